use bson::{self, Bson};

use super::error::{CommandError, WriteConcernError, WriteError};

/// The per-kind effect of one successfully applied write item.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteEffect {
    Insert { inserted_count: i64 },
    Update {
        matched_count: i64,
        modified_count: i64,
        upserted_id: Option<Bson>,
    },
    Delete { deleted_count: i64 },
}

/// The result of applying one write item.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Success(WriteEffect),
    Failure(WriteError),
}

/// Running totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub num_inserted: i64,
    // The number of docs modified and updated (inc no-ops and upserts).
    // NOTE: The difference of the two are the number of no-ops plus upserts.
    pub num_updated: i64,
    pub num_modified: i64,
    pub num_upserted: i64,
    pub num_deleted: i64,
}

/// Results reported by a storage update primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: i64,
    pub modified_count: i64,
    pub upserted_id: Option<Bson>,
}

/// Results reported by a storage delete primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: i64,
}

/// The identifier generated for an upserted document, keyed by item index.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedId {
    pub index: usize,
    pub id: Bson,
}

/// The aggregated result of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub ok: bool,
    pub stats: WriteStats,
    pub write_errors: Vec<WriteError>,
    pub upserted: Vec<UpsertedId>,
    pub write_concern_error: Option<WriteConcernError>,
    /// Set when the batch was rejected or aborted as a whole.
    pub error: Option<CommandError>,
}

/// Collects the pieces of a `WriteResponse` while a batch runs.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    stats: WriteStats,
    write_errors: Vec<WriteError>,
    upserted: Vec<UpsertedId>,
    write_concern_error: Option<WriteConcernError>,
    error: Option<CommandError>,
}

impl WriteEffect {
    pub fn upserted_id(&self) -> Option<&Bson> {
        match *self {
            WriteEffect::Update { upserted_id: Some(ref id), .. } => Some(id),
            _ => None,
        }
    }

    /// The number of documents this effect touched, as reported in `n`.
    pub fn n(&self) -> i64 {
        match *self {
            WriteEffect::Insert { inserted_count } => inserted_count,
            WriteEffect::Update { matched_count, .. } => matched_count,
            WriteEffect::Delete { deleted_count } => deleted_count,
        }
    }
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        match *self {
            WriteOutcome::Success(_) => true,
            WriteOutcome::Failure(_) => false,
        }
    }
}

impl WriteStats {
    pub fn new() -> WriteStats {
        Default::default()
    }

    /// Folds the effect of one successful item into the running totals.
    pub fn merge(&mut self, effect: &WriteEffect) {
        match *effect {
            WriteEffect::Insert { inserted_count } => self.num_inserted += inserted_count,
            WriteEffect::Update { matched_count, modified_count, ref upserted_id } => {
                self.num_updated += matched_count;
                self.num_modified += modified_count;
                if upserted_id.is_some() {
                    self.num_upserted += 1;
                }
            }
            WriteEffect::Delete { deleted_count } => self.num_deleted += deleted_count,
        }
    }

    /// Merges an outcome; failures leave the totals untouched.
    pub fn merge_outcome(&mut self, outcome: &WriteOutcome) {
        if let WriteOutcome::Success(ref effect) = *outcome {
            self.merge(effect);
        }
    }

    /// The total reported as `n`: inserted, matched (including upserted) and deleted.
    pub fn n(&self) -> i64 {
        self.num_inserted + self.num_updated + self.num_deleted
    }
}

impl UpdateResult {
    pub fn new(matched_count: i64, modified_count: i64) -> UpdateResult {
        UpdateResult {
            matched_count: matched_count,
            modified_count: modified_count,
            upserted_id: None,
        }
    }

    pub fn upserted(id: Bson) -> UpdateResult {
        UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id),
        }
    }
}

impl DeleteResult {
    pub fn new(deleted_count: i64) -> DeleteResult {
        DeleteResult { deleted_count: deleted_count }
    }
}

impl UpsertedId {
    pub fn new(index: usize, id: Bson) -> UpsertedId {
        UpsertedId { index: index, id: id }
    }
}

impl ResponseBuilder {
    pub fn new() -> ResponseBuilder {
        Default::default()
    }

    /// Records a successful item.
    pub fn record_success(&mut self, index: usize, effect: &WriteEffect) {
        self.stats.merge(effect);

        if let Some(id) = effect.upserted_id() {
            self.upserted.push(UpsertedId::new(index, id.clone()));
        }
    }

    /// Records a failed item. Items are processed in order, so errors stay sorted by index.
    pub fn record_failure(&mut self, error: WriteError) {
        self.write_errors.push(error);
    }

    pub fn set_write_concern_error(&mut self, error: WriteConcernError) {
        self.write_concern_error = Some(error);
    }

    pub fn set_error(&mut self, error: CommandError) {
        self.error = Some(error);
    }

    pub fn stats(&self) -> &WriteStats {
        &self.stats
    }

    pub fn build(self) -> WriteResponse {
        WriteResponse {
            ok: self.error.is_none() && self.write_concern_error.is_none(),
            stats: self.stats,
            write_errors: self.write_errors,
            upserted: self.upserted,
            write_concern_error: self.write_concern_error,
            error: self.error,
        }
    }
}

impl WriteResponse {
    /// A response for a batch that was refused before any item ran.
    pub fn rejected(error: CommandError) -> WriteResponse {
        let mut builder = ResponseBuilder::new();
        builder.set_error(error);
        builder.build()
    }

    pub fn has_write_errors(&self) -> bool {
        !self.write_errors.is_empty()
    }

    /// The generated identifier for the item at `index`, if it upserted.
    pub fn upserted_id(&self, index: usize) -> Option<&Bson> {
        self.upserted.iter().find(|u| u.index == index).map(|u| &u.id)
    }
}

impl From<WriteResponse> for bson::Document {
    fn from(response: WriteResponse) -> Self {
        let mut document = bson::Document::new();

        document.insert("ok", Bson::FloatingPoint(if response.ok { 1.0 } else { 0.0 }));
        document.insert("n", Bson::I64(response.stats.n()));
        document.insert("nModified", Bson::I64(response.stats.num_modified));

        if !response.upserted.is_empty() {
            let upserted = response
                .upserted
                .into_iter()
                .map(|u| {
                    let mut entry = bson::Document::new();
                    entry.insert("index", Bson::I32(u.index as i32));
                    entry.insert("_id", u.id);
                    Bson::Document(entry)
                })
                .collect();
            document.insert("upserted", Bson::Array(upserted));
        }

        if !response.write_errors.is_empty() {
            let errors = response
                .write_errors
                .into_iter()
                .map(|e| Bson::Document(bson::Document::from(e)))
                .collect();
            document.insert("writeErrors", Bson::Array(errors));
        }

        if let Some(error) = response.write_concern_error {
            document.insert("writeConcernError", Bson::Document(bson::Document::from(error)));
        }

        if let Some(error) = response.error {
            document.insert("code", Bson::I32(error.code.as_i32()));
            document.insert("errmsg", Bson::String(error.message));
        }

        document
    }
}
