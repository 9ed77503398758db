//! Update modification parsing, application and upsert document synthesis.
use bson::{oid, Bson, Document};

use crate::coll::error::ErrorCode;
use crate::matcher::{self, Query};
use crate::{Error, Result};

/// A parsed update modification: either a whole-document replacement or a list of
/// field-level operators applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Replacement(Document),
    Operators(Vec<Modifier>),
}

/// One `$op: { path: value }` entry of an operator update.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub path: String,
    pub value: Bson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKind {
    Set,
    Unset,
    Inc,
    Mul,
    Push,
    AddToSet,
}

impl ModifierKind {
    fn parse(op: &str) -> Option<ModifierKind> {
        match op {
            "$set" => Some(ModifierKind::Set),
            "$unset" => Some(ModifierKind::Unset),
            "$inc" => Some(ModifierKind::Inc),
            "$mul" => Some(ModifierKind::Mul),
            "$push" => Some(ModifierKind::Push),
            "$addToSet" => Some(ModifierKind::AddToSet),
            _ => None,
        }
    }

    fn to_str(&self) -> &str {
        match *self {
            ModifierKind::Set => "$set",
            ModifierKind::Unset => "$unset",
            ModifierKind::Inc => "$inc",
            ModifierKind::Mul => "$mul",
            ModifierKind::Push => "$push",
            ModifierKind::AddToSet => "$addToSet",
        }
    }
}

impl UpdateSpec {
    /// Parses an update document. Keys must be either all operators or all plain fields.
    pub fn parse(update: &Document) -> Result<UpdateSpec> {
        let operator_keys = update.keys().filter(|key| key.starts_with('$')).count();

        if operator_keys == 0 {
            return Ok(UpdateSpec::Replacement(update.clone()));
        }

        if operator_keys != update.len() {
            let field = update.keys().find(|key| !key.starts_with('$')).cloned().unwrap_or_default();
            return Err(Error::write(
                ErrorCode::FailedToParse,
                format!("Unknown modifier: {}. Cannot mix update operators and fields", field),
            ));
        }

        let mut modifiers = Vec::new();

        for (op, operand) in update.iter() {
            let kind = match ModifierKind::parse(op) {
                Some(kind) => kind,
                None => {
                    return Err(Error::write(
                        ErrorCode::FailedToParse,
                        format!("Unknown modifier: {}", op),
                    ))
                }
            };

            let fields = match *operand {
                Bson::Document(ref fields) => fields,
                ref other => {
                    return Err(Error::write(
                        ErrorCode::FailedToParse,
                        format!(
                            "Modifiers operate on fields but we found type {} instead. For example: \
                             {{$mod: {{<field>: ...}}}} not {{{}: {:?}}}",
                            type_name(other),
                            op,
                            other
                        ),
                    ))
                }
            };

            if fields.is_empty() {
                return Err(Error::write(
                    ErrorCode::FailedToParse,
                    format!(
                        "'{}' is empty. You must specify a field like so: {{{}: {{<field>: ...}}}}",
                        op, op
                    ),
                ));
            }

            for (path, value) in fields.iter() {
                validate_path(path)?;

                if (kind == ModifierKind::Inc || kind == ModifierKind::Mul) && !is_numeric(value) {
                    return Err(Error::write(
                        ErrorCode::TypeMismatch,
                        format!(
                            "Cannot {} with non-numeric argument: {{{}: {:?}}}",
                            if kind == ModifierKind::Inc { "increment" } else { "multiply" },
                            path,
                            value
                        ),
                    ));
                }

                modifiers.push(Modifier {
                    kind: kind,
                    path: path.to_owned(),
                    value: value.clone(),
                });
            }
        }

        Ok(UpdateSpec::Operators(modifiers))
    }

    pub fn is_replacement(&self) -> bool {
        match *self {
            UpdateSpec::Replacement(_) => true,
            UpdateSpec::Operators(_) => false,
        }
    }

    /// The `_id` the modification itself supplies, if any.
    pub fn supplied_id(&self) -> Option<&Bson> {
        match *self {
            UpdateSpec::Replacement(ref doc) => doc.get("_id"),
            UpdateSpec::Operators(ref modifiers) => modifiers
                .iter()
                .find(|m| m.kind == ModifierKind::Set && m.path == "_id")
                .map(|m| &m.value),
        }
    }

    /// Applies the modification to a copy of `original`. The result equals the original
    /// when the modification is a no-op for this document.
    pub fn apply(&self, original: &Document) -> Result<Document> {
        let updated = match *self {
            UpdateSpec::Replacement(ref replacement) => {
                if let (Some(old), Some(new)) = (original.get("_id"), replacement.get("_id")) {
                    if !matcher::values_equal(old, new) {
                        return Err(Error::write(
                            ErrorCode::ImmutableField,
                            format!("The _id field cannot be changed from {{_id: {}}} to {{_id: {}}}.", old, new),
                        ));
                    }
                }

                match original.get("_id") {
                    Some(id) => with_id_first(id.clone(), replacement),
                    None => replacement.clone(),
                }
            }
            UpdateSpec::Operators(ref modifiers) => {
                let mut updated = original.clone();
                for modifier in modifiers {
                    modifier.apply(&mut updated)?;
                }
                updated
            }
        };

        if !self.is_replacement() {
            check_id_unchanged(original.get("_id"), updated.get("_id"))?;
        }

        Ok(updated)
    }

    /// Builds the document to insert when an upsert matches nothing.
    ///
    /// Operator updates start from the query's equality fields; replacements start from the
    /// replacement itself. The `_id` comes from the modification, then the query, and is
    /// generated otherwise.
    pub fn upsert_document(&self, query: &Query) -> Result<Document> {
        let query_id = query.id_equality();

        if let (Some(ref from_query), Some(from_update)) = (query_id.as_ref(), self.supplied_id()) {
            if !matcher::values_equal(from_query, from_update) {
                return Err(Error::write(
                    ErrorCode::ImmutableField,
                    format!(
                        "conflicting _id for upsert: query has {{_id: {}}} but update has {{_id: {}}}",
                        from_query, from_update
                    ),
                ));
            }
        }

        let mut document = match *self {
            UpdateSpec::Replacement(ref replacement) => replacement.clone(),
            UpdateSpec::Operators(ref modifiers) => {
                let mut seed = Document::new();
                for (path, value) in query.equality_fields() {
                    set_path(&mut seed, &path, value)?;
                }

                let seeded_id = seed.get("_id").cloned();
                for modifier in modifiers {
                    modifier.apply(&mut seed)?;
                }
                check_id_unchanged(seeded_id.as_ref(), seed.get("_id"))?;
                seed
            }
        };

        let id = match document.remove("_id").or(query_id) {
            Some(id) => id,
            None => Bson::ObjectId(oid::ObjectId::new()?),
        };

        document = with_id_first(id, &document);
        Ok(document)
    }
}

impl Modifier {
    fn apply(&self, document: &mut Document) -> Result<()> {
        match self.kind {
            ModifierKind::Set => set_path(document, &self.path, self.value.clone()),
            ModifierKind::Unset => {
                unset_path(document, &self.path);
                Ok(())
            }
            ModifierKind::Inc | ModifierKind::Mul => {
                let result = match matcher::lookup(document, &self.path) {
                    None if self.kind == ModifierKind::Inc => self.value.clone(),
                    None => zero_like(&self.value),
                    Some(current) if is_numeric(current) => {
                        arithmetic(self.kind, current, &self.value)
                    }
                    Some(current) => {
                        return Err(Error::write(
                            ErrorCode::TypeMismatch,
                            format!(
                                "Cannot apply {} to a value of non-numeric type. The field '{}' \
                                 is of non-numeric type {}",
                                self.kind.to_str(),
                                self.path,
                                type_name(current)
                            ),
                        ))
                    }
                };
                set_path(document, &self.path, result)
            }
            ModifierKind::Push | ModifierKind::AddToSet => {
                let mut elements = match matcher::lookup(document, &self.path) {
                    None => Vec::new(),
                    Some(&Bson::Array(ref elements)) => elements.clone(),
                    Some(other) => {
                        return Err(Error::write(
                            ErrorCode::BadValue,
                            format!(
                                "The field '{}' must be an array but is of type {}",
                                self.path,
                                type_name(other)
                            ),
                        ))
                    }
                };

                let present = elements.iter().any(|e| matcher::values_equal(e, &self.value));
                if self.kind == ModifierKind::Push || !present {
                    elements.push(self.value.clone());
                }
                set_path(document, &self.path, Bson::Array(elements))
            }
        }
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.split('.').any(|segment| segment.is_empty()) {
        return Err(Error::write(
            ErrorCode::FailedToParse,
            format!("The update path '{}' contains an empty field name, which is not allowed.", path),
        ));
    }
    Ok(())
}

fn check_id_unchanged(before: Option<&Bson>, after: Option<&Bson>) -> Result<()> {
    let unchanged = match (before, after) {
        (Some(old), Some(new)) => matcher::values_equal(old, new),
        (None, _) => true,
        (Some(_), None) => false,
    };

    if unchanged {
        Ok(())
    } else {
        Err(Error::write(
            ErrorCode::ImmutableField,
            "Performing an update on the path '_id' would modify the immutable field '_id'",
        ))
    }
}

fn with_id_first(id: Bson, document: &Document) -> Document {
    let mut fixed = Document::new();
    fixed.insert("_id", id);

    for (key, value) in document.iter() {
        if key != "_id" {
            fixed.insert(key.to_owned(), value.clone());
        }
    }

    fixed
}

/// Sets a dotted path, creating intermediate documents as needed.
pub fn set_path(document: &mut Document, path: &str, value: Bson) -> Result<()> {
    match path.find('.') {
        None => {
            // Replace in place; re-inserting would move the field to the end.
            match document.get_mut(path) {
                Some(slot) => *slot = value,
                None => {
                    document.insert(path.to_owned(), value);
                }
            }
            Ok(())
        }
        Some(idx) => {
            let (head, rest) = (&path[..idx], &path[idx + 1..]);

            if !document.contains_key(head) {
                document.insert(head.to_owned(), Bson::Document(Document::new()));
            }

            match document.get_mut(head) {
                Some(&mut Bson::Document(ref mut inner)) => set_path(inner, rest, value),
                Some(&mut Bson::Array(ref mut elements)) => {
                    set_array_path(elements, head, rest, value)
                }
                Some(other) => Err(not_viable(rest, head, other)),
                None => Err(Error::write(ErrorCode::InternalError, "path vanished during update")),
            }
        }
    }
}

fn set_array_path(elements: &mut Vec<Bson>, head: &str, rest: &str, value: Bson) -> Result<()> {
    let (segment, tail) = match rest.find('.') {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };

    let position = match segment.parse::<usize>() {
        Ok(position) if position < elements.len() => position,
        _ => {
            return Err(Error::write(
                ErrorCode::PathNotViable,
                format!("cannot use the part ({} of {}.{}) to traverse the element", segment, head, rest),
            ))
        }
    };

    match (tail, &mut elements[position]) {
        (None, slot) => {
            *slot = value;
            Ok(())
        }
        (Some(tail), &mut Bson::Document(ref mut inner)) => set_path(inner, tail, value),
        (Some(tail), other) => Err(not_viable(tail, segment, other)),
    }
}

fn not_viable(field: &str, parent: &str, value: &Bson) -> Error {
    let name = field.split('.').next().unwrap_or(field);
    Error::write(
        ErrorCode::PathNotViable,
        format!("Cannot create field '{}' in element {{{}: {}}}", name, parent, value),
    )
}

/// Removes a dotted path if it exists.
pub fn unset_path(document: &mut Document, path: &str) {
    match path.find('.') {
        None => {
            document.remove(path);
        }
        Some(idx) => {
            if let Some(&mut Bson::Document(ref mut inner)) = document.get_mut(&path[..idx]) {
                unset_path(inner, &path[idx + 1..]);
            }
        }
    }
}

fn is_numeric(value: &Bson) -> bool {
    match *value {
        Bson::I32(_) | Bson::I64(_) | Bson::FloatingPoint(_) => true,
        _ => false,
    }
}

fn zero_like(value: &Bson) -> Bson {
    match *value {
        Bson::I32(_) => Bson::I32(0),
        Bson::I64(_) => Bson::I64(0),
        _ => Bson::FloatingPoint(0.0),
    }
}

fn arithmetic(kind: ModifierKind, current: &Bson, operand: &Bson) -> Bson {
    let checked = |a: i64, b: i64| if kind == ModifierKind::Inc {
        a.checked_add(b)
    } else {
        a.checked_mul(b)
    };
    let float = |a: f64, b: f64| if kind == ModifierKind::Inc { a + b } else { a * b };

    match (current, operand) {
        (&Bson::I32(a), &Bson::I32(b)) => {
            match checked(a as i64, b as i64) {
                Some(n) if n >= i32::min_value() as i64 && n <= i32::max_value() as i64 => {
                    Bson::I32(n as i32)
                }
                Some(n) => Bson::I64(n),
                None => Bson::FloatingPoint(float(a as f64, b as f64)),
            }
        }
        (&Bson::I32(a), &Bson::I64(b)) => int64(checked(a as i64, b), float(a as f64, b as f64)),
        (&Bson::I64(a), &Bson::I32(b)) => int64(checked(a, b as i64), float(a as f64, b as f64)),
        (&Bson::I64(a), &Bson::I64(b)) => int64(checked(a, b), float(a as f64, b as f64)),
        _ => Bson::FloatingPoint(float(as_f64(current), as_f64(operand))),
    }
}

fn int64(result: Option<i64>, fallback: f64) -> Bson {
    result.map(Bson::I64).unwrap_or(Bson::FloatingPoint(fallback))
}

fn as_f64(value: &Bson) -> f64 {
    match *value {
        Bson::I32(n) => n as f64,
        Bson::I64(n) => n as f64,
        Bson::FloatingPoint(f) => f,
        _ => 0.0,
    }
}

/// A short name for a value's BSON type, used in error messages.
pub fn type_name(value: &Bson) -> &'static str {
    match *value {
        Bson::FloatingPoint(_) => "double",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::Boolean(_) => "bool",
        Bson::Null => "null",
        Bson::RegExp(..) => "regex",
        Bson::I32(_) => "int",
        Bson::I64(_) => "long",
        Bson::ObjectId(_) => "objectId",
        Bson::UtcDatetime(_) => "date",
        Bson::Binary(..) => "binData",
        _ => "other",
    }
}
