//! Monitorable write types.
use crate::coll::options::WriteModel;

/// Write operations that can be monitored and counted by the executor.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CommandType {
    DeleteMany,
    DeleteOne,
    InsertOne,
    UpdateMany,
    UpdateOne,
}

impl CommandType {
    pub fn to_str(&self) -> &str {
        match *self {
            CommandType::DeleteMany => "delete_many",
            CommandType::DeleteOne => "delete_one",
            CommandType::InsertOne => "insert_one",
            CommandType::UpdateMany => "update_many",
            CommandType::UpdateOne => "update_one",
        }
    }

    /// The command type issued for a single write model.
    pub fn for_model(model: &WriteModel) -> CommandType {
        match *model {
            WriteModel::Insert { .. } => CommandType::InsertOne,
            WriteModel::Update { multi: true, .. } => CommandType::UpdateMany,
            WriteModel::Update { multi: false, .. } => CommandType::UpdateOne,
            WriteModel::Delete { limit_one: true, .. } => CommandType::DeleteOne,
            WriteModel::Delete { limit_one: false, .. } => CommandType::DeleteMany,
        }
    }

    pub fn is_insert(&self) -> bool {
        *self == CommandType::InsertOne
    }

    pub fn is_update(&self) -> bool {
        match *self {
            CommandType::UpdateMany | CommandType::UpdateOne => true,
            _ => false,
        }
    }

    pub fn is_delete(&self) -> bool {
        match *self {
            CommandType::DeleteMany | CommandType::DeleteOne => true,
            _ => false,
        }
    }
}
