use std::sync::PoisonError;

use thiserror::Error;

use crate::Revision;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    #[error("key not found: {key}")]
    NotFound { key: String },
    #[error("key already exists: {key}")]
    KeyExists { key: String },
    #[error("version mismatch on {key}: expected {expected}, actual {actual}")]
    VersionMismatch {
        key: String,
        expected: Revision,
        actual: Revision,
    },
    #[error("revision {requested} has been compacted, oldest available: {oldest}")]
    Compacted {
        requested: Revision,
        oldest: Revision,
    },
    #[error("lock poison error")]
    LockPoison,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl<T> From<PoisonError<T>> for KvError {
    fn from(_error: PoisonError<T>) -> Self {
        Self::LockPoison
    }
}
