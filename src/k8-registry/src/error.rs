use std::fmt;

use thiserror::Error;

use k8_kv_store::KvError;

use crate::codec::CodecError;
use crate::strategy::FieldError;

/// kind of failure, lets caller tell "retry" from "fix input" from "does not exist"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Conflict,
    Invalid,
    Timeout,
    Cancelled,
    Corrupt,
    EncodingFailed,
    BadSelector,
    Gone,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{key}: not found")]
    NotFound { key: String },
    #[error("{key}: already exists")]
    AlreadyExists { key: String },
    #[error("{key}: conflict, {message}")]
    Conflict { key: String, message: String },
    #[error("{key}: invalid, {}", FieldErrors(.errors))]
    Invalid {
        key: String,
        errors: Vec<FieldError>,
    },
    #[error("{key}: timed out")]
    Timeout { key: String },
    #[error("{key}: cancelled")]
    Cancelled { key: String },
    #[error("{key}: corrupt record: {source}")]
    Corrupt { key: String, source: CodecError },
    #[error("{key}: encoding failed: {source}")]
    EncodingFailed { key: String, source: CodecError },
    #[error("bad selector: {0}")]
    BadSelector(String),
    #[error("{key}: {message}")]
    Gone { key: String, message: String },
    #[error("{key}: store error: {source}")]
    Store { key: String, source: KvError },
}

struct FieldErrors<'a>(&'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl RegistryError {
    /// translate store error for key
    pub(crate) fn from_kv(key: &str, error: KvError) -> Self {
        let key = key.to_owned();
        match error {
            KvError::NotFound { .. } => Self::NotFound { key },
            KvError::KeyExists { .. } => Self::AlreadyExists { key },
            KvError::VersionMismatch {
                expected, actual, ..
            } => Self::Conflict {
                key,
                message: format!(
                    "object has been modified, expected version {} but found {}",
                    expected, actual
                ),
            },
            KvError::Compacted { requested, oldest } => Self::Gone {
                key,
                message: format!(
                    "too old resource version: {} (oldest available: {})",
                    requested, oldest
                ),
            },
            source => Self::Store { key, source },
        }
    }

    pub(crate) fn invalid(key: &str, errors: Vec<FieldError>) -> Self {
        Self::Invalid {
            key: key.to_owned(),
            errors,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Corrupt { .. } => ErrorKind::Corrupt,
            Self::EncodingFailed { .. } => ErrorKind::EncodingFailed,
            Self::BadSelector(_) => ErrorKind::BadSelector,
            Self::Gone { .. } => ErrorKind::Gone,
            Self::Store { .. } => ErrorKind::Store,
        }
    }

    /// target key, if failure is about a single key or prefix
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::NotFound { key }
            | Self::AlreadyExists { key }
            | Self::Conflict { key, .. }
            | Self::Invalid { key, .. }
            | Self::Timeout { key }
            | Self::Cancelled { key }
            | Self::Corrupt { key, .. }
            | Self::EncodingFailed { key, .. }
            | Self::Gone { key, .. }
            | Self::Store { key, .. } => Some(key),
            Self::BadSelector(_) => None,
        }
    }

    /// only conflicts may succeed when retried against fresh state
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// field errors of a validation failure
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Invalid { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod test {

    use k8_kv_store::KvError;

    use super::ErrorKind;
    use super::RegistryError;
    use crate::strategy::FieldError;

    #[test]
    fn test_kv_error_mapping() {
        let key = "/registry/deployments/ns/a";
        let conflict = RegistryError::from_kv(
            key,
            KvError::VersionMismatch {
                key: key.to_owned(),
                expected: 1,
                actual: 2,
            },
        );
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert!(conflict.is_retryable());
        assert_eq!(conflict.key(), Some(key));

        let missing = RegistryError::from_kv(key, KvError::NotFound { key: key.to_owned() });
        assert!(missing.is_not_found());
        assert!(!missing.is_retryable());

        let gone = RegistryError::from_kv(
            key,
            KvError::Compacted {
                requested: 1,
                oldest: 5,
            },
        );
        assert_eq!(gone.kind(), ErrorKind::Gone);

        let store = RegistryError::from_kv(key, KvError::LockPoison);
        assert_eq!(store.kind(), ErrorKind::Store);
    }

    #[test]
    fn test_invalid_display() {
        let error = RegistryError::invalid(
            "/registry/deployments/ns/a",
            vec![
                FieldError::required("spec.selector", "selector must not be empty"),
                FieldError::invalid("spec.replicas", "-1", "must be non-negative"),
            ],
        );
        assert_eq!(error.field_errors().len(), 2);
        assert_eq!(
            error.to_string(),
            "/registry/deployments/ns/a: invalid, spec.selector: Required value: selector must not be empty, \
             spec.replicas: Invalid value \"-1\": must be non-negative"
        );
    }
}
