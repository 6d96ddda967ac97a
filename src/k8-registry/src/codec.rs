use std::fmt::Debug;

use thiserror::Error;

use k8_types::K8Obj;
use k8_types::Spec;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {expected} but record holds {found}")]
    KindMismatch { expected: String, found: String },
}

/// converts objects to and from stored bytes.
/// resource version is never part of stored bytes
pub trait Codec<S: Spec>: Debug + Send + Sync {
    fn encode(&self, obj: &K8Obj<S>) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<K8Obj<S>, CodecError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<S: Spec> Codec<S> for JsonCodec {
    fn encode(&self, obj: &K8Obj<S>) -> Result<Vec<u8>, CodecError> {
        if obj.metadata.resource_version.is_empty() {
            return Ok(serde_json::to_vec(obj)?);
        }

        let mut stripped = obj.clone();
        stripped.metadata.resource_version.clear();
        Ok(serde_json::to_vec(&stripped)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<K8Obj<S>, CodecError> {
        let mut obj: K8Obj<S> = serde_json::from_slice(bytes)?;
        if obj.kind != S::kind() || obj.api_version != S::api_version() {
            return Err(CodecError::KindMismatch {
                expected: format!("{}/{}", S::api_version(), S::kind()),
                found: format!("{}/{}", obj.api_version, obj.kind),
            });
        }
        obj.metadata.resource_version.clear();
        Ok(obj)
    }
}
