mod error;
mod memory;

pub use error::KvError;
pub use memory::MemoryKvStore;
pub use k8_registry_config::DEFAULT_HISTORY_LIMIT;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// global change counter of the store
pub type Revision = u64;

pub type SharedKvStore = Arc<dyn KvStore>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Vec<u8>,
    /// revision at which key was created
    pub create_revision: Revision,
    /// revision of last modification, used as version token for conditional writes
    pub mod_revision: Revision,
}

#[derive(Debug, Clone, Default)]
pub struct KvList {
    pub entries: Vec<KvEntry>,
    /// store revision at the time of listing
    pub revision: Revision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOp {
    Put,
    Delete,
}

/// raw mutation as seen on the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub key: String,
    /// none for delete
    pub value: Option<Vec<u8>>,
    /// value before this mutation, none if key did not exist
    pub prev_value: Option<Vec<u8>>,
    pub revision: Revision,
    pub op: RawOp,
}

/// change feed, dropping the stream releases the subscription
pub type RawEventStream = BoxStream<'static, RawEvent>;

/// backing store contract
#[async_trait]
pub trait KvStore: Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<KvEntry>, KvError>;

    /// all entries whose key starts with prefix, in key order
    async fn list(&self, prefix: &str) -> Result<KvList, KvError>;

    /// write only if key doesn't exist
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<KvEntry, KvError>;

    /// unconditional write
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<KvEntry, KvError>;

    /// write only if key's mod revision still equals expected
    async fn compare_and_put(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Revision,
    ) -> Result<KvEntry, KvError>;

    /// remove key, returning last entry.
    /// if expected is given, key's mod revision must match
    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<KvEntry, KvError>;

    /// subscribe to mutations under prefix with revision greater than since.
    /// if since is none, only changes after now are delivered
    async fn watch(&self, prefix: &str, since: Option<Revision>)
        -> Result<RawEventStream, KvError>;

    /// current revision
    async fn revision(&self) -> Result<Revision, KvError>;
}
