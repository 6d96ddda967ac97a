use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::channel::mpsc::unbounded;
use futures::channel::mpsc::UnboundedSender;
use futures::stream::StreamExt;
use tracing::debug;
use tracing::trace;

use k8_registry_config::StorageConfig;
use k8_registry_config::DEFAULT_HISTORY_LIMIT;

use crate::KvEntry;
use crate::KvError;
use crate::KvList;
use crate::KvStore;
use crate::RawEvent;
use crate::RawEventStream;
use crate::RawOp;
use crate::Revision;

#[derive(Debug)]
struct Watcher {
    prefix: String,
    sender: UnboundedSender<RawEvent>,
}

#[derive(Debug)]
struct Inner {
    revision: Revision,
    /// highest revision no longer in history
    compacted: Revision,
    items: BTreeMap<String, KvEntry>,
    history: VecDeque<RawEvent>,
    history_limit: usize,
    watchers: Vec<Watcher>,
}

impl Inner {
    fn new(history_limit: usize) -> Self {
        Self {
            revision: 0,
            compacted: 0,
            items: BTreeMap::new(),
            history: VecDeque::new(),
            history_limit,
            watchers: vec![],
        }
    }

    fn write(&mut self, key: &str, value: Vec<u8>) -> KvEntry {
        self.revision += 1;
        let revision = self.revision;
        let prev = self.items.get(key).cloned();
        let entry = KvEntry {
            key: key.to_owned(),
            value: value.clone(),
            create_revision: prev
                .as_ref()
                .map(|entry| entry.create_revision)
                .unwrap_or(revision),
            mod_revision: revision,
        };
        self.items.insert(key.to_owned(), entry.clone());
        self.publish(RawEvent {
            key: key.to_owned(),
            value: Some(value),
            prev_value: prev.map(|entry| entry.value),
            revision,
            op: RawOp::Put,
        });
        entry
    }

    fn remove(&mut self, key: &str) -> Option<KvEntry> {
        let prev = self.items.remove(key)?;
        self.revision += 1;
        self.publish(RawEvent {
            key: key.to_owned(),
            value: None,
            prev_value: Some(prev.value.clone()),
            revision: self.revision,
            op: RawOp::Delete,
        });
        Some(prev)
    }

    fn publish(&mut self, event: RawEvent) {
        trace!(key = %event.key, revision = event.revision, "publishing raw event");
        if self.history_limit > 0 {
            self.history.push_back(event.clone());
        } else {
            self.compacted = event.revision;
        }
        while self.history.len() > self.history_limit {
            if let Some(dropped) = self.history.pop_front() {
                self.compacted = dropped.revision;
            }
        }

        // closed watchers are released here
        self.watchers.retain(|watcher| {
            if event.key.starts_with(&watcher.prefix) {
                watcher.sender.unbounded_send(event.clone()).is_ok()
            } else {
                !watcher.sender.is_closed()
            }
        });
    }

    fn check_version(&self, key: &str, expected: Revision) -> Result<(), KvError> {
        let current = self.items.get(key).ok_or_else(|| KvError::NotFound {
            key: key.to_owned(),
        })?;
        if current.mod_revision != expected {
            return Err(KvError::VersionMismatch {
                key: key.to_owned(),
                expected,
                actual: current.mod_revision,
            });
        }
        Ok(())
    }
}

/// single process store with a global revision counter and change feed.
/// used for tests and embedding
#[derive(Debug)]
pub struct MemoryKvStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::new(history_limit)),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        debug!(history_limit = config.history_limit, "memory store");
        Self::with_history_limit(config.history_limit)
    }

    /// number of live subscriptions
    pub fn watcher_count(&self) -> Result<usize, KvError> {
        let mut inner = self.inner.write()?;
        inner.watchers.retain(|watcher| !watcher.sender.is_closed());
        Ok(inner.watchers.len())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<KvEntry>, KvError> {
        let inner = self.inner.read()?;
        Ok(inner.items.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<KvList, KvError> {
        let inner = self.inner.read()?;
        let entries = inner
            .items
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .collect();
        Ok(KvList {
            entries,
            revision: inner.revision,
        })
    }

    async fn create(&self, key: &str, value: Vec<u8>) -> Result<KvEntry, KvError> {
        let mut inner = self.inner.write()?;
        if inner.items.contains_key(key) {
            return Err(KvError::KeyExists {
                key: key.to_owned(),
            });
        }
        Ok(inner.write(key, value))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<KvEntry, KvError> {
        let mut inner = self.inner.write()?;
        Ok(inner.write(key, value))
    }

    async fn compare_and_put(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Revision,
    ) -> Result<KvEntry, KvError> {
        let mut inner = self.inner.write()?;
        inner.check_version(key, expected)?;
        Ok(inner.write(key, value))
    }

    async fn delete(&self, key: &str, expected: Option<Revision>) -> Result<KvEntry, KvError> {
        let mut inner = self.inner.write()?;
        if let Some(expected) = expected {
            inner.check_version(key, expected)?;
        }
        inner.remove(key).ok_or_else(|| KvError::NotFound {
            key: key.to_owned(),
        })
    }

    async fn watch(
        &self,
        prefix: &str,
        since: Option<Revision>,
    ) -> Result<RawEventStream, KvError> {
        let mut inner = self.inner.write()?;
        let since = since.unwrap_or(inner.revision);
        if since < inner.compacted {
            return Err(KvError::Compacted {
                requested: since,
                oldest: inner.compacted,
            });
        }

        let (sender, receiver) = unbounded();
        // replay and registration happen under the same lock so nothing is missed
        for event in inner
            .history
            .iter()
            .filter(|event| event.revision > since && event.key.starts_with(prefix))
        {
            // receiver is alive, send can't fail
            let _ = sender.unbounded_send(event.clone());
        }
        debug!(prefix, since, "registering watcher");
        inner.watchers.push(Watcher {
            prefix: prefix.to_owned(),
            sender,
        });

        Ok(receiver.boxed())
    }

    async fn revision(&self) -> Result<Revision, KvError> {
        Ok(self.inner.read()?.revision)
    }
}
