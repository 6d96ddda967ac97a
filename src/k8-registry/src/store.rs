use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use chrono::Utc;
use tracing::debug;
use tracing::trace;
use uuid::Uuid;

use k8_kv_store::KvEntry;
use k8_kv_store::Revision;
use k8_kv_store::SharedKvStore;
use k8_registry_config::RegistryConfig;
use k8_types::K8List;
use k8_types::K8Obj;
use k8_types::Spec;

use crate::codec::Codec;
use crate::codec::JsonCodec;
use crate::context::RequestContext;
use crate::key::KeyCodec;
use crate::key::NameSpace;
use crate::selector::SelectionPredicate;
use crate::strategy::FieldError;
use crate::strategy::Strategy;
use crate::watch::WatchStream;
use crate::RegistryError;

/// conditions the stored object must meet for a write to proceed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub uid: Option<String>,
    pub resource_version: Option<String>,
}

impl Preconditions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn uid<T: Into<String>>(mut self, uid: T) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn resource_version<T: Into<String>>(mut self, version: T) -> Self {
        self.resource_version = Some(version.into());
        self
    }

    /// non-empty resource version of payload becomes a precondition
    pub fn from_resource_version(version: &str) -> Self {
        Self {
            uid: None,
            resource_version: (!version.is_empty()).then(|| version.to_owned()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.resource_version.is_none()
    }

    fn check<S: Spec>(&self, key: &str, current: &K8Obj<S>) -> Result<(), RegistryError> {
        if let Some(uid) = &self.uid {
            if *uid != current.metadata.uid {
                return Err(RegistryError::Conflict {
                    key: key.to_owned(),
                    message: format!(
                        "precondition failed: uid in precondition: {}, uid in object meta: {}",
                        uid, current.metadata.uid
                    ),
                });
            }
        }
        if let Some(version) = &self.resource_version {
            if *version != current.metadata.resource_version {
                return Err(RegistryError::Conflict {
                    key: key.to_owned(),
                    message: format!(
                        "the object has been modified, resource version in request: {}, in store: {}",
                        version, current.metadata.resource_version
                    ),
                });
            }
        }
        Ok(())
    }
}

/// typed objects over the key-value store.
///
/// every write is validated by the strategy, updates are compare-and-swap
/// on the record version and retried against a fresh read on conflict
#[derive(Debug, Clone)]
pub struct ObjectStore<S: Spec> {
    kv: SharedKvStore,
    codec: Arc<dyn Codec<S>>,
    strategy: Arc<dyn Strategy<S>>,
    keys: KeyCodec,
    max_attempts: u32,
    request_timeout: Duration,
}

impl<S: Spec> ObjectStore<S> {
    pub fn new(kv: SharedKvStore, strategy: Arc<dyn Strategy<S>>, config: &RegistryConfig) -> Self {
        Self {
            kv,
            codec: Arc::new(JsonCodec),
            strategy,
            keys: KeyCodec::new::<S>(&config.storage.prefix),
            max_attempts: config.update.max_attempts.max(1),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec<S>>) -> Self {
        self.codec = codec;
        self
    }

    /// same records, different write hooks
    pub fn with_strategy(&self, strategy: Arc<dyn Strategy<S>>) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    pub fn keys(&self) -> &KeyCodec {
        &self.keys
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn encode(&self, key: &str, obj: &K8Obj<S>) -> Result<Vec<u8>, RegistryError> {
        self.codec
            .encode(obj)
            .map_err(|source| RegistryError::EncodingFailed {
                key: key.to_owned(),
                source,
            })
    }

    fn decode(&self, entry: &KvEntry) -> Result<K8Obj<S>, RegistryError> {
        let mut obj = self
            .codec
            .decode(&entry.value)
            .map_err(|source| RegistryError::Corrupt {
                key: entry.key.clone(),
                source,
            })?;
        obj.metadata.resource_version = entry.mod_revision.to_string();
        Ok(obj)
    }

    fn validation_result(key: &str, errors: Vec<FieldError>) -> Result<(), RegistryError> {
        if errors.is_empty() {
            Ok(())
        } else {
            debug!(key, ?errors, "{} failed validation", S::label());
            Err(RegistryError::invalid(key, errors))
        }
    }

    /// store new object, fails if one already exists under its key.
    /// uid, creation timestamp and resource version are assigned here
    pub async fn create(
        &self,
        ctx: &RequestContext,
        mut obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, RegistryError> {
        let key = self
            .keys
            .item_key(&obj.metadata.namespace, &obj.metadata.name)?;

        obj.api_version = S::api_version();
        obj.kind = S::kind();
        obj.metadata.uid = Uuid::new_v4().to_string();
        obj.metadata.creation_timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        obj.metadata.resource_version.clear();
        self.strategy.prepare_for_create(&mut obj);
        Self::validation_result(&key, self.strategy.validate_create(&obj))?;

        let value = self.encode(&key, &obj)?;
        let entry = ctx
            .run(self.request_timeout, &key, self.kv.create(&key, value))
            .await?;
        obj.metadata.resource_version = entry.mod_revision.to_string();
        debug!(key = %key, version = entry.mod_revision, "{} created", S::label());
        Ok(obj)
    }

    async fn read(&self, ctx: &RequestContext, key: &str) -> Result<(K8Obj<S>, Revision), RegistryError> {
        let entry = ctx
            .run(self.request_timeout, key, self.kv.get(key))
            .await?
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_owned(),
            })?;
        Ok((self.decode(&entry)?, entry.mod_revision))
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
    ) -> Result<K8Obj<S>, RegistryError> {
        let key = self.keys.item_key(namespace, name)?;
        trace!(key = %key, "get {}", S::label());
        let (obj, _) = self.read(ctx, &key).await?;
        Ok(obj)
    }

    /// read-modify-write under optimistic concurrency.
    ///
    /// try_update receives the current object and returns the desired one.
    /// it may run several times, each time against a freshly read object,
    /// until the write is not raced or attempts run out
    pub async fn update<F>(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        preconditions: &Preconditions,
        mut try_update: F,
    ) -> Result<K8Obj<S>, RegistryError>
    where
        F: FnMut(K8Obj<S>) -> Result<K8Obj<S>, RegistryError> + Send,
    {
        let key = self.keys.item_key(namespace, name)?;

        for attempt in 1..=self.max_attempts {
            let (current, version) = self.read(ctx, &key).await?;
            preconditions.check(&key, &current)?;

            let mut candidate = try_update(current.clone())?;
            candidate.api_version = S::api_version();
            candidate.kind = S::kind();
            self.strategy.prepare_for_update(&mut candidate, &current);
            Self::validation_result(&key, self.strategy.validate_update(&current, &candidate))?;

            candidate.metadata.resource_version.clear();
            let value = self.encode(&key, &candidate)?;
            match ctx
                .run(
                    self.request_timeout,
                    &key,
                    self.kv.compare_and_put(&key, value, version),
                )
                .await
            {
                Ok(entry) => {
                    candidate.metadata.resource_version = entry.mod_revision.to_string();
                    debug!(key = %key, attempt, version = entry.mod_revision, "{} updated", S::label());
                    return Ok(candidate);
                }
                Err(err) if err.is_retryable() => {
                    debug!(key = %key, attempt, "{} update raced, retrying", S::label());
                }
                Err(err) => return Err(err),
            }
        }

        Err(RegistryError::Conflict {
            key,
            message: format!(
                "gave up after {} attempts, object keeps changing",
                self.max_attempts
            ),
        })
    }

    /// remove object, returning its last stored state
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        namespace: &str,
        name: &str,
        preconditions: &Preconditions,
    ) -> Result<K8Obj<S>, RegistryError> {
        let key = self.keys.item_key(namespace, name)?;

        for attempt in 1..=self.max_attempts {
            let (current, version) = self.read(ctx, &key).await?;
            preconditions.check(&key, &current)?;

            match ctx
                .run(
                    self.request_timeout,
                    &key,
                    self.kv.delete(&key, Some(version)),
                )
                .await
            {
                Ok(_) => {
                    debug!(key = %key, attempt, "{} deleted", S::label());
                    return Ok(current);
                }
                Err(err) if err.is_retryable() => {
                    debug!(key = %key, attempt, "{} delete raced, retrying", S::label());
                }
                Err(err) => return Err(err),
            }
        }

        Err(RegistryError::Conflict {
            key,
            message: format!(
                "gave up after {} attempts, object keeps changing",
                self.max_attempts
            ),
        })
    }

    /// objects in namespace that satisfy predicate, stamped with store revision
    pub async fn list(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        predicate: &SelectionPredicate,
    ) -> Result<K8List<S>, RegistryError> {
        let prefix = self.keys.namespace_prefix(namespace);
        let entries = ctx
            .run(self.request_timeout, &prefix, self.kv.list(&prefix))
            .await?;

        let mut list = K8List::new();
        for entry in &entries.entries {
            let obj = self.decode(entry)?;
            if predicate.matches(&obj) {
                list.items.push(obj);
            }
        }
        list.metadata.resource_version = entries.revision.to_string();
        trace!(prefix = %prefix, items = list.items.len(), "{} list", S::label());
        Ok(list)
    }

    /// typed change feed of namespace.
    ///
    /// with resource version, changes after that version are replayed first.
    /// without one, only changes after now are delivered
    pub async fn watch(
        &self,
        ctx: &RequestContext,
        namespace: &NameSpace,
        predicate: SelectionPredicate,
        resource_version: Option<&str>,
    ) -> Result<WatchStream<S>, RegistryError> {
        let prefix = self.keys.namespace_prefix(namespace);
        let since = parse_resource_version(&prefix, resource_version)?;
        let raw = ctx
            .run(self.request_timeout, &prefix, self.kv.watch(&prefix, since))
            .await?;
        debug!(prefix = %prefix, ?since, "{} watch started", S::label());
        Ok(WatchStream::new(
            raw,
            self.codec.clone(),
            predicate,
            ctx,
            &prefix,
        ))
    }
}

fn parse_resource_version(
    key: &str,
    resource_version: Option<&str>,
) -> Result<Option<Revision>, RegistryError> {
    match resource_version {
        None | Some("") => Ok(None),
        Some(version) => version.parse::<Revision>().map(Some).map_err(|_| {
            RegistryError::invalid(
                key,
                vec![FieldError::invalid(
                    "metadata.resourceVersion",
                    version,
                    "must be a revision number",
                )],
            )
        }),
    }
}
