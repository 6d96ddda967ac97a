use futures::stream::iter;
use futures::stream::BoxStream;
use futures::stream::StreamExt;
use tracing::debug;

use k8_types::K8List;
use k8_types::K8Obj;
use k8_types::K8Watch;
use k8_types::Spec;

use crate::context::RequestContext;
use crate::key::NameSpace;
use crate::selector::ListArg;
use crate::selector::SelectionPredicate;
use crate::store::ObjectStore;
use crate::store::Preconditions;
use crate::watch::WatchItem;
use crate::watch::WatchStream;
use crate::RegistryError;

/// public operations on one kind
#[derive(Debug, Clone)]
pub struct Registry<S: Spec> {
    store: ObjectStore<S>,
}

impl<S: Spec> Registry<S> {
    pub fn new(store: ObjectStore<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ObjectStore<S> {
        &self.store
    }

    fn namespace_scope(ctx: &RequestContext) -> NameSpace {
        match ctx.namespace() {
            Some(ns) if S::NAME_SPACED => NameSpace::Named(ns.to_owned()),
            _ => NameSpace::All,
        }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        mut obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, RegistryError> {
        obj.metadata.namespace = ctx.resolve_namespace::<S>(&obj.metadata.namespace)?;
        self.store.create(ctx, obj).await
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> Result<K8Obj<S>, RegistryError> {
        let namespace = ctx.require_namespace::<S>()?;
        self.store.get(ctx, &namespace, name).await
    }

    /// replace object with payload.
    ///
    /// non-empty resource version in payload must match the stored one.
    /// empty one means last writer wins, retried on races.
    /// uid and creation timestamp are filled from the stored object when empty
    pub async fn update(
        &self,
        ctx: &RequestContext,
        obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, RegistryError> {
        let namespace = ctx.resolve_namespace::<S>(&obj.metadata.namespace)?;
        let preconditions = Preconditions::from_resource_version(&obj.metadata.resource_version);
        debug!(
            name = %obj.metadata.name,
            namespace = %namespace,
            version = %obj.metadata.resource_version,
            "{} update",
            S::label()
        );

        self.store
            .update(
                ctx,
                &namespace,
                &obj.metadata.name,
                &preconditions,
                |current| {
                    let mut next = obj.clone();
                    next.metadata.namespace = current.metadata.namespace.clone();
                    if next.metadata.uid.is_empty() {
                        next.metadata.uid = current.metadata.uid.clone();
                    }
                    if next.metadata.creation_timestamp.is_empty() {
                        next.metadata.creation_timestamp =
                            current.metadata.creation_timestamp.clone();
                    }
                    Ok(next)
                },
            )
            .await
    }

    /// update by applying function to the current object, retried on races
    pub async fn update_with<F>(
        &self,
        ctx: &RequestContext,
        name: &str,
        try_update: F,
    ) -> Result<K8Obj<S>, RegistryError>
    where
        F: FnMut(K8Obj<S>) -> Result<K8Obj<S>, RegistryError> + Send,
    {
        let namespace = ctx.require_namespace::<S>()?;
        self.store
            .update(ctx, &namespace, name, &Preconditions::none(), try_update)
            .await
    }

    /// remove object, returning its last state
    pub async fn delete(&self, ctx: &RequestContext, name: &str) -> Result<K8Obj<S>, RegistryError> {
        self.delete_with_preconditions(ctx, name, &Preconditions::none())
            .await
    }

    pub async fn delete_with_preconditions(
        &self,
        ctx: &RequestContext,
        name: &str,
        preconditions: &Preconditions,
    ) -> Result<K8Obj<S>, RegistryError> {
        let namespace = ctx.require_namespace::<S>()?;
        self.store
            .delete(ctx, &namespace, name, preconditions)
            .await
    }

    /// list request namespace, or all namespaces if request has none
    pub async fn list(
        &self,
        ctx: &RequestContext,
        arg: &ListArg,
    ) -> Result<K8List<S>, RegistryError> {
        let predicate = SelectionPredicate::from_list_arg(arg)?;
        self.store
            .list(ctx, &Self::namespace_scope(ctx), &predicate)
            .await
    }

    pub async fn watch(
        &self,
        ctx: &RequestContext,
        arg: &ListArg,
        resource_version: Option<&str>,
    ) -> Result<WatchStream<S>, RegistryError> {
        let predicate = SelectionPredicate::from_list_arg(arg)?;
        self.store
            .watch(ctx, &Self::namespace_scope(ctx), predicate, resource_version)
            .await
    }

    /// current matching objects as ADDED events followed by all later changes
    pub async fn watch_stream_now(
        &self,
        ctx: &RequestContext,
        arg: &ListArg,
    ) -> Result<BoxStream<'static, WatchItem<S>>, RegistryError> {
        let predicate = SelectionPredicate::from_list_arg(arg)?;
        let namespace = Self::namespace_scope(ctx);
        let list = self.store.list(ctx, &namespace, &predicate).await?;
        let version = list.metadata.resource_version.clone();
        let changes = self
            .store
            .watch(ctx, &namespace, predicate, Some(&version))
            .await?;

        let current = list
            .items
            .into_iter()
            .map(|obj| Ok(K8Watch::ADDED(obj)))
            .collect::<Vec<_>>();
        Ok(iter(current).chain(changes).boxed())
    }
}
