use std::collections::BTreeMap;

use k8_types::app::scale::Scale;
use k8_types::app::scale::ScaleSpec;
use k8_types::app::scale::ScaleStatus;
use k8_types::K8Obj;
use k8_types::ObjectMeta;
use k8_types::Spec;

use crate::context::RequestContext;
use crate::store::ObjectStore;
use crate::store::Preconditions;
use crate::RegistryError;

/// spec whose replica count can be driven through the scale subresource
pub trait ScalableSpec: Spec {
    fn replicas(&self) -> i32;

    fn set_replicas(&mut self, replicas: i32);

    /// labels of the pods counted by status
    fn pod_selector(&self) -> BTreeMap<String, String>;

    fn status_replicas(status: &Self::Status) -> i32;
}

/// partial view over a stored object.
/// project reads the view out, apply writes it back into a fresh copy of the
/// stored object touching nothing outside the view
pub trait Subresource<S: Spec> {
    type View;

    fn project(&self, canonical: &K8Obj<S>) -> Self::View;

    fn apply(&self, canonical: K8Obj<S>, view: &Self::View) -> K8Obj<S>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScaleProjection;

impl<S: ScalableSpec> Subresource<S> for ScaleProjection {
    type View = Scale;

    fn project(&self, canonical: &K8Obj<S>) -> Scale {
        let meta = &canonical.metadata;
        Scale {
            api_version: ScaleSpec::api_version(),
            kind: ScaleSpec::kind(),
            metadata: ObjectMeta {
                name: meta.name.clone(),
                namespace: meta.namespace.clone(),
                uid: meta.uid.clone(),
                creation_timestamp: meta.creation_timestamp.clone(),
                resource_version: meta.resource_version.clone(),
                ..Default::default()
            },
            spec: ScaleSpec {
                replicas: canonical.spec.replicas(),
            },
            status: ScaleStatus {
                replicas: S::status_replicas(&canonical.status),
                selector: canonical.spec.pod_selector(),
            },
            header: Default::default(),
        }
    }

    fn apply(&self, mut canonical: K8Obj<S>, view: &Scale) -> K8Obj<S> {
        canonical.spec.set_replicas(view.spec.replicas);
        canonical
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StatusProjection;

impl<S: Spec> Subresource<S> for StatusProjection {
    type View = K8Obj<S>;

    fn project(&self, canonical: &K8Obj<S>) -> K8Obj<S> {
        canonical.clone()
    }

    fn apply(&self, mut canonical: K8Obj<S>, view: &K8Obj<S>) -> K8Obj<S> {
        canonical.status = view.status.clone();
        canonical
    }
}

/// preconditions carried by a subresource payload
fn payload_preconditions(meta: &ObjectMeta) -> Preconditions {
    let mut preconditions = Preconditions::from_resource_version(&meta.resource_version);
    if !meta.uid.is_empty() {
        preconditions = preconditions.uid(meta.uid.clone());
    }
    preconditions
}

/// scale endpoint of a scalable kind
#[derive(Debug, Clone)]
pub struct ScaleRest<S: ScalableSpec> {
    store: ObjectStore<S>,
}

impl<S: ScalableSpec> ScaleRest<S> {
    pub fn new(store: ObjectStore<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> Result<Scale, RegistryError> {
        let namespace = ctx.require_namespace::<S>()?;
        let obj = self.store.get(ctx, &namespace, name).await?;
        Ok(ScaleProjection.project(&obj))
    }

    /// only spec.replicas of the parent changes
    pub async fn update(&self, ctx: &RequestContext, scale: Scale) -> Result<Scale, RegistryError> {
        let namespace = ctx.resolve_namespace::<S>(&scale.metadata.namespace)?;
        let preconditions = payload_preconditions(&scale.metadata);
        let updated = self
            .store
            .update(
                ctx,
                &namespace,
                &scale.metadata.name,
                &preconditions,
                |current| Ok(ScaleProjection.apply(current, &scale)),
            )
            .await?;
        Ok(ScaleProjection.project(&updated))
    }
}

/// status endpoint, store must carry a status strategy
#[derive(Debug, Clone)]
pub struct StatusRest<S: Spec> {
    store: ObjectStore<S>,
}

impl<S: Spec> StatusRest<S> {
    pub fn new(store: ObjectStore<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, ctx: &RequestContext, name: &str) -> Result<K8Obj<S>, RegistryError> {
        let namespace = ctx.require_namespace::<S>()?;
        let obj = self.store.get(ctx, &namespace, name).await?;
        Ok(StatusProjection.project(&obj))
    }

    /// only status of the stored object changes, spec in payload is ignored
    pub async fn update(
        &self,
        ctx: &RequestContext,
        obj: K8Obj<S>,
    ) -> Result<K8Obj<S>, RegistryError> {
        let namespace = ctx.resolve_namespace::<S>(&obj.metadata.namespace)?;
        let preconditions = payload_preconditions(&obj.metadata);
        let updated = self
            .store
            .update(
                ctx,
                &namespace,
                &obj.metadata.name,
                &preconditions,
                |current| Ok(StatusProjection.apply(current, &obj)),
            )
            .await?;
        Ok(StatusProjection.project(&updated))
    }
}
