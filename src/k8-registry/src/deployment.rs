use std::collections::BTreeMap;
use std::sync::Arc;

use k8_kv_store::SharedKvStore;
use k8_registry_config::RegistryConfig;
use k8_types::app::deployment::DeploymentSpec;
use k8_types::app::deployment::DeploymentStatus;
use k8_types::core::pod::PodRestartPolicy;
use k8_types::K8Obj;
use k8_types::Spec;

use crate::selector::LabelSelector;
use crate::store::ObjectStore;
use crate::strategy::is_dns_subdomain;
use crate::strategy::validate_object_meta;
use crate::strategy::validate_object_meta_update;
use crate::strategy::FieldError;
use crate::strategy::StatusStrategy;
use crate::strategy::Strategy;
use crate::subresource::ScalableSpec;
use crate::subresource::ScaleRest;
use crate::subresource::StatusRest;
use crate::Registry;

const MAX_LABEL_NAME_LEN: usize = 63;

impl ScalableSpec for DeploymentSpec {
    fn replicas(&self) -> i32 {
        self.replicas
    }

    fn set_replicas(&mut self, replicas: i32) {
        self.replicas = replicas;
    }

    fn pod_selector(&self) -> BTreeMap<String, String> {
        self.template.labels()
    }

    fn status_replicas(status: &DeploymentStatus) -> i32 {
        status.replicas
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeploymentStrategy;

impl Strategy<DeploymentSpec> for DeploymentStrategy {
    /// status is owned by the status endpoint
    fn prepare_for_update(&self, new: &mut K8Obj<DeploymentSpec>, old: &K8Obj<DeploymentSpec>) {
        new.status = old.status.clone();
    }

    fn validate_create(&self, obj: &K8Obj<DeploymentSpec>) -> Vec<FieldError> {
        let mut errors = validate_object_meta(&obj.metadata, DeploymentSpec::NAME_SPACED);
        errors.extend(validate_deployment_spec(&obj.spec));
        errors
    }

    fn validate_update(
        &self,
        old: &K8Obj<DeploymentSpec>,
        new: &K8Obj<DeploymentSpec>,
    ) -> Vec<FieldError> {
        let mut errors = validate_object_meta_update(&old.metadata, &new.metadata);
        errors.extend(validate_deployment_spec(&new.spec));
        errors
    }
}

/// label key, optionally prefixed with a dns subdomain
fn is_qualified_name(value: &str) -> bool {
    let name = match value.split_once('/') {
        Some((prefix, name)) => {
            if !is_dns_subdomain(prefix) {
                return false;
            }
            name
        }
        None => value,
    };
    if name.is_empty() || name.len() > MAX_LABEL_NAME_LEN {
        return false;
    }
    name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn validate_deployment_spec(spec: &DeploymentSpec) -> Vec<FieldError> {
    let mut errors = vec![];

    if spec.replicas < 0 {
        errors.push(FieldError::invalid(
            "spec.replicas",
            spec.replicas.to_string(),
            "must be greater than or equal to 0",
        ));
    }

    let template_labels = spec.template.labels();
    if spec.selector.is_empty() {
        errors.push(FieldError::required(
            "spec.selector",
            "selector must not be empty",
        ));
    } else if !LabelSelector::from(spec.selector.clone()).matches(&template_labels) {
        errors.push(FieldError::invalid(
            "spec.template.metadata.labels",
            format!("{:?}", template_labels),
            "`selector` does not match template `labels`",
        ));
    }

    for key in spec.selector.keys() {
        if !is_qualified_name(key) {
            errors.push(FieldError::invalid(
                "spec.selector",
                key.clone(),
                "must be a qualified label name",
            ));
        }
    }

    if !spec.unique_label_key.is_empty() && !is_qualified_name(&spec.unique_label_key) {
        errors.push(FieldError::invalid(
            "spec.uniqueLabelKey",
            spec.unique_label_key.clone(),
            "must be a qualified label name",
        ));
    }

    let pod = &spec.template.spec;
    match &pod.restart_policy {
        None | Some(PodRestartPolicy::Always) => {}
        Some(other) => errors.push(FieldError::not_supported(
            "spec.template.spec.restartPolicy",
            format!("{:?}", other),
            &["Always"],
        )),
    }

    if pod.containers.is_empty() {
        errors.push(FieldError::required(
            "spec.template.spec.containers",
            "at least one container is required",
        ));
    }
    for (index, container) in pod.containers.iter().enumerate() {
        if container.name.is_empty() {
            errors.push(FieldError::required(
                format!("spec.template.spec.containers[{}].name", index),
                "container name is required",
            ));
        }
        if container.image.as_deref().unwrap_or_default().is_empty() {
            errors.push(FieldError::required(
                format!("spec.template.spec.containers[{}].image", index),
                "container image is required",
            ));
        }
    }

    errors
}

/// deployment endpoints sharing one store
#[derive(Debug, Clone)]
pub struct DeploymentStorage {
    pub deployment: Registry<DeploymentSpec>,
    pub scale: ScaleRest<DeploymentSpec>,
    pub status: StatusRest<DeploymentSpec>,
}

impl DeploymentStorage {
    pub fn new(kv: SharedKvStore, config: &RegistryConfig) -> Self {
        let strategy: Arc<dyn Strategy<DeploymentSpec>> = Arc::new(DeploymentStrategy);
        let store = ObjectStore::new(kv, strategy.clone(), config);
        let status_store = store.with_strategy(Arc::new(StatusStrategy::new(strategy)));

        Self {
            deployment: Registry::new(store.clone()),
            scale: ScaleRest::new(store),
            status: StatusRest::new(status_store),
        }
    }
}
