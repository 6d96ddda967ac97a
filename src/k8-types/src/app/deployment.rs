use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::pod::PodSpec;
use crate::{Crd, CrdNames, DefaultHeader, Spec, Status, TemplateSpec};

const DEPLOYMENT_API: Crd = Crd {
    group: "extensions",
    version: "v1beta1",
    names: CrdNames {
        kind: "Deployment",
        plural: "deployments",
        singular: "deployment",
    },
};

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentSpec {
    pub replicas: i32,
    pub selector: BTreeMap<String, String>,
    pub template: TemplateSpec<PodSpec>,
    /// label key added to pods to tell apart those created by different revisions
    pub unique_label_key: String,
}

impl Spec for DeploymentSpec {
    type Status = DeploymentStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &DEPLOYMENT_API
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatus {
    pub replicas: i32,
    pub updated_replicas: i32,
}

impl Status for DeploymentStatus {}
