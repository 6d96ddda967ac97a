use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::{Crd, CrdNames, DefaultHeader, K8Obj, Spec, Status};

const SCALE_API: Crd = Crd {
    group: "extensions",
    version: "v1beta1",
    names: CrdNames {
        kind: "Scale",
        plural: "scales",
        singular: "scale",
    },
};

/// Scale is never stored, it is a view over a scalable resource
pub type Scale = K8Obj<ScaleSpec>;

#[derive(Deserialize, Serialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaleSpec {
    pub replicas: i32,
}

impl Spec for ScaleSpec {
    type Status = ScaleStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &SCALE_API
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaleStatus {
    pub replicas: i32,
    /// labels of the pods counted in replicas
    pub selector: BTreeMap<String, String>,
}

impl Status for ScaleStatus {}
