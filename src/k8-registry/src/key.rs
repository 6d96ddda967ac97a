use std::fmt;

use k8_types::ItemMeta;
use k8_types::Spec;

use crate::strategy::FieldError;
use crate::RegistryError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameSpace {
    All,
    Named(String),
}

impl NameSpace {
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn named(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Named(name) => name,
        }
    }
}

impl From<String> for NameSpace {
    fn from(namespace: String) -> Self {
        NameSpace::Named(namespace)
    }
}

impl From<&str> for NameSpace {
    fn from(namespace: &str) -> Self {
        NameSpace::Named(namespace.to_owned())
    }
}

impl fmt::Display for NameSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::All => write!(f, "*"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// maps object identity to store keys.
///
/// layout is `{prefix}/{plural}/{namespace}/{name}`, cluster scoped kinds
/// drop the namespace segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    root: String,
    name_spaced: bool,
}

impl KeyCodec {
    pub fn new<S: Spec>(prefix: &str) -> Self {
        Self {
            root: format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                S::metadata().names.plural
            ),
            name_spaced: S::NAME_SPACED,
        }
    }

    /// prefix shared by all objects of this kind, without trailing separator
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn item_key(&self, namespace: &str, name: &str) -> Result<String, RegistryError> {
        let mut errors = vec![];
        if self.name_spaced {
            check_segment("metadata.namespace", namespace, &mut errors);
        }
        check_segment("metadata.name", name, &mut errors);

        let key = self.format_key(namespace, name);
        if errors.is_empty() {
            Ok(key)
        } else {
            Err(RegistryError::invalid(&key, errors))
        }
    }

    fn format_key(&self, namespace: &str, name: &str) -> String {
        if self.name_spaced {
            format!("{}/{}/{}", self.root, namespace, name)
        } else {
            format!("{}/{}", self.root, name)
        }
    }

    /// prefix covering every key in namespace, with trailing separator
    /// so that namespace "a" never matches namespace "ab"
    pub fn namespace_prefix(&self, namespace: &NameSpace) -> String {
        match namespace {
            NameSpace::Named(ns) if self.name_spaced => format!("{}/{}/", self.root, ns),
            _ => format!("{}/", self.root),
        }
    }

    /// recover identity from key, none if key is not under this kind
    pub fn parse_key(&self, key: &str) -> Option<ItemMeta> {
        let rest = key.strip_prefix(&self.root)?.strip_prefix('/')?;
        if self.name_spaced {
            let (namespace, name) = rest.split_once('/')?;
            if namespace.is_empty() || name.is_empty() || name.contains('/') {
                return None;
            }
            Some(ItemMeta::new(name, namespace))
        } else {
            if rest.is_empty() || rest.contains('/') {
                return None;
            }
            Some(ItemMeta::new(rest, ""))
        }
    }
}

fn check_segment(field: &str, value: &str, errors: &mut Vec<FieldError>) {
    if value.is_empty() {
        errors.push(FieldError::required(field, "must not be empty"));
    } else if value.contains('/') {
        errors.push(FieldError::invalid(field, value, "may not contain '/'"));
    } else if value == "." || value == ".." {
        errors.push(FieldError::invalid(field, value, "may not be '.' or '..'"));
    }
}

#[cfg(test)]
mod test {

    use serde::Deserialize;
    use serde::Serialize;

    use k8_types::app::deployment::DeploymentSpec;
    use k8_types::Crd;
    use k8_types::CrdNames;
    use k8_types::DefaultHeader;
    use k8_types::ItemMeta;
    use k8_types::Spec;
    use k8_types::Status;

    use super::KeyCodec;
    use super::NameSpace;
    use crate::ErrorKind;

    const NODE_API: Crd = Crd {
        group: "core",
        version: "v1",
        names: CrdNames {
            kind: "Node",
            plural: "nodes",
            singular: "node",
        },
    };

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct NodeSpec {}

    #[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
    struct NodeStatus {}

    impl Status for NodeStatus {}

    impl Spec for NodeSpec {
        type Status = NodeStatus;
        type Header = DefaultHeader;
        const NAME_SPACED: bool = false;

        fn metadata() -> &'static Crd {
            &NODE_API
        }
    }

    #[test]
    fn test_item_key() {
        let keys = KeyCodec::new::<DeploymentSpec>("/registry");
        assert_eq!(
            keys.item_key("default", "web").expect("key"),
            "/registry/deployments/default/web"
        );
        assert_eq!(
            keys.parse_key("/registry/deployments/default/web"),
            Some(ItemMeta::new("web", "default"))
        );
        assert_eq!(keys.parse_key("/registry/services/default/web"), None);
        assert_eq!(keys.parse_key("/registry/deployments/default"), None);
        assert_eq!(keys.parse_key("/registry/deployments/default/a/b"), None);
    }

    #[test]
    fn test_item_key_rejects_bad_segments() {
        let keys = KeyCodec::new::<DeploymentSpec>("/registry");
        for (namespace, name) in [("", "web"), ("default", ""), ("a/b", "web"), ("default", "..")] {
            let err = keys.item_key(namespace, name).expect_err("invalid");
            assert_eq!(err.kind(), ErrorKind::Invalid);
        }
    }

    #[test]
    fn test_root_prefix() {
        let keys = KeyCodec::new::<DeploymentSpec>("/");
        assert_eq!(keys.root(), "/deployments");
        assert_eq!(
            keys.item_key("ns", "a").expect("key"),
            "/deployments/ns/a"
        );
    }

    #[test]
    fn test_namespace_prefix() {
        let keys = KeyCodec::new::<DeploymentSpec>("/registry");
        assert_eq!(
            keys.namespace_prefix(&NameSpace::Named("a".to_owned())),
            "/registry/deployments/a/"
        );
        assert_eq!(
            keys.namespace_prefix(&NameSpace::All),
            "/registry/deployments/"
        );
    }

    #[test]
    fn test_cluster_scoped() {
        let keys = KeyCodec::new::<NodeSpec>("/registry");
        assert_eq!(keys.item_key("", "n1").expect("key"), "/registry/nodes/n1");
        assert_eq!(
            keys.parse_key("/registry/nodes/n1"),
            Some(ItemMeta::new("n1", ""))
        );
        assert_eq!(
            keys.namespace_prefix(&NameSpace::Named("ignored".to_owned())),
            "/registry/nodes/"
        );
    }
}
