use std::collections::BTreeMap;
use std::fmt;

use k8_types::K8Obj;
use k8_types::Spec;

use crate::RegistryError;

/// raw selector arguments of list and watch
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct ListArg {
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
}

impl ListArg {
    pub fn labels<T: Into<String>>(selector: T) -> Self {
        Self {
            label_selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn fields<T: Into<String>>(selector: T) -> Self {
        Self {
            field_selector: Some(selector.into()),
            ..Default::default()
        }
    }
}

/// parse "k=v,k2==v2" into pairs
fn parse_terms(selector: &str) -> Result<Vec<(String, String)>, RegistryError> {
    let mut terms = vec![];
    for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if term.contains("!=") {
            return Err(RegistryError::BadSelector(format!(
                "unsupported operator in '{}'",
                term
            )));
        }
        let (key, value) = term
            .split_once("==")
            .or_else(|| term.split_once('='))
            .ok_or_else(|| RegistryError::BadSelector(format!("missing '=' in '{}'", term)))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(RegistryError::BadSelector(format!(
                "empty key in '{}'",
                term
            )));
        }
        terms.push((key.to_owned(), value.trim().to_owned()));
    }
    Ok(terms)
}

/// equality-based label selector, empty matches everything.
/// every term must hold, so a key repeated with different values matches nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(Vec<(String, String)>);

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, RegistryError> {
        Ok(Self(parse_terms(selector)?))
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl From<BTreeMap<String, String>> for LabelSelector {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self(labels.into_iter().collect())
    }
}

/// object fields that can be selected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldPath {
    MetadataName,
    MetadataNamespace,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, RegistryError> {
        match path {
            "metadata.name" => Ok(Self::MetadataName),
            "metadata.namespace" => Ok(Self::MetadataNamespace),
            other => Err(RegistryError::BadSelector(format!(
                "field label not supported: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetadataName => "metadata.name",
            Self::MetadataNamespace => "metadata.namespace",
        }
    }

    pub fn value<'a, S: Spec>(&self, obj: &'a K8Obj<S>) -> &'a str {
        match self {
            Self::MetadataName => &obj.metadata.name,
            Self::MetadataNamespace => &obj.metadata.namespace,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// equality-based field selector over allow-listed fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector(Vec<(FieldPath, String)>);

impl FieldSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, RegistryError> {
        let fields = parse_terms(selector)?
            .into_iter()
            .map(|(path, value)| Ok((FieldPath::parse(&path)?, value)))
            .collect::<Result<Vec<_>, RegistryError>>()?;
        Ok(Self(fields))
    }

    pub fn with<V: Into<String>>(mut self, path: FieldPath, value: V) -> Self {
        self.0.push((path, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches<S: Spec>(&self, obj: &K8Obj<S>) -> bool {
        self.0
            .iter()
            .all(|(path, value)| path.value(obj) == value)
    }
}

/// combined label and field filter applied to list results and watch events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPredicate {
    pub labels: LabelSelector,
    pub fields: FieldSelector,
}

impl SelectionPredicate {
    pub fn new(labels: LabelSelector, fields: FieldSelector) -> Self {
        Self { labels, fields }
    }

    pub fn everything() -> Self {
        Self::default()
    }

    pub fn from_list_arg(arg: &ListArg) -> Result<Self, RegistryError> {
        let labels = match &arg.label_selector {
            Some(selector) => LabelSelector::parse(selector)?,
            None => LabelSelector::default(),
        };
        let fields = match &arg.field_selector {
            Some(selector) => FieldSelector::parse(selector)?,
            None => FieldSelector::default(),
        };
        Ok(Self { labels, fields })
    }

    pub fn is_everything(&self) -> bool {
        self.labels.is_empty() && self.fields.is_empty()
    }

    pub fn matches<S: Spec>(&self, obj: &K8Obj<S>) -> bool {
        matches(obj, &self.labels, &self.fields)
    }
}

/// true if object satisfies both selectors
pub fn matches<S: Spec>(obj: &K8Obj<S>, labels: &LabelSelector, fields: &FieldSelector) -> bool {
    labels.matches(&obj.metadata.labels) && fields.matches(obj)
}
