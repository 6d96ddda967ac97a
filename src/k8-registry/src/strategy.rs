use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use k8_types::K8Obj;
use k8_types::ObjectMeta;
use k8_types::Spec;

const MAX_NAME_LEN: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid,
    Immutable,
    NotSupported,
}

/// validation failure of a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub value: Option<String>,
    pub detail: String,
}

impl FieldError {
    pub fn required<F: Into<String>, D: Into<String>>(field: F, detail: D) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Required,
            value: None,
            detail: detail.into(),
        }
    }

    pub fn invalid<F, V, D>(field: F, value: V, detail: D) -> Self
    where
        F: Into<String>,
        V: Into<String>,
        D: Into<String>,
    {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Invalid,
            value: Some(value.into()),
            detail: detail.into(),
        }
    }

    pub fn immutable<F: Into<String>>(field: F) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Immutable,
            value: None,
            detail: "field is immutable".to_owned(),
        }
    }

    pub fn not_supported<F, V>(field: F, value: V, supported: &[&str]) -> Self
    where
        F: Into<String>,
        V: Into<String>,
    {
        Self {
            field: field.into(),
            kind: FieldErrorKind::NotSupported,
            value: Some(value.into()),
            detail: format!("supported values: {}", supported.join(", ")),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.kind, &self.value) {
            (FieldErrorKind::Required, _) => {
                write!(f, "{}: Required value: {}", self.field, self.detail)
            }
            (FieldErrorKind::Immutable, _) => write!(f, "{}: {}", self.field, self.detail),
            (FieldErrorKind::Invalid, value) => write!(
                f,
                "{}: Invalid value \"{}\": {}",
                self.field,
                value.as_deref().unwrap_or_default(),
                self.detail
            ),
            (FieldErrorKind::NotSupported, value) => write!(
                f,
                "{}: Unsupported value \"{}\": {}",
                self.field,
                value.as_deref().unwrap_or_default(),
                self.detail
            ),
        }
    }
}

/// per-kind hooks run by the object store on every write
pub trait Strategy<S: Spec>: Debug + Send + Sync {
    /// normalize object before it is validated and stored
    fn prepare_for_create(&self, _obj: &mut K8Obj<S>) {}

    fn validate_create(&self, obj: &K8Obj<S>) -> Vec<FieldError>;

    /// carry over from old whatever this kind of update must not change
    fn prepare_for_update(&self, _new: &mut K8Obj<S>, _old: &K8Obj<S>) {}

    fn validate_update(&self, old: &K8Obj<S>, new: &K8Obj<S>) -> Vec<FieldError>;
}

/// strategy for the status subresource.
/// spec and metadata always come from the stored object
#[derive(Debug)]
pub struct StatusStrategy<S: Spec> {
    inner: Arc<dyn Strategy<S>>,
}

impl<S: Spec> StatusStrategy<S> {
    pub fn new(inner: Arc<dyn Strategy<S>>) -> Self {
        Self { inner }
    }
}

impl<S: Spec> Strategy<S> for StatusStrategy<S> {
    fn prepare_for_create(&self, obj: &mut K8Obj<S>) {
        self.inner.prepare_for_create(obj)
    }

    fn validate_create(&self, obj: &K8Obj<S>) -> Vec<FieldError> {
        self.inner.validate_create(obj)
    }

    fn prepare_for_update(&self, new: &mut K8Obj<S>, old: &K8Obj<S>) {
        new.spec = old.spec.clone();
        new.metadata = old.metadata.clone();
    }

    fn validate_update(&self, old: &K8Obj<S>, new: &K8Obj<S>) -> Vec<FieldError> {
        self.inner.validate_update(old, new)
    }
}

/// dot separated labels of lowercase alphanumeric or '-',
/// each starting and ending with alphanumeric
pub fn is_dns_subdomain(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_NAME_LEN {
        return false;
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    value.split('.').all(|label| {
        label.starts_with(alnum)
            && label.ends_with(alnum)
            && label.chars().all(|c| alnum(c) || c == '-')
    })
}

/// identity checks shared by every kind
pub fn validate_object_meta(meta: &ObjectMeta, name_spaced: bool) -> Vec<FieldError> {
    let mut errors = vec![];
    if meta.name.is_empty() {
        errors.push(FieldError::required("metadata.name", "name is required"));
    } else if !is_dns_subdomain(&meta.name) {
        errors.push(FieldError::invalid(
            "metadata.name",
            meta.name.clone(),
            "must consist of lower case alphanumeric characters, '-' or '.'",
        ));
    }

    if name_spaced {
        if meta.namespace.is_empty() {
            errors.push(FieldError::required(
                "metadata.namespace",
                "namespace is required",
            ));
        } else if !is_dns_subdomain(&meta.namespace) {
            errors.push(FieldError::invalid(
                "metadata.namespace",
                meta.namespace.clone(),
                "must consist of lower case alphanumeric characters, '-' or '.'",
            ));
        }
    } else if !meta.namespace.is_empty() {
        errors.push(FieldError::invalid(
            "metadata.namespace",
            meta.namespace.clone(),
            "not allowed on cluster scoped objects",
        ));
    }
    errors
}

pub fn validate_object_meta_update(old: &ObjectMeta, new: &ObjectMeta) -> Vec<FieldError> {
    let mut errors = vec![];
    if new.name.is_empty() {
        errors.push(FieldError::required("metadata.name", "name is required"));
    } else if new.name != old.name {
        errors.push(FieldError::immutable("metadata.name"));
    }
    if new.namespace != old.namespace {
        errors.push(FieldError::immutable("metadata.namespace"));
    }
    if new.uid != old.uid {
        errors.push(FieldError::immutable("metadata.uid"));
    }
    if new.creation_timestamp != old.creation_timestamp {
        errors.push(FieldError::immutable("metadata.creationTimestamp"));
    }
    errors
}

#[cfg(test)]
mod test {

    use k8_types::ObjectMeta;

    use super::is_dns_subdomain;
    use super::validate_object_meta;
    use super::validate_object_meta_update;
    use super::FieldErrorKind;

    #[test]
    fn test_dns_subdomain() {
        assert!(is_dns_subdomain("foo-deployment"));
        assert!(is_dns_subdomain("a.b-1"));
        assert!(!is_dns_subdomain(""));
        assert!(!is_dns_subdomain("Foo"));
        assert!(!is_dns_subdomain("-foo"));
        assert!(!is_dns_subdomain("foo/bar"));
        assert!(!is_dns_subdomain(&"a".repeat(254)));
        assert!(is_dns_subdomain("a.b.c"));
        assert!(!is_dns_subdomain("a..b"));
        assert!(!is_dns_subdomain("a.-b"));
        assert!(!is_dns_subdomain("a-.b"));
        assert!(!is_dns_subdomain("a."));
    }

    #[test]
    fn test_meta_required() {
        let errors = validate_object_meta(&ObjectMeta::default(), true);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == FieldErrorKind::Required));

        assert!(validate_object_meta(&ObjectMeta::new("a", "b"), true).is_empty());
        assert!(validate_object_meta(&ObjectMeta::named("a"), false).is_empty());
        assert_eq!(validate_object_meta(&ObjectMeta::new("a", "b"), false).len(), 1);
    }

    #[test]
    fn test_meta_immutable() {
        let mut old = ObjectMeta::new("a", "b");
        old.uid = "1".to_owned();
        let mut new = old.clone();
        assert!(validate_object_meta_update(&old, &new).is_empty());

        new.uid = "2".to_owned();
        new.labels.insert("x".to_owned(), "y".to_owned());
        let errors = validate_object_meta_update(&old, &new);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "metadata.uid");
        assert_eq!(errors[0].kind, FieldErrorKind::Immutable);
    }
}
