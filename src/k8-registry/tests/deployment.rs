#[cfg(test)]
mod integration_tests {

    use std::collections::BTreeMap;
    use std::sync::Arc;

    use rand::distributions::Alphanumeric;
    use rand::{thread_rng, Rng};

    use fluvio_future::test_async;
    use k8_registry::config::RegistryConfig;
    use k8_registry::kv::KvStore;
    use k8_registry::kv::MemoryKvStore;
    use k8_registry::types::app::deployment::DeploymentSpec;
    use k8_registry::types::app::deployment::DeploymentStatus;
    use k8_registry::types::app::scale::Scale;
    use k8_registry::types::app::scale::ScaleSpec;
    use k8_registry::types::app::scale::ScaleStatus;
    use k8_registry::types::core::pod::ContainerSpec;
    use k8_registry::types::core::pod::DnsPolicy;
    use k8_registry::types::core::pod::ImagePullPolicy;
    use k8_registry::types::core::pod::PodRestartPolicy;
    use k8_registry::types::core::pod::PodSpec;
    use k8_registry::types::K8Obj;
    use k8_registry::types::LabelProvider;
    use k8_registry::types::ObjectMeta;
    use k8_registry::types::Spec;
    use k8_registry::types::TemplateMeta;
    use k8_registry::types::TemplateSpec;
    use k8_registry::DeploymentStorage;
    use k8_registry::ErrorKind;
    use k8_registry::ListArg;
    use k8_registry::Preconditions;
    use k8_registry::RegistryError;
    use k8_registry::RequestContext;

    const NAMESPACE: &str = "foo-namespace";
    const NAME: &str = "foo-deployment";
    const KEY: &str = "/registry/deployments/foo-namespace/foo-deployment";

    type Deployment = K8Obj<DeploymentSpec>;

    fn create_storage() -> (DeploymentStorage, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::default());
        let storage = DeploymentStorage::new(kv.clone(), &RegistryConfig::default());
        (storage, kv)
    }

    fn ctx() -> RequestContext {
        RequestContext::new().with_namespace(NAMESPACE)
    }

    fn random_name() -> String {
        let rng = thread_rng();
        let name: String = rng
            .sample_iter(&Alphanumeric)
            .map(char::from)
            .take(5)
            .collect();
        format!("deployment{}", name.to_lowercase())
    }

    fn labels(pairs: Vec<(&str, &str)>) -> BTreeMap<String, String> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    fn valid_deployment() -> Deployment {
        let mut container = ContainerSpec::new("test", "test_image");
        container.image_pull_policy = Some(ImagePullPolicy::IfNotPresent);
        let pod = PodSpec {
            containers: vec![container],
            restart_policy: Some(PodRestartPolicy::Always),
            dns_policy: Some(DnsPolicy::ClusterFirst),
            ..Default::default()
        };
        let spec = DeploymentSpec {
            replicas: 7,
            selector: labels(vec![("a", "b")]),
            template: TemplateSpec::new(pod)
                .set_metadata(TemplateMeta::default().set_labels(vec![("a", "b")])),
            unique_label_key: "my-label".to_owned(),
        };
        K8Obj::new(NAME, spec)
            .set_namespace(NAMESPACE)
            .set_status(DeploymentStatus {
                replicas: 5,
                ..Default::default()
            })
    }

    /// write record directly into the store, bypassing the registry
    async fn seed(kv: &MemoryKvStore, obj: &Deployment) -> u64 {
        let value = serde_json::to_vec(obj).expect("encode");
        kv.put(KEY, value).await.expect("seed").mod_revision
    }

    async fn stored(kv: &MemoryKvStore) -> Deployment {
        let entry = kv.get(KEY).await.expect("get").expect("exists");
        serde_json::from_slice(&entry.value).expect("decode")
    }

    #[test_async]
    async fn test_create() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();

        let mut deployment = valid_deployment();
        deployment.metadata = ObjectMeta::named(random_name());
        let created = storage.deployment.create(&ctx(), deployment.clone()).await?;
        assert_eq!(created.metadata.namespace, NAMESPACE);
        assert!(!created.metadata.uid.is_empty());
        assert!(!created.metadata.creation_timestamp.is_empty());
        assert!(!created.metadata.resource_version.is_empty());
        assert_eq!(created.spec, deployment.spec);
        assert_eq!(created.status.replicas, 5);

        let fetched = storage.deployment.get(&ctx(), created.name()).await?;
        assert_eq!(fetched, created);

        let err = storage
            .deployment
            .create(&ctx(), deployment.clone())
            .await
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        // invalid selector
        let mut invalid = valid_deployment();
        invalid.metadata = ObjectMeta::named(random_name());
        invalid.spec.selector.clear();
        let err = storage
            .deployment
            .create(&ctx(), invalid)
            .await
            .expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.field_errors()[0].field, "spec.selector");

        Ok(())
    }

    #[test_async]
    async fn test_create_namespace_mismatch() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        let deployment = valid_deployment().set_namespace("other");
        let err = storage
            .deployment
            .create(&ctx(), deployment)
            .await
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(kv.get(KEY).await.expect("get").is_none());
        Ok(())
    }

    #[test_async]
    async fn test_update() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        let created = storage.deployment.create(&ctx(), valid_deployment()).await?;

        let mut update = created.clone();
        update.spec.template.spec.node_selector = Some(labels(vec![("c", "d")]));
        let updated = storage.deployment.update(&ctx(), update).await?;
        assert_eq!(
            updated.spec.template.spec.node_selector,
            Some(labels(vec![("c", "d")]))
        );
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);
        assert_eq!(updated.metadata.uid, created.metadata.uid);

        let invalid_updates: Vec<fn(&mut Deployment)> = vec![
            |obj: &mut Deployment| obj.metadata.uid = "newUID".to_owned(),
            |obj: &mut Deployment| {
                obj.spec.template.spec.restart_policy = Some(PodRestartPolicy::OnFailure)
            },
            |obj: &mut Deployment| obj.spec.selector.clear(),
        ];
        for invalid_update in invalid_updates {
            let mut obj = updated.clone();
            invalid_update(&mut obj);
            let err = storage
                .deployment
                .update(&ctx(), obj)
                .await
                .expect_err("invalid");
            assert_eq!(err.kind(), ErrorKind::Invalid);
        }

        let mut unnamed = updated.clone();
        unnamed.metadata.name.clear();
        let err = storage
            .deployment
            .update(&ctx(), unnamed)
            .await
            .expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let current = storage.deployment.get(&ctx(), NAME).await?;
        assert_eq!(current, updated);
        Ok(())
    }

    #[test_async]
    async fn test_update_preserves_status() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        let created = storage.deployment.create(&ctx(), valid_deployment()).await?;

        let mut update = created.clone();
        update.spec.replicas = 3;
        update.status.replicas = 99;
        let updated = storage.deployment.update(&ctx(), update).await?;
        assert_eq!(updated.spec.replicas, 3);
        assert_eq!(updated.status.replicas, 5);
        Ok(())
    }

    #[test_async]
    async fn test_update_stale_version() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        let created = storage.deployment.create(&ctx(), valid_deployment()).await?;

        let mut first = created.clone();
        first.spec.replicas = 1;
        storage.deployment.update(&ctx(), first).await?;

        let mut stale = created.clone();
        stale.spec.replicas = 2;
        let err = storage
            .deployment
            .update(&ctx(), stale)
            .await
            .expect_err("stale");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let current = storage.deployment.get(&ctx(), NAME).await?;
        assert_eq!(current.spec.replicas, 1);
        Ok(())
    }

    #[test_async]
    async fn test_update_missing() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        let err = storage
            .deployment
            .update(&ctx(), valid_deployment())
            .await
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        Ok(())
    }

    #[test_async]
    async fn test_delete() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        let created = storage.deployment.create(&ctx(), valid_deployment()).await?;

        let err = storage
            .deployment
            .delete_with_preconditions(&ctx(), NAME, &Preconditions::none().uid("other"))
            .await
            .expect_err("uid mismatch");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let deleted = storage.deployment.delete(&ctx(), NAME).await?;
        assert_eq!(deleted, created);
        assert!(kv.get(KEY).await.expect("get").is_none());

        let err = storage
            .deployment
            .delete(&ctx(), NAME)
            .await
            .expect_err("gone");
        assert!(err.is_not_found());
        Ok(())
    }

    #[test_async]
    async fn test_get() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        let version = seed(&kv, &valid_deployment()).await;

        let fetched = storage.deployment.get(&ctx(), NAME).await?;
        assert_eq!(fetched.metadata.resource_version, version.to_string());
        assert_eq!(fetched.spec, valid_deployment().spec);

        let err = storage
            .deployment
            .get(&ctx(), "missing")
            .await
            .expect_err("missing");
        assert!(err.is_not_found());

        let err = storage
            .deployment
            .get(&RequestContext::new(), NAME)
            .await
            .expect_err("no namespace");
        assert_eq!(err.kind(), ErrorKind::Invalid);
        Ok(())
    }

    #[test_async]
    async fn test_get_corrupt() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        kv.put(KEY, b"{ not json".to_vec()).await.expect("put");
        let err = storage
            .deployment
            .get(&ctx(), NAME)
            .await
            .expect_err("corrupt");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        Ok(())
    }

    #[test_async]
    async fn test_list() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        let empty = storage.deployment.list(&ctx(), &ListArg::default()).await?;
        assert!(empty.items.is_empty());
        assert_eq!(empty.kind, "DeploymentList");

        storage.deployment.create(&ctx(), valid_deployment()).await?;
        let mut other = valid_deployment();
        other.metadata.name = "other".to_owned();
        other.metadata.labels = labels(vec![("tier", "web")]);
        storage.deployment.create(&ctx(), other).await?;
        storage
            .deployment
            .create(
                &RequestContext::new().with_namespace("elsewhere"),
                valid_deployment().set_namespace(""),
            )
            .await?;

        let list = storage.deployment.list(&ctx(), &ListArg::default()).await?;
        assert_eq!(list.items.len(), 2);
        assert!(!list.metadata.resource_version.is_empty());

        let list = storage
            .deployment
            .list(&ctx(), &ListArg::labels("tier=web"))
            .await?;
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].metadata.name, "other");

        let list = storage
            .deployment
            .list(&ctx(), &ListArg::fields(format!("metadata.name={}", NAME)))
            .await?;
        assert_eq!(list.items.len(), 1);

        let all = storage
            .deployment
            .list(&RequestContext::new(), &ListArg::default())
            .await?;
        assert_eq!(all.items.len(), 3);

        let err = storage
            .deployment
            .list(&ctx(), &ListArg::fields("name=foo"))
            .await
            .expect_err("bad selector");
        assert_eq!(err.kind(), ErrorKind::BadSelector);
        Ok(())
    }

    #[test_async]
    async fn test_scale_get() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        let version = seed(&kv, &valid_deployment()).await;

        let scale = storage.scale.get(&ctx(), NAME).await?;
        let mut expected = Scale::new(
            NAME,
            ScaleSpec {
                replicas: 7,
            },
        )
        .set_namespace(NAMESPACE)
        .set_status(ScaleStatus {
            replicas: 5,
            selector: labels(vec![("a", "b")]),
        });
        expected.metadata.resource_version = version.to_string();
        assert_eq!(scale, expected);
        assert_eq!(scale.api_version, ScaleSpec::api_version());
        Ok(())
    }

    #[test_async]
    async fn test_scale_update() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        let version = seed(&kv, &valid_deployment()).await;

        let update = Scale::new(NAME, ScaleSpec { replicas: 12 }).set_namespace(NAMESPACE);
        let scale = storage.scale.update(&ctx(), update).await?;
        assert_eq!(scale.spec.replicas, 12);
        assert_eq!(scale.status.replicas, 5);

        let deployment = stored(&kv).await;
        assert_eq!(
            deployment.spec,
            DeploymentSpec {
                replicas: 12,
                ..valid_deployment().spec
            }
        );
        assert_eq!(deployment.status, valid_deployment().status);

        // stale version in payload
        let mut stale = Scale::new(NAME, ScaleSpec { replicas: 1 }).set_namespace(NAMESPACE);
        stale.metadata.resource_version = version.to_string();
        let err = storage
            .scale
            .update(&ctx(), stale)
            .await
            .expect_err("stale");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(stored(&kv).await.spec.replicas, 12);
        Ok(())
    }

    #[test_async]
    async fn test_scale_update_negative() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        seed(&kv, &valid_deployment()).await;

        let update = Scale::new(NAME, ScaleSpec { replicas: -1 }).set_namespace(NAMESPACE);
        let err = storage
            .scale
            .update(&ctx(), update)
            .await
            .expect_err("negative");
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.field_errors()[0].field, "spec.replicas");
        assert_eq!(stored(&kv).await.spec.replicas, 7);

        let err = storage
            .scale
            .update(&ctx(), Scale::new("missing", ScaleSpec { replicas: 1 }))
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
        Ok(())
    }

    #[test_async]
    async fn test_status_update() -> Result<(), RegistryError> {
        let (storage, kv) = create_storage();
        seed(&kv, &valid_deployment()).await;

        let mut update = valid_deployment();
        update.spec = DeploymentSpec {
            replicas: 100,
            ..Default::default()
        };
        update.status.replicas = 100;
        update.metadata.labels = labels(vec![("x", "y")]);

        let updated = storage.status.update(&ctx(), update).await?;
        assert_eq!(updated.status.replicas, 100);
        assert_eq!(updated.spec.replicas, 7);

        let deployment = stored(&kv).await;
        assert_eq!(deployment.spec.replicas, 7);
        assert_eq!(deployment.status.replicas, 100);
        assert!(deployment.metadata.labels.is_empty());
        Ok(())
    }

    #[test_async]
    async fn test_status_update_uid_mismatch() -> Result<(), RegistryError> {
        let (storage, _kv) = create_storage();
        storage.deployment.create(&ctx(), valid_deployment()).await?;

        let mut update = valid_deployment();
        update.metadata.uid = "someone-else".to_owned();
        update.status.replicas = 1;
        let err = storage
            .status
            .update(&ctx(), update)
            .await
            .expect_err("uid");
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let status = storage.status.get(&ctx(), NAME).await?;
        assert_eq!(status.status.replicas, 5);
        Ok(())
    }
}
