//! Full module lifecycle through the registry facade
//!
//! Registration, review, publishing, installation and retirement, with
//! events delivered over a channel the way an external dispatcher would
//! consume them.

use std::collections::BTreeMap;
use std::sync::{Arc, mpsc};

use modreg_catalog::{Author, Catalog, MemoryCatalog, Metadata, ModuleType, ReviewStatus};
use modreg_core::{
    Error, ErrorKind, InstallOptions, InstallationUpdate, ModuleRegistry, ModuleUpdate,
    PublishVersion, RegisterModule, RegistryConfig, RegistryEvent,
};
use modreg_test_utils::init_tracing;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn channel_registry() -> (ModuleRegistry, mpsc::Receiver<RegistryEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::channel();
    let registry = ModuleRegistry::new(
        Arc::new(MemoryCatalog::new()),
        Arc::new(tx),
        RegistryConfig::default(),
    );
    (registry, rx)
}

fn names(rx: &mpsc::Receiver<RegistryEvent>) -> Vec<&'static str> {
    rx.try_iter().map(|e| e.name()).collect()
}

fn metadata_with(dependency: Option<(&str, &str)>, permission: &str) -> Metadata {
    let mut metadata = Metadata::default();
    if let Some((name, range)) = dependency {
        metadata
            .dependencies
            .push(modreg_catalog::Dependency::required(name, range));
    }
    metadata.permissions.insert(permission.to_string());
    metadata
}

#[tokio::test]
async fn test_module_lifecycle_end_to_end() {
    let (registry, rx) = channel_registry();
    let author = Author::new("u-net", "Net Team");

    // Dependency first, reviewed and approved
    let http = registry
        .register_module(
            RegisterModule::new("http-client", "1.0.0", ModuleType::Tool, author.clone())
                .with_metadata(metadata_with(None, "network")),
        )
        .await
        .unwrap();
    assert_eq!(http.review_status, ReviewStatus::Pending);

    registry.approve_module(http.id).await.unwrap();
    registry
        .publish_version(
            http.id,
            PublishVersion::new("1.1.0", metadata_with(None, "network")),
        )
        .await
        .unwrap();

    // Dependent module, auto-approved
    let search = registry
        .register_module(
            RegisterModule::new("core-search", "1.0.0", ModuleType::Tool, author)
                .with_metadata(metadata_with(Some(("http-client", "^1.0.0")), "storage"))
                .requires_review(false),
        )
        .await
        .unwrap();
    assert_eq!(search.review_status, ReviewStatus::Approved);

    let plan = registry.plan_install("alice", search.id, None).await.unwrap();
    assert!(plan.can_install());
    assert_eq!(plan.resolution.install_order, vec![http.id, search.id]);
    assert_eq!(
        plan.resolution.dependency("http-client").unwrap().version,
        "1.1.0"
    );

    for id in &plan.resolution.install_order {
        registry
            .record_installation("alice", *id, InstallOptions::default())
            .await
            .unwrap();
    }
    let installed = registry.list_installations("alice").await.unwrap();
    assert_eq!(installed.len(), 2);

    // A broken release is yanked; resolution falls back to the previous one
    registry
        .publish_version(
            http.id,
            PublishVersion::new("1.2.0", metadata_with(None, "network")),
        )
        .await
        .unwrap();
    registry
        .yank_version(http.id, "1.2.0", Some("connection leak"))
        .await
        .unwrap();
    let resolution = registry.resolve_dependencies(search.id, None).await.unwrap();
    assert_eq!(
        resolution.dependency("http-client").unwrap().version,
        "1.1.0"
    );

    registry.rate(search.id, 4.0, "alice").await.unwrap();
    registry.deprecate_module(search.id).await.unwrap();

    assert_eq!(
        names(&rx),
        vec![
            "module:registered",
            "module:reviewed",
            "module:version:published",
            "module:registered",
            "module:installed",
            "module:installed",
            "module:version:published",
            "module:version:yanked",
            "module:rated",
            "module:updated",
        ]
    );
}

#[tokio::test]
async fn test_rejected_module_cannot_be_installed() {
    let (registry, rx) = channel_registry();
    let module = registry
        .register_module(RegisterModule::new(
            "spam-bot",
            "1.0.0",
            ModuleType::Agent,
            Author::new("u-2", "Mallory"),
        ))
        .await
        .unwrap();
    let rejected = registry.reject_module(module.id).await.unwrap();
    assert_eq!(rejected.review_status, ReviewStatus::Rejected);

    let err = registry
        .record_installation("alice", module.id, InstallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidLifecycleTransition { .. }), "got {err:?}");

    let err = registry
        .publish_version(module.id, PublishVersion::new("1.1.0", Metadata::default()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidLifecycleTransition);

    assert_eq!(names(&rx), vec!["module:registered", "module:reviewed"]);
}

#[tokio::test]
async fn test_installation_updates() {
    let (registry, rx) = channel_registry();
    let module = registry
        .register_module(
            RegisterModule::new(
                "weather-tool",
                "2.0.0",
                ModuleType::Tool,
                Author::new("u-wx", "Weather Team"),
            )
            .requires_review(false),
        )
        .await
        .unwrap();

    let mut options = InstallOptions::default();
    options
        .config
        .insert("units".to_string(), serde_json::json!("metric"));
    options.profile_ids.insert("default".to_string());
    registry
        .record_installation("alice", module.id, options)
        .await
        .unwrap();

    let mut config = BTreeMap::new();
    config.insert("units".to_string(), serde_json::json!("imperial"));
    let updated = registry
        .update_installation(
            "alice",
            module.id,
            InstallationUpdate {
                enabled: Some(false),
                config: Some(config),
                add_profiles: ["travel".to_string()].into(),
                remove_profiles: ["default".to_string()].into(),
            },
        )
        .await
        .unwrap();

    assert!(!updated.enabled);
    assert_eq!(updated.config["units"], serde_json::json!("imperial"));
    assert_eq!(
        updated.profile_ids.iter().cloned().collect::<Vec<_>>(),
        vec!["travel".to_string()]
    );

    let err = registry
        .update_installation("bob", module.id, InstallationUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(
        names(&rx),
        vec![
            "module:registered",
            "module:installed",
            "module:installation:updated",
        ]
    );
}

#[tokio::test]
async fn test_pending_metadata_edits_and_tags() {
    let (registry, _rx) = channel_registry();
    let module = registry
        .register_module(RegisterModule::new(
            "note-taker",
            "0.1.0",
            ModuleType::Personality,
            Author::new("u-1", "Ada"),
        ))
        .await
        .unwrap();

    let edited = registry
        .update_metadata(module.id, metadata_with(None, "storage"))
        .await
        .unwrap();
    assert!(edited.metadata.permissions.contains("storage"));
    let record = registry
        .get_versions(module.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(record.metadata, edited.metadata);

    let tagged = registry
        .add_tags(module.id, ["notes".to_string(), " ".to_string()])
        .await
        .unwrap();
    assert_eq!(tagged.metadata.tags.len(), 1);
    let untagged = registry
        .remove_tags(module.id, ["notes".to_string()])
        .await
        .unwrap();
    assert!(untagged.metadata.tags.is_empty());

    registry.approve_module(module.id).await.unwrap();
    let err = registry
        .update_metadata(module.id, Metadata::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidLifecycleTransition { .. }));

    let renamed = registry
        .update_module(
            module.id,
            ModuleUpdate {
                description: Some("Keeps notes".to_string()),
                ..ModuleUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.description, "Keeps notes");
}

#[rstest]
#[case("", "1.0.0")]
#[case("has space", "1.0.0")]
#[case("at@sign", "1.0.0")]
#[case("valid-name", "1.0")]
#[case("valid-name", "latest")]
#[tokio::test]
async fn test_invalid_registrations_are_client_errors(#[case] name: &str, #[case] version: &str) {
    let (registry, rx) = channel_registry();
    let err = registry
        .register_module(RegisterModule::new(
            name,
            version,
            ModuleType::Tool,
            Author::new("u-1", "Ada"),
        ))
        .await
        .unwrap_err();

    assert!(err.kind().is_client_error(), "got {err:?}");
    assert!(names(&rx).is_empty());
    assert!(registry.catalog().list_modules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_maps_to_already_exists() {
    let (registry, _rx) = channel_registry();
    let request = RegisterModule::new(
        "weather-tool",
        "2.0.0",
        ModuleType::Tool,
        Author::new("u-wx", "Weather Team"),
    );
    registry.register_module(request.clone()).await.unwrap();

    let err = registry.register_module(request).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateModule { .. }));
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(err.kind().to_string(), "already_exists");
}
