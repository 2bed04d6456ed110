//! End-to-end scenarios over fixture catalogs
//!
//! Each test loads a JSON catalog snapshot from `test-fixtures/catalogs/`
//! and drives the registry facade the way a request layer would.

use std::sync::Arc;

use modreg_catalog::{Catalog, CatalogSnapshot, MemoryCatalog, ModuleId};
use modreg_core::{
    ConflictType, ModuleRegistry, NullSink, RegistryConfig, Severity,
};
use modreg_test_utils::{CatalogSeeder, fixture_path, init_tracing};
use pretty_assertions::assert_eq;

const CORE_SEARCH: &str = "6f1c2a52-0b1e-4c1a-9d0e-000000000001";
const HTTP_CLIENT: &str = "6f1c2a52-0b1e-4c1a-9d0e-000000000002";
const WEATHER_V2: &str = "0c9a7e44-5d6b-4f0e-8a51-000000000020";
const WEATHER_V3: &str = "0c9a7e44-5d6b-4f0e-8a51-000000000030";

fn id(s: &str) -> ModuleId {
    s.parse().unwrap()
}

fn fixture_registry(name: &str) -> ModuleRegistry {
    init_tracing();
    ModuleRegistry::with_catalog(CatalogSeeder::from_fixture(name).catalog())
}

#[tokio::test]
async fn test_core_search_resolves_without_optional_cache() {
    let registry = fixture_registry("core-search");

    let resolution = registry
        .resolve_dependencies(id(CORE_SEARCH), None)
        .await
        .unwrap();

    assert!(resolution.resolved);
    assert!(resolution.conflicts.is_empty());
    assert_eq!(
        resolution.install_order,
        vec![id(HTTP_CLIENT), id(CORE_SEARCH)]
    );
    assert!(resolution.dependency("cache-layer").is_none());

    // ^1.0.0 excludes 2.0.0, and 1.3.0 is yanked
    let http = resolution.dependency("http-client").unwrap();
    assert_eq!(http.version, "1.2.0");
    assert!(http.required);
}

#[tokio::test]
async fn test_weather_tool_upgrade_is_one_version_conflict() {
    let registry = fixture_registry("weather-tool");

    let report = registry
        .check_for_conflicts("alice", id(WEATHER_V3))
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    let conflict = &report.conflicts[0];
    assert_eq!(conflict.conflict_type, ConflictType::Version);
    assert_eq!(conflict.severity, Severity::Blocking);
    assert!(conflict.description.contains(WEATHER_V2));
    assert!(conflict.description.contains(WEATHER_V3));
}

#[tokio::test]
async fn test_install_plan_combines_resolution_and_conflicts() {
    let registry = fixture_registry("weather-tool");

    let plan = registry
        .plan_install("alice", id(WEATHER_V3), None)
        .await
        .unwrap();
    assert!(plan.resolution.resolved);
    assert_eq!(plan.resolution.install_order, vec![id(WEATHER_V3)]);
    assert!(!plan.can_install());

    let plan = registry
        .plan_install("bob", id(WEATHER_V3), None)
        .await
        .unwrap();
    assert!(plan.can_install());
}

#[tokio::test]
async fn test_install_plan_serializes_camel_case() {
    let registry = fixture_registry("core-search");
    let plan = registry
        .plan_install("alice", id(CORE_SEARCH), None)
        .await
        .unwrap();

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["resolution"]["resolved"], serde_json::json!(true));
    assert_eq!(
        json["resolution"]["installOrder"],
        serde_json::json!([HTTP_CLIENT, CORE_SEARCH])
    );
    assert_eq!(json["conflicts"]["conflicts"], serde_json::json!([]));
}

#[tokio::test]
async fn test_fixture_versions_and_latest() {
    let registry = fixture_registry("core-search");

    let versions: Vec<String> = registry
        .get_versions(id(HTTP_CLIENT))
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(versions, vec!["2.0.0", "1.3.0", "1.2.0", "1.0.0"]);

    let latest = registry
        .get_latest_version(id(HTTP_CLIENT))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, "2.0.0");
}

#[tokio::test]
async fn test_fixture_checksum_and_compatibility() {
    let registry = fixture_registry("core-search");

    assert!(
        registry
            .verify_checksum(id(CORE_SEARCH), "1.0.0", b"hello")
            .await
            .unwrap()
    );
    assert!(
        !registry
            .verify_checksum(id(CORE_SEARCH), "1.0.0", b"tampered")
            .await
            .unwrap()
    );

    let report = registry
        .check_compatibility(id(CORE_SEARCH), "2.1.0")
        .await
        .unwrap();
    assert!(report.compatible);
    assert!(!report.above_target);

    let report = registry
        .check_compatibility(id(CORE_SEARCH), "1.9.0")
        .await
        .unwrap();
    assert!(!report.compatible);
}

#[tokio::test]
async fn test_config_fixture_changes_registry_behaviour() {
    let config = RegistryConfig::load(fixture_path("config/registry.toml")).unwrap();
    assert!(!config.review.require_review);
    assert_eq!(config.resolution.max_depth, 8);
    assert!(config.resolution.prefer_non_deprecated);
    assert_eq!(config.conflicts.permission, Severity::Blocking);
    assert_eq!(config.conflicts.version, Severity::Blocking);
    assert_eq!(config.search.default_limit, 5);

    let seeder = CatalogSeeder::from_fixture("weather-tool");
    let registry = ModuleRegistry::new(seeder.catalog(), Arc::new(NullSink), config);
    let page = registry
        .search_modules(&modreg_core::SearchFilters::query("weather"))
        .await
        .unwrap();
    assert_eq!(page.limit, 5);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_snapshot_round_trip_preserves_catalog() {
    let path = fixture_path("catalogs/core-search.json");
    let snapshot = CatalogSnapshot::load(&path).unwrap();
    let catalog = MemoryCatalog::from_snapshot(snapshot).unwrap();

    let json = catalog.snapshot().to_json_pretty().unwrap();
    let reloaded = MemoryCatalog::from_snapshot(CatalogSnapshot::from_json(&json).unwrap()).unwrap();

    assert_eq!(reloaded.module_count(), 2);
    let versions = reloaded.list_versions(id(HTTP_CLIENT)).await.unwrap();
    assert_eq!(versions.len(), 4);
    assert!(versions.iter().any(|v| v.version == "1.3.0" && v.yanked));
}

#[test]
fn test_snapshot_with_duplicate_name_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.json");
    let module = |id: &str| {
        serde_json::json!({
            "id": id,
            "name": "weather-tool",
            "type": "tool",
            "author": { "id": "u", "name": "U" },
            "version": "2.0.0"
        })
    };
    let body = serde_json::json!({ "modules": [module(WEATHER_V2), module(WEATHER_V3)] });
    std::fs::write(&path, body.to_string()).unwrap();

    let snapshot = CatalogSnapshot::load(&path).unwrap();
    assert!(MemoryCatalog::from_snapshot(snapshot).is_err());
}
