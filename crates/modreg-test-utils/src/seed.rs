//! [`CatalogSeeder`] for populating an in-memory catalog.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use modreg_catalog::{
    Catalog, CatalogSnapshot, MemoryCatalog, Metadata, Module, ModuleInstallation, ModuleVersion,
};

use crate::builders::ModuleBuilder;

/// Path of a file under the workspace `test-fixtures/` directory.
pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../test-fixtures")
        .join(relative)
}

/// Writes records straight into a [`MemoryCatalog`].
///
/// Every helper panics on failure; seeding errors are test bugs.
pub struct CatalogSeeder {
    catalog: Arc<MemoryCatalog>,
}

impl Default for CatalogSeeder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogSeeder {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::new()),
        }
    }

    /// Load a snapshot from `test-fixtures/catalogs/<name>.json`.
    pub fn from_fixture(name: &str) -> Self {
        let path = fixture_path(&format!("catalogs/{name}.json"));
        let snapshot = CatalogSnapshot::load(&path)
            .unwrap_or_else(|e| panic!("failed to load fixture {}: {e}", path.display()));
        let catalog = MemoryCatalog::from_snapshot(snapshot)
            .unwrap_or_else(|e| panic!("invalid fixture {}: {e}", path.display()));
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> Arc<MemoryCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Insert a module with its initial version record.
    pub async fn module(&self, builder: ModuleBuilder) -> Module {
        let module = builder.build();
        self.catalog
            .create_module(module.clone(), ModuleVersion::initial(&module))
            .await
            .unwrap_or_else(|e| panic!("failed to seed {}: {e}", module.label()));
        module
    }

    /// Record an additional version of `module` without changing the
    /// module's current version.
    pub async fn version(&self, module: &Module, version: &str, metadata: Metadata) -> ModuleVersion {
        let current = self
            .catalog
            .get_module(module.id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("module {} not seeded", module.label()));
        let record = ModuleVersion {
            module_id: module.id,
            version: version.to_string(),
            metadata,
            checksum: None,
            download_url: None,
            deprecated: false,
            yanked: false,
            release_notes: None,
            created_at: Utc::now(),
        };
        self.catalog
            .publish_version(current, record.clone())
            .await
            .unwrap_or_else(|e| panic!("failed to seed {}@{version}: {e}", module.name));
        record
    }

    /// Flip the yanked flag on a recorded version.
    pub async fn yank(&self, module: &Module, version: &str) {
        self.flag(module, version, |v| v.yanked = true).await;
    }

    /// Flip the deprecated flag on a recorded version.
    pub async fn deprecate(&self, module: &Module, version: &str) {
        self.flag(module, version, |v| v.deprecated = true).await;
    }

    async fn flag(&self, module: &Module, version: &str, apply: impl FnOnce(&mut ModuleVersion)) {
        let mut record = self
            .catalog
            .get_version(module.id, version)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("{}@{version} not seeded", module.name));
        apply(&mut record);
        self.catalog
            .update_version(record)
            .await
            .unwrap_or_else(|e| panic!("failed to update {}@{version}: {e}", module.name));
    }

    /// Record that `user_id` has `module` installed at its current version.
    pub async fn install(&self, user_id: &str, module: &Module) -> ModuleInstallation {
        let installation = ModuleInstallation::new(user_id, module.id, module.version.clone());
        self.catalog
            .create_installation(installation.clone())
            .await
            .unwrap_or_else(|e| panic!("failed to install {}: {e}", module.label()));
        installation
    }
}
