//! In-memory [`Catalog`] implementation.
//!
//! All state sits behind one `RwLock`. Every write performs its constraint
//! checks and its mutation under the same write guard, so two concurrent
//! registrations of the same `(name, version)` cannot both succeed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Entity, Error, Result};
use crate::model::{Module, ModuleId, ModuleInstallation, ModuleVersion};

#[derive(Debug, Default)]
struct State {
    modules: HashMap<ModuleId, Module>,
    /// Version records per module, in publication order.
    versions: HashMap<ModuleId, Vec<ModuleVersion>>,
    installations: HashMap<(String, ModuleId), ModuleInstallation>,
}

impl State {
    fn name_version_taken(&self, module: &Module) -> bool {
        self.modules
            .values()
            .any(|m| m.id != module.id && m.name == module.name && m.version == module.version)
    }

    fn insert_module(&mut self, module: Module, initial: ModuleVersion) -> Result<()> {
        if self.modules.contains_key(&module.id) {
            return Err(Error::already_exists(Entity::Module, module.id));
        }
        if self.name_version_taken(&module) {
            return Err(Error::already_exists(Entity::Module, module.label()));
        }
        self.versions.insert(module.id, vec![initial]);
        self.modules.insert(module.id, module);
        Ok(())
    }

    fn replace_module(&mut self, module: Module) -> Result<()> {
        if !self.modules.contains_key(&module.id) {
            return Err(Error::not_found(Entity::Module, module.id));
        }
        if self.name_version_taken(&module) {
            return Err(Error::already_exists(Entity::Module, module.label()));
        }
        self.modules.insert(module.id, module);
        Ok(())
    }

    fn modify_module(&mut self, id: ModuleId, change: impl FnOnce(&mut Module)) -> Result<Module> {
        let module = self
            .modules
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(Entity::Module, id))?;
        change(module);
        Ok(module.clone())
    }

    fn append_version(&mut self, module: Module, version: ModuleVersion) -> Result<()> {
        if !self.modules.contains_key(&module.id) {
            return Err(Error::not_found(Entity::Module, module.id));
        }
        let existing = self.versions.get(&module.id);
        if existing.is_some_and(|vs| vs.iter().any(|v| v.version == version.version)) {
            return Err(Error::already_exists(
                Entity::ModuleVersion,
                format!("{}@{}", module.id, version.version),
            ));
        }
        if self.name_version_taken(&module) {
            return Err(Error::already_exists(Entity::Module, module.label()));
        }
        self.versions.entry(module.id).or_default().push(version);
        self.modules.insert(module.id, module);
        Ok(())
    }

    fn replace_version(&mut self, version: ModuleVersion) -> Result<()> {
        let slot = self
            .versions
            .get_mut(&version.module_id)
            .and_then(|vs| vs.iter_mut().find(|v| v.version == version.version))
            .ok_or_else(|| {
                Error::not_found(
                    Entity::ModuleVersion,
                    format!("{}@{}", version.module_id, version.version),
                )
            })?;
        *slot = version;
        Ok(())
    }

    fn insert_installation(&mut self, installation: ModuleInstallation) -> Result<()> {
        let key = (installation.user_id.clone(), installation.module_id);
        if self.installations.contains_key(&key) {
            return Err(Error::already_exists(
                Entity::Installation,
                format!("{}/{}", key.0, key.1),
            ));
        }
        self.installations.insert(key, installation);
        Ok(())
    }

    fn replace_installation(&mut self, installation: ModuleInstallation) -> Result<()> {
        let key = (installation.user_id.clone(), installation.module_id);
        match self.installations.get_mut(&key) {
            Some(slot) => {
                *slot = installation;
                Ok(())
            }
            None => Err(Error::not_found(
                Entity::Installation,
                format!("{}/{}", key.0, key.1),
            )),
        }
    }
}

/// Serializable dump of a catalog, used to seed fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub versions: Vec<ModuleVersion>,
    #[serde(default)]
    pub installations: Vec<ModuleInstallation>,
}

impl CatalogSnapshot {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Catalog held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a snapshot, enforcing the same constraints as
    /// live writes.
    ///
    /// A module without a version record for its current version gets one
    /// synthesized from the module itself.
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self> {
        let mut state = State::default();
        let mut versions: HashMap<ModuleId, Vec<ModuleVersion>> = HashMap::new();
        for version in snapshot.versions {
            versions.entry(version.module_id).or_default().push(version);
        }

        for module in snapshot.modules {
            let mut records = versions.remove(&module.id).unwrap_or_default();
            if !records.iter().any(|v| v.version == module.version) {
                records.push(ModuleVersion::initial(&module));
            }
            let id = module.id;
            let mut records = records.into_iter();
            if let Some(first) = records.next() {
                state.insert_module(module, first)?;
            }
            for record in records {
                let stored = state
                    .versions
                    .get_mut(&id)
                    .ok_or_else(|| Error::not_found(Entity::Module, id))?;
                if stored.iter().any(|v| v.version == record.version) {
                    return Err(Error::already_exists(
                        Entity::ModuleVersion,
                        format!("{id}@{}", record.version),
                    ));
                }
                stored.push(record);
            }
        }

        if let Some(orphan) = versions.keys().next() {
            return Err(Error::not_found(Entity::Module, orphan));
        }

        for installation in snapshot.installations {
            if !state.modules.contains_key(&installation.module_id) {
                return Err(Error::not_found(Entity::Module, installation.module_id));
            }
            state.insert_installation(installation)?;
        }

        tracing::debug!(
            modules = state.modules.len(),
            installations = state.installations.len(),
            "Loaded catalog snapshot"
        );

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Export the current contents.
    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.read();
        let mut modules: Vec<Module> = state.modules.values().cloned().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));

        let mut versions = Vec::new();
        for module in &modules {
            if let Some(records) = state.versions.get(&module.id) {
                versions.extend(records.iter().cloned());
            }
        }

        let mut installations: Vec<ModuleInstallation> =
            state.installations.values().cloned().collect();
        installations.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then_with(|| a.installed_at.cmp(&b.installed_at))
        });

        CatalogSnapshot {
            modules,
            versions,
            installations,
        }
    }

    pub fn module_count(&self) -> usize {
        self.read().modules.len()
    }

    // A panic while holding the lock cannot leave a half-applied write:
    // every mutation is a single insert/replace after its checks pass.
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>> {
        Ok(self.read().modules.get(&id).cloned())
    }

    async fn get_module_by_name_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<Module>> {
        Ok(self
            .read()
            .modules
            .values()
            .find(|m| m.name == name && m.version == version)
            .cloned())
    }

    async fn find_modules_by_name(&self, name: &str) -> Result<Vec<Module>> {
        let mut found: Vec<Module> = self
            .read()
            .modules
            .values()
            .filter(|m| m.name == name)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn list_modules(&self) -> Result<Vec<Module>> {
        let mut modules: Vec<Module> = self.read().modules.values().cloned().collect();
        modules.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(modules)
    }

    async fn create_module(&self, module: Module, initial: ModuleVersion) -> Result<()> {
        self.write().insert_module(module, initial)
    }

    async fn update_module(&self, module: Module) -> Result<()> {
        self.write().replace_module(module)
    }

    async fn increment_install_count(&self, id: ModuleId) -> Result<Module> {
        self.write()
            .modify_module(id, |module| module.record_install(Utc::now()))
    }

    async fn apply_rating(&self, id: ModuleId, stars: f64) -> Result<Module> {
        self.write()
            .modify_module(id, |module| module.add_rating(stars, Utc::now()))
    }

    async fn list_versions(&self, module_id: ModuleId) -> Result<Vec<ModuleVersion>> {
        Ok(self
            .read()
            .versions
            .get(&module_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_version(
        &self,
        module_id: ModuleId,
        version: &str,
    ) -> Result<Option<ModuleVersion>> {
        Ok(self
            .read()
            .versions
            .get(&module_id)
            .and_then(|vs| vs.iter().find(|v| v.version == version))
            .cloned())
    }

    async fn publish_version(&self, module: Module, version: ModuleVersion) -> Result<()> {
        self.write().append_version(module, version)
    }

    async fn update_version(&self, version: ModuleVersion) -> Result<()> {
        self.write().replace_version(version)
    }

    async fn get_installation(
        &self,
        user_id: &str,
        module_id: ModuleId,
    ) -> Result<Option<ModuleInstallation>> {
        Ok(self
            .read()
            .installations
            .get(&(user_id.to_string(), module_id))
            .cloned())
    }

    async fn list_installations(&self, user_id: &str) -> Result<Vec<ModuleInstallation>> {
        let mut found: Vec<ModuleInstallation> = self
            .read()
            .installations
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.installed_at);
        Ok(found)
    }

    async fn create_installation(&self, installation: ModuleInstallation) -> Result<()> {
        self.write().insert_installation(installation)
    }

    async fn update_installation(&self, installation: ModuleInstallation) -> Result<()> {
        self.write().replace_installation(installation)
    }
}
