//! The storage seam for module, version and installation records.

use async_trait::async_trait;

use crate::Result;
use crate::model::{Module, ModuleId, ModuleInstallation, ModuleVersion};

/// Read/write access to persisted registry records.
///
/// Implementations must provide read-your-writes consistency within one
/// logical operation, and must enforce the uniqueness constraints below
/// themselves rather than relying on callers to check first:
///
/// - `(Module.name, Module.version)` is unique across all modules
/// - `(ModuleVersion.module_id, ModuleVersion.version)` is unique
/// - `(ModuleInstallation.user_id, ModuleInstallation.module_id)` is unique
///
/// A write that would violate a constraint fails with
/// [`Error::AlreadyExists`](crate::Error::AlreadyExists) and leaves the
/// catalog unchanged.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>>;

    async fn get_module_by_name_version(&self, name: &str, version: &str)
    -> Result<Option<Module>>;

    /// All modules sharing `name`, whatever their version.
    async fn find_modules_by_name(&self, name: &str) -> Result<Vec<Module>>;

    async fn list_modules(&self) -> Result<Vec<Module>>;

    /// Atomically insert a module together with its first version record.
    async fn create_module(&self, module: Module, initial: ModuleVersion) -> Result<()>;

    /// Replace an existing module record.
    async fn update_module(&self, module: Module) -> Result<()>;

    /// Add one to a module's install count in a single step and return the
    /// updated record. Concurrent calls must all be counted.
    async fn increment_install_count(&self, id: ModuleId) -> Result<Module>;

    /// Fold `stars` into a module's rating average in a single step and
    /// return the updated record. Concurrent calls must all be counted.
    async fn apply_rating(&self, id: ModuleId, stars: f64) -> Result<Module>;

    /// Version records for a module, in publication order.
    async fn list_versions(&self, module_id: ModuleId) -> Result<Vec<ModuleVersion>>;

    async fn get_version(&self, module_id: ModuleId, version: &str)
    -> Result<Option<ModuleVersion>>;

    /// Atomically append `version` and replace the module record.
    async fn publish_version(&self, module: Module, version: ModuleVersion) -> Result<()>;

    /// Replace an existing version record (flag and notes changes).
    async fn update_version(&self, version: ModuleVersion) -> Result<()>;

    async fn get_installation(
        &self,
        user_id: &str,
        module_id: ModuleId,
    ) -> Result<Option<ModuleInstallation>>;

    async fn list_installations(&self, user_id: &str) -> Result<Vec<ModuleInstallation>>;

    async fn create_installation(&self, installation: ModuleInstallation) -> Result<()>;

    async fn update_installation(&self, installation: ModuleInstallation) -> Result<()>;
}
