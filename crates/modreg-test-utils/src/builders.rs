//! [`ModuleBuilder`] for module records in test scenarios.

use chrono::Utc;
use uuid::Uuid;

use modreg_catalog::{
    Author, Capability, Dependency, Metadata, Module, ModuleStatus, ModuleType, ReviewStatus,
};

/// Builds a [`Module`] record directly, bypassing registry validation so
/// tests can set up any state (including broken constraints).
///
/// Modules default to approved and active.
///
/// # Example
///
/// ```rust
/// use modreg_test_utils::ModuleBuilder;
///
/// let module = ModuleBuilder::new("core-search", "1.0.0")
///     .depends_on("http-client", "^1.0.0")
///     .optional_dependency("cache-layer", "^1.0.0")
///     .build();
///
/// assert_eq!(module.metadata.dependencies.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        let now = Utc::now();
        Self {
            module: Module {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: format!("{name} test module"),
                module_type: ModuleType::Tool,
                author: Author::new("test-author", "Test Author"),
                version: version.to_string(),
                install_count: 0,
                rating: 0.0,
                rating_count: 0,
                requires_review: true,
                review_status: ReviewStatus::Approved,
                status: ModuleStatus::Active,
                published_at: Some(now),
                metadata: Metadata::default(),
                checksum: None,
                download_url: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn depends_on(mut self, name: &str, constraint: &str) -> Self {
        self.module
            .metadata
            .dependencies
            .push(Dependency::required(name, constraint));
        self
    }

    pub fn optional_dependency(mut self, name: &str, constraint: &str) -> Self {
        self.module
            .metadata
            .dependencies
            .push(Dependency::optional(name, constraint));
        self
    }

    pub fn capability(mut self, id: &str, version: &str) -> Self {
        self.module
            .metadata
            .capabilities
            .push(Capability::new(id, version));
        self
    }

    pub fn optional_capability(mut self, id: &str, version: &str) -> Self {
        self.module
            .metadata
            .capabilities
            .push(Capability::optional(id, version));
        self
    }

    pub fn permission(mut self, permission: &str) -> Self {
        self.module
            .metadata
            .permissions
            .insert(permission.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.module.metadata.tags.insert(tag.to_string());
        self
    }

    pub fn module_type(mut self, module_type: ModuleType) -> Self {
        self.module.module_type = module_type;
        self
    }

    pub fn author(mut self, id: &str, name: &str) -> Self {
        self.module.author = Author::new(id, name);
        self
    }

    pub fn review_status(mut self, status: ReviewStatus) -> Self {
        self.module.review_status = status;
        if status == ReviewStatus::Pending {
            self.module.status = ModuleStatus::Inactive;
            self.module.published_at = None;
        }
        self
    }

    pub fn installs(mut self, count: u64) -> Self {
        self.module.install_count = count;
        self
    }

    pub fn checksum(mut self, checksum: &str) -> Self {
        self.module.checksum = Some(checksum.to_string());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.module.metadata = metadata;
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}
