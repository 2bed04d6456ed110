//! The registry facade
//!
//! [`ModuleRegistry`] owns every write to module, version and installation
//! records. It composes the lifecycle rules, the resolver and the conflict
//! detector over an injected [`Catalog`], and reports each successful
//! mutation to an injected [`EventSink`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use modreg_catalog::{
    Catalog, Metadata, Module, ModuleId, ModuleInstallation, ModuleStatus, ModuleVersion,
    ReviewStatus,
};

use crate::config::RegistryConfig;
use crate::conflict::{ConflictDetector, ConflictReport, ModuleConflict};
use crate::events::{EventSink, NullSink, RegistryEvent};
use crate::integrity::{CompatibilityReport, checksum_matches, evaluate_compatibility};
use crate::lifecycle;
use crate::request::{
    InstallOptions, InstallationUpdate, ModuleUpdate, PublishVersion, RegisterModule,
};
use crate::resolver::{DependencyResolution, DependencyResolver};
use crate::search::{self, SearchFilters, SearchPage};
use crate::validate::{validate_metadata, validate_name};
use crate::{Error, Result};

/// Everything needed to decide whether an install may proceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPlan {
    pub resolution: DependencyResolution,
    pub conflicts: ConflictReport,
}

impl InstallPlan {
    /// Dependencies resolved and no blocking conflict from either source.
    pub fn can_install(&self) -> bool {
        self.resolution.is_installable() && !self.conflicts.blocks_install()
    }
}

/// Registry facade over a catalog.
pub struct ModuleRegistry {
    catalog: Arc<dyn Catalog>,
    events: Arc<dyn EventSink>,
    config: RegistryConfig,
}

impl ModuleRegistry {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        events: Arc<dyn EventSink>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            catalog,
            events,
            config,
        }
    }

    /// Default configuration, events discarded.
    pub fn with_catalog(catalog: Arc<dyn Catalog>) -> Self {
        Self::new(catalog, Arc::new(NullSink), RegistryConfig::default())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    fn emit(&self, event: RegistryEvent) {
        tracing::debug!(event = event.name(), module_id = %event.module_id(), "Emitting event");
        self.events.emit(event);
    }

    async fn require_module(&self, id: ModuleId) -> Result<Module> {
        self.catalog
            .get_module(id)
            .await?
            .ok_or_else(|| Error::module_not_found(id))
    }

    async fn require_version(&self, module: &Module, version: &str) -> Result<ModuleVersion> {
        self.catalog
            .get_version(module.id, version)
            .await?
            .ok_or_else(|| Error::VersionNotFound {
                module: module.name.clone(),
                version: version.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Registration and publishing
    // ------------------------------------------------------------------

    /// Register a new module together with its first version record.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateModule`] when `(name, version)` is taken. The
    /// catalog enforces this itself, so two concurrent registrations of the
    /// same pair cannot both succeed.
    pub async fn register_module(&self, request: RegisterModule) -> Result<Module> {
        validate_name(&request.name)?;
        modreg_version::parse_version(&request.version)?;
        validate_metadata(&request.name, &request.metadata)?;
        if request.author.id.trim().is_empty() {
            return Err(Error::invalid_input("author.id", "must not be empty"));
        }

        if self
            .catalog
            .get_module_by_name_version(&request.name, &request.version)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateModule {
                name: request.name,
                version: request.version,
            });
        }

        let now = Utc::now();
        let requires_review = request
            .requires_review
            .unwrap_or(self.config.review.require_review);
        let mut module = Module {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            module_type: request.module_type,
            author: request.author,
            version: request.version,
            install_count: 0,
            rating: 0.0,
            rating_count: 0,
            requires_review,
            review_status: ReviewStatus::Pending,
            status: ModuleStatus::Inactive,
            published_at: None,
            metadata: request.metadata,
            checksum: request.checksum,
            download_url: request.download_url,
            created_at: now,
            updated_at: now,
        };
        if !requires_review {
            lifecycle::approve(&mut module, now)?;
        }

        let initial = ModuleVersion::initial(&module);
        self.catalog
            .create_module(module.clone(), initial)
            .await
            .map_err(|e| Error::from_module_write(e, &module.name, &module.version))?;

        tracing::info!(
            module = %module.label(),
            id = %module.id,
            review = %module.review_status,
            "Registered module"
        );
        self.emit(RegistryEvent::Registered {
            module_id: module.id,
            name: module.name.clone(),
            version: module.version.clone(),
            at: now,
        });
        Ok(module)
    }

    /// Change descriptive fields of a module.
    pub async fn update_module(&self, id: ModuleId, update: ModuleUpdate) -> Result<Module> {
        if update.is_empty() {
            return Err(Error::invalid_input("update", "no fields to change"));
        }
        let mut module = self.require_module(id).await?;

        let mut fields = Vec::new();
        if let Some(description) = update.description {
            module.description = description;
            fields.push("description");
        }
        if let Some(module_type) = update.module_type {
            module.module_type = module_type;
            fields.push("type");
        }
        if let Some(status) = update.status {
            module.status = status;
            fields.push("status");
        }
        if let Some(download_url) = update.download_url {
            module.download_url = Some(download_url);
            fields.push("downloadUrl");
        }
        self.save_module(module, &fields).await
    }

    async fn save_module(&self, mut module: Module, fields: &[&str]) -> Result<Module> {
        let now = Utc::now();
        module.updated_at = now;
        self.catalog.update_module(module.clone()).await?;

        tracing::debug!(module = %module.label(), ?fields, "Updated module");
        self.emit(RegistryEvent::Updated {
            module_id: module.id,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            at: now,
        });
        Ok(module)
    }

    /// Publish a new version of an existing module.
    ///
    /// # Errors
    ///
    /// [`Error::VersionNotGreater`] unless the version is strictly newer than
    /// the current one, then [`Error::VersionAlreadyExists`] if it is already
    /// recorded.
    pub async fn publish_version(
        &self,
        id: ModuleId,
        request: PublishVersion,
    ) -> Result<ModuleVersion> {
        let module = self.require_module(id).await?;
        let previous = module.version.clone();
        let (updated, record) = lifecycle::prepare_publish(&module, request, Utc::now())?;

        if self
            .catalog
            .get_version(id, &record.version)
            .await?
            .is_some()
        {
            return Err(Error::VersionAlreadyExists {
                module: module.name,
                version: record.version,
            });
        }

        self.catalog
            .publish_version(updated, record.clone())
            .await
            .map_err(|e| Error::from_module_write(e, &module.name, &record.version))?;

        tracing::info!(
            module = %module.name,
            from = %previous,
            to = %record.version,
            "Published version"
        );
        self.emit(RegistryEvent::VersionPublished {
            module_id: id,
            version: record.version.clone(),
            previous_version: previous,
            at: record.created_at,
        });
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn search_modules(&self, filters: &SearchFilters) -> Result<SearchPage> {
        let modules = self.catalog.list_modules().await?;
        Ok(search::search(modules, filters, &self.config.search))
    }

    pub async fn get_module(&self, id: ModuleId) -> Result<Module> {
        self.require_module(id).await
    }

    pub async fn get_module_by_name(&self, name: &str, version: &str) -> Result<Module> {
        self.catalog
            .get_module_by_name_version(name, version)
            .await?
            .ok_or_else(|| Error::module_not_found(format!("{name}@{version}")))
    }

    /// All recorded versions, newest first.
    pub async fn get_versions(&self, id: ModuleId) -> Result<Vec<ModuleVersion>> {
        self.require_module(id).await?;
        let mut versions = self.catalog.list_versions(id).await?;
        versions.sort_by(|a, b| match (a.semver(), b.semver()) {
            (Ok(a), Ok(b)) => modreg_version::precedence(&b, &a),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.version.cmp(&b.version),
        });
        Ok(versions)
    }

    /// Highest version that is neither deprecated nor yanked.
    pub async fn get_latest_version(&self, id: ModuleId) -> Result<Option<ModuleVersion>> {
        let versions = self.get_versions(id).await?;
        Ok(versions
            .into_iter()
            .find(|v| v.is_current() && v.semver().is_ok()))
    }

    /// Latest version if any, else the highest deprecated but not yanked one.
    async fn default_install_version(&self, module: &Module) -> Result<ModuleVersion> {
        let versions = self.get_versions(module.id).await?;
        let pick = versions
            .iter()
            .find(|v| v.is_current())
            .or_else(|| versions.iter().find(|v| !v.yanked));
        pick.cloned().ok_or_else(|| Error::VersionNotFound {
            module: module.name.clone(),
            version: "latest".to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Installations
    // ------------------------------------------------------------------

    /// Record that `user_id` installed a module.
    ///
    /// A first install creates the record and bumps `install_count`; a
    /// reinstall or upgrade updates the record in place.
    pub async fn record_installation(
        &self,
        user_id: &str,
        module_id: ModuleId,
        options: InstallOptions,
    ) -> Result<ModuleInstallation> {
        if user_id.trim().is_empty() {
            return Err(Error::invalid_input("userId", "must not be empty"));
        }
        let module = self.require_module(module_id).await?;
        lifecycle::ensure_installable(&module)?;

        let record = match options.version.as_deref() {
            Some(version) => self.require_version(&module, version).await?,
            None => self.default_install_version(&module).await?,
        };
        if record.yanked {
            return Err(Error::VersionYanked {
                module: module.name,
                version: record.version,
            });
        }

        let now = Utc::now();
        let existing = self.catalog.get_installation(user_id, module_id).await?;
        let first_install = existing.is_none();
        let installation = match existing {
            Some(mut installation) => {
                installation.version = record.version.clone();
                if !options.config.is_empty() {
                    installation.config = options.config;
                }
                installation.profile_ids.extend(options.profile_ids);
                installation.updated_at = now;
                self.catalog.update_installation(installation.clone()).await?;
                installation
            }
            None => {
                let mut installation =
                    ModuleInstallation::new(user_id, module_id, record.version.clone());
                installation.config = options.config;
                installation.profile_ids = options.profile_ids;
                self.catalog
                    .create_installation(installation.clone())
                    .await
                    .map_err(|e| match e {
                        modreg_catalog::Error::AlreadyExists { .. } => Error::InstallationExists {
                            user_id: user_id.to_string(),
                            module_id,
                        },
                        other => Error::Catalog(other),
                    })?;
                self.bump_install_count(module_id).await?;
                installation
            }
        };

        tracing::info!(
            user = user_id,
            module = %module.name,
            version = %installation.version,
            first_install,
            "Recorded installation"
        );
        self.emit(RegistryEvent::Installed {
            module_id,
            user_id: user_id.to_string(),
            version: installation.version.clone(),
            first_install,
            at: now,
        });
        Ok(installation)
    }

    pub async fn update_installation(
        &self,
        user_id: &str,
        module_id: ModuleId,
        update: InstallationUpdate,
    ) -> Result<ModuleInstallation> {
        let mut installation = self
            .catalog
            .get_installation(user_id, module_id)
            .await?
            .ok_or_else(|| Error::InstallationNotFound {
                user_id: user_id.to_string(),
                module_id,
            })?;

        if let Some(enabled) = update.enabled {
            installation.enabled = enabled;
        }
        if let Some(config) = update.config {
            installation.config = config;
        }
        installation.profile_ids.extend(update.add_profiles);
        installation
            .profile_ids
            .retain(|p| !update.remove_profiles.contains(p));
        let now = Utc::now();
        installation.updated_at = now;
        self.catalog.update_installation(installation.clone()).await?;

        self.emit(RegistryEvent::InstallationUpdated {
            module_id,
            user_id: user_id.to_string(),
            at: now,
        });
        Ok(installation)
    }

    pub async fn get_installation(
        &self,
        user_id: &str,
        module_id: ModuleId,
    ) -> Result<Option<ModuleInstallation>> {
        Ok(self.catalog.get_installation(user_id, module_id).await?)
    }

    pub async fn list_installations(&self, user_id: &str) -> Result<Vec<ModuleInstallation>> {
        Ok(self.catalog.list_installations(user_id).await?)
    }

    // ------------------------------------------------------------------
    // Resolution and conflicts
    // ------------------------------------------------------------------

    pub async fn resolve_dependencies(
        &self,
        module_id: ModuleId,
        version: Option<&str>,
    ) -> Result<DependencyResolution> {
        DependencyResolver::new(
            self.catalog.as_ref(),
            &self.config.resolution,
            &self.config.conflicts,
        )
        .resolve(module_id, version)
        .await
    }

    /// Check a candidate against an explicit installed set.
    pub async fn check_conflicts(
        &self,
        candidate_id: ModuleId,
        installed: &[ModuleInstallation],
    ) -> Result<Vec<ModuleConflict>> {
        ConflictDetector::new(self.catalog.as_ref(), &self.config.conflicts)
            .check(candidate_id, installed)
            .await
    }

    /// Check a candidate against everything `user_id` has installed.
    pub async fn check_for_conflicts(
        &self,
        user_id: &str,
        candidate_id: ModuleId,
    ) -> Result<ConflictReport> {
        let installed = self.catalog.list_installations(user_id).await?;
        let conflicts = self.check_conflicts(candidate_id, &installed).await?;
        Ok(ConflictReport::new(conflicts))
    }

    /// Resolve and conflict-check in one call. Nothing is written.
    pub async fn plan_install(
        &self,
        user_id: &str,
        module_id: ModuleId,
        version: Option<&str>,
    ) -> Result<InstallPlan> {
        let resolution = self.resolve_dependencies(module_id, version).await?;
        let conflicts = self.check_for_conflicts(user_id, module_id).await?;
        Ok(InstallPlan {
            resolution,
            conflicts,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Leaves a pending module as it is and emits nothing; fails from any
    /// other state.
    pub async fn request_review(&self, id: ModuleId) -> Result<Module> {
        let mut module = self.require_module(id).await?;
        lifecycle::request_review(&mut module)?;
        Ok(module)
    }

    pub async fn approve_module(&self, id: ModuleId) -> Result<Module> {
        self.review(id, ReviewStatus::Approved).await
    }

    pub async fn reject_module(&self, id: ModuleId) -> Result<Module> {
        self.review(id, ReviewStatus::Rejected).await
    }

    async fn review(&self, id: ModuleId, decision: ReviewStatus) -> Result<Module> {
        let mut module = self.require_module(id).await?;
        let now = Utc::now();
        if decision == ReviewStatus::Approved {
            lifecycle::approve(&mut module, now)?;
        } else {
            lifecycle::reject(&mut module, now)?;
        }
        self.catalog.update_module(module.clone()).await?;

        tracing::info!(module = %module.label(), status = %module.review_status, "Reviewed module");
        self.emit(RegistryEvent::Reviewed {
            module_id: id,
            status: module.review_status,
            at: now,
        });
        Ok(module)
    }

    pub async fn deprecate_module(&self, id: ModuleId) -> Result<Module> {
        let mut module = self.require_module(id).await?;
        lifecycle::deprecate_module(&mut module, Utc::now())?;
        tracing::info!(module = %module.label(), "Deprecated module");
        self.save_module(module, &["reviewStatus", "status"]).await
    }

    pub async fn deprecate_version(
        &self,
        id: ModuleId,
        version: &str,
        reason: Option<&str>,
    ) -> Result<ModuleVersion> {
        let module = self.require_module(id).await?;
        let mut record = self.require_version(&module, version).await?;
        lifecycle::deprecate_version(&module, &mut record, reason)?;
        self.catalog.update_version(record.clone()).await?;

        tracing::info!(module = %module.name, version, ?reason, "Deprecated version");
        self.emit(RegistryEvent::VersionDeprecated {
            module_id: id,
            version: record.version.clone(),
            reason: reason.map(str::to_string),
            at: Utc::now(),
        });
        Ok(record)
    }

    /// Yank a version. Existing installations of it are left in place.
    pub async fn yank_version(
        &self,
        id: ModuleId,
        version: &str,
        reason: Option<&str>,
    ) -> Result<ModuleVersion> {
        let module = self.require_module(id).await?;
        let mut record = self.require_version(&module, version).await?;
        lifecycle::yank_version(&module, &mut record, reason)?;
        self.catalog.update_version(record.clone()).await?;

        tracing::info!(module = %module.name, version, ?reason, "Yanked version");
        self.emit(RegistryEvent::VersionYanked {
            module_id: id,
            version: record.version.clone(),
            reason: reason.map(str::to_string),
            at: Utc::now(),
        });
        Ok(record)
    }

    /// Replace the metadata of a module still awaiting review, together with
    /// its current version snapshot.
    pub async fn update_metadata(&self, id: ModuleId, metadata: Metadata) -> Result<Module> {
        let mut module = self.require_module(id).await?;
        lifecycle::ensure_metadata_editable(&module)?;
        validate_metadata(&module.name, &metadata)?;

        let mut record = self.require_version(&module, &module.version).await?;
        record.metadata = metadata.clone();
        self.catalog.update_version(record).await?;

        module.metadata = metadata;
        self.save_module(module, &["metadata"]).await
    }

    pub async fn add_tags<I>(&self, id: ModuleId, tags: I) -> Result<Module>
    where
        I: IntoIterator<Item = String>,
    {
        let mut module = self.require_module(id).await?;
        module.metadata.tags.extend(
            tags.into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
        self.save_module(module, &["tags"]).await
    }

    pub async fn remove_tags<I>(&self, id: ModuleId, tags: I) -> Result<Module>
    where
        I: IntoIterator<Item = String>,
    {
        let mut module = self.require_module(id).await?;
        let remove: BTreeSet<String> = tags.into_iter().collect();
        module.metadata.tags.retain(|t| !remove.contains(t));
        self.save_module(module, &["tags"]).await
    }

    pub async fn increment_install_count(&self, id: ModuleId) -> Result<Module> {
        let module = self.bump_install_count(id).await?;
        self.emit(RegistryEvent::Updated {
            module_id: id,
            fields: vec!["installCount".to_string()],
            at: module.updated_at,
        });
        Ok(module)
    }

    async fn bump_install_count(&self, id: ModuleId) -> Result<Module> {
        self.catalog
            .increment_install_count(id)
            .await
            .map_err(|e| Error::from_module_update(e, id))
    }

    /// Add one rating to the running average.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRating`] unless `0 <= stars <= 5`.
    pub async fn rate(&self, id: ModuleId, stars: f64, user_id: &str) -> Result<Module> {
        if !stars.is_finite() || !(0.0..=5.0).contains(&stars) {
            return Err(Error::InvalidRating { stars });
        }
        let module = self
            .catalog
            .apply_rating(id, stars)
            .await
            .map_err(|e| Error::from_module_update(e, id))?;

        tracing::debug!(module = %module.name, user = user_id, stars, rating = module.rating, "Rated module");
        self.emit(RegistryEvent::Rated {
            module_id: id,
            user_id: user_id.to_string(),
            stars,
            rating: module.rating,
            rating_count: module.rating_count,
            at: module.updated_at,
        });
        Ok(module)
    }

    // ------------------------------------------------------------------
    // Integrity and compatibility
    // ------------------------------------------------------------------

    /// Compare `bytes` against the checksum recorded for `version`.
    ///
    /// Returns `false` when no checksum was recorded.
    pub async fn verify_checksum(&self, id: ModuleId, version: &str, bytes: &[u8]) -> Result<bool> {
        let module = self.require_module(id).await?;
        let record = self.require_version(&module, version).await?;
        match record.checksum.as_deref() {
            Some(expected) => {
                let ok = checksum_matches(expected, bytes);
                if !ok {
                    tracing::warn!(module = %module.name, version, "Checksum mismatch");
                }
                Ok(ok)
            }
            None => {
                tracing::warn!(module = %module.name, version, "No checksum recorded");
                Ok(false)
            }
        }
    }

    pub async fn check_compatibility(
        &self,
        id: ModuleId,
        platform_version: &str,
    ) -> Result<CompatibilityReport> {
        let module = self.require_module(id).await?;
        evaluate_compatibility(&module.metadata.compatibility, platform_version)
    }
}
