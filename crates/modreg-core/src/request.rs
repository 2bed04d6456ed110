//! Inbound payloads accepted by the registry facade.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use modreg_catalog::{Author, Metadata, ModuleStatus, ModuleType};

/// Registration payload for a brand-new module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterModule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub author: Author,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    /// Falls back to `[review] require_review` when absent.
    #[serde(default)]
    pub requires_review: Option<bool>,
}

impl RegisterModule {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        module_type: ModuleType,
        author: Author,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: version.into(),
            module_type,
            author,
            metadata: Metadata::default(),
            checksum: None,
            download_url: None,
            requires_review: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn requires_review(mut self, requires_review: bool) -> Self {
        self.requires_review = Some(requires_review);
        self
    }
}

/// Partial update of a module's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub module_type: Option<ModuleType>,
    #[serde(default)]
    pub status: Option<ModuleStatus>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ModuleUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.module_type.is_none()
            && self.status.is_none()
            && self.download_url.is_none()
    }
}

/// Data for a new version of an existing module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishVersion {
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
}

impl PublishVersion {
    pub fn new(version: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            version: version.into(),
            metadata,
            checksum: None,
            download_url: None,
            release_notes: None,
        }
    }
}

/// Options for recording an installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOptions {
    /// Defaults to the latest eligible version.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub profile_ids: BTreeSet<String>,
}

impl InstallOptions {
    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }
}

/// Changes to an existing installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationUpdate {
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Replaces the whole config map when present.
    #[serde(default)]
    pub config: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub add_profiles: BTreeSet<String>,
    #[serde(default)]
    pub remove_profiles: BTreeSet<String>,
}
