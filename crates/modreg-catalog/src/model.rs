//! Persisted record shapes.
//!
//! Field names serialize in camelCase so the JSON shape matches what the
//! document store and the request layer exchange (`installCount`,
//! `reviewStatus`, ...).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque module identifier, assigned at registration.
pub type ModuleId = Uuid;

/// Kind of extension a module provides.
///
/// Serialized as a plain lowercase string; unknown strings round-trip
/// through [`ModuleType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleType {
    Personality,
    Tool,
    Agent,
    Modality,
    Other(String),
}

impl From<String> for ModuleType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "personality" => Self::Personality,
            "tool" => Self::Tool,
            "agent" => Self::Agent,
            "modality" => Self::Modality,
            _ => Self::Other(s),
        }
    }
}

impl From<ModuleType> for String {
    fn from(t: ModuleType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personality => write!(f, "personality"),
            Self::Tool => write!(f, "tool"),
            Self::Agent => write!(f, "agent"),
            Self::Modality => write!(f, "modality"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

/// Activation state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    #[default]
    Inactive,
    Active,
    Deprecated,
}

/// Review state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Deprecated,
    Yanked,
}

impl ReviewStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Yanked)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Yanked => write!(f, "yanked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A reference from one module to another, by module name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// Name of the module depended on.
    pub id: String,
    /// Exact version or range.
    pub version: String,
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    pub fn required(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: false,
        }
    }

    pub fn optional(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: true,
        }
    }
}

/// A named, versioned feature a module provides or requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub optional: bool,
}

impl Capability {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: false,
        }
    }

    pub fn optional(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            optional: true,
        }
    }
}

/// Platform requirements declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    #[serde(default = "default_min_platform")]
    pub min_platform_version: String,
    #[serde(default)]
    pub target_platform_version: Option<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub modalities: Vec<String>,
}

fn default_min_platform() -> String {
    "0.0.0".to_string()
}

impl Default for Compatibility {
    fn default() -> Self {
        Self {
            min_platform_version: default_min_platform(),
            target_platform_version: None,
            protocols: Vec::new(),
            modalities: Vec::new(),
        }
    }
}

/// Per-version metadata. Replaced wholesale when a new version is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub compatibility: Compatibility,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            license: None,
            tags: BTreeSet::new(),
            dependencies: Vec::new(),
            permissions: BTreeSet::new(),
            capabilities: Vec::new(),
            compatibility: Compatibility::default(),
        }
    }
}

/// A named, versioned artifact. `version` mirrors the latest published
/// [`ModuleVersion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub module_type: ModuleType,
    pub author: Author,
    pub version: String,
    #[serde(default)]
    pub install_count: u64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub rating_count: u64,
    #[serde(default)]
    pub requires_review: bool,
    #[serde(default)]
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub status: ModuleStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Module {
    /// `name@version`, used in log lines and conflict descriptions.
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn record_install(&mut self, at: DateTime<Utc>) {
        self.install_count = self.install_count.saturating_add(1);
        self.updated_at = at;
    }

    /// Fold one rating into the running average.
    pub fn add_rating(&mut self, stars: f64, at: DateTime<Utc>) {
        let count = self.rating_count as f64;
        self.rating = (self.rating * count + stars) / (count + 1.0);
        self.rating_count += 1;
        self.updated_at = at;
    }
}

/// Immutable record of one published version of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleVersion {
    pub module_id: ModuleId,
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub release_notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ModuleVersion {
    /// The version record mirroring a module's current state.
    pub fn initial(module: &Module) -> Self {
        Self {
            module_id: module.id,
            version: module.version.clone(),
            metadata: module.metadata.clone(),
            checksum: module.checksum.clone(),
            download_url: module.download_url.clone(),
            deprecated: false,
            yanked: false,
            release_notes: None,
            created_at: module.created_at,
        }
    }

    /// Neither deprecated nor yanked.
    pub fn is_current(&self) -> bool {
        !self.deprecated && !self.yanked
    }

    /// Parse the version string.
    pub fn semver(&self) -> modreg_version::Result<modreg_version::Version> {
        modreg_version::parse_version(&self.version)
    }
}

/// A user's installation of one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInstallation {
    pub user_id: String,
    pub module_id: ModuleId,
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub profile_ids: BTreeSet<String>,
    #[serde(default = "Utc::now")]
    pub installed_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl ModuleInstallation {
    pub fn new(user_id: impl Into<String>, module_id: ModuleId, version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            module_id,
            version: version.into(),
            enabled: true,
            config: BTreeMap::new(),
            profile_ids: BTreeSet::new(),
            installed_at: now,
            updated_at: now,
        }
    }
}
