//! Error types for modreg-core

use std::fmt;
use std::path::PathBuf;

use modreg_catalog::{Entity, ModuleId, ReviewStatus};

use crate::lifecycle::LifecycleAction;

/// Result type for modreg-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a registry operation.
///
/// Unsatisfiable dependencies and detected conflicts are not errors; they
/// are reported inside [`DependencyResolution`](crate::DependencyResolution)
/// and [`ConflictReport`](crate::ConflictReport).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Module not found: {id}")]
    ModuleNotFound { id: String },

    #[error("Version {version} not found for module {module}")]
    VersionNotFound { module: String, version: String },

    #[error("No installation of module {module_id} for user {user_id}")]
    InstallationNotFound { user_id: String, module_id: ModuleId },

    /// A module with this `(name, version)` pair is already registered
    #[error("Module {name}@{version} already exists")]
    DuplicateModule { name: String, version: String },

    #[error("Version {version} is already recorded for module {module}")]
    VersionAlreadyExists { module: String, version: String },

    #[error("User {user_id} already has module {module_id} installed")]
    InstallationExists { user_id: String, module_id: ModuleId },

    /// Publish attempted with a version that is not newer than the current one
    #[error("Version {attempted} is not greater than current version {current}")]
    VersionNotGreater { current: String, attempted: String },

    #[error("Version {version} of {module} has been yanked")]
    VersionYanked { module: String, version: String },

    #[error("Cannot {action} {module}: review status is {from}")]
    InvalidLifecycleTransition {
        module: String,
        from: ReviewStatus,
        action: LifecycleAction,
    },

    #[error("Invalid rating {stars}: must be between 0 and 5")]
    InvalidRating { stars: f64 },

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    // Transparent wrappers for underlying crate errors
    /// Version or range parse failure
    #[error(transparent)]
    Version(#[from] modreg_version::Error),

    /// Storage error from the catalog
    #[error(transparent)]
    Catalog(#[from] modreg_catalog::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error taxonomy exposed to the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidVersionFormat,
    VersionNotGreater,
    InvalidLifecycleTransition,
    InvalidRating,
    InvalidInput,
    Configuration,
    Storage,
}

impl ErrorKind {
    /// Whether the caller's input caused the failure (a 4xx-style rejection).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Configuration | Self::Storage)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidVersionFormat => "invalid_version_format",
            Self::VersionNotGreater => "version_not_greater",
            Self::InvalidLifecycleTransition => "invalid_lifecycle_transition",
            Self::InvalidRating => "invalid_rating",
            Self::InvalidInput => "invalid_input",
            Self::Configuration => "configuration",
            Self::Storage => "storage",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModuleNotFound { .. }
            | Self::VersionNotFound { .. }
            | Self::InstallationNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateModule { .. }
            | Self::VersionAlreadyExists { .. }
            | Self::InstallationExists { .. } => ErrorKind::AlreadyExists,
            Self::VersionNotGreater { .. } => ErrorKind::VersionNotGreater,
            Self::VersionYanked { .. } | Self::InvalidLifecycleTransition { .. } => {
                ErrorKind::InvalidLifecycleTransition
            }
            Self::InvalidRating { .. } => ErrorKind::InvalidRating,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Version(_) => ErrorKind::InvalidVersionFormat,
            Self::ConfigNotFound { .. } | Self::InvalidConfig { .. } | Self::TomlDe(_) => {
                ErrorKind::Configuration
            }
            Self::Catalog(inner) => match inner {
                modreg_catalog::Error::NotFound { .. } => ErrorKind::NotFound,
                modreg_catalog::Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
                _ => ErrorKind::Storage,
            },
            Self::Io(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn module_not_found(id: impl fmt::Display) -> Self {
        Self::ModuleNotFound { id: id.to_string() }
    }

    pub(crate) fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Translate a missing record on an in-place module update.
    pub(crate) fn from_module_update(err: modreg_catalog::Error, id: impl fmt::Display) -> Self {
        match err {
            modreg_catalog::Error::NotFound { .. } => Self::module_not_found(id),
            other => Self::Catalog(other),
        }
    }

    /// Translate a storage uniqueness violation for a module write.
    pub(crate) fn from_module_write(err: modreg_catalog::Error, name: &str, version: &str) -> Self {
        match err {
            modreg_catalog::Error::AlreadyExists {
                entity: Entity::ModuleVersion,
                ..
            } => Self::VersionAlreadyExists {
                module: name.to_string(),
                version: version.to_string(),
            },
            modreg_catalog::Error::AlreadyExists { .. } => Self::DuplicateModule {
                name: name.to_string(),
                version: version.to_string(),
            },
            other => Self::Catalog(other),
        }
    }
}
