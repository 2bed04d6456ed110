//! Error types for modreg-catalog

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The kind of record a catalog error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Module,
    ModuleVersion,
    Installation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::ModuleVersion => write!(f, "module version"),
            Self::Installation => write!(f, "installation"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record addressed by an update does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    /// A uniqueness constraint rejected the write.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: Entity, key: String },

    /// A snapshot could not be loaded into the catalog.
    #[error("invalid catalog snapshot at {path}: {message}")]
    Snapshot { path: PathBuf, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn already_exists(entity: Entity, key: impl fmt::Display) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_display() {
        let err = Error::already_exists(Entity::Module, "weather-tool@2.0.0");
        assert_eq!(err.to_string(), "module already exists: weather-tool@2.0.0");
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found(Entity::Installation, "alice/1234");
        assert!(err.to_string().contains("installation not found"));
        assert!(err.to_string().contains("alice/1234"));
    }
}
