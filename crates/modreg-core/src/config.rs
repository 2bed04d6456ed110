//! Registry configuration parsed from TOML
//!
//! Every section and field is optional; an empty file yields
//! [`RegistryConfig::default()`].
//!
//! ```toml
//! [review]
//! require_review = true
//!
//! [resolution]
//! max_depth = 64
//! prefer_non_deprecated = true
//!
//! [conflicts]
//! version = "blocking"
//! capability = "blocking"
//! permission = "advisory"
//! dependency = "blocking"
//!
//! [search]
//! default_limit = 20
//! max_limit = 100
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conflict::{ConflictType, Severity};
use crate::{Error, Result};

/// Review gate applied at registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Default for `requiresReview` when a registration does not say.
    pub require_review: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            require_review: true,
        }
    }
}

/// Dependency resolver tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Longest dependency chain followed before giving up on a branch.
    pub max_depth: usize,
    /// Rank non-deprecated versions above deprecated ones when both match.
    pub prefer_non_deprecated: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            prefer_non_deprecated: true,
        }
    }
}

/// Severity assigned to each conflict class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictPolicy {
    pub version: Severity,
    pub capability: Severity,
    pub permission: Severity,
    pub dependency: Severity,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            version: Severity::Blocking,
            capability: Severity::Blocking,
            permission: Severity::Advisory,
            dependency: Severity::Blocking,
        }
    }
}

impl ConflictPolicy {
    pub fn severity_for(&self, conflict_type: ConflictType) -> Severity {
        match conflict_type {
            ConflictType::Version => self.version,
            ConflictType::Capability => self.capability,
            ConflictType::Permission => self.permission,
            ConflictType::Dependency => self.dependency,
        }
    }
}

/// Paging defaults for search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Complete registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub review: ReviewConfig,
    pub resolution: ResolutionConfig,
    pub conflicts: ConflictPolicy,
    pub search: SearchConfig,
}

impl RegistryConfig {
    /// Parse configuration from TOML content
    ///
    /// # Example
    ///
    /// ```
    /// use modreg_core::RegistryConfig;
    ///
    /// let config = RegistryConfig::parse(r#"
    /// [resolution]
    /// max_depth = 8
    /// "#).unwrap();
    ///
    /// assert_eq!(config.resolution.max_depth, 8);
    /// assert!(config.review.require_review);
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// [`Error::ConfigNotFound`] when the file does not exist and
    /// [`Error::InvalidConfig`] when it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "Loaded registry config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.resolution.max_depth == 0 {
            return Err(Error::invalid_input(
                "resolution.max_depth",
                "must be at least 1",
            ));
        }
        if self.search.max_limit == 0 {
            return Err(Error::invalid_input("search.max_limit", "must be at least 1"));
        }
        if self.search.default_limit > self.search.max_limit {
            return Err(Error::invalid_input(
                "search.default_limit",
                format!("exceeds max_limit {}", self.search.max_limit),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RegistryConfig::parse("").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.resolution.max_depth, 64);
        assert_eq!(config.conflicts.permission, Severity::Advisory);
        assert_eq!(config.search.default_limit, 20);
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config = RegistryConfig::parse(
            r#"
[review]
require_review = false

[conflicts]
permission = "blocking"
"#,
        )
        .unwrap();

        assert!(!config.review.require_review);
        assert_eq!(config.conflicts.permission, Severity::Blocking);
        assert_eq!(config.conflicts.version, Severity::Blocking);
        assert!(config.resolution.prefer_non_deprecated);
    }

    #[test]
    fn test_severity_for_each_type() {
        let policy = ConflictPolicy::default();
        assert_eq!(policy.severity_for(ConflictType::Version), Severity::Blocking);
        assert_eq!(policy.severity_for(ConflictType::Capability), Severity::Blocking);
        assert_eq!(policy.severity_for(ConflictType::Permission), Severity::Advisory);
        assert_eq!(policy.severity_for(ConflictType::Dependency), Severity::Blocking);
    }

    #[test]
    fn test_rejects_zero_depth_and_bad_limits() {
        assert!(RegistryConfig::parse("[resolution]\nmax_depth = 0\n").is_err());
        assert!(
            RegistryConfig::parse("[search]\ndefault_limit = 50\nmax_limit = 10\n").is_err()
        );
    }

    #[test]
    fn test_rejects_unknown_severity() {
        let err = RegistryConfig::parse("[conflicts]\nversion = \"fatal\"\n").unwrap_err();
        assert!(matches!(err, Error::TomlDe(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegistryConfig::load(dir.path().join("registry.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_malformed_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[resolution\nmax_depth = ").unwrap();

        let err = RegistryConfig::load(file.path()).unwrap_err();
        match err {
            Error::InvalidConfig { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\ndefault_limit = 5\nmax_limit = 10").unwrap();

        let config = RegistryConfig::load(file.path()).unwrap();
        assert_eq!(config.search.default_limit, 5);
        assert_eq!(config.search.max_limit, 10);
    }
}
