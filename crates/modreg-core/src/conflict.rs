//! Conflict detection between a candidate module and an installed set
//!
//! Three independent checks run against every installed module, and all
//! findings are reported:
//!
//! 1. **Version identity**: an installed module shares the candidate's name
//!    under a different module id.
//! 2. **Capability**: both declare a capability id whose version constraints
//!    cannot be satisfied together.
//! 3. **Permission**: both request one or more identical permissions.
//!
//! Each [`ModuleConflict`] carries a [`Severity`] taken from
//! [`ConflictPolicy`]; the detector itself never filters or short-circuits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use modreg_catalog::{Capability, Catalog, Metadata, Module, ModuleId, ModuleInstallation};
use modreg_version::VersionRange;

use crate::config::ConflictPolicy;
use crate::{Error, Result};

/// Class of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Version,
    Capability,
    Permission,
    /// Missing, cyclic or too-deep dependencies found during resolution
    Dependency,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => write!(f, "version"),
            Self::Capability => write!(f, "capability"),
            Self::Permission => write!(f, "permission"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}

/// Whether a conflict should stop an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Advisory,
}

/// One detected incompatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// The module the finding is about (candidate, or the dependent module).
    pub module_id: ModuleId,
    /// The other side, when one exists in the catalog.
    pub conflicting_module_id: Option<ModuleId>,
    pub description: String,
    #[serde(default)]
    pub resolution: Option<String>,
    pub severity: Severity,
}

impl ModuleConflict {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// The outcome of a conflict check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<ModuleConflict>,
}

impl ConflictReport {
    pub fn new(conflicts: Vec<ModuleConflict>) -> Self {
        Self { conflicts }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// True when any conflict is blocking under the active policy.
    pub fn blocks_install(&self) -> bool {
        self.conflicts.iter().any(ModuleConflict::is_blocking)
    }

    pub fn by_type(&self, conflict_type: ConflictType) -> Vec<&ModuleConflict> {
        self.conflicts
            .iter()
            .filter(|c| c.conflict_type == conflict_type)
            .collect()
    }

    /// Conflicts grouped by class, classes in declaration order.
    pub fn grouped(&self) -> BTreeMap<ConflictType, Vec<&ModuleConflict>> {
        let mut groups: BTreeMap<ConflictType, Vec<&ModuleConflict>> = BTreeMap::new();
        for conflict in &self.conflicts {
            groups.entry(conflict.conflict_type).or_default().push(conflict);
        }
        groups
    }
}

/// Read-only conflict checker over a catalog.
pub struct ConflictDetector<'a> {
    catalog: &'a dyn Catalog,
    policy: &'a ConflictPolicy,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(catalog: &'a dyn Catalog, policy: &'a ConflictPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Check `candidate_id` against every entry of `installed`.
    ///
    /// # Errors
    ///
    /// [`Error::ModuleNotFound`] when the candidate does not exist. Installed
    /// entries pointing at missing modules are skipped with a warning.
    pub async fn check(
        &self,
        candidate_id: ModuleId,
        installed: &[ModuleInstallation],
    ) -> Result<Vec<ModuleConflict>> {
        let candidate = self
            .catalog
            .get_module(candidate_id)
            .await?
            .ok_or_else(|| Error::module_not_found(candidate_id))?;

        let mut conflicts = Vec::new();
        for installation in installed {
            if installation.module_id == candidate.id {
                continue;
            }
            let Some(other) = self.catalog.get_module(installation.module_id).await? else {
                tracing::warn!(
                    user = %installation.user_id,
                    module_id = %installation.module_id,
                    "Skipping installation of a module missing from the catalog"
                );
                continue;
            };
            let other_metadata = self.metadata_at(&other, &installation.version).await?;

            self.check_identity(&candidate, &other, &installation.version, &mut conflicts);
            self.check_capabilities(&candidate, &other, &other_metadata, &mut conflicts);
            self.check_permissions(&candidate, &other, &other_metadata, &mut conflicts);
        }

        tracing::debug!(
            candidate = %candidate.label(),
            installed = installed.len(),
            conflicts = conflicts.len(),
            "Conflict check finished"
        );
        Ok(conflicts)
    }

    /// Metadata of `module` as it was at the installed version.
    async fn metadata_at(&self, module: &Module, version: &str) -> Result<Metadata> {
        if module.version == version {
            return Ok(module.metadata.clone());
        }
        match self.catalog.get_version(module.id, version).await? {
            Some(record) => Ok(record.metadata),
            None => {
                tracing::warn!(
                    module = %module.name,
                    version,
                    "Installed version not recorded, using current metadata"
                );
                Ok(module.metadata.clone())
            }
        }
    }

    fn conflict(
        &self,
        conflict_type: ConflictType,
        candidate: &Module,
        other: &Module,
        description: String,
        resolution: String,
    ) -> ModuleConflict {
        ModuleConflict {
            conflict_type,
            module_id: candidate.id,
            conflicting_module_id: Some(other.id),
            description,
            resolution: Some(resolution),
            severity: self.policy.severity_for(conflict_type),
        }
    }

    fn check_identity(
        &self,
        candidate: &Module,
        other: &Module,
        installed_version: &str,
        out: &mut Vec<ModuleConflict>,
    ) {
        if candidate.name != other.name {
            return;
        }
        out.push(self.conflict(
            ConflictType::Version,
            candidate,
            other,
            format!(
                "{} is already installed at version {installed_version} ({}); candidate is {} ({})",
                other.name,
                other.id,
                candidate.label(),
                candidate.id
            ),
            format!(
                "Uninstall {}@{installed_version} or upgrade it in place before installing {}",
                other.name,
                candidate.label()
            ),
        ));
    }

    fn check_capabilities(
        &self,
        candidate: &Module,
        other: &Module,
        other_metadata: &Metadata,
        out: &mut Vec<ModuleConflict>,
    ) {
        for wanted in &candidate.metadata.capabilities {
            for declared in other_metadata
                .capabilities
                .iter()
                .filter(|c| c.id == wanted.id)
            {
                if capabilities_compatible(declared, wanted) {
                    continue;
                }
                let mut conflict = self.conflict(
                    ConflictType::Capability,
                    candidate,
                    other,
                    format!(
                        "Capability '{}': {} declares {}, {} requires {}",
                        wanted.id,
                        other.name,
                        declared.version,
                        candidate.name,
                        wanted.version
                    ),
                    format!(
                        "Choose versions of {} and {} that agree on capability '{}'",
                        candidate.name, other.name, wanted.id
                    ),
                );
                if wanted.optional || declared.optional {
                    conflict.severity = Severity::Advisory;
                }
                out.push(conflict);
            }
        }
    }

    fn check_permissions(
        &self,
        candidate: &Module,
        other: &Module,
        other_metadata: &Metadata,
        out: &mut Vec<ModuleConflict>,
    ) {
        let shared: BTreeSet<&String> = candidate
            .metadata
            .permissions
            .intersection(&other_metadata.permissions)
            .collect();
        if shared.is_empty() {
            return;
        }
        let list = shared
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push(self.conflict(
            ConflictType::Permission,
            candidate,
            other,
            format!(
                "{} and {} both request permission(s): {list}",
                candidate.name, other.name
            ),
            "Review and approve permission sharing".to_string(),
        ));
    }
}

/// An installed capability is compatible when its declared version (or any
/// version of its declared range) satisfies the candidate's constraint.
fn capabilities_compatible(declared: &Capability, wanted: &Capability) -> bool {
    let Ok(wanted_range) = VersionRange::parse(&wanted.version) else {
        return false;
    };
    if let Ok(version) = modreg_version::parse_version(&declared.version) {
        return wanted_range.matches(&version);
    }
    match VersionRange::parse(&declared.version) {
        Ok(declared_range) => declared_range.intersects(&wanted_range),
        Err(_) => false,
    }
}
