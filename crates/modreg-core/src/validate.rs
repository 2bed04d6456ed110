//! Input validation for registration payloads.

use modreg_catalog::Metadata;
use modreg_version::VersionRange;

use crate::{Error, Result};

/// Module names are matched by dependencies, so they must be usable as keys.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_input("name", "must not be empty"));
    }
    if let Some(c) = name.chars().find(|c| c.is_whitespace() || *c == '@') {
        return Err(Error::invalid_input(
            "name",
            format!("'{name}' contains invalid character {c:?}"),
        ));
    }
    Ok(())
}

/// Check every version string and constraint in a metadata block.
pub fn validate_metadata(module_name: &str, metadata: &Metadata) -> Result<()> {
    for dep in &metadata.dependencies {
        validate_name(&dep.id)?;
        if dep.id == module_name {
            return Err(Error::invalid_input(
                "metadata.dependencies",
                format!("{module_name} cannot depend on itself"),
            ));
        }
        VersionRange::parse(&dep.version)?;
    }

    for cap in &metadata.capabilities {
        if cap.id.trim().is_empty() {
            return Err(Error::invalid_input(
                "metadata.capabilities",
                "capability id must not be empty",
            ));
        }
        VersionRange::parse(&cap.version)?;
    }

    let compat = &metadata.compatibility;
    let min = modreg_version::parse_version(&compat.min_platform_version)?;
    if let Some(target) = &compat.target_platform_version {
        let target = modreg_version::parse_version(target)?;
        if modreg_version::precedence(&target, &min).is_lt() {
            return Err(Error::invalid_input(
                "metadata.compatibility",
                format!(
                    "target platform {target} is below minimum {}",
                    compat.min_platform_version
                ),
            ));
        }
    }
    Ok(())
}
