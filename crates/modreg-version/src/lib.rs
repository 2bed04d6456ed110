//! Semantic version comparison for the module registry.
//!
//! Every other registry crate depends on this one for two questions:
//! which of two versions is newer ([`compare`]), and whether a version falls
//! inside a declared range ([`satisfies`]). Version parsing and precedence
//! use the `semver` crate; the range grammar is defined in [`range`] so the
//! accepted syntax is explicit and tested here rather than inherited.
//!
//! # Example
//!
//! ```
//! use std::cmp::Ordering;
//!
//! assert_eq!(modreg_version::compare("1.2.0", "1.10.0").unwrap(), Ordering::Less);
//! assert!(modreg_version::satisfies("1.4.2", "^1.0.0").unwrap());
//! assert!(!modreg_version::satisfies("2.0.0", ">=1.0.0 <2.0.0").unwrap());
//! ```

pub mod error;
pub mod range;
pub mod version;

pub use error::{Error, Result};
pub use range::VersionRange;
pub use version::{
    Version, compare, compare_i8, is_newer, is_valid, parse_version, precedence, sort_descending,
};

/// Check whether `version` falls inside `constraint`.
///
/// # Errors
///
/// Returns [`Error::InvalidVersionFormat`] if `version` does not parse and
/// [`Error::InvalidRange`] if `constraint` does not parse.
pub fn satisfies(version: &str, constraint: &str) -> Result<bool> {
    let range = VersionRange::parse(constraint)?;
    range.satisfied_by(version)
}

/// Return the highest version in `candidates` that matches `range`.
pub fn max_satisfying<'a, I>(candidates: I, range: &VersionRange) -> Option<&'a Version>
where
    I: IntoIterator<Item = &'a Version>,
{
    candidates
        .into_iter()
        .filter(|v| range.matches(v))
        .max_by(|a, b| precedence(a, b))
}
