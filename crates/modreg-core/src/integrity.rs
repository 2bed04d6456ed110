//! Checksum verification and platform compatibility checks.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use modreg_catalog::Compatibility;

use crate::Result;

/// SHA-256 of `bytes` as lowercase hex.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Compare `bytes` against a recorded checksum.
///
/// The recorded value may carry a `sha256:` prefix and any letter case.
pub fn checksum_matches(expected: &str, bytes: &[u8]) -> bool {
    let expected = expected.trim();
    let expected = expected
        .strip_prefix("sha256:")
        .or_else(|| expected.strip_prefix("SHA256:"))
        .unwrap_or(expected);
    expected.eq_ignore_ascii_case(&compute_checksum(bytes))
}

/// How a platform version relates to a module's declared compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    /// Platform is at or above the minimum.
    pub compatible: bool,
    /// Platform is newer than the declared target, if any.
    pub above_target: bool,
    pub platform_version: String,
    pub min_platform_version: String,
    pub target_platform_version: Option<String>,
}

/// Evaluate `platform_version` against `compatibility`.
///
/// # Errors
///
/// Fails when the platform version or a declared version does not parse.
pub fn evaluate_compatibility(
    compatibility: &Compatibility,
    platform_version: &str,
) -> Result<CompatibilityReport> {
    let platform = modreg_version::parse_version(platform_version)?;
    let min = modreg_version::parse_version(&compatibility.min_platform_version)?;
    let above_target = match &compatibility.target_platform_version {
        Some(target) => {
            let target = modreg_version::parse_version(target)?;
            modreg_version::precedence(&platform, &target) == Ordering::Greater
        }
        None => false,
    };

    Ok(CompatibilityReport {
        compatible: modreg_version::precedence(&platform, &min) != Ordering::Less,
        above_target,
        platform_version: platform_version.to_string(),
        min_platform_version: compatibility.min_platform_version.clone(),
        target_platform_version: compatibility.target_platform_version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_compute_checksum_known_value() {
        assert_eq!(
            compute_checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[rstest]
    #[case("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824", true)]
    #[case("2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824", true)]
    #[case("sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824", true)]
    #[case("0000", false)]
    #[case("", false)]
    fn test_checksum_matches(#[case] expected: &str, #[case] ok: bool) {
        assert_eq!(checksum_matches(expected, b"hello"), ok);
    }

    #[rstest]
    #[case("1.0.0", None, "1.0.0", true, false)]
    #[case("1.2.0", None, "1.1.9", false, false)]
    #[case("1.0.0", Some("2.0.0"), "2.0.0", true, false)]
    #[case("1.0.0", Some("2.0.0"), "2.1.0", true, true)]
    fn test_evaluate_compatibility(
        #[case] min: &str,
        #[case] target: Option<&str>,
        #[case] platform: &str,
        #[case] compatible: bool,
        #[case] above_target: bool,
    ) {
        let compat = Compatibility {
            min_platform_version: min.to_string(),
            target_platform_version: target.map(str::to_string),
            ..Compatibility::default()
        };
        let report = evaluate_compatibility(&compat, platform).unwrap();
        assert_eq!(report.compatible, compatible);
        assert_eq!(report.above_target, above_target);
    }

    #[test]
    fn test_evaluate_compatibility_rejects_bad_platform() {
        assert!(evaluate_compatibility(&Compatibility::default(), "latest").is_err());
    }
}
