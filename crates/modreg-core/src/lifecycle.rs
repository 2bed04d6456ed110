//! Review and availability state machine
//!
//! ```text
//! Pending ──approve──▶ Approved ──deprecate_module──▶ Deprecated
//!    │                    │                              │
//!    └──reject──▶ Rejected (terminal)      versions: deprecate / yank
//! ```
//!
//! Functions here validate a transition and apply it to the records in
//! hand. Persisting the result is the caller's job, so a failed check
//! leaves nothing half-written.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

use modreg_catalog::{Module, ModuleStatus, ModuleVersion, ReviewStatus};

use crate::request::PublishVersion;
use crate::validate::validate_metadata;
use crate::{Error, Result};

/// A lifecycle command, named in transition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    RequestReview,
    Approve,
    Reject,
    DeprecateModule,
    DeprecateVersion,
    YankVersion,
    Publish,
    UpdateMetadata,
    Install,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RequestReview => "request review of",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::DeprecateModule => "deprecate",
            Self::DeprecateVersion => "deprecate a version of",
            Self::YankVersion => "yank a version of",
            Self::Publish => "publish a version of",
            Self::UpdateMetadata => "update metadata of",
            Self::Install => "install",
        };
        f.write_str(s)
    }
}

fn transition_error(module: &Module, action: LifecycleAction) -> Error {
    Error::InvalidLifecycleTransition {
        module: module.label(),
        from: module.review_status,
        action,
    }
}

fn require_status(module: &Module, allowed: &[ReviewStatus], action: LifecycleAction) -> Result<()> {
    if allowed.contains(&module.review_status) {
        Ok(())
    } else {
        Err(transition_error(module, action))
    }
}

/// Put a module (back) into the review queue. Only `Pending` qualifies,
/// which makes this a no-op that confirms the module awaits review.
pub fn request_review(module: &mut Module) -> Result<()> {
    require_status(module, &[ReviewStatus::Pending], LifecycleAction::RequestReview)?;
    module.review_status = ReviewStatus::Pending;
    Ok(())
}

/// `Pending → Approved`. Activates the module and stamps `published_at`
/// the first time.
pub fn approve(module: &mut Module, now: DateTime<Utc>) -> Result<()> {
    require_status(module, &[ReviewStatus::Pending], LifecycleAction::Approve)?;
    module.review_status = ReviewStatus::Approved;
    module.status = ModuleStatus::Active;
    module.published_at.get_or_insert(now);
    module.updated_at = now;
    Ok(())
}

/// `Pending → Rejected`.
pub fn reject(module: &mut Module, now: DateTime<Utc>) -> Result<()> {
    require_status(module, &[ReviewStatus::Pending], LifecycleAction::Reject)?;
    module.review_status = ReviewStatus::Rejected;
    module.status = ModuleStatus::Inactive;
    module.updated_at = now;
    Ok(())
}

/// `Approved → Deprecated` for the module as a whole.
pub fn deprecate_module(module: &mut Module, now: DateTime<Utc>) -> Result<()> {
    require_status(module, &[ReviewStatus::Approved], LifecycleAction::DeprecateModule)?;
    module.review_status = ReviewStatus::Deprecated;
    module.status = ModuleStatus::Deprecated;
    module.updated_at = now;
    Ok(())
}

/// Flag one version deprecated. The module's own review status is left as is.
pub fn deprecate_version(
    module: &Module,
    version: &mut ModuleVersion,
    reason: Option<&str>,
) -> Result<()> {
    require_status(
        module,
        &[ReviewStatus::Approved, ReviewStatus::Deprecated],
        LifecycleAction::DeprecateVersion,
    )?;
    if version.yanked {
        return Err(Error::VersionYanked {
            module: module.name.clone(),
            version: version.version.clone(),
        });
    }
    if version.deprecated {
        return Err(Error::invalid_input(
            "version",
            format!("{}@{} is already deprecated", module.name, version.version),
        ));
    }

    version.deprecated = true;
    version.release_notes = Some(prepend_marker(
        version.release_notes.take(),
        "DEPRECATED",
        reason,
    ));
    Ok(())
}

/// Flag one version yanked. One-way: a yanked version never comes back.
pub fn yank_version(module: &Module, version: &mut ModuleVersion, reason: Option<&str>) -> Result<()> {
    require_status(
        module,
        &[ReviewStatus::Approved, ReviewStatus::Deprecated],
        LifecycleAction::YankVersion,
    )?;
    if version.yanked {
        return Err(Error::VersionYanked {
            module: module.name.clone(),
            version: version.version.clone(),
        });
    }

    version.yanked = true;
    version.release_notes = Some(prepend_marker(
        version.release_notes.take(),
        "YANKED",
        reason,
    ));
    Ok(())
}

/// Metadata is editable in place only while the module awaits review.
pub fn ensure_metadata_editable(module: &Module) -> Result<()> {
    require_status(module, &[ReviewStatus::Pending], LifecycleAction::UpdateMetadata)
}

/// Refuse new installations of modules that were turned down or pulled.
pub fn ensure_installable(module: &Module) -> Result<()> {
    if module.review_status.is_terminal() {
        return Err(transition_error(module, LifecycleAction::Install));
    }
    Ok(())
}

/// Build the records for publishing `request` on top of `module`.
///
/// The new version must be strictly greater than the current one. Whether
/// that exact version string is already recorded is left to the catalog's
/// uniqueness constraint.
pub fn prepare_publish(
    module: &Module,
    request: PublishVersion,
    now: DateTime<Utc>,
) -> Result<(Module, ModuleVersion)> {
    if module.review_status.is_terminal() {
        return Err(transition_error(module, LifecycleAction::Publish));
    }

    let attempted = modreg_version::parse_version(&request.version)?;
    let current = modreg_version::parse_version(&module.version)?;
    if modreg_version::precedence(&attempted, &current) != Ordering::Greater {
        return Err(Error::VersionNotGreater {
            current: module.version.clone(),
            attempted: request.version,
        });
    }
    validate_metadata(&module.name, &request.metadata)?;

    let mut updated = module.clone();
    updated.version = request.version.clone();
    updated.metadata = request.metadata;
    updated.checksum = request.checksum;
    updated.download_url = request.download_url;
    updated.updated_at = now;

    let record = ModuleVersion {
        release_notes: request.release_notes,
        created_at: now,
        ..ModuleVersion::initial(&updated)
    };
    Ok((updated, record))
}

/// Prepend `MARKER: reason` (or the bare marker) as its own line.
pub(crate) fn prepend_marker(notes: Option<String>, marker: &str, reason: Option<&str>) -> String {
    let line = match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{marker}: {reason}"),
        None => marker.to_string(),
    };
    match notes.filter(|n| !n.is_empty()) {
        Some(existing) => format!("{line}\n{existing}"),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modreg_catalog::{Author, Metadata, ModuleType};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use uuid::Uuid;

    fn module(status: ReviewStatus) -> Module {
        let now = Utc::now();
        Module {
            id: Uuid::new_v4(),
            name: "weather-tool".to_string(),
            description: String::new(),
            module_type: ModuleType::Tool,
            author: Author::new("u-1", "Ada"),
            version: "2.0.0".to_string(),
            install_count: 0,
            rating: 0.0,
            rating_count: 0,
            requires_review: true,
            review_status: status,
            status: ModuleStatus::Inactive,
            published_at: None,
            metadata: Metadata::default(),
            checksum: None,
            download_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn publish_request(version: &str) -> PublishVersion {
        PublishVersion {
            version: version.to_string(),
            metadata: Metadata::default(),
            checksum: Some("abc".to_string()),
            download_url: None,
            release_notes: Some("Faster forecasts".to_string()),
        }
    }

    #[test]
    fn test_approve_activates_and_stamps_once() {
        let mut m = module(ReviewStatus::Pending);
        let first = Utc::now();
        approve(&mut m, first).unwrap();
        assert_eq!(m.review_status, ReviewStatus::Approved);
        assert_eq!(m.status, ModuleStatus::Active);
        assert_eq!(m.published_at, Some(first));

        // A second approval is not a valid transition
        assert!(approve(&mut m, Utc::now()).is_err());
        assert_eq!(m.published_at, Some(first));
    }

    #[rstest]
    #[case(ReviewStatus::Approved)]
    #[case(ReviewStatus::Rejected)]
    #[case(ReviewStatus::Deprecated)]
    #[case(ReviewStatus::Yanked)]
    fn test_approve_and_reject_only_from_pending(#[case] status: ReviewStatus) {
        let mut m = module(status);
        assert!(matches!(
            approve(&mut m, Utc::now()),
            Err(Error::InvalidLifecycleTransition { .. })
        ));
        assert!(matches!(
            reject(&mut m, Utc::now()),
            Err(Error::InvalidLifecycleTransition { .. })
        ));
        assert_eq!(m.review_status, status);
    }

    #[test]
    fn test_request_review_is_noop_from_pending() {
        let mut m = module(ReviewStatus::Pending);
        request_review(&mut m).unwrap();
        assert_eq!(m.review_status, ReviewStatus::Pending);

        let mut rejected = module(ReviewStatus::Rejected);
        assert!(request_review(&mut rejected).is_err());
    }

    #[test]
    fn test_deprecate_module_only_from_approved() {
        let mut m = module(ReviewStatus::Approved);
        deprecate_module(&mut m, Utc::now()).unwrap();
        assert_eq!(m.review_status, ReviewStatus::Deprecated);
        assert_eq!(m.status, ModuleStatus::Deprecated);

        let mut pending = module(ReviewStatus::Pending);
        assert!(deprecate_module(&mut pending, Utc::now()).is_err());
    }

    #[test]
    fn test_deprecate_version_prepends_marker() {
        let m = module(ReviewStatus::Approved);
        let mut v = ModuleVersion::initial(&m);
        v.release_notes = Some("Initial release".to_string());

        deprecate_version(&m, &mut v, Some("use 3.x")).unwrap();
        assert!(v.deprecated);
        assert_eq!(
            v.release_notes.as_deref(),
            Some("DEPRECATED: use 3.x\nInitial release")
        );

        // Second deprecation is refused and leaves notes alone
        assert!(deprecate_version(&m, &mut v, None).is_err());
        assert_eq!(
            v.release_notes.as_deref(),
            Some("DEPRECATED: use 3.x\nInitial release")
        );
    }

    #[test]
    fn test_deprecate_version_requires_approved_module() {
        let m = module(ReviewStatus::Pending);
        let mut v = ModuleVersion::initial(&m);
        assert!(matches!(
            deprecate_version(&m, &mut v, None),
            Err(Error::InvalidLifecycleTransition { .. })
        ));
        assert!(!v.deprecated);
    }

    #[test]
    fn test_yank_is_one_way_and_allowed_after_deprecation() {
        let m = module(ReviewStatus::Deprecated);
        let mut v = ModuleVersion::initial(&m);
        deprecate_version(&m, &mut v, None).unwrap();
        yank_version(&m, &mut v, Some("security issue")).unwrap();

        assert!(v.yanked);
        assert!(v.deprecated);
        assert_eq!(
            v.release_notes.as_deref(),
            Some("YANKED: security issue\nDEPRECATED")
        );
        assert!(matches!(
            yank_version(&m, &mut v, None),
            Err(Error::VersionYanked { .. })
        ));
        assert!(matches!(
            deprecate_version(&m, &mut v, None),
            Err(Error::VersionYanked { .. })
        ));
    }

    #[rstest]
    #[case("2.0.0")]
    #[case("1.9.9")]
    #[case("2.0.0-rc.1")]
    fn test_publish_requires_strictly_greater(#[case] attempted: &str) {
        let m = module(ReviewStatus::Approved);
        let err = prepare_publish(&m, publish_request(attempted), Utc::now()).unwrap_err();
        assert!(matches!(err, Error::VersionNotGreater { .. }), "got {err:?}");
    }

    #[test]
    fn test_publish_builds_module_and_version() {
        let m = module(ReviewStatus::Approved);
        let now = Utc::now();
        let (updated, record) = prepare_publish(&m, publish_request("2.1.0"), now).unwrap();

        assert_eq!(updated.id, m.id);
        assert_eq!(updated.version, "2.1.0");
        assert_eq!(updated.checksum.as_deref(), Some("abc"));
        assert_eq!(updated.review_status, ReviewStatus::Approved);
        assert_eq!(record.module_id, m.id);
        assert_eq!(record.version, "2.1.0");
        assert_eq!(record.release_notes.as_deref(), Some("Faster forecasts"));
        assert_eq!(record.created_at, now);
        assert!(record.is_current());
    }

    #[test]
    fn test_publish_rejects_bad_version_and_terminal_modules() {
        let m = module(ReviewStatus::Approved);
        assert!(matches!(
            prepare_publish(&m, publish_request("three"), Utc::now()),
            Err(Error::Version(_))
        ));

        let rejected = module(ReviewStatus::Rejected);
        assert!(matches!(
            prepare_publish(&rejected, publish_request("3.0.0"), Utc::now()),
            Err(Error::InvalidLifecycleTransition { .. })
        ));
    }

    #[rstest]
    #[case(None, None, "YANKED")]
    #[case(None, Some("  "), "YANKED")]
    #[case(Some(""), Some("bad build"), "YANKED: bad build")]
    #[case(Some("notes"), Some("bad build"), "YANKED: bad build\nnotes")]
    fn test_prepend_marker(
        #[case] notes: Option<&str>,
        #[case] reason: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(
            prepend_marker(notes.map(str::to_string), "YANKED", reason),
            expected
        );
    }
}
