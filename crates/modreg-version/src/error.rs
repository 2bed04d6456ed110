/// Errors produced while parsing versions and version ranges.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input is not a parseable semantic version.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersionFormat { version: String, reason: String },

    /// The input is not a parseable version range.
    #[error("invalid version range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
