use thiserror::Error;

/// Configuration is invalid or unreadable.
///
/// Loading and validating configuration (file parsing, interactive prompts,
/// engine-binary discovery) is outside this crate's scope; callers assemble
/// a [`crate::Config`] however they like and this error exists only so the
/// top-level binary has something concrete to map to exit code 78.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
