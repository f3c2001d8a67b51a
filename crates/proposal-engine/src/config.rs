//! Engine configuration

use proposal_core::{ContentLimits, Visibility};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for this schema
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length caps for proposal content
    pub content_limits: ContentLimits,
    /// Minimum reviewer justification length in characters
    pub min_justification_chars: usize,
    /// Largest accepted attachment
    pub max_attachment_bytes: u64,
    /// Budget for advisory analysis on reads
    pub advisory_timeout_ms: u64,
    /// Visibility given to newly derived projects
    pub default_project_visibility: Visibility,
    /// Re-submission after `revise` needs a version newer than the reviewed one
    pub require_new_version_for_resubmission: bool,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With content limits
    #[inline]
    #[must_use]
    pub fn with_content_limits(mut self, limits: ContentLimits) -> Self {
        self.content_limits = limits;
        self
    }

    /// With minimum justification length
    #[inline]
    #[must_use]
    pub fn with_min_justification_chars(mut self, chars: usize) -> Self {
        self.min_justification_chars = chars;
        self
    }

    /// With attachment size cap
    #[inline]
    #[must_use]
    pub fn with_max_attachment_bytes(mut self, bytes: u64) -> Self {
        self.max_attachment_bytes = bytes;
        self
    }

    /// With advisory timeout
    #[inline]
    #[must_use]
    pub fn with_advisory_timeout(mut self, timeout: Duration) -> Self {
        self.advisory_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With default project visibility
    #[inline]
    #[must_use]
    pub fn with_default_project_visibility(mut self, visibility: Visibility) -> Self {
        self.default_project_visibility = visibility;
        self
    }

    /// With or without the new-version rule for re-submission
    #[inline]
    #[must_use]
    pub fn with_new_version_required_for_resubmission(mut self, required: bool) -> Self {
        self.require_new_version_for_resubmission = required;
        self
    }

    /// Advisory timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn advisory_timeout(&self) -> Duration {
        Duration::from_millis(self.advisory_timeout_ms)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` plus everything [`EngineConfig::from_toml_str`] returns
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the engine cannot work with
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_limits.max_title_chars == 0 {
            return Err(ConfigError::Invalid("max_title_chars must be positive".into()));
        }
        if self.content_limits.max_section_chars == 0 {
            return Err(ConfigError::Invalid("max_section_chars must be positive".into()));
        }
        if self.max_attachment_bytes == 0 {
            return Err(ConfigError::Invalid("max_attachment_bytes must be positive".into()));
        }
        if self.advisory_timeout_ms == 0 {
            return Err(ConfigError::Invalid("advisory_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            content_limits: ContentLimits::default(),
            min_justification_chars: 10,
            max_attachment_bytes: 10 * 1024 * 1024,
            advisory_timeout_ms: 2_000,
            default_project_visibility: Visibility::Restricted,
            require_new_version_for_resubmission: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_yields_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            min_justification_chars = 3
            default_project_visibility = "public"

            [content_limits]
            max_title_chars = 80
            max_section_chars = 500
            "#,
        )
        .unwrap();

        let expected = EngineConfig::new()
            .with_min_justification_chars(3)
            .with_default_project_visibility(Visibility::Public)
            .with_content_limits(ContentLimits {
                max_title_chars: 80,
                max_section_chars: 500,
            });
        assert_eq!(config, expected);
    }

    #[test]
    fn zero_attachment_cap_is_rejected() {
        let err = EngineConfig::from_toml_str("max_attachment_bytes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_visibility_fails_to_parse() {
        let err = EngineConfig::from_toml_str(r#"default_project_visibility = "secret""#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "advisory_timeout_ms = 250\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.advisory_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::from_file("/nonexistent/engine.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.toml"));
    }
}
