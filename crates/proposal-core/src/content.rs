//! Proposal content and attachment descriptors

use crate::error::ContentError;
use serde::{Deserialize, Serialize};

/// Descriptor returned by the file store for an uploaded attachment
///
/// The engine never touches file bytes after upload; it keeps only this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Location of the stored file
    pub url: String,
    /// Lowercase hex SHA-256 of the file bytes
    pub sha256: String,
    /// Size in bytes
    pub byte_size: u64,
}

impl FileDescriptor {
    fn validate(&self) -> Result<(), ContentError> {
        if self.url.trim().is_empty() {
            return Err(ContentError::InvalidAttachment("missing url"));
        }
        let hash_ok = self.sha256.len() == 64
            && self
                .sha256
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !hash_ok {
            return Err(ContentError::InvalidAttachment("malformed sha256"));
        }
        Ok(())
    }
}

/// Full content of one proposal version
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProposalContent {
    /// Short title
    pub title: String,
    /// Problem the project addresses
    pub problem_statement: String,
    /// Objectives
    pub objectives: String,
    /// Planned methodology
    pub methodology: String,
    /// Timeline
    pub timeline: String,
    /// Expected outcomes
    pub expected_outcomes: String,
    /// Optional attached document
    pub attachment: Option<FileDescriptor>,
}

impl ProposalContent {
    /// Create content with a title and problem statement
    #[inline]
    #[must_use]
    pub fn new(title: impl Into<String>, problem_statement: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            problem_statement: problem_statement.into(),
            ..Self::default()
        }
    }

    /// With objectives
    #[inline]
    #[must_use]
    pub fn with_objectives(mut self, objectives: impl Into<String>) -> Self {
        self.objectives = objectives.into();
        self
    }

    /// With methodology
    #[inline]
    #[must_use]
    pub fn with_methodology(mut self, methodology: impl Into<String>) -> Self {
        self.methodology = methodology.into();
        self
    }

    /// With timeline
    #[inline]
    #[must_use]
    pub fn with_timeline(mut self, timeline: impl Into<String>) -> Self {
        self.timeline = timeline.into();
        self
    }

    /// With expected outcomes
    #[inline]
    #[must_use]
    pub fn with_expected_outcomes(mut self, outcomes: impl Into<String>) -> Self {
        self.expected_outcomes = outcomes.into();
        self
    }

    /// With attachment
    #[inline]
    #[must_use]
    pub fn with_attachment(mut self, attachment: FileDescriptor) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Check required fields and length caps
    ///
    /// # Errors
    /// The first violated rule
    pub fn validate(&self, limits: &ContentLimits) -> Result<(), ContentError> {
        if self.title.trim().is_empty() {
            return Err(ContentError::MissingField("title"));
        }
        if self.problem_statement.trim().is_empty() {
            return Err(ContentError::MissingField("problem statement"));
        }
        if self.title.chars().count() > limits.max_title_chars {
            return Err(ContentError::TooLong {
                field: "title",
                max: limits.max_title_chars,
            });
        }
        let long_fields = [
            ("problem statement", &self.problem_statement),
            ("objectives", &self.objectives),
            ("methodology", &self.methodology),
            ("timeline", &self.timeline),
            ("expected outcomes", &self.expected_outcomes),
        ];
        for (field, value) in long_fields {
            if value.chars().count() > limits.max_section_chars {
                return Err(ContentError::TooLong {
                    field,
                    max: limits.max_section_chars,
                });
            }
        }
        if let Some(attachment) = &self.attachment {
            attachment.validate()?;
        }
        Ok(())
    }
}

/// Length caps applied to content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLimits {
    /// Maximum title length in characters
    pub max_title_chars: usize,
    /// Maximum length of every other text section
    pub max_section_chars: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_title_chars: 200,
            max_section_chars: 20_000,
        }
    }
}
