//! Contract version and verification result types exchanged with a broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of a participant's code that produced or verified a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractVersion {
    /// Semantic version or build identifier
    pub version: String,
    /// Git commit SHA (40 hex chars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    /// Git branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Version tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContractVersion {
    /// Create a version without git metadata.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            git_commit: None,
            branch: None,
            tags: Vec::new(),
        }
    }

    /// Set the git commit.
    #[must_use]
    pub fn with_git_commit(mut self, commit: impl Into<String>) -> Self {
        self.git_commit = Some(commit.into());
        self
    }

    /// Set the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Check if git commit is valid (40 hex characters).
    #[must_use]
    pub fn has_valid_git_commit(&self) -> bool {
        self.git_commit
            .as_ref()
            .is_some_and(|c| c.len() == 40 && c.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// Check if tags include git commit.
    #[must_use]
    pub fn tags_include_commit(&self) -> bool {
        self.git_commit
            .as_ref()
            .is_some_and(|commit| self.tags.iter().any(|t| t == commit))
    }
}

/// Outcome of one interaction as reported to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Interaction description
    pub interaction_description: String,
    /// Whether the interaction passed
    pub success: bool,
    /// Rendered failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<String>,
}

/// Verification result of one contract against one provider version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether verification succeeded
    pub success: bool,
    /// Provider name
    pub provider: String,
    /// Consumer name
    pub consumer: String,
    /// Provider version
    pub provider_version: String,
    /// Provider branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_branch: Option<String>,
    /// Verification timestamp
    pub verified_at: DateTime<Utc>,
    /// Per-interaction outcomes
    #[serde(default)]
    pub test_results: Vec<TestResult>,
}

impl VerificationResult {
    /// Check if deployment should be allowed.
    #[must_use]
    pub const fn can_deploy(&self) -> bool {
        self.success
    }
}
