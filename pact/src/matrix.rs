//! Broker matrix types for can-i-deploy.

use serde::{Deserialize, Serialize};

/// Result of a can-i-deploy check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanIDeployResult {
    /// Whether deployment is allowed
    pub ok: bool,
    /// Reason for result
    pub reason: String,
    /// Verification matrix
    pub matrix: Vec<MatrixEntry>,
}

impl CanIDeployResult {
    /// Create from matrix entries: deployable when every row verified.
    #[must_use]
    pub fn from_matrix(matrix: Vec<MatrixEntry>) -> Self {
        let ok = matrix.iter().all(|e| e.success);
        let reason = if ok {
            "All contracts verified".to_string()
        } else {
            let failed: Vec<_> = matrix
                .iter()
                .filter(|e| !e.success)
                .map(|e| format!("{} -> {}", e.consumer, e.provider))
                .collect();
            format!("Verification failed: {}", failed.join(", "))
        };

        Self { ok, reason, matrix }
    }

    /// Create from the broker's own summary, falling back to the matrix
    /// where the broker left a field out.
    #[must_use]
    pub fn from_summary(deployable: Option<bool>, reason: Option<String>, matrix: Vec<MatrixEntry>) -> Self {
        let derived = Self::from_matrix(matrix);
        Self {
            ok: deployable.unwrap_or(derived.ok),
            reason: reason.unwrap_or(derived.reason),
            matrix: derived.matrix,
        }
    }

    /// Check if deployment is allowed.
    #[must_use]
    pub const fn can_deploy(&self) -> bool {
        self.ok
    }
}

/// Entry in the verification matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Consumer name
    pub consumer: String,
    /// Consumer version
    pub consumer_version: String,
    /// Provider name
    pub provider: String,
    /// Provider version; `None` when the pact was never verified
    pub provider_version: Option<String>,
    /// Whether verification succeeded
    pub success: bool,
}

impl MatrixEntry {
    /// Create a verified entry.
    #[must_use]
    pub fn new(
        consumer: impl Into<String>,
        consumer_version: impl Into<String>,
        provider: impl Into<String>,
        provider_version: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            consumer_version: consumer_version.into(),
            provider: provider.into(),
            provider_version: Some(provider_version.into()),
            success,
        }
    }

    /// Create an entry for a pact no provider version has verified.
    #[must_use]
    pub fn unverified(
        consumer: impl Into<String>,
        consumer_version: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            consumer: consumer.into(),
            consumer_version: consumer_version.into(),
            provider: provider.into(),
            provider_version: None,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_deploy_all_success() {
        let matrix = vec![
            MatrixEntry::new("Pact feat1 consumer", "1.0.0", "feat1 provider", "1.0.0", true),
            MatrixEntry::new("PactV3 feat1 consumer", "1.0.0", "feat1 provider", "1.0.0", true),
        ];

        let result = CanIDeployResult::from_matrix(matrix);
        assert!(result.can_deploy());
        assert!(result.reason.contains("All contracts verified"));
    }

    #[test]
    fn test_can_deploy_with_failure() {
        let matrix = vec![
            MatrixEntry::new("Pact feat1 consumer", "1.0.0", "feat1 provider", "1.0.0", true),
            MatrixEntry::unverified("PactV4 feat1 consumer", "1.0.0", "feat1 provider"),
        ];

        let result = CanIDeployResult::from_matrix(matrix);
        assert!(!result.can_deploy());
        assert_eq!(
            result.reason,
            "Verification failed: PactV4 feat1 consumer -> feat1 provider"
        );
    }

    #[test]
    fn test_empty_matrix() {
        let result = CanIDeployResult::from_matrix(vec![]);
        assert!(result.can_deploy());
    }

    #[test]
    fn test_summary_overrides_matrix() {
        let result = CanIDeployResult::from_summary(
            Some(false),
            Some("No version tagged prod".to_string()),
            vec![],
        );
        assert!(!result.can_deploy());
        assert_eq!(result.reason, "No version tagged prod");

        let fallback = CanIDeployResult::from_summary(None, None, vec![]);
        assert!(fallback.can_deploy());
    }
}
