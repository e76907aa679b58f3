//! Error types for the analysis engine
//!
//! Sparse or degenerate data is never an error here; it is absorbed by the
//! eligibility, degenerate-K and cluster-dropping policies. The variants
//! below cover configuration problems, failed k-means fits (only ever
//! observed internally during K search) and broken feature-matrix
//! invariants, which propagate to the caller.

use offbeat_shared_config::ConfigError;
use thiserror::Error;

/// Analysis engine error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The analyzer was built with an invalid configuration
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// A k-means fit failed for a given cluster count
    #[error("k-means fit failed for k={k}: {reason}")]
    Clustering { k: usize, reason: String },

    /// The audio and tag blocks of the feature matrix disagree on row count
    #[error("feature matrix shape mismatch: {0}")]
    FeatureShape(String),
}

impl AnalysisError {
    /// Create a clustering error
    pub fn clustering(k: usize, reason: impl Into<String>) -> Self {
        Self::Clustering {
            k,
            reason: reason.into(),
        }
    }

    pub fn feature_shape(detail: impl Into<String>) -> Self {
        Self::FeatureShape(detail.into())
    }
}

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
