//! Playlist analysis configuration types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{parse_env, ConfigError, ConfigResult};

/// How analysis results are keyed in the result cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKeyPolicy {
    /// Playlist id plus a fingerprint of the track content.
    /// Re-analyzing a playlist whose tracks changed produces a fresh result.
    #[default]
    ContentFingerprint,
    /// Playlist id only. Stale results are returned until the entry is
    /// cleared explicitly.
    PlaylistId,
}

impl FromStr for CacheKeyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fingerprint" | "content" | "content_fingerprint" => Ok(Self::ContentFingerprint),
            "playlist_id" | "id" => Ok(Self::PlaylistId),
            other => Err(ConfigError::InvalidValue(
                "ANALYSIS_CACHE_KEY".to_string(),
                format!("unknown cache key policy '{}'", other),
            )),
        }
    }
}

impl fmt::Display for CacheKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentFingerprint => write!(f, "fingerprint"),
            Self::PlaylistId => write!(f, "playlist_id"),
        }
    }
}

/// Tuning knobs for the playlist analysis engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Smallest cluster count tried during K search
    pub k_min: usize,

    /// Largest cluster count tried during K search
    pub k_max: usize,

    /// Seed shared by every k-means run
    pub random_seed: u64,

    /// k-means initializations per candidate K during the search pass
    pub search_runs: usize,

    /// k-means initializations for the production partition
    pub final_runs: usize,

    /// Iteration cap for a single k-means run
    pub max_iterations: u64,

    /// Centroid movement below which k-means is considered converged
    pub tolerance: f64,

    /// Vocabulary cap for the tag TF-IDF vectorizer
    pub max_tag_features: usize,

    /// Minimum number of tracks a tag term must appear in
    pub min_document_frequency: usize,

    /// Number of top weighted tags kept per cluster summary
    pub top_tags: usize,

    /// Clusters with more undefined audio means than this are dropped
    pub max_null_audio_means: usize,

    /// Fraction of eligible tracks flagged as anomalies
    pub anomaly_fraction: f64,

    /// Number of leading moods compared between two playlists
    pub compare_top_n: usize,

    /// Result cache keying
    pub cache_key: CacheKeyPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            k_min: 3,
            k_max: 8,
            random_seed: 42,
            search_runs: 20,
            final_runs: 30,
            max_iterations: 300,
            tolerance: 1e-4,
            max_tag_features: 200,
            min_document_frequency: 1,
            top_tags: 8,
            max_null_audio_means: 2,
            anomaly_fraction: 0.15,
            compare_top_n: 6,
            cache_key: CacheKeyPolicy::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load analysis configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        let config = Self {
            k_min: parse_env("ANALYSIS_K_MIN", defaults.k_min)?,
            k_max: parse_env("ANALYSIS_K_MAX", defaults.k_max)?,
            random_seed: parse_env("ANALYSIS_RANDOM_SEED", defaults.random_seed)?,
            search_runs: parse_env("ANALYSIS_SEARCH_RUNS", defaults.search_runs)?,
            final_runs: parse_env("ANALYSIS_FINAL_RUNS", defaults.final_runs)?,
            max_iterations: parse_env("ANALYSIS_MAX_ITERATIONS", defaults.max_iterations)?,
            tolerance: parse_env("ANALYSIS_TOLERANCE", defaults.tolerance)?,
            max_tag_features: parse_env("ANALYSIS_MAX_TAG_FEATURES", defaults.max_tag_features)?,
            min_document_frequency: parse_env(
                "ANALYSIS_MIN_DOCUMENT_FREQUENCY",
                defaults.min_document_frequency,
            )?,
            top_tags: parse_env("ANALYSIS_TOP_TAGS", defaults.top_tags)?,
            max_null_audio_means: parse_env(
                "ANALYSIS_MAX_NULL_AUDIO_MEANS",
                defaults.max_null_audio_means,
            )?,
            anomaly_fraction: parse_env("ANALYSIS_ANOMALY_FRACTION", defaults.anomaly_fraction)?,
            compare_top_n: parse_env("ANALYSIS_COMPARE_TOP_N", defaults.compare_top_n)?,
            cache_key: match std::env::var("ANALYSIS_CACHE_KEY") {
                Ok(val) => val.parse()?,
                Err(_) => defaults.cache_key,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.k_min == 0 || self.k_max == 0 {
            return Err(ConfigError::ValidationError(
                "cluster count bounds must be positive".to_string(),
            ));
        }
        if self.k_min > self.k_max {
            return Err(ConfigError::ValidationError(format!(
                "k_min ({}) must not exceed k_max ({})",
                self.k_min, self.k_max
            )));
        }
        if self.search_runs == 0 || self.final_runs == 0 {
            return Err(ConfigError::ValidationError(
                "k-means run counts must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::ValidationError(
                "tolerance must be a positive finite number".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.anomaly_fraction) {
            return Err(ConfigError::ValidationError(format!(
                "anomaly_fraction must be within [0, 1], got {}",
                self.anomaly_fraction
            )));
        }
        if self.min_document_frequency == 0 {
            return Err(ConfigError::ValidationError(
                "min_document_frequency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
