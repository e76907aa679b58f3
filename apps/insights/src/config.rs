//! Insights exporter configuration loaded from environment variables
//!
//! Analysis tuning comes from the shared `ANALYSIS_*` variables; this module
//! only adds the input and output locations.

use std::path::PathBuf;

use anyhow::{Context, Result};
use offbeat_shared_config::{get_env_or_default, AnalysisConfig, CommonConfig};

/// Default enriched playlist export read on startup
pub const DEFAULT_INPUT_PATH: &str = "enriched_playlists.json";

/// Default insights document written on completion
pub const DEFAULT_OUTPUT_PATH: &str = "playlist_analysis_insights.json";

/// Exporter configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// JSON array of enriched playlists
    pub input_path: PathBuf,

    /// Where the insights document is written
    pub output_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env().context("Failed to load analysis config")?;

        Ok(Self {
            common,
            input_path: PathBuf::from(get_env_or_default("INSIGHTS_INPUT_PATH", DEFAULT_INPUT_PATH)),
            output_path: PathBuf::from(get_env_or_default(
                "INSIGHTS_OUTPUT_PATH",
                DEFAULT_OUTPUT_PATH,
            )),
        })
    }

    pub fn analysis(&self) -> &AnalysisConfig {
        &self.common.analysis
    }
}
