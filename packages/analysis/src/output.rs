//! Analysis result types
//!
//! Everything here serializes to plain nested JSON so results can cross to
//! the API, chat-assistant and recommendation layers without further
//! mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reason::TrackReason;

/// Per-track verdict of an analysis run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisTrackRow {
    #[serde(rename = "spotify_id", alias = "track_id")]
    pub track_id: String,
    pub title: String,
    /// Surviving cluster the track belongs to
    pub cluster_id: Option<usize>,
    /// Normalized distance to the cluster centroid, in [0, 1]
    pub anomaly_score: Option<f64>,
    pub is_anomaly: bool,
    pub reason: TrackReason,
    /// Legacy free-text rendering of `reason`
    pub reason_text: String,
}

impl AnalysisTrackRow {
    pub(crate) fn new(
        track_id: impl Into<String>,
        title: impl Into<String>,
        cluster_id: Option<usize>,
        anomaly_score: Option<f64>,
        reason: TrackReason,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            title: title.into(),
            cluster_id,
            anomaly_score,
            is_anomaly: reason.is_anomaly(),
            reason_text: reason.render(),
            reason,
        }
    }
}

/// Cluster centroid summary in original feature units
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CentroidFeatures {
    /// Mean of each audio descriptor over members that have it
    pub audio_means: BTreeMap<String, Option<f64>>,
    /// Highest mean TF-IDF terms, strongest first
    pub top_tags: Vec<String>,
    pub tag_weights_top: BTreeMap<String, f64>,
}

impl CentroidFeatures {
    /// Mean of a single descriptor, if defined
    pub fn mean(&self, feature: &str) -> Option<f64> {
        self.audio_means.get(feature).copied().flatten()
    }
}

/// A mood cluster that survived the audio coverage check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisCluster {
    pub cluster_id: usize,
    pub label: String,
    pub size: usize,
    pub centroid_features: CentroidFeatures,
    pub member_track_ids: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<AnalysisTrackRow>,
}

/// Minimal track reference listed under a mood
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisTrackRef {
    #[serde(rename = "spotify_id", alias = "track_id")]
    pub track_id: String,
    pub title: Option<String>,
}

/// All surviving clusters sharing one mood label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub mood_label: String,
    pub cluster_ids: Vec<usize>,
    pub track_ids: Vec<String>,
    pub tracks: Vec<AnalysisTrackRef>,
}

impl MoodEntry {
    pub(crate) fn new(mood_label: impl Into<String>) -> Self {
        Self {
            mood_label: mood_label.into(),
            cluster_ids: Vec::new(),
            track_ids: Vec::new(),
            tracks: Vec::new(),
        }
    }
}

/// Cross-cutting counts for one analysis run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSummary {
    pub num_tracks: usize,
    pub num_eligible: usize,
    pub num_excluded_missing_all: usize,
    pub num_excluded_insufficient_audio_cluster: usize,
    pub num_clusters: usize,
    pub num_anomalies: usize,
    pub anomaly_score_cutoff: Option<f64>,
    pub excluded_track_ids: Vec<String>,
}

/// Complete analysis of one playlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutput {
    pub playlist_id: String,
    pub playlist_name: String,
    pub clusters: Vec<AnalysisCluster>,
    pub moods: BTreeMap<String, MoodEntry>,
    pub summary: AnalysisSummary,
    /// Rows for tracks that belong to no surviving cluster
    #[serde(default)]
    pub excluded_tracks: Vec<AnalysisTrackRow>,
}

impl AnalysisOutput {
    /// Cluster by id
    pub fn cluster(&self, cluster_id: usize) -> Option<&AnalysisCluster> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// Every per-track row: clustered tracks first, then exclusions
    pub fn track_rows(&self) -> impl Iterator<Item = &AnalysisTrackRow> {
        self.clusters
            .iter()
            .flat_map(|c| c.tracks.iter())
            .chain(self.excluded_tracks.iter())
    }

    /// Row for a single track
    pub fn track_row(&self, track_id: &str) -> Option<&AnalysisTrackRow> {
        self.track_rows().find(|r| r.track_id == track_id)
    }

    /// Flagged rows, highest score first
    pub fn anomalies(&self) -> Vec<&AnalysisTrackRow> {
        let mut rows: Vec<&AnalysisTrackRow> = self.track_rows().filter(|r| r.is_anomaly).collect();
        rows.sort_by(|a, b| {
            b.anomaly_score
                .unwrap_or(0.0)
                .total_cmp(&a.anomaly_score.unwrap_or(0.0))
        });
        rows
    }
}
