//! Insights document written by the exporter
//!
//! One entry per playlist with its summary, every mood's tracks and a
//! lightweight anomaly list, plus the cross-playlist mood comparison.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use offbeat_analysis::{
    compare_analyses, AnalysisOutput, AnalysisSummary, AnalysisTrackRow, PlaylistComparison,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsPayload {
    pub generated_at: DateTime<Utc>,
    pub num_playlists: usize,
    pub playlists: Vec<PlaylistInsights>,
    pub comparison: PlaylistComparison,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistInsights {
    pub playlist_id: String,
    pub playlist_name: String,
    pub summary: AnalysisSummary,
    /// Mood label to the merged rows of every cluster carrying it
    pub moods: BTreeMap<String, MoodInsights>,
    /// Flagged tracks, highest score first
    pub anomalies: Vec<AnomalyInsight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodInsights {
    pub cluster_ids: Vec<usize>,
    pub size: usize,
    pub tracks: Vec<AnalysisTrackRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyInsight {
    #[serde(rename = "spotify_id")]
    pub track_id: String,
    pub title: String,
    pub cluster_id: Option<usize>,
    pub anomaly_score: Option<f64>,
    pub reason: String,
}

impl From<&AnalysisTrackRow> for AnomalyInsight {
    fn from(row: &AnalysisTrackRow) -> Self {
        Self {
            track_id: row.track_id.clone(),
            title: row.title.clone(),
            cluster_id: row.cluster_id,
            anomaly_score: row.anomaly_score,
            reason: row.reason_text.clone(),
        }
    }
}

impl PlaylistInsights {
    pub fn from_analysis(analysis: &AnalysisOutput) -> Self {
        let mut moods: BTreeMap<String, MoodInsights> = BTreeMap::new();
        for cluster in &analysis.clusters {
            let entry = moods
                .entry(cluster.label.clone())
                .or_insert_with(|| MoodInsights {
                    cluster_ids: Vec::new(),
                    size: 0,
                    tracks: Vec::new(),
                });
            entry.cluster_ids.push(cluster.cluster_id);
            entry.size += cluster.size;
            entry.tracks.extend(cluster.tracks.iter().cloned());
        }

        Self {
            playlist_id: analysis.playlist_id.clone(),
            playlist_name: analysis.playlist_name.clone(),
            summary: analysis.summary.clone(),
            moods,
            anomalies: analysis.anomalies().into_iter().map(AnomalyInsight::from).collect(),
        }
    }
}

impl InsightsPayload {
    pub fn build(analyses: &[Arc<AnalysisOutput>], compare_top_n: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            num_playlists: analyses.len(),
            playlists: analyses
                .iter()
                .map(|a| PlaylistInsights::from_analysis(a))
                .collect(),
            comparison: compare_analyses(analyses, compare_top_n),
        }
    }
}
