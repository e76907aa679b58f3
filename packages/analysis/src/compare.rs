//! Multi-playlist helpers
//!
//! Everything here is built on top of [`PlaylistAnalyzer::analyze`], so
//! repeated calls over the same playlists hit the analyzer's cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analyzer::PlaylistAnalyzer;
use crate::error::AnalysisResult;
use crate::models::Playlist;
use crate::output::{AnalysisOutput, AnalysisSummary, AnalysisTrackRow};

/// Error reported when fewer than two playlists are compared
pub const COMPARE_MIN_PLAYLISTS_ERROR: &str = "compare_playlists requires at least 2 playlists";

/// Share of a playlist's clustered tracks carrying one mood label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodShare {
    pub mood_label: String,
    pub proportion: f64,
}

/// A playlist's leading moods
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistMoods {
    pub playlist_id: String,
    pub name: String,
    pub moods: Vec<MoodShare>,
}

/// A mood present in the top moods of both playlists of a pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedMood {
    pub mood_label: String,
    pub proportion_a: f64,
    pub proportion_b: f64,
    /// `max(0, 1 - |proportion_a - proportion_b|)`
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistOverlap {
    pub playlist_id_a: String,
    pub playlist_id_b: String,
    pub shared_moods: Vec<SharedMood>,
}

/// Result of [`compare_playlists`]
///
/// Callers must check `error`: it is set, with both lists empty, when fewer
/// than two playlists were given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistComparison {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub num_playlists: usize,
    pub playlists: Vec<PlaylistMoods>,
    pub overlaps: Vec<PlaylistOverlap>,
}

impl PlaylistComparison {
    fn too_few(num_playlists: usize) -> Self {
        tracing::debug!(num_playlists = num_playlists, "Not enough playlists to compare");
        Self {
            error: Some(COMPARE_MIN_PLAYLISTS_ERROR.to_string()),
            num_playlists,
            playlists: Vec::new(),
            overlaps: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A clustered track row annotated with the playlist it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodTrack {
    #[serde(flatten)]
    pub row: AnalysisTrackRow,
    pub playlist_id: String,
    pub playlist_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodSelection {
    pub mood_label: String,
    pub tracks: Vec<MoodTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistOverviewEntry {
    pub playlist_id: String,
    pub playlist_name: String,
    pub num_clusters: usize,
    pub summary: AnalysisSummary,
}

/// Compact per-playlist bundle for API responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistsOverview {
    pub num_playlists: usize,
    pub playlists: Vec<PlaylistOverviewEntry>,
}

/// Analyze every playlist in order, stopping at the first failure
pub fn run_playlists_analysis(
    analyzer: &PlaylistAnalyzer,
    playlists: &[Playlist],
) -> AnalysisResult<Vec<Arc<AnalysisOutput>>> {
    playlists.iter().map(|p| analyzer.analyze(p)).collect()
}

/// Analyze every playlist and keep only the summary of each
pub fn summarize_playlists(
    analyzer: &PlaylistAnalyzer,
    playlists: &[Playlist],
) -> AnalysisResult<PlaylistsOverview> {
    let entries = run_playlists_analysis(analyzer, playlists)?
        .into_iter()
        .map(|analysis| PlaylistOverviewEntry {
            playlist_id: analysis.playlist_id.clone(),
            playlist_name: analysis.playlist_name.clone(),
            num_clusters: analysis.clusters.len(),
            summary: analysis.summary.clone(),
        })
        .collect();

    Ok(PlaylistsOverview {
        num_playlists: playlists.len(),
        playlists: entries,
    })
}

/// Proportion of clustered tracks per mood label, largest first
///
/// Labels tied on size keep the order of their first cluster.
pub fn mood_distribution(analysis: &AnalysisOutput) -> Vec<MoodShare> {
    let mut sizes: Vec<(&str, usize)> = Vec::new();
    for cluster in &analysis.clusters {
        if cluster.label.is_empty() || cluster.size == 0 {
            continue;
        }
        match sizes.iter_mut().find(|(label, _)| *label == cluster.label) {
            Some((_, size)) => *size += cluster.size,
            None => sizes.push((cluster.label.as_str(), cluster.size)),
        }
    }

    let total: usize = sizes.iter().map(|(_, size)| size).sum();
    sizes.sort_by(|a, b| b.1.cmp(&a.1));
    sizes
        .into_iter()
        .map(|(label, size)| MoodShare {
            mood_label: label.to_string(),
            proportion: if total > 0 {
                size as f64 / total as f64
            } else {
                0.0
            },
        })
        .collect()
}

/// Compare mood composition across playlists, pair by pair
///
/// Too few playlists is reported through [`PlaylistComparison::error`];
/// only a failed analysis is an `Err`.
pub fn compare_playlists(
    analyzer: &PlaylistAnalyzer,
    playlists: &[Playlist],
    top_n: usize,
) -> AnalysisResult<PlaylistComparison> {
    if playlists.len() < 2 {
        return Ok(PlaylistComparison::too_few(playlists.len()));
    }
    let analyses = run_playlists_analysis(analyzer, playlists)?;
    Ok(compare_analyses(&analyses, top_n))
}

/// Compare already computed analyses
///
/// Playlist entries list the first `max(1, top_n)` moods. Each pair shares
/// the labels found in both playlists' top `top_n` moods, reported in label
/// order, so `top_n == 0` leaves every overlap empty.
pub fn compare_analyses(analyses: &[Arc<AnalysisOutput>], top_n: usize) -> PlaylistComparison {
    if analyses.len() < 2 {
        return PlaylistComparison::too_few(analyses.len());
    }

    let distributions: Vec<Vec<MoodShare>> = analyses.iter().map(|a| mood_distribution(a)).collect();

    let playlists = analyses
        .iter()
        .zip(&distributions)
        .map(|(analysis, distribution)| PlaylistMoods {
            playlist_id: analysis.playlist_id.clone(),
            name: analysis.playlist_name.clone(),
            moods: distribution.iter().take(top_n.max(1)).cloned().collect(),
        })
        .collect();

    let mut overlaps = Vec::new();
    for a in 0..analyses.len() {
        for b in (a + 1)..analyses.len() {
            overlaps.push(overlap(
                &analyses[a].playlist_id,
                &distributions[a],
                &analyses[b].playlist_id,
                &distributions[b],
                top_n,
            ));
        }
    }

    PlaylistComparison {
        error: None,
        num_playlists: analyses.len(),
        playlists,
        overlaps,
    }
}

fn overlap(
    id_a: &str,
    dist_a: &[MoodShare],
    id_b: &str,
    dist_b: &[MoodShare],
    top_n: usize,
) -> PlaylistOverlap {
    let proportions_a: HashMap<&str, f64> = dist_a
        .iter()
        .map(|m| (m.mood_label.as_str(), m.proportion))
        .collect();
    let proportions_b: HashMap<&str, f64> = dist_b
        .iter()
        .map(|m| (m.mood_label.as_str(), m.proportion))
        .collect();

    let top_a: BTreeSet<&str> = dist_a.iter().take(top_n).map(|m| m.mood_label.as_str()).collect();
    let top_b: BTreeSet<&str> = dist_b.iter().take(top_n).map(|m| m.mood_label.as_str()).collect();

    let shared_moods = top_a
        .intersection(&top_b)
        .map(|&label| {
            let proportion_a = proportions_a.get(label).copied().unwrap_or(0.0);
            let proportion_b = proportions_b.get(label).copied().unwrap_or(0.0);
            SharedMood {
                mood_label: label.to_string(),
                proportion_a,
                proportion_b,
                similarity: (1.0 - (proportion_a - proportion_b).abs()).max(0.0),
            }
        })
        .collect();

    PlaylistOverlap {
        playlist_id_a: id_a.to_string(),
        playlist_id_b: id_b.to_string(),
        shared_moods,
    }
}

/// Every clustered track, across playlists, whose cluster carries `mood_label`
pub fn select_tracks_by_mood(
    analyzer: &PlaylistAnalyzer,
    playlists: &[Playlist],
    mood_label: &str,
) -> AnalysisResult<MoodSelection> {
    let mut tracks = Vec::new();
    if !mood_label.is_empty() {
        for playlist in playlists {
            let analysis = analyzer.analyze(playlist)?;
            for cluster in analysis.clusters.iter().filter(|c| c.label == mood_label) {
                tracks.extend(cluster.tracks.iter().map(|row| MoodTrack {
                    row: row.clone(),
                    playlist_id: playlist.id.clone(),
                    playlist_name: playlist.name.clone(),
                }));
            }
        }
    }

    Ok(MoodSelection {
        mood_label: mood_label.to_string(),
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{AnalysisCluster, CentroidFeatures};
    use std::collections::BTreeMap;

    fn analysis(id: &str, clusters: &[(&str, usize)]) -> Arc<AnalysisOutput> {
        let clusters = clusters
            .iter()
            .enumerate()
            .map(|(i, (label, size))| AnalysisCluster {
                cluster_id: i,
                label: label.to_string(),
                size: *size,
                centroid_features: CentroidFeatures::default(),
                member_track_ids: Vec::new(),
                tracks: Vec::new(),
            })
            .collect();
        Arc::new(AnalysisOutput {
            playlist_id: id.to_string(),
            playlist_name: id.to_uppercase(),
            clusters,
            moods: BTreeMap::new(),
            summary: AnalysisSummary::default(),
            excluded_tracks: Vec::new(),
        })
    }

    #[test]
    fn test_distribution_merges_labels() {
        let a = analysis("a", &[("sad", 2), ("happy", 5), ("sad", 4), ("calm", 0)]);
        let dist = mood_distribution(&a);
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].mood_label, "sad");
        assert!((dist[0].proportion - 6.0 / 11.0).abs() < 1e-12);
        assert_eq!(dist[1].mood_label, "happy");
    }

    #[test]
    fn test_distribution_ties_keep_cluster_order() {
        let a = analysis("a", &[("b_mood", 3), ("a_mood", 3)]);
        let labels: Vec<String> = mood_distribution(&a).into_iter().map(|m| m.mood_label).collect();
        assert_eq!(labels, vec!["b_mood", "a_mood"]);
    }

    #[test]
    fn test_distribution_empty() {
        assert!(mood_distribution(&analysis("a", &[])).is_empty());
    }

    #[test]
    fn test_compare_requires_two() {
        let result = compare_analyses(&[analysis("a", &[("sad", 1)])], 6);
        assert_eq!(result.error.as_deref(), Some(COMPARE_MIN_PLAYLISTS_ERROR));
        assert_eq!(result.num_playlists, 1);
        assert!(result.playlists.is_empty());
        assert!(result.overlaps.is_empty());
    }

    #[test]
    fn test_overlap_similarity() {
        let a = analysis("a", &[("sad", 3), ("happy", 1)]);
        let b = analysis("b", &[("happy", 1), ("calm", 1)]);
        let c = analysis("c", &[("sad", 1)]);
        let result = compare_analyses(&[a, b, c], 6);

        assert!(!result.is_error());
        assert_eq!(result.overlaps.len(), 3);

        let ab = &result.overlaps[0];
        assert_eq!((ab.playlist_id_a.as_str(), ab.playlist_id_b.as_str()), ("a", "b"));
        assert_eq!(ab.shared_moods.len(), 1);
        let happy = &ab.shared_moods[0];
        assert_eq!(happy.mood_label, "happy");
        assert!((happy.proportion_a - 0.25).abs() < 1e-12);
        assert!((happy.proportion_b - 0.5).abs() < 1e-12);
        assert!((happy.similarity - 0.75).abs() < 1e-12);

        assert!(result.overlaps[1].shared_moods.iter().all(|m| m.mood_label == "sad"));
        assert!(result.overlaps[2].shared_moods.is_empty());
    }

    #[test]
    fn test_top_n_limits_moods_and_overlaps() {
        let a = analysis("a", &[("x", 5), ("y", 1)]);
        let b = analysis("b", &[("y", 5), ("x", 1)]);
        let result = compare_analyses(&[a, b], 1);

        assert_eq!(result.playlists[0].moods.len(), 1);
        assert!(result.overlaps[0].shared_moods.is_empty());
    }

    #[test]
    fn test_zero_top_n_keeps_one_mood_and_no_overlap() {
        let c = analysis("c", &[("x", 2), ("y", 1)]);
        let d = analysis("d", &[("x", 2), ("y", 1)]);
        let result = compare_analyses(&[c, d], 0);

        assert!(!result.is_error());
        assert_eq!(result.playlists.len(), 2);
        assert_eq!(result.playlists[0].moods.len(), 1);
        assert_eq!(result.playlists[0].moods[0].mood_label, "x");
        assert_eq!(result.overlaps.len(), 1);
        assert!(result.overlaps[0].shared_moods.is_empty());
    }
}
