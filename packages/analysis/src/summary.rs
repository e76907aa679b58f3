//! Cluster summaries and rule-based mood labels
//!
//! Summaries report audio means in original units (not the standardized
//! clustering space) and the strongest TF-IDF tags of each cluster. The
//! mood label is derived from the energy, valence and tempo means alone.

use std::collections::BTreeMap;

use ndarray::{Array2, Axis};

use crate::features::FeatureMatrix;
use crate::models::AUDIO_FEATURE_NAMES;
use crate::output::{AnalysisCluster, CentroidFeatures};

/// Energy at or above which a cluster is high energy
pub const HIGH_ENERGY_THRESHOLD: f64 = 0.67;
/// Energy at or below which a cluster is low energy
pub const LOW_ENERGY_THRESHOLD: f64 = 0.33;
/// Valence at or above which a cluster is happy
pub const HAPPY_VALENCE_THRESHOLD: f64 = 0.6;
/// Valence at or below which a cluster is sad
pub const SAD_VALENCE_THRESHOLD: f64 = 0.4;
/// Tempo (BPM) at or above which a cluster is fast
pub const FAST_TEMPO_BPM: f64 = 130.0;
/// Tempo (BPM) at or below which a cluster is slow
pub const SLOW_TEMPO_BPM: f64 = 90.0;

/// Outcome of summarizing every cluster of a partition
#[derive(Debug, Clone)]
pub struct ClusterSummaries {
    /// Clusters with enough audio coverage, ascending by id, rows not yet attached
    pub kept: Vec<AnalysisCluster>,
    /// Ids of clusters suppressed for insufficient audio coverage
    pub dropped: Vec<usize>,
}

impl ClusterSummaries {
    pub fn is_kept(&self, cluster_id: usize) -> bool {
        self.kept.iter().any(|c| c.cluster_id == cluster_id)
    }
}

/// Summarize each cluster id present in `labels`
///
/// A cluster with more than `max_null_audio_means` undefined audio means is
/// dropped rather than labeled.
pub fn summarize_clusters(
    features: &FeatureMatrix,
    labels: &[usize],
    top_n_tags: usize,
    max_null_audio_means: usize,
) -> ClusterSummaries {
    let k = labels.iter().max().map_or(0, |&m| m + 1);
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for cluster_id in 0..k {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == cluster_id)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            continue;
        }

        let audio_means = audio_means(&features.audio_raw, &members);
        let null_count = audio_means.values().filter(|v| v.is_none()).count();
        if null_count > max_null_audio_means {
            tracing::debug!(
                cluster_id = cluster_id,
                size = members.len(),
                undefined_means = null_count,
                "Dropping cluster with insufficient audio coverage"
            );
            dropped.push(cluster_id);
            continue;
        }

        let (top_tags, tag_weights_top) = top_tags(features, &members, top_n_tags);
        let label = mood_label(&audio_means);

        kept.push(AnalysisCluster {
            cluster_id,
            label,
            size: members.len(),
            centroid_features: CentroidFeatures {
                audio_means,
                top_tags,
                tag_weights_top,
            },
            member_track_ids: members
                .iter()
                .map(|&i| features.track_ids[i].clone())
                .collect(),
            tracks: Vec::new(),
        });
    }

    ClusterSummaries { kept, dropped }
}

/// Mean of each audio column over the given rows, skipping unknown cells
pub fn audio_means(audio_raw: &Array2<f64>, rows: &[usize]) -> BTreeMap<String, Option<f64>> {
    AUDIO_FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let column = audio_raw.column(j);
            let present: Vec<f64> = rows
                .iter()
                .map(|&i| column[i])
                .filter(|v| !v.is_nan())
                .collect();
            let mean = if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            };
            (name.to_string(), mean)
        })
        .collect()
}

/// Strongest tags by mean TF-IDF weight across the given rows
fn top_tags(
    features: &FeatureMatrix,
    rows: &[usize],
    top_n: usize,
) -> (Vec<String>, BTreeMap<String, f64>) {
    if features.tag_terms.is_empty() || rows.is_empty() {
        return (Vec::new(), BTreeMap::new());
    }

    let members = features.tag_weights.select(Axis(0), rows);
    let Some(centroid) = members.mean_axis(Axis(0)) else {
        return (Vec::new(), BTreeMap::new());
    };

    let mut ranked: Vec<(&str, f64)> = features
        .tag_terms
        .iter()
        .map(String::as_str)
        .zip(centroid.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let top: Vec<(&str, f64)> = ranked
        .into_iter()
        .take(top_n)
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    let names = top.iter().map(|(term, _)| term.to_string()).collect();
    let weights = top
        .into_iter()
        .map(|(term, weight)| (term.to_string(), weight))
        .collect();
    (names, weights)
}

// =============================================================================
// Mood Labels
// =============================================================================

/// Energy bucket; unknown energy counts as medium
pub fn energy_bucket(energy: Option<f64>) -> &'static str {
    match energy {
        Some(e) if e >= HIGH_ENERGY_THRESHOLD => "high_energy",
        Some(e) if e <= LOW_ENERGY_THRESHOLD => "low_energy",
        _ => "medium_energy",
    }
}

/// Valence bucket; unknown valence counts as neutral
pub fn valence_bucket(valence: Option<f64>) -> &'static str {
    match valence {
        Some(v) if v >= HAPPY_VALENCE_THRESHOLD => "happy",
        Some(v) if v <= SAD_VALENCE_THRESHOLD => "sad",
        _ => "neutral",
    }
}

/// Tempo suffix; unknown or mid tempo adds nothing
pub fn tempo_suffix(tempo: Option<f64>) -> &'static str {
    match tempo {
        Some(t) if t >= FAST_TEMPO_BPM => "_fast",
        Some(t) if t <= SLOW_TEMPO_BPM => "_slow",
        _ => "",
    }
}

/// Mood label such as `high_energy_happy_fast` from original-unit audio means
///
/// Labels are mood buckets, not identifiers: distinct clusters may share one.
pub fn mood_label(audio_means: &BTreeMap<String, Option<f64>>) -> String {
    let mean = |name: &str| audio_means.get(name).copied().flatten();
    format!(
        "{}_{}{}",
        energy_bucket(mean("energy")),
        valence_bucket(mean("valence")),
        tempo_suffix(mean("tempo"))
    )
    .replace("__", "_")
}
