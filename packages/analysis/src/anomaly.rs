//! Distance-based anomaly scoring
//!
//! A track's raw score is its Euclidean distance to its own centroid in the
//! clustering space. Scores are divided by the largest distance among the
//! tracks that remain visible (members of surviving clusters), so the
//! farthest visible track always scores 1.0 unless every distance is 0.

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::clustering::{euclidean_distance, Partition};
use crate::models::AudioFeatures;
use crate::reason::{AnomalyEvidence, FeatureDelta, TrackReason};

/// Descriptors compared against the dominant cluster when explaining an anomaly
pub const EXPLANATION_FEATURES: [&str; 7] = [
    "energy",
    "valence",
    "tempo",
    "danceability",
    "acousticness",
    "speechiness",
    "loudness",
];

/// Number of feature deltas reported per anomaly
const MAX_EXPLANATION_DELTAS: usize = 3;

/// Scores and flags for every row of a feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySelection {
    /// Normalized score per row; `None` for rows that were not candidates
    pub scores: Vec<Option<f64>>,
    pub flagged: Vec<bool>,
    /// Score of the lowest-ranked flagged row
    pub cutoff: Option<f64>,
}

impl AnomalySelection {
    pub fn num_flagged(&self) -> usize {
        self.flagged.iter().filter(|&&f| f).count()
    }
}

/// Distance from every row to the centroid of its cluster
pub fn centroid_distances(data: &Array2<f64>, partition: &Partition) -> Vec<f64> {
    partition
        .labels
        .iter()
        .enumerate()
        .map(|(i, &label)| euclidean_distance(&data.row(i), &partition.centroids.row(label)))
        .collect()
}

/// How many tracks to flag among `n` eligible tracks
///
/// `ceil(fraction * n)`, forced to at least one when `n >= 5` and capped at
/// one below that.
pub fn outlier_count(n: usize, fraction: f64) -> usize {
    let raw = (fraction * n as f64).ceil().max(0.0) as usize;
    if n >= 5 {
        raw.max(1)
    } else {
        raw.min(1)
    }
}

/// Normalize distances over the candidate rows and flag the farthest ones
///
/// `candidates[i]` marks the rows that take part; `n_eligible` sizes the
/// outlier budget, which is then capped at the number of candidates. Ties
/// are broken by row order.
pub fn select_anomalies(
    distances: &[f64],
    candidates: &[bool],
    n_eligible: usize,
    fraction: f64,
) -> AnomalySelection {
    let max_distance = distances
        .iter()
        .zip(candidates)
        .filter(|(d, &c)| c && !d.is_nan())
        .map(|(d, _)| *d)
        .fold(0.0_f64, f64::max);

    let scores: Vec<Option<f64>> = distances
        .iter()
        .zip(candidates)
        .map(|(&d, &c)| {
            c.then(|| if max_distance > 0.0 { d / max_distance } else { 0.0 })
        })
        .collect();

    let mut order: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|s| (i, s)))
        .collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1));

    let budget = outlier_count(n_eligible, fraction).min(order.len());
    let mut flagged = vec![false; distances.len()];
    for &(i, _) in order.iter().take(budget) {
        flagged[i] = true;
    }
    let cutoff = budget.checked_sub(1).map(|last| order[last].1);

    AnomalySelection {
        scores,
        flagged,
        cutoff,
    }
}

/// Largest cluster by size, ties going to the smallest id
pub fn dominant_cluster(labels: &[usize]) -> Option<usize> {
    let mut sizes: BTreeMap<usize, usize> = BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (id, size)| match best {
            Some((_, best_size)) if best_size >= size => best,
            _ => Some((id, size)),
        })
        .map(|(id, _)| id)
}

/// Signed deltas against the dominant cluster's means, largest magnitude first
pub fn feature_deltas(
    features: &AudioFeatures,
    dominant_means: &BTreeMap<String, Option<f64>>,
) -> Vec<FeatureDelta> {
    let mut deltas: Vec<FeatureDelta> = EXPLANATION_FEATURES
        .iter()
        .filter_map(|&name| {
            let mean = dominant_means.get(name).copied().flatten()?;
            let value = features.get(name)?;
            Some(FeatureDelta::new(name, value - mean))
        })
        .collect();
    deltas.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));
    deltas.truncate(MAX_EXPLANATION_DELTAS);
    deltas
}

/// Structured reason for a flagged track
pub fn explain_anomaly(
    audio_features: Option<&AudioFeatures>,
    distance_score: f64,
    dominant_label: Option<&str>,
    dominant_means: Option<&BTreeMap<String, Option<f64>>>,
) -> TrackReason {
    let evidence = match (audio_features, dominant_means) {
        (None, _) => AnomalyEvidence::TagDriven,
        (Some(features), Some(means)) => {
            let deltas = feature_deltas(features, means);
            if deltas.is_empty() {
                AnomalyEvidence::None
            } else {
                AnomalyEvidence::FeatureDeltas(deltas)
            }
        }
        (Some(_), None) => AnomalyEvidence::None,
    };

    TrackReason::Anomalous {
        dominant_label: dominant_label.map(str::to_string),
        distance_score,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(4, 1)]
    #[case(5, 1)]
    #[case(7, 2)]
    #[case(20, 3)]
    fn test_outlier_count(#[case] n: usize, #[case] expected: usize) {
        assert_eq!(outlier_count(n, 0.15), expected);
    }

    #[test]
    fn test_outlier_count_zero_fraction() {
        assert_eq!(outlier_count(3, 0.0), 0);
        assert_eq!(outlier_count(10, 0.0), 1, "five or more tracks always flag one");
    }

    #[test]
    fn test_centroid_distances() {
        let data = array![[0.0, 0.0], [3.0, 4.0], [10.0, 10.0]];
        let partition = Partition {
            labels: vec![0, 0, 1],
            centroids: array![[0.0, 0.0], [10.0, 10.0]],
        };
        assert_eq!(centroid_distances(&data, &partition), vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_select_normalizes_over_candidates() {
        let distances = [1.0, 2.0, 4.0, 8.0, 0.5, 0.0];
        let candidates = [true, true, true, false, true, true];
        let selection = select_anomalies(&distances, &candidates, 6, 0.15);

        assert_eq!(selection.scores[2], Some(1.0));
        assert_eq!(selection.scores[3], None);
        assert_eq!(selection.scores[0], Some(0.25));
        assert_eq!(selection.num_flagged(), 1);
        assert!(selection.flagged[2]);
        assert_eq!(selection.cutoff, Some(1.0));
    }

    #[test]
    fn test_select_all_zero_distances() {
        let selection = select_anomalies(&[0.0, 0.0], &[true, true], 2, 0.15);
        assert_eq!(selection.scores, vec![Some(0.0), Some(0.0)]);
        assert_eq!(selection.flagged, vec![true, false], "ties go to the first row");
        assert_eq!(selection.cutoff, Some(0.0));
    }

    #[test]
    fn test_select_without_candidates() {
        let selection = select_anomalies(&[1.0, 2.0, 3.0, 4.0, 5.0], &[false; 5], 5, 0.15);
        assert_eq!(selection.num_flagged(), 0);
        assert_eq!(selection.cutoff, None);
        assert!(selection.scores.iter().all(Option::is_none));
    }

    #[test]
    fn test_dominant_cluster_ties_to_smallest_id() {
        assert_eq!(dominant_cluster(&[2, 1, 1, 2, 0]), Some(1));
        assert_eq!(dominant_cluster(&[0, 3, 3, 3]), Some(3));
        assert_eq!(dominant_cluster(&[]), None);
    }

    fn dominant_means() -> BTreeMap<String, Option<f64>> {
        [
            ("energy", Some(0.8)),
            ("valence", Some(0.7)),
            ("tempo", Some(128.0)),
            ("danceability", Some(0.75)),
            ("acousticness", None),
            ("speechiness", Some(0.05)),
            ("loudness", Some(-5.0)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_feature_deltas_keep_largest_three() {
        let features = AudioFeatures {
            energy: Some(0.2),
            valence: Some(0.6),
            tempo: Some(80.0),
            danceability: Some(0.7),
            acousticness: Some(0.9),
            loudness: Some(-14.0),
            ..Default::default()
        };
        let deltas = feature_deltas(&features, &dominant_means());
        let names: Vec<&str> = deltas.iter().map(|d| d.feature.as_str()).collect();
        assert_eq!(names, vec!["tempo", "loudness", "energy"]);
        assert!((deltas[0].delta + 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_explain_tag_driven_track() {
        let reason = explain_anomaly(None, 0.9, Some("high_energy_happy"), Some(&dominant_means()));
        assert_matches!(
            reason,
            TrackReason::Anomalous {
                evidence: AnomalyEvidence::TagDriven,
                ..
            }
        );
    }

    #[test]
    fn test_explain_without_comparable_features() {
        let features = AudioFeatures {
            instrumentalness: Some(0.9),
            ..Default::default()
        };
        let reason = explain_anomaly(Some(&features), 1.0, None, Some(&dominant_means()));
        assert_matches!(
            reason,
            TrackReason::Anomalous {
                dominant_label: None,
                evidence: AnomalyEvidence::None,
                ..
            }
        );
    }
}
