//! Structured per-track verdicts
//!
//! Consumers format [`TrackReason`] themselves; [`TrackReason::render`]
//! produces the legacy one-line text for older clients.

use serde::{Deserialize, Serialize};

/// Signed difference between a track's descriptor and the dominant cluster's mean
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureDelta {
    pub feature: String,
    /// Track value minus cluster mean, in original units
    pub delta: f64,
}

impl FeatureDelta {
    pub fn new(feature: impl Into<String>, delta: f64) -> Self {
        Self {
            feature: feature.into(),
            delta,
        }
    }

    fn render(&self) -> String {
        let direction = if self.delta > 0.0 { "higher" } else { "lower" };
        let magnitude = self.delta.abs();
        match self.feature.as_str() {
            "tempo" => format!("{} tempo by {:.0} BPM", direction, magnitude),
            "loudness" => format!("{} loudness by {:.1} dB", direction, magnitude),
            other => format!("{} {} by {:.2}", direction, other, magnitude),
        }
    }
}

/// What backs an anomaly verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "deltas", rename_all = "snake_case")]
pub enum AnomalyEvidence {
    /// Largest descriptor deltas against the dominant cluster, strongest first
    FeatureDeltas(Vec<FeatureDelta>),
    /// The track has no audio features; its position comes from tags
    TagDriven,
    /// No comparison was possible (the dominant cluster lacks audio means)
    None,
}

/// Why a track ended up where it did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackReason {
    /// Clustered and not flagged
    Typical,
    /// Clustered and among the farthest from its centroid
    Anomalous {
        /// Label of the dominant cluster, absent when that cluster was dropped
        dominant_label: Option<String>,
        distance_score: f64,
        evidence: AnomalyEvidence,
    },
    /// Assigned to a cluster dropped for insufficient audio coverage
    InsufficientClusterAudio,
    /// Track has neither audio features nor tags
    MissingAllSignals,
}

impl TrackReason {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::Anomalous { .. })
    }

    /// True for both exclusion kinds
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::InsufficientClusterAudio | Self::MissingAllSignals)
    }

    /// Legacy free-text form
    pub fn render(&self) -> String {
        match self {
            Self::Typical => String::new(),
            Self::Anomalous {
                dominant_label,
                distance_score,
                evidence,
            } => {
                let mut parts = Vec::with_capacity(3);
                parts.push(match dominant_label {
                    Some(label) => format!("Anomalous vs dominant mood '{}'", label),
                    None => "Anomalous vs dominant mood".to_string(),
                });
                parts.push(format!("distance_score={:.2}", distance_score));
                match evidence {
                    AnomalyEvidence::FeatureDeltas(deltas) if !deltas.is_empty() => {
                        let phrases: Vec<String> = deltas.iter().map(FeatureDelta::render).collect();
                        parts.push(phrases.join("; "));
                    }
                    AnomalyEvidence::TagDriven => {
                        parts.push(
                            "reason: limited audio features available (mostly tag-driven)".to_string(),
                        );
                    }
                    _ => {}
                }
                parts.join(". ")
            }
            Self::InsufficientClusterAudio => {
                "Excluded: assigned cluster has insufficient audio feature coverage".to_string()
            }
            Self::MissingAllSignals => "Excluded: missing both audio_features and tags".to_string(),
        }
    }
}
