//! Playlist analysis orchestration
//!
//! Runs feature building, clustering, summarizing and anomaly scoring in
//! sequence and assembles the per-track rows, mood index and summary.
//! Results are memoized in an [`AnalysisCache`] owned by the analyzer.

use std::collections::HashMap;
use std::sync::Arc;

use offbeat_shared_config::AnalysisConfig;
use tracing::instrument;

use crate::anomaly::{centroid_distances, dominant_cluster, explain_anomaly, select_anomalies};
use crate::cache::{AnalysisCache, CacheKey};
use crate::clustering::cluster_rows;
use crate::error::AnalysisResult;
use crate::features::FeatureMatrix;
use crate::models::{Playlist, Track};
use crate::mood_index::build_mood_index;
use crate::output::{AnalysisOutput, AnalysisSummary, AnalysisTrackRow};
use crate::reason::TrackReason;
use crate::summary::{audio_means, summarize_clusters};

/// Analysis entry point, safe to share across threads
#[derive(Debug, Clone)]
pub struct PlaylistAnalyzer {
    config: AnalysisConfig,
    cache: AnalysisCache,
}

impl PlaylistAnalyzer {
    /// Create an analyzer with its own empty cache
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        Self::with_cache(config, AnalysisCache::new())
    }

    /// Create an analyzer around an existing, possibly shared, cache
    pub fn with_cache(config: AnalysisConfig, cache: AnalysisCache) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Analyze a playlist, reusing a cached result when one exists
    ///
    /// Failed analyses are not cached.
    #[instrument(skip_all, fields(playlist_id = %playlist.id))]
    pub fn analyze(&self, playlist: &Playlist) -> AnalysisResult<Arc<AnalysisOutput>> {
        let key = CacheKey::for_playlist(playlist, self.config.cache_key);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Using cached analysis");
            return Ok(cached);
        }

        let output = Arc::new(self.analyze_uncached(playlist)?);
        self.cache.insert(key, Arc::clone(&output));
        Ok(output)
    }

    /// Analyze without reading or writing the cache
    ///
    /// Use this for aggregate or virtual playlists whose id must not shadow
    /// a real playlist's cached result.
    #[instrument(skip_all, fields(playlist_id = %playlist.id))]
    pub fn analyze_uncached(&self, playlist: &Playlist) -> AnalysisResult<AnalysisOutput> {
        let config = &self.config;
        let eligible: Vec<Track> = playlist
            .tracks
            .iter()
            .filter(|t| t.is_eligible())
            .cloned()
            .collect();
        let missing_all: Vec<AnalysisTrackRow> = playlist
            .tracks
            .iter()
            .filter(|t| !t.is_eligible())
            .map(|t| AnalysisTrackRow::new(&t.id, &t.title, None, None, TrackReason::MissingAllSignals))
            .collect();
        let excluded_track_ids: Vec<String> =
            missing_all.iter().map(|r| r.track_id.clone()).collect();

        let mut summary = AnalysisSummary {
            num_tracks: playlist.tracks.len(),
            num_eligible: eligible.len(),
            num_excluded_missing_all: missing_all.len(),
            excluded_track_ids,
            ..Default::default()
        };

        if eligible.is_empty() {
            tracing::info!(
                num_tracks = summary.num_tracks,
                "No eligible tracks, skipping clustering"
            );
            return Ok(AnalysisOutput {
                playlist_id: playlist.id.clone(),
                playlist_name: playlist.name.clone(),
                clusters: Vec::new(),
                moods: Default::default(),
                summary,
                excluded_tracks: missing_all,
            });
        }

        let features = FeatureMatrix::build(
            &eligible,
            config.max_tag_features,
            config.min_document_frequency,
        )?;
        let partition = cluster_rows(&features.combined, config);
        let labels = &partition.labels;

        let summaries = summarize_clusters(
            &features,
            labels,
            config.top_tags,
            config.max_null_audio_means,
        );
        let visible: Vec<bool> = labels.iter().map(|&l| summaries.is_kept(l)).collect();

        let distances = centroid_distances(&features.combined, &partition);
        let selection = select_anomalies(
            &distances,
            &visible,
            eligible.len(),
            config.anomaly_fraction,
        );

        // Reasons refer to the largest cluster before any were dropped
        let dominant_id = dominant_cluster(labels);
        let dominant_label = dominant_id
            .and_then(|id| summaries.kept.iter().find(|c| c.cluster_id == id))
            .map(|c| c.label.clone());
        let dominant_means = dominant_id.map(|id| {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == id)
                .map(|(i, _)| i)
                .collect();
            audio_means(&features.audio_raw, &members)
        });

        let mut clusters = summaries.kept;
        let position: HashMap<usize, usize> = clusters
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.cluster_id, pos))
            .collect();

        let mut excluded_tracks = Vec::new();
        for (i, track) in eligible.iter().enumerate() {
            let cluster_id = labels[i];
            let Some(&pos) = position.get(&cluster_id) else {
                excluded_tracks.push(AnalysisTrackRow::new(
                    &track.id,
                    &track.title,
                    None,
                    None,
                    TrackReason::InsufficientClusterAudio,
                ));
                continue;
            };

            let score = selection.scores[i].unwrap_or(0.0);
            let reason = if selection.flagged[i] {
                explain_anomaly(
                    track.audio_features.as_ref(),
                    score,
                    dominant_label.as_deref(),
                    dominant_means.as_ref(),
                )
            } else {
                TrackReason::Typical
            };
            clusters[pos].tracks.push(AnalysisTrackRow::new(
                &track.id,
                &track.title,
                Some(cluster_id),
                Some(score),
                reason,
            ));
        }
        let num_dropped_tracks = excluded_tracks.len();
        excluded_tracks.extend(missing_all);

        let titles: HashMap<&str, &str> = eligible
            .iter()
            .map(|t| (t.id.as_str(), t.title.as_str()))
            .collect();
        let moods = build_mood_index(&clusters, &titles);

        summary.num_excluded_insufficient_audio_cluster = num_dropped_tracks;
        summary.num_clusters = clusters.len();
        summary.num_anomalies = selection.num_flagged();
        summary.anomaly_score_cutoff = selection.cutoff;

        tracing::info!(
            num_tracks = summary.num_tracks,
            num_eligible = summary.num_eligible,
            k = partition.k(),
            num_clusters = summary.num_clusters,
            dropped_clusters = summaries.dropped.len(),
            num_anomalies = summary.num_anomalies,
            "Playlist analyzed"
        );

        Ok(AnalysisOutput {
            playlist_id: playlist.id.clone(),
            playlist_name: playlist.name.clone(),
            clusters,
            moods,
            summary,
            excluded_tracks,
        })
    }

    /// Drop cached results for one playlist id, or for every playlist
    pub fn clear_cache(&self, playlist_id: Option<&str>) {
        match playlist_id {
            Some(id) => {
                self.cache.clear_playlist(id);
            }
            None => self.cache.clear(),
        }
    }
}
