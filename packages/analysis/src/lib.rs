//! Playlist mood analysis engine for OffBeat
//!
//! Groups a playlist's enriched tracks into mood clusters, labels each
//! cluster from its audio profile, flags the tracks farthest from their
//! cluster, and compares mood composition across playlists.
//!
//! # Pipeline
//!
//! 1. Tracks with neither audio features nor tags are excluded up front
//! 2. The remaining tracks become rows of standardized audio descriptors
//!    followed by TF-IDF tag weights ([`FeatureMatrix`])
//! 3. K-means with a silhouette-selected K partitions the rows
//! 4. Clusters with too little audio coverage are dropped, the rest are
//!    labeled from their energy, valence and tempo means
//! 5. Distances to centroids become anomaly scores
//!
//! # Thread Safety
//!
//! [`PlaylistAnalyzer`] is `Clone + Send + Sync`; clones share one
//! [`AnalysisCache`]. The engine itself performs no I/O.
//!
//! # Example
//!
//! ```no_run
//! use offbeat_analysis::{Playlist, PlaylistAnalyzer};
//! use offbeat_shared_config::AnalysisConfig;
//!
//! # fn example(playlist: Playlist) -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = PlaylistAnalyzer::new(AnalysisConfig::default())?;
//! let analysis = analyzer.analyze(&playlist)?;
//!
//! for cluster in &analysis.clusters {
//!     println!("{} ({} tracks)", cluster.label, cluster.size);
//! }
//! for row in analysis.anomalies() {
//!     println!("{}: {}", row.title, row.reason_text);
//! }
//! # Ok(())
//! # }
//! ```

mod analyzer;
mod anomaly;
mod cache;
mod clustering;
mod compare;
mod error;
mod features;
mod models;
mod mood_index;
mod output;
mod reason;
mod summary;

pub use analyzer::PlaylistAnalyzer;
pub use anomaly::{
    centroid_distances, dominant_cluster, explain_anomaly, feature_deltas, outlier_count,
    select_anomalies, AnomalySelection, EXPLANATION_FEATURES,
};
pub use cache::{content_fingerprint, AnalysisCache, CacheKey};
pub use clustering::{
    calculate_silhouette_score, choose_k, cluster_rows, euclidean_distance, CandidateOutcome,
    KSelection, Partition, SkipReason,
};
pub use compare::{
    compare_analyses, compare_playlists, mood_distribution, run_playlists_analysis,
    select_tracks_by_mood, summarize_playlists, MoodSelection, MoodShare, MoodTrack,
    PlaylistComparison, PlaylistMoods, PlaylistOverlap, PlaylistOverviewEntry, PlaylistsOverview,
    SharedMood, COMPARE_MIN_PLAYLISTS_ERROR,
};
pub use error::{AnalysisError, AnalysisResult};
pub use features::{
    audio_matrix, combine_blocks, l2_normalize_rows, standardize_columns, tag_document,
    tag_repeats, FeatureMatrix, TfidfVectorizer,
};
pub use models::{
    Artist, AudioFeatures, Playlist, Tag, Track, AUDIO_FEATURE_COUNT, AUDIO_FEATURE_NAMES,
};
pub use mood_index::build_mood_index;
pub use output::{
    AnalysisCluster, AnalysisOutput, AnalysisSummary, AnalysisTrackRef, AnalysisTrackRow,
    CentroidFeatures, MoodEntry,
};
pub use reason::{AnomalyEvidence, FeatureDelta, TrackReason};
pub use summary::{
    audio_means, energy_bucket, mood_label, summarize_clusters, tempo_suffix, valence_bucket,
    ClusterSummaries,
};
