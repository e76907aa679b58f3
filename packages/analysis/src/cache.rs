//! Shared analysis result cache
//!
//! Entries never expire. A playlist id stays cached until it is cleared
//! explicitly, so with [`CacheKeyPolicy::PlaylistId`] callers must clear an
//! id before reusing it for different tracks. The default
//! [`CacheKeyPolicy::ContentFingerprint`] policy also keys on a digest of
//! the playlist content, which makes changed tracks miss the cache.

use std::sync::Arc;

use dashmap::DashMap;
use offbeat_shared_config::CacheKeyPolicy;
use sha2::{Digest, Sha256};

use crate::models::Playlist;
use crate::output::AnalysisOutput;

/// Cache slot identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub playlist_id: String,
    /// Content digest, absent under the id-only policy
    pub fingerprint: Option<String>,
}

impl CacheKey {
    /// Key for `playlist` under the given policy
    pub fn for_playlist(playlist: &Playlist, policy: CacheKeyPolicy) -> Self {
        let fingerprint = match policy {
            CacheKeyPolicy::ContentFingerprint => Some(content_fingerprint(playlist)),
            CacheKeyPolicy::PlaylistId => None,
        };
        Self {
            playlist_id: playlist.id.clone(),
            fingerprint,
        }
    }
}

/// SHA-256 over everything the analysis reads from a playlist
pub fn content_fingerprint(playlist: &Playlist) -> String {
    let mut hasher = Sha256::new();
    hasher.update(playlist.name.as_bytes());
    hasher.update([0u8]);

    for track in &playlist.tracks {
        hasher.update(track.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(track.title.as_bytes());
        hasher.update([0u8]);

        match &track.audio_features {
            Some(features) => {
                hasher.update([1u8]);
                for value in features.to_row() {
                    hasher.update(value.to_bits().to_le_bytes());
                }
            }
            None => hasher.update([0u8]),
        }

        for tag in &track.tags {
            hasher.update(tag.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(tag.count.to_le_bytes());
        }
        hasher.update([0xffu8]);
    }

    format!("{:x}", hasher.finalize())
}

/// Concurrent map from playlist to its analysis
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    entries: Arc<DashMap<CacheKey, Arc<AnalysisOutput>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<AnalysisOutput>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a result; a concurrent insert for the same key simply wins last
    pub fn insert(&self, key: CacheKey, output: Arc<AnalysisOutput>) {
        self.entries.insert(key, output);
    }

    /// Remove every entry of a playlist id, returning how many were removed
    pub fn clear_playlist(&self, playlist_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.playlist_id != playlist_id);
        let removed = before.saturating_sub(self.entries.len());
        tracing::debug!(playlist_id = %playlist_id, removed = removed, "Cleared cached analysis");
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("Cleared analysis cache");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
