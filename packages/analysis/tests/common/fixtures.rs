//! Test fixtures for analysis integration tests
//!
//! Tracks are generated around a few audio profiles with small
//! deterministic jitter, so clustering has real structure to find while
//! titles and artists stay random.

use fake::faker::lorem::en::Words;
use fake::faker::name::en::Name;
use fake::Fake;
use offbeat_analysis::{AudioFeatures, Playlist, PlaylistAnalyzer, Tag, Track};
use offbeat_shared_config::{AnalysisConfig, CacheKeyPolicy};

/// Audio and tag profile a generated track is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Loud, bright, fast dance tracks
    Party,
    /// Quiet, dark, slow acoustic tracks
    Melancholy,
    /// Mid-everything indie tracks
    Mellow,
}

impl Profile {
    /// Audio features for the `i`-th track of this profile
    pub fn audio(self, i: usize) -> AudioFeatures {
        let j = (i % 5) as f64;
        let (energy, valence, tempo, danceability, acousticness, loudness, instrumentalness) =
            match self {
                Profile::Party => (0.85, 0.8, 135.0, 0.8, 0.05, -4.0, 0.0),
                Profile::Melancholy => (0.2, 0.2, 75.0, 0.3, 0.8, -14.0, 0.3),
                Profile::Mellow => (0.5, 0.5, 110.0, 0.55, 0.4, -9.0, 0.1),
            };
        AudioFeatures {
            acousticness: Some(acousticness + 0.01 * j),
            danceability: Some(danceability - 0.01 * j),
            energy: Some(energy + 0.01 * j),
            instrumentalness: Some(instrumentalness),
            liveness: Some(0.1 + 0.005 * j),
            loudness: Some(loudness - 0.2 * j),
            speechiness: Some(0.05),
            tempo: Some(tempo + j),
            valence: Some(valence - 0.01 * j),
            key: Some((i % 12) as i32),
            mode: Some((i % 2) as i32),
        }
    }

    pub fn tags(self) -> Vec<Tag> {
        match self {
            Profile::Party => vec![Tag::new("dance", 100), Tag::new("pop", 60)],
            Profile::Melancholy => vec![Tag::new("sad", 100), Tag::new("acoustic", 80)],
            Profile::Mellow => vec![Tag::new("chill", 100), Tag::new("indie", 40)],
        }
    }
}

/// Random track title
pub fn random_title() -> String {
    Words(2..4).fake::<Vec<String>>().join(" ")
}

/// A fully enriched track following `profile`
pub fn profile_track(id: impl Into<String>, profile: Profile, i: usize) -> Track {
    Track::new(id, random_title())
        .with_artist(Name().fake::<String>())
        .with_audio_features(profile.audio(i))
        .with_tags(profile.tags())
}

/// A track with neither audio features nor tags
pub fn bare_track(id: impl Into<String>) -> Track {
    Track::new(id, random_title()).with_artist(Name().fake::<String>())
}

/// A track carrying only tags
pub fn tag_only_track(id: impl Into<String>, tags: &[(&str, i32)]) -> Track {
    Track::new(id, random_title()).with_tags(
        tags.iter()
            .map(|(name, count)| Tag::new(*name, *count))
            .collect(),
    )
}

/// Playlist with the given number of tracks per profile, ids `{id}-{n}`
pub fn profile_playlist(id: &str, counts: &[(Profile, usize)]) -> Playlist {
    let mut tracks = Vec::new();
    for &(profile, count) in counts {
        for i in 0..count {
            let track_id = format!("{}-{}", id, tracks.len());
            tracks.push(profile_track(track_id, profile, i));
        }
    }
    Playlist::new(id, format!("Playlist {}", id), tracks)
}

/// Fifteen tracks across three clearly separated profiles
pub fn mixed_playlist(id: &str) -> Playlist {
    profile_playlist(
        id,
        &[
            (Profile::Party, 6),
            (Profile::Melancholy, 6),
            (Profile::Mellow, 3),
        ],
    )
}

/// Append `count` bare tracks to a playlist
pub fn with_bare_tracks(mut playlist: Playlist, count: usize) -> Playlist {
    for i in 0..count {
        let id = format!("{}-bare-{}", playlist.id, i);
        playlist.tracks.push(bare_track(id));
    }
    playlist
}

/// Structural duplicate of a playlist under another id
pub fn copy_of(playlist: &Playlist, id: &str) -> Playlist {
    let mut copy = playlist.clone();
    copy.id = id.to_string();
    copy
}

pub fn test_analyzer() -> PlaylistAnalyzer {
    analyzer_with_policy(CacheKeyPolicy::ContentFingerprint)
}

pub fn analyzer_with_policy(policy: CacheKeyPolicy) -> PlaylistAnalyzer {
    let config = AnalysisConfig {
        cache_key: policy,
        ..Default::default()
    };
    PlaylistAnalyzer::new(config).expect("default analysis config is valid")
}

/// Analyzer restricted to cluster counts in `k_min..=k_max`
pub fn analyzer_with_k_range(k_min: usize, k_max: usize) -> PlaylistAnalyzer {
    let config = AnalysisConfig {
        k_min,
        k_max,
        ..Default::default()
    };
    PlaylistAnalyzer::new(config).expect("k range is valid")
}
