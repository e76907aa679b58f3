//! Enriched playlist input models
//!
//! These are the records handed over by the enrichment layer: Spotify
//! metadata fused with audio descriptors and Last.fm folksonomy tags.

use serde::{Deserialize, Serialize};

/// The nine continuous audio descriptors, in feature-matrix column order
pub const AUDIO_FEATURE_NAMES: [&str; 9] = [
    "acousticness",
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "loudness",
    "speechiness",
    "tempo",
    "valence",
];

/// Number of audio descriptor columns
pub const AUDIO_FEATURE_COUNT: usize = AUDIO_FEATURE_NAMES.len();

/// A playlist with its fully enriched tracks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    /// Opaque playlist id
    #[serde(alias = "spotify_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Playlist {
    /// Create a playlist from its id, name and tracks
    pub fn new(id: impl Into<String>, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks,
            description: None,
            owner: None,
            snapshot_id: None,
            image_url: None,
        }
    }
}

/// Track artist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
    #[serde(default, alias = "spotify_id")]
    pub id: Option<String>,
}

/// A single track with whatever signals enrichment could attach
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    #[serde(alias = "spotify_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Audio descriptors, absent when the provider had no match
    #[serde(default)]
    pub audio_features: Option<AudioFeatures>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Track {
    /// Create a track with no audio features and no tags
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            album_name: None,
            duration_ms: None,
            audio_features: None,
            tags: Vec::new(),
        }
    }

    pub fn with_audio_features(mut self, features: AudioFeatures) -> Self {
        self.audio_features = Some(features);
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_artist(mut self, name: impl Into<String>) -> Self {
        self.artists.push(Artist {
            name: name.into(),
            id: None,
        });
        self
    }

    /// Artist names in credit order
    pub fn artist_names(&self) -> Vec<&str> {
        self.artists.iter().map(|a| a.name.as_str()).collect()
    }

    /// A track takes part in clustering only if it carries audio features
    /// or at least one tag
    pub fn is_eligible(&self) -> bool {
        self.audio_features.is_some() || !self.tags.is_empty()
    }
}

/// Folksonomy tag with its relevance weight (0-100)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub count: i32,
}

impl Tag {
    pub fn new(name: impl Into<String>, count: i32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Audio descriptors from the features provider
///
/// Every descriptor is optional; a missing or non-finite value is treated
/// as unknown by the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatures {
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub instrumentalness: Option<f64>,
    #[serde(default)]
    pub liveness: Option<f64>,
    /// Loudness in dB
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
    /// Tempo in BPM
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    /// Pitch class, not used by the analysis
    #[serde(default)]
    pub key: Option<i32>,
    /// Major/minor, not used by the analysis
    #[serde(default)]
    pub mode: Option<i32>,
}

impl AudioFeatures {
    /// Look up a descriptor by its column name
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "acousticness" => self.acousticness,
            "danceability" => self.danceability,
            "energy" => self.energy,
            "instrumentalness" => self.instrumentalness,
            "liveness" => self.liveness,
            "loudness" => self.loudness,
            "speechiness" => self.speechiness,
            "tempo" => self.tempo,
            "valence" => self.valence,
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Descriptors in column order, `NaN` where unknown
    pub fn to_row(&self) -> [f64; AUDIO_FEATURE_COUNT] {
        let mut row = [f64::NAN; AUDIO_FEATURE_COUNT];
        for (slot, name) in row.iter_mut().zip(AUDIO_FEATURE_NAMES) {
            if let Some(v) = self.get(name) {
                *slot = v;
            }
        }
        row
    }
}
