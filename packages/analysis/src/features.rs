//! Feature matrix construction
//!
//! Each eligible track becomes one row made of two blocks:
//!
//! 1. The nine audio descriptors, z-scored per column over the tracks that
//!    have a value. Unknown cells become 0 after centering, and a column
//!    with fewer than two values or zero spread is zeroed entirely.
//! 2. TF-IDF weights over a synthetic tag document in which each tag name
//!    is repeated in proportion to its relevance weight.
//!
//! The concatenated row is L2-normalized so that audio and tag signals are
//! compared by direction rather than raw magnitude.

use std::collections::{BTreeMap, HashMap};

use ndarray::{concatenate, Array2, ArrayView1, Axis};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{Track, AUDIO_FEATURE_COUNT};

/// Weight units per repetition of a tag in the synthetic document
const TAG_WEIGHT_PER_REPEAT: f64 = 20.0;

/// Upper bound on repetitions of a single tag
const MAX_TAG_REPEATS: usize = 5;

/// Numeric representation of a playlist's eligible tracks
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Row order of every matrix below
    pub track_ids: Vec<String>,

    /// Audio descriptors in original units, `NaN` where unknown
    pub audio_raw: Array2<f64>,

    /// TF-IDF vocabulary, one entry per column of `tag_weights`
    pub tag_terms: Vec<String>,

    /// Row-normalized TF-IDF weights
    pub tag_weights: Array2<f64>,

    /// Standardized audio block followed by the tag block, rows of unit length
    pub combined: Array2<f64>,
}

impl FeatureMatrix {
    /// Build the feature matrix for the given eligible tracks
    pub fn build(
        tracks: &[Track],
        max_tag_features: usize,
        min_document_frequency: usize,
    ) -> AnalysisResult<Self> {
        let track_ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
        let audio_raw = audio_matrix(tracks);

        let documents: Vec<Vec<String>> = tracks.iter().map(tag_document).collect();
        let vectorizer = TfidfVectorizer::new(max_tag_features, min_document_frequency);
        let (tag_terms, tag_weights) = vectorizer.fit_transform(&documents);

        let audio_scaled = standardize_columns(&audio_raw);
        let combined = combine_blocks(&audio_scaled, &tag_weights)?;

        tracing::debug!(
            rows = combined.nrows(),
            audio_columns = AUDIO_FEATURE_COUNT,
            tag_columns = tag_terms.len(),
            "Built feature matrix"
        );

        Ok(Self {
            track_ids,
            audio_raw,
            tag_terms,
            tag_weights,
            combined,
        })
    }

    /// Number of rows (eligible tracks)
    pub fn len(&self) -> usize {
        self.track_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }
}

/// Audio block followed by the tag block, each row scaled to unit length
///
/// Both blocks must have one row per track.
pub fn combine_blocks(audio: &Array2<f64>, tags: &Array2<f64>) -> AnalysisResult<Array2<f64>> {
    let mut combined = concatenate(Axis(1), &[audio.view(), tags.view()]).map_err(|e| {
        AnalysisError::feature_shape(format!(
            "{} audio rows vs {} tag rows: {}",
            audio.nrows(),
            tags.nrows(),
            e
        ))
    })?;
    l2_normalize_rows(&mut combined);
    Ok(combined)
}

/// Audio descriptors of every track in column order
pub fn audio_matrix(tracks: &[Track]) -> Array2<f64> {
    let mut matrix = Array2::from_elem((tracks.len(), AUDIO_FEATURE_COUNT), f64::NAN);
    for (i, track) in tracks.iter().enumerate() {
        if let Some(features) = &track.audio_features {
            for (j, value) in features.to_row().into_iter().enumerate() {
                matrix[[i, j]] = value;
            }
        }
    }
    matrix
}

/// Number of times a tag is repeated in the synthetic document
///
/// Weights are divided into steps of 20 and rounded half-to-even; a tag
/// always appears at least once.
pub fn tag_repeats(count: i32) -> usize {
    let steps = (f64::from(count) / TAG_WEIGHT_PER_REPEAT).round_ties_even();
    (steps.clamp(0.0, MAX_TAG_REPEATS as f64) as usize).max(1)
}

/// Synthetic token stream for a track's tags
pub fn tag_document(track: &Track) -> Vec<String> {
    let mut tokens = Vec::new();
    for tag in &track.tags {
        let name = tag.name.trim().to_lowercase();
        if name.is_empty() {
            continue;
        }
        let terms = tokenize(&name);
        for _ in 0..tag_repeats(tag.count) {
            tokens.extend(terms.iter().cloned());
        }
    }
    tokens
}

/// Split on whitespace and strip non-word characters from token edges
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|chunk| chunk.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_')))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Smoothed TF-IDF with L2-normalized rows and a capped vocabulary
#[derive(Debug, Clone, Copy)]
pub struct TfidfVectorizer {
    max_features: usize,
    min_document_frequency: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize, min_document_frequency: usize) -> Self {
        Self {
            max_features,
            min_document_frequency: min_document_frequency.max(1),
        }
    }

    /// Learn the vocabulary from `documents` and return it with the weight matrix
    ///
    /// The vocabulary keeps the `max_features` most frequent terms across the
    /// corpus (ties broken alphabetically) and is returned sorted. When no
    /// document contains a token the matrix has zero columns.
    pub fn fit_transform(&self, documents: &[Vec<String>]) -> (Vec<String>, Array2<f64>) {
        let n_docs = documents.len();

        let mut term_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<HashMap<&str, usize>> = Vec::with_capacity(n_docs);

        for doc in documents {
            let mut doc_counts: HashMap<&str, usize> = HashMap::new();
            for token in doc {
                *doc_counts.entry(token.as_str()).or_insert(0) += 1;
            }
            for (&term, &count) in &doc_counts {
                *term_frequency.entry(term).or_insert(0) += count;
                *document_frequency.entry(term).or_insert(0) += 1;
            }
            counts.push(doc_counts);
        }

        let mut candidates: Vec<(&str, usize)> = term_frequency
            .into_iter()
            .filter(|(term, _)| document_frequency[term] >= self.min_document_frequency)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        candidates.truncate(self.max_features);

        let mut vocabulary: Vec<&str> = candidates.into_iter().map(|(term, _)| term).collect();
        vocabulary.sort_unstable();

        if vocabulary.is_empty() {
            return (Vec::new(), Array2::zeros((n_docs, 0)));
        }

        let idf: Vec<f64> = vocabulary
            .iter()
            .map(|term| {
                let df = document_frequency[term] as f64;
                ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let mut weights = Array2::zeros((n_docs, vocabulary.len()));
        for (i, doc_counts) in counts.iter().enumerate() {
            for (j, term) in vocabulary.iter().enumerate() {
                if let Some(&count) = doc_counts.get(term) {
                    weights[[i, j]] = count as f64 * idf[j];
                }
            }
        }
        l2_normalize_rows(&mut weights);

        (vocabulary.into_iter().map(str::to_string).collect(), weights)
    }
}

/// Z-score each column over its non-missing values
///
/// Missing cells are set to 0 after centering. Columns with fewer than two
/// values, or no spread, are zeroed.
pub fn standardize_columns(raw: &Array2<f64>) -> Array2<f64> {
    let mut scaled = Array2::zeros(raw.raw_dim());
    for (j, column) in raw.axis_iter(Axis(1)).enumerate() {
        let Some((mean, std)) = column_moments(column) else {
            continue;
        };
        if std == 0.0 {
            continue;
        }
        for (i, &value) in column.iter().enumerate() {
            if !value.is_nan() {
                scaled[[i, j]] = (value - mean) / std;
            }
        }
    }
    scaled
}

/// Mean and population standard deviation over non-missing values
fn column_moments(column: ArrayView1<f64>) -> Option<(f64, f64)> {
    let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.len() < 2 {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Scale every non-zero row to unit Euclidean length
pub fn l2_normalize_rows(matrix: &mut Array2<f64>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioFeatures, Tag};
    use assert_matches::assert_matches;
    use ndarray::array;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tag_repeats_rounding() {
        assert_eq!(tag_repeats(0), 1, "a present tag always counts once");
        assert_eq!(tag_repeats(10), 1);
        assert_eq!(tag_repeats(30), 2);
        assert_eq!(tag_repeats(50), 2, "2.5 rounds half to even");
        assert_eq!(tag_repeats(70), 4, "3.5 rounds half to even");
        assert_eq!(tag_repeats(100), 5);
        assert_eq!(tag_repeats(250), 5);
    }

    #[test]
    fn test_tag_document_normalizes_names() {
        let track = Track::new("t1", "Song").with_tags(vec![
            Tag::new("  Indie Rock ", 40),
            Tag::new("", 100),
            Tag::new("chill!", 20),
        ]);
        let doc = tag_document(&track);
        assert_eq!(doc, tokens(&["indie", "rock", "indie", "rock", "chill"]));
    }

    #[test]
    fn test_tfidf_smoothed_idf() {
        let docs = vec![tokens(&["rock", "jazz"]), tokens(&["rock"])];
        let (terms, weights) = TfidfVectorizer::new(200, 1).fit_transform(&docs);
        assert_eq!(terms, tokens(&["jazz", "rock"]));

        // idf(rock) = ln(3/3) + 1 = 1, idf(jazz) = ln(3/2) + 1
        let jazz = (1.5f64).ln() + 1.0;
        let norm = (jazz * jazz + 1.0).sqrt();
        assert!((weights[[0, 0]] - jazz / norm).abs() < 1e-12);
        assert!((weights[[0, 1]] - 1.0 / norm).abs() < 1e-12);
        assert!((weights[[1, 1]] - 1.0).abs() < 1e-12);
        assert_eq!(weights[[1, 0]], 0.0);
    }

    #[test]
    fn test_tfidf_vocabulary_cap_keeps_most_frequent() {
        let docs = vec![
            tokens(&["pop", "pop", "rock", "jazz"]),
            tokens(&["pop", "rock"]),
        ];
        let (terms, weights) = TfidfVectorizer::new(2, 1).fit_transform(&docs);
        assert_eq!(terms, tokens(&["pop", "rock"]));
        assert_eq!(weights.ncols(), 2);
    }

    #[test]
    fn test_tfidf_all_empty_documents() {
        let docs = vec![Vec::new(), Vec::new(), Vec::new()];
        let (terms, weights) = TfidfVectorizer::new(200, 1).fit_transform(&docs);
        assert!(terms.is_empty());
        assert_eq!(weights.dim(), (3, 0));
    }

    #[test]
    fn test_standardize_degenerate_columns() {
        let raw = array![
            [1.0, 5.0, f64::NAN],
            [3.0, 5.0, 2.0],
            [f64::NAN, 5.0, f64::NAN],
        ];
        let scaled = standardize_columns(&raw);

        // column 0: mean 2, std 1
        assert!((scaled[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((scaled[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(scaled[[2, 0]], 0.0, "missing is neutral after centering");

        // column 1 has no spread, column 2 a single value
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
        assert!(scaled.column(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_combined_rows_have_unit_length() {
        let tracks = vec![
            Track::new("a", "A").with_audio_features(AudioFeatures {
                energy: Some(0.9),
                valence: Some(0.2),
                ..Default::default()
            }),
            Track::new("b", "B")
                .with_audio_features(AudioFeatures {
                    energy: Some(0.1),
                    valence: Some(0.8),
                    ..Default::default()
                })
                .with_tags(vec![Tag::new("folk", 80)]),
            Track::new("c", "C").with_tags(vec![Tag::new("metal", 100)]),
        ];
        let matrix = FeatureMatrix::build(&tracks, 200, 1).unwrap();

        assert_eq!(matrix.track_ids, vec!["a", "b", "c"]);
        assert_eq!(matrix.combined.ncols(), AUDIO_FEATURE_COUNT + 2);
        for row in matrix.combined.axis_iter(Axis(0)) {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9, "row norm was {}", norm);
        }
        assert!(matrix.audio_raw[[2, 2]].is_nan());
    }

    #[test]
    fn test_empty_input_yields_empty_matrix() {
        let matrix = FeatureMatrix::build(&[], 200, 1).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.combined.nrows(), 0);
    }

    #[test]
    fn test_combine_blocks_rejects_row_mismatch() {
        let audio = Array2::<f64>::zeros((3, AUDIO_FEATURE_COUNT));
        let tags = Array2::<f64>::zeros((2, 4));
        let err = combine_blocks(&audio, &tags).unwrap_err();
        assert_matches!(
            err,
            AnalysisError::FeatureShape(ref detail) if detail.starts_with("3 audio rows vs 2 tag rows")
        );
    }
}
