//! Integration tests for the multi-playlist helpers
//!
//! Tests cover:
//! - Comparison precondition and pairwise overlaps
//! - Mood-based track selection
//! - Playlist overview bundles

mod common;

use common::*;
use offbeat_analysis::{
    compare_playlists, mood_distribution, run_playlists_analysis, select_tracks_by_mood,
    summarize_playlists, Playlist, COMPARE_MIN_PLAYLISTS_ERROR,
};

#[test]
fn test_compare_single_playlist_reports_error() {
    let analyzer = test_analyzer();
    let result = compare_playlists(&analyzer, &[mixed_playlist("solo")], 6).unwrap();

    assert_eq!(result.error.as_deref(), Some(COMPARE_MIN_PLAYLISTS_ERROR));
    assert_eq!(result.num_playlists, 1);
    assert!(result.playlists.is_empty());
    assert!(result.overlaps.is_empty());

    let value = serde_json::to_value(&result).unwrap();
    assert!(value.get("error").is_some());
}

#[test]
fn test_compare_no_playlists() {
    let result = compare_playlists(&test_analyzer(), &[], 6).unwrap();
    assert!(result.is_error());
    assert_eq!(result.num_playlists, 0);
}

#[test]
fn test_compare_with_structural_copy() {
    let analyzer = test_analyzer();
    let original = mixed_playlist("orig");
    let copy = copy_of(&original, "copy");
    let result = compare_playlists(&analyzer, &[original, copy], 6).unwrap();

    assert!(!result.is_error());
    assert!(serde_json::to_value(&result).unwrap().get("error").is_none());
    assert_eq!(result.playlists.len(), 2);
    assert_eq!(result.playlists[0].moods, result.playlists[1].moods);
    assert_eq!(result.overlaps.len(), 1);

    let overlap = &result.overlaps[0];
    assert_eq!(overlap.playlist_id_a, "orig");
    assert_eq!(overlap.playlist_id_b, "copy");
    assert!(!overlap.shared_moods.is_empty());
    for mood in &overlap.shared_moods {
        assert_eq!(mood.proportion_a, mood.proportion_b);
        assert_eq!(mood.similarity, 1.0);
    }
}

#[test]
fn test_compare_disjoint_playlists() {
    let analyzer = test_analyzer();
    let party = profile_playlist("party", &[(Profile::Party, 6)]);
    let sad = profile_playlist("sad", &[(Profile::Melancholy, 6)]);
    let result = compare_playlists(&analyzer, &[party, sad], 6).unwrap();

    assert!(result.overlaps[0].shared_moods.is_empty());
    for entry in &result.playlists {
        let total: f64 = entry.moods.iter().map(|m| m.proportion).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_overlap_pairs_for_three_playlists() {
    let analyzer = test_analyzer();
    let playlists: Vec<Playlist> = ["a", "b", "c"].iter().map(|id| mixed_playlist(id)).collect();
    let result = compare_playlists(&analyzer, &playlists, 6).unwrap();

    let pairs: Vec<(&str, &str)> = result
        .overlaps
        .iter()
        .map(|o| (o.playlist_id_a.as_str(), o.playlist_id_b.as_str()))
        .collect();
    assert_eq!(pairs, vec![("a", "b"), ("a", "c"), ("b", "c")]);
}

#[test]
fn test_distribution_of_empty_analysis() {
    let analyzer = test_analyzer();
    let empty = with_bare_tracks(Playlist::new("empty", "Empty", Vec::new()), 3);
    let analysis = analyzer.analyze(&empty).unwrap();
    assert!(mood_distribution(&analysis).is_empty());
}

#[test]
fn test_select_tracks_by_mood() {
    let analyzer = test_analyzer();
    let playlists = vec![mixed_playlist("one"), mixed_playlist("two")];
    let analyses = run_playlists_analysis(&analyzer, &playlists).unwrap();
    let label = analyses[0].clusters[0].label.clone();

    let selection = select_tracks_by_mood(&analyzer, &playlists, &label).unwrap();
    assert_eq!(selection.mood_label, label);

    let expected: usize = analyses
        .iter()
        .flat_map(|a| a.clusters.iter())
        .filter(|c| c.label == label)
        .map(|c| c.size)
        .sum();
    assert_eq!(selection.tracks.len(), expected);
    assert!(selection
        .tracks
        .iter()
        .all(|t| t.row.track_id.starts_with(&t.playlist_id)));
    assert!(selection.tracks.iter().any(|t| t.playlist_name == "Playlist one"));

    let value = serde_json::to_value(&selection.tracks[0]).unwrap();
    assert!(value.get("spotify_id").is_some(), "row fields are flattened");
    assert!(value.get("playlist_id").is_some());
}

#[test]
fn test_select_tracks_short_circuits() {
    let analyzer = test_analyzer();
    let playlists = vec![mixed_playlist("sc")];

    assert!(select_tracks_by_mood(&analyzer, &playlists, "").unwrap().tracks.is_empty());
    assert!(analyzer.cache().is_empty(), "empty label never triggers analysis");
    assert!(select_tracks_by_mood(&analyzer, &[], "low_energy_sad").unwrap().tracks.is_empty());
    assert!(select_tracks_by_mood(&analyzer, &playlists, "no_such_mood").unwrap()
        .tracks
        .is_empty());
}

#[test]
fn test_summarize_playlists() {
    let analyzer = test_analyzer();
    let playlists = vec![
        mixed_playlist("s1"),
        with_bare_tracks(mixed_playlist("s2"), 3),
    ];
    let overview = summarize_playlists(&analyzer, &playlists).unwrap();

    assert_eq!(overview.num_playlists, 2);
    assert_eq!(overview.playlists[1].playlist_id, "s2");
    assert_eq!(overview.playlists[1].summary.num_excluded_missing_all, 3);
    assert_eq!(
        overview.playlists[0].num_clusters,
        overview.playlists[0].summary.num_clusters
    );
    assert_eq!(analyzer.cache().len(), 2);
}
