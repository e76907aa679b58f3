//! Label to tracks index merging every surviving cluster that shares a label

use std::collections::{BTreeMap, HashMap};

use crate::output::{AnalysisCluster, AnalysisTrackRef, MoodEntry};

/// Build the mood index from surviving clusters
///
/// `titles` maps track id to title for the reference list. Clusters are
/// visited in order, so ids within an entry follow cluster order.
pub fn build_mood_index(
    clusters: &[AnalysisCluster],
    titles: &HashMap<&str, &str>,
) -> BTreeMap<String, MoodEntry> {
    let mut index: BTreeMap<String, MoodEntry> = BTreeMap::new();

    for cluster in clusters {
        if cluster.label.is_empty() {
            continue;
        }
        let entry = index
            .entry(cluster.label.clone())
            .or_insert_with(|| MoodEntry::new(cluster.label.clone()));
        entry.cluster_ids.push(cluster.cluster_id);
        entry
            .track_ids
            .extend(cluster.member_track_ids.iter().cloned());
    }

    for entry in index.values_mut() {
        entry.tracks = entry
            .track_ids
            .iter()
            .map(|id| AnalysisTrackRef {
                track_id: id.clone(),
                title: titles.get(id.as_str()).map(|t| t.to_string()),
            })
            .collect();
    }

    index
}
