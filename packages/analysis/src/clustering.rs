//! K-means partitioning of a playlist's feature matrix
//!
//! # Algorithm
//!
//! 1. Degenerate inputs (one or two rows) are partitioned directly: every
//!    distinct row is its own cluster.
//! 2. Otherwise try k-means for each K in the configured range, clipped so
//!    that K stays below the number of rows and the number of distinct rows
//! 3. Score every fit that populates at least two clusters with the
//!    silhouette coefficient and keep the K with the highest score
//! 4. Refit the chosen K with more initializations for the production
//!    partition
//!
//! Every k-means run uses the same fixed seed, so identical inputs always
//! produce the identical partition.

use std::collections::{BTreeSet, HashSet};

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array2, ArrayView1, Axis};
use offbeat_shared_config::AnalysisConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::error::{AnalysisError, AnalysisResult};

/// Threshold for using sampling-based silhouette calculation
/// For datasets larger than this, we sample to avoid O(n²) computation
const SILHOUETTE_SAMPLE_THRESHOLD: usize = 500;

/// Number of samples to use for silhouette calculation on large datasets
const SILHOUETTE_SAMPLE_SIZE: usize = 300;

// =============================================================================
// Types
// =============================================================================

/// Cluster assignment of every row plus one centroid per cluster
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Dense 0-based cluster id per row
    pub labels: Vec<usize>,

    /// One row per cluster id, in the clustering feature space
    pub centroids: Array2<f64>,
}

impl Partition {
    /// Number of clusters
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    /// Track count per cluster id
    pub fn cluster_sizes(&self) -> Vec<usize> {
        count_cluster_sizes(&self.labels, self.k())
    }

    /// A single cluster whose centroid is the mean of all rows
    fn single(data: &Array2<f64>) -> Self {
        let centroid = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| ndarray::Array1::zeros(data.ncols()));
        Self {
            labels: vec![0; data.nrows()],
            centroids: centroid.insert_axis(Axis(0)),
        }
    }

    /// One cluster per distinct row; identical rows share a cluster
    fn per_distinct_row(data: &Array2<f64>) -> Self {
        let mut representatives: Vec<usize> = Vec::new();
        let mut labels = Vec::with_capacity(data.nrows());
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let existing = representatives
                .iter()
                .position(|&r| data.row(r) == row);
            match existing {
                Some(label) => labels.push(label),
                None => {
                    labels.push(representatives.len());
                    representatives.push(i);
                }
            }
        }
        Self {
            labels,
            centroids: data.select(Axis(0), &representatives),
        }
    }

    /// Renumber labels to 0..k in ascending order of the original label,
    /// dropping centroids of clusters that ended up empty
    fn densified(labels: Vec<usize>, centroids: Array2<f64>) -> Self {
        let used: BTreeSet<usize> = labels.iter().copied().collect();
        let order: Vec<usize> = used.into_iter().collect();
        let remap = |label: usize| order.binary_search(&label).unwrap_or(0);
        Self {
            labels: labels.into_iter().map(remap).collect(),
            centroids: centroids.select(Axis(0), &order),
        }
    }
}

/// Why a candidate K could not be scored
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// K is not smaller than the number of rows
    NotFewerThanPoints,
    /// K exceeds the number of distinct rows
    TooFewDistinctPoints,
    /// The fit populated fewer than two clusters
    TooFewPopulatedClusters,
    /// k-means itself failed
    FitFailed(String),
}

/// Result of evaluating one candidate K during the search
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Scored { k: usize, silhouette: f64 },
    NotEvaluable { k: usize, reason: SkipReason },
}

impl CandidateOutcome {
    pub fn k(&self) -> usize {
        match self {
            Self::Scored { k, .. } | Self::NotEvaluable { k, .. } => *k,
        }
    }
}

/// Chosen cluster count together with every candidate's outcome
#[derive(Debug, Clone)]
pub struct KSelection {
    pub k: usize,
    pub outcomes: Vec<CandidateOutcome>,
    /// Search-pass partition for the chosen K, if it was scored
    search_partition: Option<Partition>,
}

impl KSelection {
    /// Best silhouette among scored candidates
    pub fn best_silhouette(&self) -> Option<f64> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                CandidateOutcome::Scored { silhouette, .. } => Some(*silhouette),
                CandidateOutcome::NotEvaluable { .. } => None,
            })
            .reduce(f64::max)
    }
}

// =============================================================================
// Main Clustering Functions
// =============================================================================

/// Partition the rows of `data` into mood clusters
///
/// Never fails: a failed production fit falls back to the search-pass
/// partition of the chosen K, and then to a single cluster.
pub fn cluster_rows(data: &Array2<f64>, config: &AnalysisConfig) -> Partition {
    let n = data.nrows();
    if n == 0 {
        return Partition {
            labels: Vec::new(),
            centroids: Array2::zeros((0, data.ncols())),
        };
    }
    if n <= 2 {
        return Partition::per_distinct_row(data);
    }

    let selection = choose_k(data, config);
    let k = selection.k.clamp(1, n).min(distinct_rows(data));
    if k == 1 {
        return Partition::single(data);
    }

    match run_kmeans(data, k, config.final_runs, config) {
        Ok(partition) => {
            tracing::debug!(
                k = k,
                clusters = partition.k(),
                sizes = ?partition.cluster_sizes(),
                "Final k-means partition"
            );
            partition
        }
        Err(e) => {
            tracing::warn!(k = k, error = %e, "Final k-means fit failed, using fallback partition");
            selection
                .search_partition
                .unwrap_or_else(|| Partition::single(data))
        }
    }
}

/// Pick the cluster count with the highest silhouette score
///
/// Candidates run from `k_min` to `k_max`, both clipped to `[2, n]`. A
/// candidate that is not smaller than `n`, exceeds the number of distinct
/// rows, fails to fit, or populates fewer than two clusters is recorded as
/// not evaluable. If nothing can be scored the clipped `k_min` is returned.
pub fn choose_k(data: &Array2<f64>, config: &AnalysisConfig) -> KSelection {
    let n = data.nrows();
    if n <= 2 {
        return KSelection {
            k: n.max(1),
            outcomes: Vec::new(),
            search_partition: None,
        };
    }

    let k_max = config.k_max.clamp(2, n);
    let k_min = config.k_min.clamp(2, n).min(k_max);
    let distinct = distinct_rows(data);

    let mut best_k = k_min;
    let mut best_silhouette = f64::NEG_INFINITY;
    let mut best_partition: Option<Partition> = None;
    let mut outcomes = Vec::with_capacity(k_max - k_min + 1);

    for k in k_min..=k_max {
        let outcome = evaluate_candidate(data, k, distinct, config);
        match outcome {
            Ok((silhouette, partition)) => {
                tracing::debug!(k = k, silhouette = silhouette, "K-means candidate scored");
                if silhouette > best_silhouette {
                    best_silhouette = silhouette;
                    best_k = k;
                    best_partition = Some(partition);
                }
                outcomes.push(CandidateOutcome::Scored { k, silhouette });
            }
            Err(reason) => {
                tracing::debug!(k = k, reason = ?reason, "Skipping candidate k={}", k);
                outcomes.push(CandidateOutcome::NotEvaluable { k, reason });
            }
        }
    }

    if best_partition.is_none() {
        tracing::debug!(k = best_k, "No candidate K could be scored, using minimum");
    } else {
        tracing::debug!(
            k = best_k,
            silhouette = best_silhouette,
            "Selected k={} clusters with silhouette={}",
            best_k,
            best_silhouette
        );
    }

    KSelection {
        k: best_k,
        outcomes,
        search_partition: best_partition,
    }
}

fn evaluate_candidate(
    data: &Array2<f64>,
    k: usize,
    distinct: usize,
    config: &AnalysisConfig,
) -> Result<(f64, Partition), SkipReason> {
    if k >= data.nrows() {
        return Err(SkipReason::NotFewerThanPoints);
    }
    if k > distinct {
        return Err(SkipReason::TooFewDistinctPoints);
    }

    let partition = run_kmeans(data, k, config.search_runs, config)
        .map_err(|e| SkipReason::FitFailed(e.to_string()))?;
    let silhouette = score_partition(data, &partition, config.random_seed)?;
    Ok((silhouette, partition))
}

/// Silhouette of a fitted partition; clusters left empty by the fit have
/// already been dropped from it
fn score_partition(data: &Array2<f64>, partition: &Partition, seed: u64) -> Result<f64, SkipReason> {
    if partition.k() < 2 {
        return Err(SkipReason::TooFewPopulatedClusters);
    }
    Ok(calculate_silhouette_score(data, partition, seed))
}

// =============================================================================
// K-Means Implementation
// =============================================================================

/// Run k-means clustering with the specified number of clusters
fn run_kmeans(
    data: &Array2<f64>,
    k: usize,
    runs: usize,
    config: &AnalysisConfig,
) -> AnalysisResult<Partition> {
    let dataset = DatasetBase::from(data.clone());

    // Fixed seed for reproducibility
    let rng = Xoshiro256Plus::seed_from_u64(config.random_seed);

    let model = KMeans::params_with_rng(k, rng)
        .n_runs(runs)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| AnalysisError::clustering(k, e.to_string()))?;

    // Get cluster assignments by predicting on the same data
    let predictions = model.predict(dataset);
    let labels: Vec<usize> = predictions.targets().iter().copied().collect();

    Ok(Partition::densified(labels, model.centroids().clone()))
}

/// Count the number of points in each cluster
fn count_cluster_sizes(labels: &[usize], k: usize) -> Vec<usize> {
    let mut counts = vec![0; k];
    for &label in labels {
        if label < k {
            counts[label] += 1;
        }
    }
    counts
}

/// Number of pairwise-distinct rows
fn distinct_rows(data: &Array2<f64>) -> usize {
    data.axis_iter(Axis(0))
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

// =============================================================================
// Silhouette Score Calculation
// =============================================================================

/// Mean silhouette coefficient of a partition
///
/// Ranges from -1 (rows closer to another cluster) to +1 (tight, well
/// separated clusters). Rows alone in their cluster contribute 0, and a
/// partition with fewer than two clusters scores 0.
///
/// Above 500 rows the mean is taken over 300 rows drawn per cluster in
/// proportion to cluster size, using `seed`.
pub fn calculate_silhouette_score(data: &Array2<f64>, partition: &Partition, seed: u64) -> f64 {
    let n = partition.labels.len();
    if n < 2 || partition.k() < 2 {
        return 0.0;
    }

    let rows: Vec<usize> = if n > SILHOUETTE_SAMPLE_THRESHOLD {
        let rows = stratified_sample(partition, SILHOUETTE_SAMPLE_SIZE, seed);
        tracing::debug!(
            n_samples = n,
            sample_size = rows.len(),
            "Using sampling-based silhouette calculation"
        );
        rows
    } else {
        (0..n).collect()
    };

    let total: f64 = rows
        .iter()
        .map(|&row| point_silhouette(data, partition, row))
        .sum();
    total / rows.len() as f64
}

/// Rows drawn from every cluster in proportion to its size
///
/// Quotas are floored shares of `sample_size`; the rows still missing go
/// to the clusters with the largest remainders, smallest id first on ties.
/// The result is sorted and holds exactly `min(sample_size, n)` rows.
fn stratified_sample(partition: &Partition, sample_size: usize, seed: u64) -> Vec<usize> {
    let n = partition.labels.len();
    let sample_size = sample_size.min(n);

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); partition.k()];
    for (row, &label) in partition.labels.iter().enumerate() {
        members[label].push(row);
    }

    let mut quotas: Vec<usize> = members.iter().map(|m| m.len() * sample_size / n).collect();
    let mut remainders: Vec<(usize, usize)> = members
        .iter()
        .enumerate()
        .map(|(cluster, m)| (cluster, m.len() * sample_size % n))
        .collect();
    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let missing = sample_size - quotas.iter().sum::<usize>();
    for &(cluster, _) in remainders.iter().take(missing) {
        quotas[cluster] += 1;
    }

    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(sample_size);
    for (pool, quota) in members.iter_mut().zip(quotas) {
        let (picked, _) = pool.partial_shuffle(&mut rng, quota);
        rows.extend_from_slice(picked);
    }
    rows.sort_unstable();
    rows
}

/// Silhouette coefficient of one row against every other row
fn point_silhouette(data: &Array2<f64>, partition: &Partition, row: usize) -> f64 {
    let k = partition.k();
    let own = partition.labels[row];
    let point = data.row(row);

    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (other, &label) in partition.labels.iter().enumerate() {
        if other != row {
            sums[label] += euclidean_distance(&point, &data.row(other));
            counts[label] += 1;
        }
    }

    if counts[own] == 0 {
        return 0.0;
    }
    let a = sums[own] / counts[own] as f64;
    let b = (0..k)
        .filter(|&c| c != own && counts[c] > 0)
        .map(|c| sums[c] / counts[c] as f64)
        .fold(f64::INFINITY, f64::min);

    if !b.is_finite() || a.max(b) == 0.0 {
        0.0
    } else {
        (b - a) / a.max(b)
    }
}

/// Calculate Euclidean distance between two points
pub fn euclidean_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

// =============================================================================
// Unit Tests
// =============================================================================
