//! Deterministic k-means clustering of pixel colors in Lab space
//!
//! 1. Take an evenly strided sample of at most `max_samples` pixels
//! 2. Seed by farthest-first traversal starting from the sample nearest the mean
//! 3. Iterate assignment + centroid update, each pass producing a fresh
//!    centroid set, until centroids settle or the iteration cap is hit
//! 4. Assign every pixel (not just the sample) to its nearest final centroid
//! 5. Rank clusters by member count, ties by darker centroid
//!
//! Nothing here is random, and partial sums are reduced in a fixed order, so
//! the same buffer always yields bit-identical centroids and ranks.

use rayon::prelude::*;
use serde::Serialize;

use crate::color::{delta_e, Lab, Lch};
use crate::config::{GroundHeuristic, KMeansConfig, CLUSTER_COUNT};
use crate::stats::ColorPlanes;

/// Samples per partial-sum chunk when recomputing centroids
const ACCUMULATE_CHUNK: usize = 4096;

/// Distances at or below this are treated as "already covered by a centroid"
const COLLAPSE_DISTANCE: f64 = 1e-9;

/// One ranked color cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Index of the cluster before ranking (seed order)
    pub index: usize,
    pub center: Lab,
    pub center_lch: Lch,
    pub pixel_count: u64,
    /// Fraction of all pixels, 0.0..=1.0
    pub percentage: f64,
}

/// Ranked clusters plus the rank of every pixel's nearest cluster
#[derive(Debug, Clone)]
pub struct Clustering {
    pub clusters: Vec<Cluster>,
    /// Row-major rank (index into `clusters`) of each pixel
    pub labels: Vec<u8>,
    pub iterations: usize,
}

/// Cluster every pixel of `planes` into [`CLUSTER_COUNT`] ranked clusters
pub fn cluster_pixels(planes: &ColorPlanes, config: &KMeansConfig) -> Clustering {
    let samples = strided_sample(planes.lab(), config.max_samples);
    let seeds = farthest_first_seeds(&samples, CLUSTER_COUNT);

    let (centroids, iterations) = iterate(&samples, seeds, config);
    tracing::debug!(
        "k-means settled after {} iterations over {} samples",
        iterations,
        samples.len()
    );

    // Final assignment over the full buffer
    let assignments: Vec<usize> = planes
        .lab()
        .par_iter()
        .map(|lab| nearest(&centroids, lab))
        .collect();

    let mut counts = [0u64; CLUSTER_COUNT];
    for &j in &assignments {
        counts[j] += 1;
    }

    let mut order: Vec<usize> = (0..CLUSTER_COUNT).collect();
    order.sort_by(|&a, &b| {
        counts[b]
            .cmp(&counts[a])
            .then_with(|| centroids[a].l.total_cmp(&centroids[b].l))
    });

    let mut rank_of = [0u8; CLUSTER_COUNT];
    for (rank, &index) in order.iter().enumerate() {
        rank_of[index] = rank as u8;
    }

    let total = assignments.len() as f64;
    let clusters = order
        .iter()
        .map(|&index| Cluster {
            index,
            center: centroids[index],
            center_lch: centroids[index].to_lch(),
            pixel_count: counts[index],
            percentage: counts[index] as f64 / total,
        })
        .collect();

    let labels = assignments.par_iter().map(|&j| rank_of[j]).collect();

    Clustering {
        clusters,
        labels,
        iterations,
    }
}

/// Rank of the highest-ranked populated cluster that looks like a toned ground
pub fn detect_ground(clusters: &[Cluster], heuristic: &GroundHeuristic) -> Option<usize> {
    clusters
        .iter()
        .position(|c| c.pixel_count > 0 && heuristic.accepts(&c.center_lch))
}

/// Index of the nearest centroid; the lowest index wins ties
#[inline]
pub fn nearest(centroids: &[Lab], lab: &Lab) -> usize {
    let mut best_index = 0;
    let mut best_dist = f64::MAX;

    for (i, c) in centroids.iter().enumerate() {
        let dist = lab.distance_squared(c);
        if dist < best_dist {
            best_dist = dist;
            best_index = i;
        }
    }

    best_index
}

fn strided_sample(lab: &[Lab], max_samples: usize) -> Vec<Lab> {
    if lab.len() <= max_samples {
        return lab.to_vec();
    }
    (0..max_samples)
        .map(|i| lab[i * lab.len() / max_samples])
        .collect()
}

fn farthest_first_seeds(samples: &[Lab], k: usize) -> Vec<Lab> {
    let n = samples.len() as f64;
    let mean = samples.iter().fold(Lab::default(), |acc, s| Lab {
        l: acc.l + s.l / n,
        a: acc.a + s.a / n,
        b: acc.b + s.b / n,
    });

    let first = samples[nearest(samples, &mean)];
    let mut seeds = vec![first];
    let mut min_dist: Vec<f64> = samples.iter().map(|s| s.distance_squared(&first)).collect();

    while seeds.len() < k {
        let (index, dist) = farthest(&min_dist);
        if dist <= COLLAPSE_DISTANCE {
            // Fewer distinct colors than clusters; the extra seeds collapse
            seeds.push(first);
            continue;
        }

        let seed = samples[index];
        seeds.push(seed);
        for (d, s) in min_dist.iter_mut().zip(samples) {
            *d = d.min(s.distance_squared(&seed));
        }
    }

    seeds
}

/// First index holding the largest value
fn farthest(distances: &[f64]) -> (usize, f64) {
    distances
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &d)| if d > best.1 { (i, d) } else { best })
}

fn iterate(samples: &[Lab], seeds: Vec<Lab>, config: &KMeansConfig) -> (Vec<Lab>, usize) {
    let mut centroids = seeds;

    for iteration in 1..=config.max_iterations {
        let assignments: Vec<usize> = samples
            .par_iter()
            .map(|s| nearest(&centroids, s))
            .collect();

        let next = update_centroids(samples, &assignments, &centroids);
        let shift = centroids
            .iter()
            .zip(&next)
            .map(|(old, new)| delta_e(*old, *new))
            .fold(0.0, f64::max);

        centroids = next;
        if shift < config.epsilon {
            return (centroids, iteration);
        }
    }

    (centroids, config.max_iterations)
}

/// Mean of each cluster's members; empty clusters move to the worst-fit sample
fn update_centroids(samples: &[Lab], assignments: &[usize], previous: &[Lab]) -> Vec<Lab> {
    let k = previous.len();
    let partials: Vec<Vec<([f64; 3], u64)>> = samples
        .par_chunks(ACCUMULATE_CHUNK)
        .zip(assignments.par_chunks(ACCUMULATE_CHUNK))
        .map(|(chunk, labels)| {
            let mut acc = vec![([0.0f64; 3], 0u64); k];
            for (lab, &j) in chunk.iter().zip(labels) {
                acc[j].0[0] += lab.l;
                acc[j].0[1] += lab.a;
                acc[j].0[2] += lab.b;
                acc[j].1 += 1;
            }
            acc
        })
        .collect();

    let mut totals = vec![([0.0f64; 3], 0u64); k];
    for part in partials {
        for (total, (sum, count)) in totals.iter_mut().zip(part) {
            total.0[0] += sum[0];
            total.0[1] += sum[1];
            total.0[2] += sum[2];
            total.1 += count;
        }
    }

    let mut next: Vec<Lab> = totals
        .iter()
        .zip(previous)
        .map(|((sum, count), prev)| {
            if *count == 0 {
                *prev
            } else {
                let n = *count as f64;
                Lab::new(sum[0] / n, sum[1] / n, sum[2] / n)
            }
        })
        .collect();

    let empty: Vec<usize> = (0..k).filter(|&j| totals[j].1 == 0).collect();
    if !empty.is_empty() {
        let mut fit: Vec<f64> = samples
            .iter()
            .zip(assignments)
            .map(|(s, &j)| s.distance_squared(&previous[j]))
            .collect();

        for j in empty {
            let (index, dist) = farthest(&fit);
            if dist > COLLAPSE_DISTANCE {
                next[j] = samples[index];
                fit[index] = 0.0;
            }
        }
    }

    next
}
