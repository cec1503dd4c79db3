//! Neighborhood-preserving 2-D projection of probe states
//!
//! A compact UMAP-style embedding:
//!
//! 1. exact k-nearest-neighbor graph over Euclidean distances
//! 2. per-point fuzzy membership (`rho` = nearest positive distance, `sigma`
//!    found by binary search so the memberships sum to `log2(k + 1)`)
//! 3. fuzzy union `w = a + b - a*b` of the two directed memberships
//! 4. seeded uniform layout in `[-10, 10]^2` refined by stochastic gradient
//!    descent with attractive edge samples and uniform negative samples
//!
//! The same input and seed always give the same layout.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const SIGMA_ITERATIONS: usize = 64;
const SIGMA_TOLERANCE: f64 = 1e-5;
const MIN_SIGMA_SCALE: f64 = 1e-3;
const GRADIENT_CLIP: f64 = 4.0;
const INIT_RANGE: f64 = 10.0;

/// Projection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Neighbors per point (capped at `n - 1`)
    pub n_neighbors: usize,
    /// Optimization epochs
    pub n_epochs: usize,
    /// Negative samples per positive sample
    pub negative_sample_rate: usize,
    /// Low-dimensional curve parameter `a`
    pub a: f64,
    /// Low-dimensional curve parameter `b`
    pub b: f64,
    /// Initial learning rate, decayed linearly to 0
    pub learning_rate: f64,
    /// Seed for the layout and negative sampling
    pub seed: u64,
}

impl Default for ProjectionConfig {
    /// Curve parameters correspond to a minimum distance of 0.1.
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            n_epochs: 200,
            negative_sample_rate: 5,
            a: 1.577,
            b: 0.8951,
            learning_rate: 1.0,
            seed: 42,
        }
    }
}

/// Reduces high-dimensional rows to 2-D coordinates.
#[derive(Debug, Clone, Default)]
pub struct NeighborhoodProjector {
    config: ProjectionConfig,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    head: usize,
    tail: usize,
    weight: f64,
}

impl NeighborhoodProjector {
    /// Create a projector.
    #[must_use]
    pub const fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Project every row to `[x, y]`.
    ///
    /// No rows give no points; a single row maps to the origin.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the rows differ in length.
    pub fn fit_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<[f64; 2]>> {
        let n = rows.len();
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        if let Some(i) = rows.iter().position(|row| row.len() != first.len()) {
            return Err(Error::ShapeMismatch {
                context: format!("projection row {i}"),
                expected: format!("{} features", first.len()),
                actual: format!("{} features", rows[i].len()),
            });
        }
        if n == 1 {
            return Ok(vec![[0.0, 0.0]]);
        }

        let distances = pairwise_distances(rows);
        let k = self.config.n_neighbors.clamp(1, n - 1);
        let edges = fuzzy_graph(&distances, k);
        Ok(self.optimize(n, &edges))
    }

    #[allow(clippy::cast_precision_loss)]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    fn optimize(&self, n: usize, edges: &[Edge]) -> Vec<[f64; 2]> {
        let ProjectionConfig {
            n_epochs,
            negative_sample_rate,
            a,
            b,
            learning_rate,
            seed,
            ..
        } = self.config;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut embedding: Vec<[f64; 2]> = (0..n)
            .map(|_| {
                [
                    rng.gen_range(-INIT_RANGE..INIT_RANGE),
                    rng.gen_range(-INIT_RANGE..INIT_RANGE),
                ]
            })
            .collect();

        let max_weight = edges.iter().map(|e| e.weight).fold(0.0, f64::max);
        let floor = max_weight / n_epochs.max(1) as f64;
        let edges: Vec<Edge> = edges.iter().copied().filter(|e| e.weight >= floor).collect();
        if edges.is_empty() || n_epochs == 0 {
            return embedding;
        }

        let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_weight / e.weight).collect();
        let negative_rate = negative_sample_rate.max(1) as f64;
        let epochs_per_negative: Vec<f64> =
            epochs_per_sample.iter().map(|eps| eps / negative_rate).collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        for epoch in 0..n_epochs {
            let epoch = epoch as f64;
            let alpha = learning_rate * (1.0 - epoch / n_epochs as f64);

            for (e, edge) in edges.iter().enumerate() {
                if next_sample[e] > epoch {
                    continue;
                }

                let (head, tail) = (embedding[edge.head], embedding[edge.tail]);
                let d2 = squared_distance(head, tail);
                let coefficient = if d2 > 0.0 {
                    -2.0 * a * b * d2.powf(b - 1.0) / (1.0 + a * d2.powf(b))
                } else {
                    0.0
                };
                for dim in 0..2 {
                    let grad = clip(coefficient * (head[dim] - tail[dim])) * alpha;
                    embedding[edge.head][dim] += grad;
                    embedding[edge.tail][dim] -= grad;
                }
                next_sample[e] += epochs_per_sample[e];

                let negatives = ((epoch - next_negative[e]) / epochs_per_negative[e]).floor();
                for _ in 0..negatives.max(0.0) as usize {
                    let other = rng.gen_range(0..n);
                    if other == edge.head {
                        continue;
                    }
                    let (head, far) = (embedding[edge.head], embedding[other]);
                    let d2 = squared_distance(head, far);
                    for dim in 0..2 {
                        let grad = if d2 > 0.0 {
                            let coefficient = 2.0 * b / ((0.001 + d2) * (1.0 + a * d2.powf(b)));
                            clip(coefficient * (head[dim] - far[dim]))
                        } else {
                            GRADIENT_CLIP
                        };
                        embedding[edge.head][dim] += grad * alpha;
                    }
                }
                next_negative[e] += negatives.max(0.0) * epochs_per_negative[e];
            }
        }
        embedding
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(feature = "rayon")]
fn pairwise_distances(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    use rayon::prelude::*;

    rows.par_iter()
        .map(|a| rows.iter().map(|b| euclidean(a, b)).collect())
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn pairwise_distances(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|a| rows.iter().map(|b| euclidean(a, b)).collect())
        .collect()
}

/// Symmetric fuzzy neighbor graph, one edge per unordered pair, sorted.
#[allow(clippy::cast_precision_loss)]
fn fuzzy_graph(distances: &[Vec<f64>], k: usize) -> Vec<Edge> {
    let target = ((k + 1) as f64).log2();
    let mut directed: FxHashMap<(usize, usize), f64> = FxHashMap::default();

    for (i, row) in distances.iter().enumerate() {
        let mut neighbors: Vec<(usize, f64)> = row
            .iter()
            .copied()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .collect();
        neighbors.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
        neighbors.truncate(k);

        let rho = neighbors
            .iter()
            .map(|&(_, d)| d)
            .find(|&d| d > 0.0)
            .unwrap_or(0.0);
        let mean_distance = neighbors.iter().map(|&(_, d)| d).sum::<f64>() / k as f64;
        let sigma = smooth_sigma(&neighbors, rho, target)
            .max(MIN_SIGMA_SCALE * mean_distance)
            .max(f64::EPSILON);

        for &(j, d) in &neighbors {
            directed.insert((i, j), membership(d, rho, sigma));
        }
    }

    let mut combined: FxHashMap<(usize, usize), f64> = FxHashMap::default();
    for (&(i, j), &w) in &directed {
        let key = (i.min(j), i.max(j));
        if combined.contains_key(&key) {
            continue;
        }
        let reverse = directed.get(&(j, i)).copied().unwrap_or(0.0);
        combined.insert(key, w + reverse - w * reverse);
    }

    let mut edges: Vec<Edge> = combined
        .into_iter()
        .filter(|&(_, weight)| weight > 0.0)
        .map(|((head, tail), weight)| Edge { head, tail, weight })
        .collect();
    edges.sort_by_key(|e| (e.head, e.tail));
    edges
}

fn membership(distance: f64, rho: f64, sigma: f64) -> f64 {
    let gap = (distance - rho).max(0.0);
    if gap == 0.0 {
        1.0
    } else {
        (-gap / sigma).exp()
    }
}

fn smooth_sigma(neighbors: &[(usize, f64)], rho: f64, target: f64) -> f64 {
    let (mut lo, mut hi, mut mid) = (0.0_f64, f64::INFINITY, 1.0_f64);
    for _ in 0..SIGMA_ITERATIONS {
        let total: f64 = neighbors.iter().map(|&(_, d)| membership(d, rho, mid)).sum();
        if (total - target).abs() < SIGMA_TOLERANCE {
            break;
        }
        if total > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_finite() { (lo + hi) / 2.0 } else { mid * 2.0 };
        }
    }
    mid
}
