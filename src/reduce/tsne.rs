//! Exact t-distributed stochastic neighbour embedding.
//!
//! 1. Pairwise distances (squared Euclidean or cosine).
//! 2. Per row, binary search for the Gaussian precision whose conditional
//!    distribution has entropy `ln(perplexity)`.
//! 3. Joint affinities `P = (P_cond + P_condᵀ) / Σ`.
//! 4. Gradient descent on `KL(P ‖ Q)` with a Student-t (1 dof) kernel:
//!    `∂C/∂yᵢ = 4 Σⱼ (pᵢⱼ − qᵢⱼ) (1 + ‖yᵢ − yⱼ‖²)⁻¹ (yᵢ − yⱼ)`,
//!    momentum and per-parameter adaptive gains. The first
//!    [`EXPLORATION_ITERS`] iterations use exaggerated `P` and momentum
//!    0.5, the rest momentum 0.8.
//!
//! Cost is O(N²) per iteration, which is fine for the trial counts of an
//! EEG session.
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::config::{LearningRate, Metric, TsneInit};
use crate::error::{Error, Result};
use crate::reduce::pca::Pca;

/// Iterations run with early exaggeration.
pub const EXPLORATION_ITERS: usize = 250;

const MACHINE_EPSILON: f64 = f64::EPSILON;
const PERPLEXITY_TOL: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 100;
const MIN_GAIN: f64 = 0.01;
const MIN_GRAD_NORM: f64 = 1e-7;
const N_DIMS: usize = 2;

/// t-SNE parameters.
#[derive(Debug, Clone)]
pub struct Tsne {
    pub perplexity: f64,
    pub n_iter: usize,
    pub metric: Metric,
    pub early_exaggeration: f64,
    pub learning_rate: LearningRate,
    pub init: TsneInit,
    pub seed: u64,
}

impl Default for Tsne {
    fn default() -> Self {
        Self {
            perplexity: 40.0,
            n_iter: 1200,
            metric: Metric::Cosine,
            early_exaggeration: 24.0,
            learning_rate: LearningRate::Auto,
            init: TsneInit::Pca,
            seed: 42,
        }
    }
}

impl Tsne {
    /// Embed the rows of `x` (`[N, D]`) in 2-D → `[N, 2]`.
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n < 2 {
            return Err(Error::InsufficientTrials(n));
        }
        if !(self.early_exaggeration >= 1.0) {
            return Err(Error::invalid(
                "early_exaggeration",
                format!("{} must be >= 1", self.early_exaggeration),
            ));
        }
        let perplexity = self.effective_perplexity(n)?;
        let distances = pairwise_distances(x, self.metric);
        let p = joint_probabilities(&distances, perplexity);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut y = self.initial_layout(x, &mut rng)?;

        let lr = match self.learning_rate {
            LearningRate::Auto => (n as f64 / self.early_exaggeration / 4.0).max(50.0),
            LearningRate::Fixed(lr) => lr,
        };
        log::debug!(
            "t-SNE: n={n} perplexity={perplexity:.2} lr={lr:.1} iters={}",
            self.n_iter
        );

        let mut update = Array2::<f64>::zeros((n, N_DIMS));
        let mut gains = Array2::<f64>::ones((n, N_DIMS));
        let exaggerated = &p * self.early_exaggeration;

        for it in 0..self.n_iter {
            let exploring = it < EXPLORATION_ITERS;
            let momentum = if exploring { 0.5 } else { 0.8 };
            let p_it = if exploring { &exaggerated } else { &p };

            let grad = kl_gradient(p_it, &y);
            let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();

            for ((u, gain), &g) in update.iter_mut().zip(gains.iter_mut()).zip(grad.iter()) {
                *gain = if *u * g < 0.0 { *gain + 0.2 } else { *gain * 0.8 };
                *gain = gain.max(MIN_GAIN);
                *u = momentum * *u - lr * *gain * g;
            }
            y += &update;

            if grad_norm < MIN_GRAD_NORM {
                log::debug!("t-SNE converged at iteration {it} (|grad| = {grad_norm:.2e})");
                break;
            }
        }
        Ok(y)
    }

    fn effective_perplexity(&self, n: usize) -> Result<f64> {
        if !(self.perplexity > 0.0) {
            return Err(Error::invalid("perplexity", format!("{} must be > 0", self.perplexity)));
        }
        let cap = (n - 1) as f64;
        if self.perplexity > cap {
            log::warn!(
                "perplexity {} is too large for {n} trials; using {cap}",
                self.perplexity
            );
            return Ok(cap);
        }
        Ok(self.perplexity)
    }

    fn initial_layout(&self, x: ArrayView2<f64>, rng: &mut StdRng) -> Result<Array2<f64>> {
        let n = x.nrows();
        if self.init == TsneInit::Pca {
            if let Some(y) = pca_layout(x)? {
                return Ok(y);
            }
            log::warn!("degenerate PCA initialisation; falling back to random");
        }
        Ok(Array2::from_shape_fn((n, N_DIMS), |_| 1e-4 * rng.sample::<f64, _>(StandardNormal)))
    }
}

/// First two principal components, scaled so axis 0 has std 1e-4.
/// `None` when the data has fewer than two informative directions.
fn pca_layout(x: ArrayView2<f64>) -> Result<Option<Array2<f64>>> {
    if x.ncols() < N_DIMS {
        return Ok(None);
    }
    let (_, proj) = Pca::fit_transform(x, N_DIMS)?;
    if proj.ncols() < N_DIMS {
        return Ok(None);
    }
    let std0 = proj.column(0).std(0.0);
    if !(std0 > 0.0) {
        return Ok(None);
    }
    Ok(Some(proj.mapv(|v| v / std0 * 1e-4)))
}

/// `[N, N]` distances: squared Euclidean, or `1 − cos` for cosine.
pub fn pairwise_distances(x: ArrayView2<f64>, metric: Metric) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::zeros((n, n));
    match metric {
        Metric::Euclidean => {
            for i in 0..n {
                for j in (i + 1)..n {
                    let v: f64 = x
                        .row(i)
                        .iter()
                        .zip(x.row(j).iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    d[[i, j]] = v;
                    d[[j, i]] = v;
                }
            }
        }
        Metric::Cosine => {
            let norms: Vec<f64> = x.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect();
            for i in 0..n {
                for j in (i + 1)..n {
                    let denom = norms[i] * norms[j];
                    let sim = if denom > 0.0 { x.row(i).dot(&x.row(j)) / denom } else { 0.0 };
                    let v = (1.0 - sim).clamp(0.0, 2.0);
                    d[[i, j]] = v;
                    d[[j, i]] = v;
                }
            }
        }
    }
    d
}

/// Conditional affinities per row, then symmetrised and normalised.
pub fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let target = perplexity.ln();
    let mut cond = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let row = distances.row(i);
        let mut beta = 1.0;
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;
        let mut p = vec![0.0; n];

        for _ in 0..PERPLEXITY_STEPS {
            let mut sum_p = 0.0;
            for j in 0..n {
                p[j] = if j == i { 0.0 } else { (-row[j] * beta).exp() };
                sum_p += p[j];
            }
            if sum_p == 0.0 {
                sum_p = MACHINE_EPSILON;
            }
            let mut sum_dp = 0.0;
            for j in 0..n {
                p[j] /= sum_p;
                sum_dp += row[j] * p[j];
            }
            let entropy = sum_p.ln() + beta * sum_dp;
            let diff = entropy - target;
            if diff.abs() <= PERPLEXITY_TOL {
                break;
            }
            if diff > 0.0 {
                beta_min = beta;
                beta = if beta_max == f64::INFINITY { beta * 2.0 } else { (beta + beta_max) / 2.0 };
            } else {
                beta_max = beta;
                beta = if beta_min == f64::NEG_INFINITY { beta / 2.0 } else { (beta + beta_min) / 2.0 };
            }
        }
        for j in 0..n {
            cond[[i, j]] = p[j];
        }
    }

    let joint = &cond + &cond.t();
    let total = joint.sum().max(MACHINE_EPSILON);
    joint.mapv(|v| (v / total).max(MACHINE_EPSILON))
}

/// KL gradient w.r.t. the layout `y` (`[N, 2]`).
fn kl_gradient(p: &Array2<f64>, y: &Array2<f64>) -> Array2<f64> {
    let n = y.nrows();
    let mut w = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = y[[i, 0]] - y[[j, 0]];
            let dy = y[[i, 1]] - y[[j, 1]];
            let v = 1.0 / (1.0 + dx * dx + dy * dy);
            w[[i, j]] = v;
            w[[j, i]] = v;
        }
    }
    let sum_w = w.sum().max(MACHINE_EPSILON);

    let mut grad = Array2::<f64>::zeros((n, N_DIMS));
    for (i, mut g) in grad.axis_iter_mut(Axis(0)).enumerate() {
        let (mut gx, mut gy) = (0.0, 0.0);
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (w[[i, j]] / sum_w).max(MACHINE_EPSILON);
            let f = (p[[i, j]] - q) * w[[i, j]];
            gx += f * (y[[i, 0]] - y[[j, 0]]);
            gy += f * (y[[i, 1]] - y[[j, 1]]);
        }
        g[0] = 4.0 * gx;
        g[1] = 4.0 * gy;
    }
    grad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> Array2<f64> {
        // 10 points around +e0 and 10 around +e1 in 5-D.
        Array2::from_shape_fn((20, 5), |(i, j)| {
            let centre = if i < 10 { 0 } else { 1 };
            let base = if j == centre { 5.0 } else { 0.0 };
            base + 0.1 * ((i * 31 + j * 17) % 13) as f64 / 13.0
        })
    }

    #[test]
    fn joint_probabilities_are_symmetric_and_normalised() {
        let d = pairwise_distances(two_clusters().view(), Metric::Euclidean);
        let p = joint_probabilities(&d, 5.0);
        approx::assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-6);
        for i in 0..20 {
            for j in 0..20 {
                approx::assert_abs_diff_eq!(p[[i, j]], p[[j, i]], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn uniform_distances_give_uniform_affinities() {
        // Every neighbour equally far: perplexity n − 1 is met exactly.
        let uniform = Array2::from_shape_fn((6, 6), |(i, j)| if i == j { 0.0 } else { 1.0 });
        let p = joint_probabilities(&uniform, 5.0);
        for i in 0..6 {
            for j in 0..6 {
                if i != j {
                    approx::assert_abs_diff_eq!(p[[i, j]], 1.0 / 30.0, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn cosine_distance_of_parallel_rows_is_zero() {
        let x = ndarray::array![[1.0, 2.0], [2.0, 4.0], [-1.0, -2.0], [0.0, 0.0]];
        let d = pairwise_distances(x.view(), Metric::Cosine);
        approx::assert_abs_diff_eq!(d[[0, 1]], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(d[[0, 2]], 2.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(d[[0, 3]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn clusters_stay_apart() {
        let tsne = Tsne { perplexity: 5.0, n_iter: 500, metric: Metric::Euclidean, ..Tsne::default() };
        let y = tsne.fit(two_clusters().view()).unwrap();
        assert_eq!(y.dim(), (20, 2));
        let centroid = |r: std::ops::Range<usize>| {
            let len = r.len() as f64;
            let (sx, sy) = r.fold((0.0, 0.0), |(sx, sy), i| (sx + y[[i, 0]], sy + y[[i, 1]]));
            (sx / len, sy / len)
        };
        let (ax, ay) = centroid(0..10);
        let (bx, by) = centroid(10..20);
        let between = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
        let spread = |r: std::ops::Range<usize>, cx: f64, cy: f64| {
            r.map(|i| ((y[[i, 0]] - cx).powi(2) + (y[[i, 1]] - cy).powi(2)).sqrt())
                .fold(0.0, f64::max)
        };
        assert!(between > spread(0..10, ax, ay), "clusters overlap");
        assert!(between > spread(10..20, bx, by), "clusters overlap");
    }

    #[test]
    fn same_seed_same_layout() {
        let tsne = Tsne { perplexity: 5.0, n_iter: 300, init: TsneInit::Random, seed: 7, ..Tsne::default() };
        let a = tsne.fit(two_clusters().view()).unwrap();
        let b = tsne.fit(two_clusters().view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn random_layout_is_small_and_seeded() {
        let tsne = Tsne { init: TsneInit::Random, seed: 3, ..Tsne::default() };
        let x = Array2::<f64>::zeros((500, 4));
        let a = tsne.initial_layout(x.view(), &mut StdRng::seed_from_u64(3)).unwrap();
        let b = tsne.initial_layout(x.view(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dim(), (500, 2));
        let std = a.std(0.0);
        assert!(std > 0.8e-4 && std < 1.2e-4, "std {std}");
    }

    #[test]
    fn one_row_is_rejected() {
        let x = Array2::<f64>::zeros((1, 3));
        assert!(matches!(Tsne::default().fit(x.view()), Err(Error::InsufficientTrials(1))));
    }
}
