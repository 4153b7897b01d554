//! Principal component analysis.
//!
//! The data is column-centred, the `F × F` covariance matrix is
//! eigendecomposed (`nalgebra::SymmetricEigen`) and the eigenvectors are
//! sorted by descending eigenvalue. Signs are fixed so that the entry of
//! largest magnitude in every component is positive, which makes the
//! projection fully deterministic.
use std::cmp::Ordering;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{Error, Result};

/// A fitted PCA model.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Column means of the training data, length `F`.
    pub mean: Array1<f64>,
    /// Principal axes, `[k, F]`, one unit vector per row.
    pub components: Array2<f64>,
    /// Variance along each axis (ddof = 1), length `k`.
    pub explained_variance: Array1<f64>,
    /// `explained_variance / total variance`.
    pub explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fit at most `n_components` axes; the effective count is
    /// `min(n_components, n_samples, n_features)`.
    pub fn fit(x: ArrayView2<f64>, n_components: usize) -> Result<Self> {
        let (n, f) = x.dim();
        if n < 2 {
            return Err(Error::InsufficientTrials(n));
        }
        if f == 0 || n_components == 0 {
            return Err(Error::invalid("n_components", "need at least one feature and component"));
        }
        let k = n_components.min(n).min(f);

        let mean = x.mean_axis(Axis(0)).ok_or_else(|| Error::InsufficientTrials(n))?;
        let centred = &x - &mean;
        let cov = centred.t().dot(&centred) / (n as f64 - 1.0);

        let sym = DMatrix::from_fn(f, f, |i, j| cov[[i, j]]);
        let eigen = SymmetricEigen::new(sym);

        let mut order: Vec<(usize, f64)> =
            eigen.eigenvalues.iter().copied().enumerate().collect();
        order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let mut components = Array2::zeros((k, f));
        let mut explained_variance = Array1::zeros(k);
        for (rank, &(idx, value)) in order.iter().take(k).enumerate() {
            let v = eigen.eigenvectors.column(idx);
            let pivot = (0..f)
                .max_by(|&a, &b| v[a].abs().partial_cmp(&v[b].abs()).unwrap_or(Ordering::Equal))
                .unwrap_or(0);
            let sign = if v[pivot] < 0.0 { -1.0 } else { 1.0 };
            for j in 0..f {
                components[[rank, j]] = sign * v[j];
            }
            explained_variance[rank] = value.max(0.0);
        }

        let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let explained_variance_ratio = if total > 0.0 {
            explained_variance.mapv(|v| v / total)
        } else {
            Array1::zeros(k)
        };

        log::debug!("pca: {n} samples × {f} features → {k} components");
        Ok(Self { mean, components, explained_variance, explained_variance_ratio })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Project `x` (`[N, F]`) onto the fitted axes → `[N, k]`.
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(Error::DimensionMismatch {
                row: 0,
                expected: self.mean.len(),
                got: x.ncols(),
            });
        }
        Ok((&x - &self.mean).dot(&self.components.t()))
    }

    /// Fit, then project the training data.
    pub fn fit_transform(x: ArrayView2<f64>, n_components: usize) -> Result<(Self, Array2<f64>)> {
        let pca = Self::fit(x, n_components)?;
        let projected = pca.transform(x)?;
        Ok((pca, projected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn components_are_orthonormal_and_sorted() {
        let x = Array2::from_shape_fn((20, 4), |(i, j)| {
            let t = i as f64;
            match j {
                0 => 3.0 * t,
                1 => t + (t * 1.7).sin(),
                2 => (t * 0.9).cos(),
                _ => 0.1 * (t * 2.3).sin(),
            }
        });
        let pca = Pca::fit(x.view(), 10).unwrap();
        assert_eq!(pca.n_components(), 4);
        let gram = pca.components.dot(&pca.components.t());
        for i in 0..4 {
            for j in 0..4 {
                let want = if i == j { 1.0 } else { 0.0 };
                approx::assert_abs_diff_eq!(gram[[i, j]], want, epsilon = 1e-9);
            }
        }
        for w in pca.explained_variance.as_slice().unwrap().windows(2) {
            assert!(w[0] >= w[1]);
        }
        approx::assert_abs_diff_eq!(pca.explained_variance_ratio.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn line_data_has_one_axis() {
        // Points on y = 2x: one component carries all variance.
        let x = array![[0.0, 0.0], [1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let (pca, proj) = Pca::fit_transform(x.view(), 2).unwrap();
        approx::assert_abs_diff_eq!(pca.explained_variance_ratio[0], 1.0, epsilon = 1e-9);
        let norm = 5.0_f64.sqrt();
        approx::assert_abs_diff_eq!(pca.components[[0, 0]], 1.0 / norm, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(pca.components[[0, 1]], 2.0 / norm, epsilon = 1e-9);
        // Centred projection: -1.5, -0.5, 0.5, 1.5 along the line, scaled by √5.
        approx::assert_abs_diff_eq!(proj[[0, 0]], -1.5 * norm, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(proj[[3, 0]], 1.5 * norm, epsilon = 1e-9);
        for i in 0..4 {
            approx::assert_abs_diff_eq!(proj[[i, 1]], 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn component_count_is_capped() {
        let x = Array2::from_shape_fn((3, 6), |(i, j)| ((i * 7 + j * 3) % 5) as f64);
        let pca = Pca::fit(x.view(), 50).unwrap();
        assert_eq!(pca.n_components(), 3);
    }

    #[test]
    fn single_row_is_rejected() {
        let x = Array2::<f64>::zeros((1, 3));
        assert!(matches!(Pca::fit(x.view(), 2), Err(Error::InsufficientTrials(1))));
    }
}
