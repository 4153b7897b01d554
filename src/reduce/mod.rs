//! Dimensionality reduction: PCA followed by t-SNE.
//!
//! - [`pca`]: linear projection onto at most
//!   `min(pca_components, n_trials, n_features)` orthogonal axes.
//! - [`tsne`]: exact 2-D t-SNE of the projected rows.
//!
//! Only neighbourhoods of the resulting embedding are meaningful; absolute
//! coordinates, scale and axis orientation are not.

pub mod pca;
pub mod tsne;

use ndarray::Array2;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureMatrix, FeatureVector};

pub use pca::Pca;
pub use tsne::Tsne;

/// 2-D embedding, row-aligned with the feature matrix it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub ids: Vec<String>,
    /// `[n_trials, 2]`.
    pub points: Array2<f64>,
}

impl Embedding {
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }
}

impl Tsne {
    /// t-SNE parameters of a run configuration.
    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self {
            perplexity: cfg.tsne_perplexity,
            n_iter: cfg.tsne_iterations,
            metric: cfg.tsne_metric,
            early_exaggeration: cfg.tsne_early_exaggeration,
            learning_rate: cfg.tsne_learning_rate,
            init: cfg.tsne_init,
            seed: cfg.random_seed,
        }
    }
}

/// PCA then t-SNE.
///
/// Fails with [`Error::InsufficientTrials`] for fewer than two rows.
pub fn embed(features: &FeatureMatrix, cfg: &AnalysisConfig) -> Result<Embedding> {
    cfg.validate()?;
    let n = features.n_trials();
    if n < 2 {
        return Err(Error::InsufficientTrials(n));
    }
    if features.ids.len() != n {
        return Err(Error::invalid("ids", format!("{} ids for {n} rows", features.ids.len())));
    }
    let (pca, reduced) = Pca::fit_transform(features.data.view(), cfg.pca_components)?;
    log::info!(
        "PCA kept {} of {} dimensions ({:.1}% variance)",
        pca.n_components(),
        features.n_features(),
        100.0 * pca.explained_variance_ratio.sum()
    );
    let points = Tsne::from_config(cfg).fit(reduced.view())?;
    Ok(Embedding { ids: features.ids.clone(), points })
}

/// Embed possibly ragged feature vectors; unequal lengths fail with
/// [`Error::DimensionMismatch`].
pub fn embed_rows(
    ids: Vec<String>,
    rows: &[FeatureVector],
    cfg: &AnalysisConfig,
) -> Result<Embedding> {
    let features = FeatureMatrix::from_rows(ids, rows)?;
    embed(&features, cfg)
}
