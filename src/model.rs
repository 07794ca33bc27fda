//! Pre-fitted scaling and K-Means scoring.
//!
//! The scaler and the clustering model arrive as small JSON artifacts
//! produced by an external training pipeline. This module loads them,
//! validates them once at startup, and applies them to feature matrices.
//! Their parameters are never mutated after loading.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use ndarray::{Array2, ArrayView1, Axis};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// On-disk shape of `scaler.json`.
#[derive(Debug, Deserialize)]
struct ScalerParams {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// On-disk shape of `kmeans.json`. Centers live in scaled feature space.
#[derive(Debug, Deserialize)]
struct KMeansParams {
    cluster_centers: Vec<Vec<f64>>,
}

/// Mean/variance normalization with externally fitted parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    /// Per-feature mean, in feature-column order.
    pub mean: Vec<f64>,
    /// Per-feature standard deviation, same order.
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Build a scaler from explicit parameters, rejecting anything the
    /// transform could not apply safely.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> anyhow::Result<Self> {
        if mean.is_empty() {
            bail!("scaler parameters are empty");
        }
        if mean.len() != scale.len() {
            bail!("scaler has {} means but {} scales", mean.len(), scale.len());
        }
        if mean.iter().any(|v| !v.is_finite()) {
            bail!("scaler means must be finite");
        }
        if scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            bail!("scaler scales must be finite and positive");
        }
        Ok(StandardScaler { mean, scale })
    }

    /// Fit mean and standard deviation column-wise. Zero-variance columns
    /// get a scale of 1.0 so the transform stays defined.
    ///
    /// Production artifacts are fitted elsewhere; this exists for tests and
    /// ad-hoc tooling.
    pub fn fit(features: &Array2<f64>) -> Self {
        let n = features.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(features.ncols());
        let mut scale = Vec::with_capacity(features.ncols());

        for column in features.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let variance = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = variance.sqrt();
            mean.push(m);
            scale.push(if s > 0.0 { s } else { 1.0 });
        }

        StandardScaler { mean, scale }
    }

    /// Load and validate scaler parameters from a JSON artifact.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scaler parameters from {}", path.display()))?;
        let params: ScalerParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing scaler parameters in {}", path.display()))?;
        Self::new(params.mean, params.scale)
            .with_context(|| format!("invalid scaler parameters in {}", path.display()))
    }

    /// Apply `(x - mean) / scale` column-wise. Row order and row count are
    /// preserved.
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(PipelineError::Model(format!(
                "scaler expects {} features per row, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        let mut scaled = features.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - m) / s);
        }
        Ok(scaled)
    }

    /// Dimensionality the scaler was fitted for.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// K-Means model reduced to what scoring needs: its centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Cluster centroids in scaled feature space, shape `(k, n_features)`.
    pub centroids: Array2<f64>,
}

impl KMeansModel {
    /// Wrap a centroid matrix, rejecting empty or non-finite ones.
    pub fn new(centroids: Array2<f64>) -> anyhow::Result<Self> {
        if centroids.nrows() == 0 || centroids.ncols() == 0 {
            bail!("model has no cluster centers");
        }
        if centroids.iter().any(|v| !v.is_finite()) {
            bail!("model cluster centers must be finite");
        }
        Ok(KMeansModel { centroids })
    }

    /// Load and validate a centroid matrix from a JSON artifact.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading model parameters from {}", path.display()))?;
        let params: KMeansParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing model parameters in {}", path.display()))?;

        let k = params.cluster_centers.len();
        if k == 0 {
            bail!("model artifact {} has no cluster centers", path.display());
        }
        let dims = params.cluster_centers[0].len();
        if params.cluster_centers.iter().any(|c| c.len() != dims) {
            bail!(
                "model artifact {} has cluster centers of unequal dimension",
                path.display()
            );
        }

        let flat: Vec<f64> = params.cluster_centers.into_iter().flatten().collect();
        let centroids = Array2::from_shape_vec((k, dims), flat)
            .with_context(|| format!("invalid centroid matrix in {}", path.display()))?;
        Self::new(centroids).with_context(|| format!("invalid model parameters in {}", path.display()))
    }

    /// Assign each row to its nearest centroid by squared Euclidean
    /// distance, preserving row order.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<u32>> {
        if features.ncols() != self.n_features() {
            return Err(PipelineError::Model(format!(
                "model expects {} features per row, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        Ok(features.outer_iter().map(|row| self.nearest(row)).collect())
    }

    fn nearest(&self, row: ArrayView1<f64>) -> u32 {
        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0u32;

        for (cluster_idx, centroid) in self.centroids.outer_iter().enumerate() {
            let distance: f64 = row
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx as u32;
            }
        }

        closest_cluster
    }

    /// Count rows per cluster for a set of predicted labels.
    pub fn cluster_sizes(&self, labels: &[u32]) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in labels {
            if (label as usize) < sizes.len() {
                sizes[label as usize] += 1;
            }
        }
        sizes
    }

    /// Number of clusters the model was trained with.
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Dimensionality the model was trained for.
    pub fn n_features(&self) -> usize {
        self.centroids.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn two_cluster_model() -> KMeansModel {
        KMeansModel::new(array![[0.0, 0.0], [10.0, 10.0]]).unwrap()
    }

    #[test]
    fn test_fit_and_transform() {
        let features = array![[1.0, 10.0], [3.0, 30.0]];
        let scaler = StandardScaler::fit(&features);

        assert_eq!(scaler.mean, vec![2.0, 20.0]);
        assert_eq!(scaler.scale, vec![1.0, 10.0]);

        let scaled = scaler.transform(&features).unwrap();
        assert_eq!(scaled, array![[-1.0, -1.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_fit_zero_variance_column() {
        let features = array![[5.0, 1.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(&features);

        assert_eq!(scaler.scale[0], 1.0);
        let scaled = scaler.transform(&features).unwrap();
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_transform_dimension_mismatch() {
        let scaler = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let features = array![[1.0, 2.0, 3.0]];

        let err = scaler.transform(&features).unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }

    #[test]
    fn test_scaler_rejects_bad_parameters() {
        assert!(StandardScaler::new(vec![], vec![]).is_err());
        assert!(StandardScaler::new(vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(StandardScaler::new(vec![0.0], vec![0.0]).is_err());
        assert!(StandardScaler::new(vec![0.0], vec![-1.0]).is_err());
        assert!(StandardScaler::new(vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn test_predict_nearest_centroid() {
        let model = two_cluster_model();
        let features = array![[1.0, 1.0], [9.0, 9.0], [0.0, 0.0]];

        let labels = model.predict(&features).unwrap();
        assert_eq!(labels, vec![0, 1, 0]);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let model = two_cluster_model();
        let features = array![[2.0, 3.0], [8.0, 7.0], [5.0, 5.0]];

        let first = model.predict(&features).unwrap();
        let second = model.predict(&features).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let model = two_cluster_model();
        let features = array![[1.0], [2.0]];

        let err = model.predict(&features).unwrap_err();
        assert!(matches!(err, PipelineError::Model(_)));
    }

    #[test]
    fn test_cluster_sizes() {
        let model = two_cluster_model();
        let sizes = model.cluster_sizes(&[0, 1, 0, 0]);

        assert_eq!(sizes, vec![3, 1]);
        assert_eq!(sizes.iter().sum::<usize>(), 4);
    }

    #[test]
    fn test_model_rejects_bad_centroids() {
        assert!(KMeansModel::new(Array2::zeros((0, 2))).is_err());
        assert!(KMeansModel::new(array![[f64::INFINITY, 0.0]]).is_err());
    }

    #[test]
    fn test_load_artifacts_from_json() {
        let mut scaler_file = NamedTempFile::new().unwrap();
        write!(scaler_file, r#"{{"mean": [60.5, 50.2], "scale": [26.2, 25.8]}}"#).unwrap();
        let scaler = StandardScaler::from_json_file(scaler_file.path()).unwrap();
        assert_eq!(scaler.n_features(), 2);

        let mut model_file = NamedTempFile::new().unwrap();
        write!(
            model_file,
            r#"{{"cluster_centers": [[0.0, 0.0], [1.0, 1.0], [-1.0, 1.0]]}}"#
        )
        .unwrap();
        let model = KMeansModel::from_json_file(model_file.path()).unwrap();
        assert_eq!(model.n_clusters(), 3);
        assert_eq!(model.n_features(), 2);
    }

    #[test]
    fn test_load_rejects_malformed_artifacts() {
        let mut not_json = NamedTempFile::new().unwrap();
        write!(not_json, "centroids go here").unwrap();
        assert!(KMeansModel::from_json_file(not_json.path()).is_err());

        let mut ragged = NamedTempFile::new().unwrap();
        write!(ragged, r#"{{"cluster_centers": [[0.0, 0.0], [1.0]]}}"#).unwrap();
        assert!(KMeansModel::from_json_file(ragged.path()).is_err());

        let mut empty = NamedTempFile::new().unwrap();
        write!(empty, r#"{{"cluster_centers": []}}"#).unwrap();
        assert!(KMeansModel::from_json_file(empty.path()).is_err());
    }
}
