//! Upload processing: parse, validate, scale, score, and render artifacts.
//!
//! [`Pipeline`] owns the pre-fitted scaler and model and turns raw upload
//! bytes into an [`UploadReport`]. It has no HTTP or HTML awareness; the
//! server and page layers sit on top of it.

use std::path::Path;

use anyhow::bail;
use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::data::{self, REQUIRED_COLUMNS};
use crate::error::Result;
use crate::model::{KMeansModel, StandardScaler};
use crate::viz;

/// Everything there is to say about one processed upload.
#[derive(Debug)]
pub struct UploadReport {
    /// The parsed upload exactly as received.
    pub table: DataFrame,
    /// What became of it.
    pub outcome: Outcome,
}

/// Result of schema checking and scoring an upload.
///
/// A missing-column upload is a handled outcome, not an error: the parsed
/// table is still available for preview either way.
#[derive(Debug)]
pub enum Outcome {
    /// The upload was scored end to end.
    Segmented(Segmentation),
    /// Required columns were absent; scoring was skipped.
    MissingColumns { missing: Vec<String> },
}

/// Artifacts of a successful scoring pass.
#[derive(Debug)]
pub struct Segmentation {
    /// The upload with the `Cluster` column appended.
    pub table: DataFrame,
    /// Predicted labels, one per input row, in input order.
    pub labels: Vec<u32>,
    /// Scatter chart of the raw feature columns, as SVG markup.
    pub chart_svg: String,
    /// The clustered table serialized as CSV with a header row.
    pub csv: Vec<u8>,
}

/// Pre-fitted scaler and model, loaded once and shared across uploads.
#[derive(Debug)]
pub struct Pipeline {
    scaler: StandardScaler,
    model: KMeansModel,
}

impl Pipeline {
    /// Pair a scaler and model, rejecting artifacts that disagree with
    /// each other or with the upload schema.
    pub fn new(scaler: StandardScaler, model: KMeansModel) -> anyhow::Result<Self> {
        if scaler.n_features() != model.n_features() {
            bail!(
                "scaler covers {} features but model expects {}",
                scaler.n_features(),
                model.n_features()
            );
        }
        if scaler.n_features() != REQUIRED_COLUMNS.len() {
            bail!(
                "artifacts cover {} features but uploads provide {}",
                scaler.n_features(),
                REQUIRED_COLUMNS.len()
            );
        }
        Ok(Pipeline { scaler, model })
    }

    /// Load both artifacts from JSON files and pair them.
    pub fn load(scaler_path: &Path, model_path: &Path) -> anyhow::Result<Self> {
        let scaler = StandardScaler::from_json_file(scaler_path)?;
        let model = KMeansModel::from_json_file(model_path)?;
        Self::new(scaler, model)
    }

    /// Number of clusters the loaded model scores into.
    pub fn n_clusters(&self) -> usize {
        self.model.n_clusters()
    }

    /// Rows per cluster for a set of predicted labels, indexed by label.
    pub fn cluster_sizes(&self, labels: &[u32]) -> Vec<usize> {
        self.model.cluster_sizes(labels)
    }

    /// Parse one upload's raw bytes into a table.
    ///
    /// Kept separate from [`Pipeline::segment`] so callers can still show
    /// what was uploaded when scoring fails after this point.
    pub fn parse(&self, bytes: &[u8]) -> Result<DataFrame> {
        let table = data::read_csv(bytes)?;
        debug!(rows = table.height(), columns = table.width(), "parsed upload");
        Ok(table)
    }

    /// Schema-check and score an already-parsed table.
    ///
    /// A schema miss is reported in the `Ok` path as
    /// [`Outcome::MissingColumns`]; scoring failures carry the taxonomy
    /// from [`crate::error::PipelineError`].
    pub fn segment(&self, table: &DataFrame) -> Result<Outcome> {
        let missing = data::missing_required_columns(table);
        if !missing.is_empty() {
            info!(?missing, "upload rejected, required columns absent");
            return Ok(Outcome::MissingColumns { missing });
        }

        let features = data::feature_matrix(table)?;
        let scaled = self.scaler.transform(&features)?;
        let labels = self.model.predict(&scaled)?;

        let clustered = data::with_cluster_column(table, &labels)?;

        // The chart plots raw values, not scaled ones.
        let income: Vec<f64> = features.column(0).to_vec();
        let spending: Vec<f64> = features.column(1).to_vec();
        let chart_svg = viz::cluster_scatter_svg(
            &income,
            &spending,
            &labels,
            REQUIRED_COLUMNS[0],
            REQUIRED_COLUMNS[1],
        )?;

        let csv = data::to_csv_bytes(&clustered)?;
        info!(
            rows = clustered.height(),
            clusters = self.n_clusters(),
            "upload segmented"
        );

        Ok(Outcome::Segmented(Segmentation {
            table: clustered,
            labels,
            chart_svg,
            csv,
        }))
    }

    /// Process one upload from raw bytes.
    ///
    /// Steps: parse CSV, check required columns, extract features, scale,
    /// predict, append the cluster column, render the chart, serialize the
    /// download CSV. Row order is preserved throughout.
    pub fn handle_upload(&self, bytes: &[u8]) -> Result<UploadReport> {
        let table = self.parse(bytes)?;
        let outcome = self.segment(&table)?;
        Ok(UploadReport { table, outcome })
    }
}
