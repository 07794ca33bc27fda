//! Segview: customer segmentation behind a CSV upload page.
//!
//! A pre-fitted standard scaler and K-Means model are loaded from JSON
//! artifacts at startup. Uploaded CSVs are schema-checked, scaled, scored,
//! and returned as an HTML report with a cluster scatter chart and a
//! downloadable clustered CSV.

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod page;
pub mod pipeline;
pub mod server;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use error::{PipelineError, Result};
pub use model::{KMeansModel, StandardScaler};
pub use pipeline::{Outcome, Pipeline, Segmentation, UploadReport};
