//! Command-line interface definitions and argument parsing

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Customer segmentation over HTTP: upload a CSV, get clusters back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to serve the upload page on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Path to the fitted scaler artifact (JSON)
    #[arg(long, default_value = "models/scaler.json")]
    pub scaler: PathBuf,

    /// Path to the fitted K-Means artifact (JSON)
    #[arg(long, default_value = "models/kmeans.json")]
    pub model: PathBuf,

    /// Score a local CSV file and exit instead of serving
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where batch mode writes the clustered CSV
    #[arg(short, long, default_value = "clustered_customers.csv")]
    pub export: PathBuf,

    /// Where batch mode writes the cluster plot (SVG)
    #[arg(short, long, default_value = "cluster_plot.svg")]
    pub plot: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
