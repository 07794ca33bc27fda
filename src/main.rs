//! Segview: customer segmentation behind a CSV upload page.
//!
//! The entrypoint loads the pre-fitted artifacts once, then either serves
//! the upload page over HTTP or, with `--input`, scores a local file and
//! writes the clustered CSV and plot next to it.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use segview::{data, page, server, Args, Outcome, Pipeline};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let pipeline = Pipeline::load(&args.scaler, &args.model)
        .context("loading model artifacts")?;
    info!(clusters = pipeline.n_clusters(), "artifacts loaded");

    if let Some(input) = &args.input {
        run_batch(&args, input, &pipeline)
    } else {
        server::serve(args.addr, pipeline).await
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "segview=debug,tower_http=debug"
    } else {
        "segview=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Score one local CSV file end to end and write the outputs to disk.
fn run_batch(args: &Args, input: &Path, pipeline: &Pipeline) -> Result<()> {
    println!("=== Customer Segmentation ===\n");
    let start_time = Instant::now();

    if args.verbose {
        println!("Input file: {}", input.display());
    }

    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let table = pipeline.parse(&bytes)?;

    println!("✓ Data loaded: {} rows", table.height());
    println!("\nUploaded data preview:");
    println!("{}", table.head(Some(data::PREVIEW_ROWS)));

    // Preview first; a scoring failure past this point leaves it on screen,
    // the same order the web page renders.
    let segmentation = match pipeline.segment(&table)? {
        Outcome::Segmented(segmentation) => segmentation,
        Outcome::MissingColumns { .. } => {
            anyhow::bail!(
                "the input file must contain the following columns: {}",
                page::python_list(&data::REQUIRED_COLUMNS)
            );
        }
    };

    println!("✓ Rows assigned to {} clusters", pipeline.n_clusters());
    println!("\nClustered data preview:");
    println!("{}", segmentation.table.head(Some(data::PREVIEW_ROWS)));

    println!("=== Cluster Statistics ===");
    let total = segmentation.labels.len().max(1);
    for (label, &size) in pipeline
        .cluster_sizes(&segmentation.labels)
        .iter()
        .enumerate()
    {
        let percentage = (size as f64 / total as f64) * 100.0;
        println!("Cluster {label}: {size} rows ({percentage:.1}%)");
    }

    fs::write(&args.export, &segmentation.csv)
        .with_context(|| format!("writing {}", args.export.display()))?;
    println!("\n✓ Clustered data saved to: {}", args.export.display());

    fs::write(&args.plot, segmentation.chart_svg.as_bytes())
        .with_context(|| format!("writing {}", args.plot.display()))?;
    println!("✓ Cluster plot saved to: {}", args.plot.display());

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
