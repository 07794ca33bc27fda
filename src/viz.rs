//! Cluster scatter plots rendered to SVG with Plotters.

use std::collections::BTreeMap;

use plotters::prelude::*;

use crate::error::{PipelineError, Result};

/// Color palette for cluster series (Set1). Labels beyond the palette
/// fall back to black.
const CLUSTER_COLORS: [RGBColor; 9] = [
    RGBColor(228, 26, 28),
    RGBColor(55, 126, 184),
    RGBColor(77, 175, 74),
    RGBColor(152, 78, 163),
    RGBColor(255, 127, 0),
    RGBColor(255, 255, 51),
    RGBColor(166, 86, 40),
    RGBColor(247, 129, 191),
    RGBColor(153, 153, 153),
];

const CHART_SIZE: (u32, u32) = (800, 600);

/// Render a scatter plot of raw feature values colored by cluster label,
/// returned as standalone SVG markup.
///
/// Points are grouped into one series per cluster so the legend lists each
/// cluster once. Empty input produces a placeholder chart rather than an
/// error.
pub fn cluster_scatter_svg(
    x: &[f64],
    y: &[f64],
    labels: &[u32],
    x_label: &str,
    y_label: &str,
) -> Result<String> {
    if x.len() != y.len() || x.len() != labels.len() {
        return Err(PipelineError::Internal(format!(
            "scatter inputs disagree: {} x values, {} y values, {} labels",
            x.len(),
            y.len(),
            labels.len()
        )));
    }

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        if x.is_empty() {
            root.draw(&Text::new(
                "No rows to plot",
                (340, 290),
                ("sans-serif", 20),
            ))?;
            root.present()?;
        } else {
            let (x_min, x_max) = padded_bounds(x);
            let (y_min, y_max) = padded_bounds(y);

            let mut chart = ChartBuilder::on(&root)
                .caption("Customer Clusters", ("sans-serif", 30))
                .margin(10)
                .x_label_area_size(50)
                .y_label_area_size(60)
                .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

            chart
                .configure_mesh()
                .x_desc(x_label)
                .y_desc(y_label)
                .axis_desc_style(("sans-serif", 15))
                .draw()?;

            let mut by_cluster: BTreeMap<u32, Vec<(f64, f64)>> = BTreeMap::new();
            for ((&px, &py), &label) in x.iter().zip(y.iter()).zip(labels.iter()) {
                by_cluster.entry(label).or_default().push((px, py));
            }

            for (&label, points) in &by_cluster {
                let color = cluster_color(label);
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|&(px, py)| Circle::new((px, py), 4, color.filled())),
                    )?
                    .label(format!("Cluster {label}"))
                    .legend(move |(lx, ly)| Circle::new((lx + 5, ly), 4, color.filled()));
            }

            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;

            root.present()?;
        }
    }

    Ok(svg)
}

fn cluster_color(label: u32) -> RGBColor {
    CLUSTER_COLORS.get(label as usize).copied().unwrap_or(BLACK)
}

/// Axis bounds with 5% padding, widened to a unit band when the values
/// are all equal.
fn padded_bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}
