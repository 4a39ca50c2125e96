//! Feature importance bar chart

use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::error::{RentError, Result};
use crate::tracking::ActiveRun;
use crate::training::FeatureImportance;

/// File name of the rendered chart
pub const IMPORTANCE_CHART: &str = "feature_importance.svg";

/// Bars beyond this many are left off the chart
const MAX_BARS: usize = 40;

fn chart_err<E: std::fmt::Display>(e: E) -> RentError {
    RentError::ChartError(e.to_string())
}

/// Render a horizontal bar chart of `importances`, largest bar on top
pub fn plot_feature_importance(names: &[String], importances: &[f64], path: &Path) -> Result<()> {
    if names.len() != importances.len() {
        return Err(RentError::ShapeError {
            expected: format!("{} importances", names.len()),
            actual: format!("{} importances", importances.len()),
        });
    }
    if names.is_empty() {
        return Err(RentError::ChartError("no features to plot".to_string()));
    }

    let mut bars: Vec<(&str, f64)> = names
        .iter()
        .map(String::as_str)
        .zip(importances.iter().copied())
        .collect();
    bars.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    bars.truncate(MAX_BARS);
    // y grows upwards
    bars.reverse();

    let n = bars.len();
    let top = bars.iter().map(|b| b.1).fold(0.0, f64::max);
    let x_max = if top > 0.0 { top * 1.1 } else { 1.0 };
    let label_width = bars.iter().map(|b| b.0.len()).max().unwrap_or(0) as u32 * 7 + 16;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = SVGBackend::new(path, (960, 120 + 24 * n as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(12)
        .caption("Feature importance", ("sans-serif", 22))
        .x_label_area_size(36)
        .y_label_area_size(label_width)
        .build_cartesian_2d(0f64..x_max, (0..n).into_segmented())
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Importance")
        .y_labels(n)
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => bars.get(*i).map(|b| b.0.to_string()).unwrap_or_default(),
            _ => String::new(),
        })
        .label_style(("sans-serif", 13))
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, &(_, value))| {
            let mut bar = Rectangle::new(
                [(0.0, SegmentValue::Exact(i)), (value, SegmentValue::Exact(i + 1))],
                BLUE.mix(0.7).filled(),
            );
            bar.set_margin(3, 3, 0, 0);
            bar
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Plot the model's importances into `artifact_dir` and log the chart to the run
pub fn log_feature_importance<M: FeatureImportance>(
    run: &mut ActiveRun,
    feature_names: &[String],
    model: &M,
    artifact_dir: &Path,
) -> Result<PathBuf> {
    let importances = model.feature_importances().ok_or(RentError::ModelNotFitted)?;
    let path = artifact_dir.join(IMPORTANCE_CHART);

    plot_feature_importance(feature_names, importances, &path)?;
    run.log_artifact(&path, None)?;

    tracing::debug!(chart = %path.display(), "feature importance chart logged");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plot_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts").join(IMPORTANCE_CHART);
        let names = vec!["size".to_string(), "bhk".to_string(), "city_Mumbai".to_string()];

        plot_feature_importance(&names, &[0.5, 0.2, 0.3], &path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("city_Mumbai"));
    }

    #[test]
    fn test_plot_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(IMPORTANCE_CHART);
        let names = vec!["size".to_string()];
        assert!(plot_feature_importance(&names, &[0.5, 0.5], &path).is_err());
        assert!(plot_feature_importance(&[], &[], &path).is_err());
    }
}
