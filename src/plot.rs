use crate::timeline::ConcurrencyTimeline;
use std::path::Path;

#[cfg(feature = "plot")]
const PANEL_SIZE: (u32, u32) = (1000, 170);

/// Render one panel per position, first drone in blue and second drone in red.
///
/// Returns whether a file was written.
#[cfg(feature = "plot")]
pub fn render_png(timeline: &ConcurrencyTimeline, path: &Path) -> anyhow::Result<bool> {
    use plotters::prelude::*;

    if timeline.is_empty() {
        tracing::warn!("no samples to plot");
        return Ok(false);
    }

    let rows = timeline.positions.len().max(1);
    let size = (PANEL_SIZE.0, PANEL_SIZE.1 * rows as u32);
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = timeline.span_s().max(1.0);
    let peak = timeline.peak();
    let y_max = f64::from(peak) + 0.5;
    let grid = RGBColor(220, 220, 220);

    for (area, position) in root.split_evenly((rows, 1)).iter().zip(&timeline.positions) {
        let mut chart = ChartBuilder::on(area)
            .margin(12)
            .build_cartesian_2d(0.0..x_max, -0.25..y_max)?;

        // No font backend is enabled, so levels are drawn as plain grid lines
        for level in 0..=peak {
            let y = f64::from(level);
            chart.draw_series(LineSeries::new([(0.0, y), (x_max, y)], &grid))?;
        }

        let xs = timeline.offsets_s.iter().copied();
        chart.draw_series(LineSeries::new(
            xs.clone().zip(position.first.iter().map(|&c| f64::from(c))),
            &BLUE,
        ))?;
        chart.draw_series(LineSeries::new(
            xs.zip(position.second.iter().map(|&c| f64::from(c))),
            &RED,
        ))?;
    }

    root.present()?;
    tracing::info!("flight plot written to {}", path.display());
    Ok(true)
}

#[cfg(not(feature = "plot"))]
pub fn render_png(_timeline: &ConcurrencyTimeline, path: &Path) -> anyhow::Result<bool> {
    tracing::info!(
        "plot output requires 'plot' feature, skipping {}",
        path.display()
    );
    Ok(false)
}
