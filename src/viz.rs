//! Visualization functions using Plotters for evaluation artifacts and the dashboard

use crate::error::ChurnError;
use crate::evaluate::{ConfusionMatrix, RocCurve};
use crate::report::Segment;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::error::Error;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Fixed file name for the confusion matrix image
pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.png";

/// Fixed file name for the ROC curve image
pub const ROC_CURVE_FILE: &str = "roc_curve.png";

const DIAGONAL_DASHES: usize = 25;

type DrawResult = Result<(), Box<dyn Error>>;

/// Colour used for a risk segment in every chart
pub fn segment_color(segment: Segment) -> RGBColor {
    match segment {
        Segment::HighRisk => RGBColor(214, 39, 40),
        Segment::MediumRisk => RGBColor(255, 127, 14),
        Segment::LowRisk => RGBColor(44, 160, 44),
    }
}

/// Render the confusion matrix as an annotated heat map PNG
///
/// # Arguments
/// * `cm` - Counts indexed `[true][predicted]`
/// * `output_path` - PNG destination; parent directories are created
pub fn render_confusion_matrix(
    cm: &ConfusionMatrix,
    output_path: impl AsRef<Path>,
) -> crate::Result<()> {
    let path = output_path.as_ref();
    ensure_parent_dir(path)?;
    draw_confusion_matrix(cm, path).map_err(|e| ChurnError::render(path, e))?;

    tracing::info!(path = %path.display(), "confusion matrix saved");
    Ok(())
}

fn draw_confusion_matrix(cm: &ConfusionMatrix, path: &Path) -> DrawResult {
    let root = BitMapBackend::new(path, (640, 560)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Confusion Matrix", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0i32..2i32).into_segmented(), (0i32..2i32).into_segmented())?;

    // Row 0 (true label 0) sits at the top, so the y axis is flipped
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Predicted label")
        .y_desc("True label")
        .x_label_formatter(&|v| class_tick(v, false))
        .y_label_formatter(&|v| class_tick(v, true))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let max_count = cm.counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let cells: Vec<(i32, i32, usize)> = (0..2)
        .flat_map(|t| (0..2).map(move |p| (t, p)))
        .map(|(t, p)| (t as i32, p as i32, cm.counts[t][p]))
        .collect();

    chart.draw_series(cells.iter().map(|&(t, p, count)| {
        let y = 1 - t;
        Rectangle::new(
            [
                (SegmentValue::Exact(p), SegmentValue::Exact(y)),
                (SegmentValue::Exact(p + 1), SegmentValue::Exact(y + 1)),
            ],
            blues(count as f64 / max_count).filled(),
        )
    }))?;

    chart.draw_series(cells.iter().map(|&(t, p, count)| {
        let shade = count as f64 / max_count;
        let ink = if shade > 0.5 { WHITE } else { BLACK };
        Text::new(
            count.to_string(),
            (SegmentValue::CenterOf(p), SegmentValue::CenterOf(1 - t)),
            ("sans-serif", 32)
                .into_font()
                .color(&ink)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn class_tick(value: &SegmentValue<i32>, flipped: bool) -> String {
    match value {
        SegmentValue::CenterOf(v) if (0..2).contains(v) => {
            let class = if flipped { 1 - v } else { *v };
            class.to_string()
        }
        _ => String::new(),
    }
}

/// Light-to-dark blue ramp for `shade` in [0, 1]
fn blues(shade: f64) -> RGBColor {
    let t = shade.clamp(0.0, 1.0);
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).round() as u8;
    RGBColor(lerp(247, 8), lerp(251, 48), lerp(255, 107))
}

/// Render the ROC curve PNG with a dashed chance diagonal and the AUC in the legend
pub fn render_roc_curve(roc: &RocCurve, output_path: impl AsRef<Path>) -> crate::Result<()> {
    let path = output_path.as_ref();
    ensure_parent_dir(path)?;
    draw_roc_curve(roc, path).map_err(|e| ChurnError::render(path, e))?;

    tracing::info!(path = %path.display(), auc = roc.auc, "ROC curve saved");
    Ok(())
}

fn draw_roc_curve(roc: &RocCurve, path: &Path) -> DrawResult {
    let root = BitMapBackend::new(path, (640, 560)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("ROC Curve", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, 0f64..1.05f64)?;

    chart
        .configure_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            roc.points.iter().copied(),
            BLUE.stroke_width(2),
        ))?
        .label(format!("AUC = {:.2}", roc.auc))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));

    let dash = 0.5 / DIAGONAL_DASHES as f64;
    chart.draw_series((0..DIAGONAL_DASHES).map(|i| {
        let start = i as f64 / DIAGONAL_DASHES as f64;
        PathElement::new(
            vec![(start, start), (start + dash, start + dash)],
            BLACK.mix(0.6).stroke_width(1),
        )
    }))?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Render segment proportions as an SVG pie chart for embedding in HTML
pub fn segment_pie_svg(counts: &[(Segment, usize)]) -> crate::Result<String> {
    let mut svg = String::new();
    draw_segment_pie(counts, &mut svg).map_err(|e| ChurnError::render("segment_pie.svg", e))?;
    Ok(svg)
}

fn draw_segment_pie(counts: &[(Segment, usize)], buffer: &mut String) -> DrawResult {
    let root = SVGBackend::with_string(buffer, (520, 360)).into_drawing_area();
    root.fill(&WHITE)?;
    let area = root.titled("Customer Risk Segment Distribution", ("sans-serif", 20))?;

    let total: usize = counts.iter().map(|(_, count)| count).sum();
    let (width, height) = area.dim_in_pixel();
    if total == 0 {
        area.draw(&Text::new(
            "No customers in the current selection",
            (20, height as i32 / 2),
            ("sans-serif", 16).into_font(),
        ))?;
        root.present()?;
        return Ok(());
    }

    let radius = (height.min(width) as f64 / 2.0 - 20.0).max(10.0);
    let center = (radius + 20.0, height as f64 / 2.0);
    let mut start = -PI / 2.0;

    for &(segment, count) in counts.iter().filter(|(_, count)| *count > 0) {
        let share = count as f64 / total as f64;
        let sweep = 2.0 * PI * share;
        let steps = ((sweep / (2.0 * PI)) * 120.0).ceil().max(2.0) as usize;

        let mut outline = vec![to_pixel(center)];
        outline.extend((0..=steps).map(|k| {
            let angle = start + sweep * k as f64 / steps as f64;
            to_pixel((center.0 + radius * angle.cos(), center.1 + radius * angle.sin()))
        }));
        area.draw(&Polygon::new(outline, segment_color(segment).filled()))?;

        let mid = start + sweep / 2.0;
        area.draw(&Text::new(
            format!("{:.1}%", share * 100.0),
            to_pixel((
                center.0 + 0.6 * radius * mid.cos(),
                center.1 + 0.6 * radius * mid.sin(),
            )),
            ("sans-serif", 14)
                .into_font()
                .color(&WHITE)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        ))?;

        start += sweep;
    }

    let legend_x = (2.0 * radius + 60.0) as i32;
    for (i, &(segment, count)) in counts.iter().enumerate() {
        let y = 30 + i as i32 * 24;
        area.draw(&Rectangle::new(
            [(legend_x, y), (legend_x + 14, y + 14)],
            segment_color(segment).filled(),
        ))?;
        area.draw(&Text::new(
            format!("{segment} ({count})"),
            (legend_x + 22, y),
            ("sans-serif", 14).into_font(),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn to_pixel((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn ensure_parent_dir(path: &Path) -> crate::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| ChurnError::render(path, e)),
        None => Ok(()),
    }
}
