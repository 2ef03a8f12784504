//! HTML rendering of the dashboard page

use super::view::{DashboardView, APPLIED_PARAM, SEGMENT_PARAM};
use crate::report::Segment;
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;margin:0;display:flex}\
aside{width:240px;padding:16px;background:#f4f5f7;min-height:100vh}\
main{padding:16px 32px;flex:1}\
table{border-collapse:collapse;margin-bottom:24px}\
th,td{border:1px solid #ddd;padding:4px 8px;text-align:right}\
th{background:#fafafa}\
td.text{text-align:left}\
img{max-width:640px;display:block;margin-bottom:8px}";

/// Render the full dashboard page for one view
pub fn render_page(view: &DashboardView, pie_svg: &str) -> String {
    let mut html = String::with_capacity(16 * 1024);
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    html.push_str("<title>Retail Churn Prediction Dashboard</title>");
    let _ = write!(html, "<style>{STYLE}</style></head><body>");

    render_sidebar(&mut html, view);

    html.push_str("<main><h1>Retail Churn Prediction Dashboard</h1>");
    let _ = write!(
        html,
        "<p>Showing {} of {} customers.</p>",
        view.filtered.len(),
        view.total_rows
    );

    html.push_str("<h2>Customer Segments Summary</h2>");
    render_summary(&mut html, &view.summary);
    html.push_str(pie_svg);

    html.push_str("<h2>Prediction Results</h2>");
    render_rows(&mut html, view);
    let _ = write!(
        html,
        "<p><a href=\"/download?{}\" download>Download Filtered Predictions</a></p>",
        escape(&view.filter.to_query())
    );

    html.push_str("<h2>Evaluation Plots</h2>");
    html.push_str("<figure><img src=\"/images/confusion_matrix.png\" alt=\"Confusion Matrix\">");
    html.push_str("<figcaption>Confusion Matrix</figcaption></figure>");
    html.push_str("<figure><img src=\"/images/roc_curve.png\" alt=\"ROC Curve\">");
    html.push_str("<figcaption>ROC Curve</figcaption></figure>");

    html.push_str("</main></body></html>");
    html
}

fn render_sidebar(html: &mut String, view: &DashboardView) {
    html.push_str("<aside><h2>Filter Customers</h2><form method=\"get\" action=\"/\">");
    let _ = write!(html, "<input type=\"hidden\" name=\"{APPLIED_PARAM}\" value=\"1\">");
    html.push_str("<fieldset><legend>Select Risk Segment</legend>");
    for segment in &view.available {
        let checked = if view.filter.contains(*segment) {
            " checked"
        } else {
            ""
        };
        let _ = write!(
            html,
            "<label><input type=\"checkbox\" name=\"{SEGMENT_PARAM}\" value=\"{0}\"{checked}> {0}</label><br>",
            segment.as_str()
        );
    }
    html.push_str("</fieldset><button type=\"submit\">Apply</button></form>");
    html.push_str(
        "<form method=\"post\" action=\"/cache/invalidate\">\
         <button type=\"submit\">Reload report</button></form></aside>",
    );
}

fn render_summary(html: &mut String, summary: &[(Segment, usize)]) {
    html.push_str("<table><thead><tr><th>Segment</th><th>Count</th></tr></thead><tbody>");
    for (segment, count) in summary {
        let _ = write!(
            html,
            "<tr><td class=\"text\">{segment}</td><td>{count}</td></tr>"
        );
    }
    html.push_str("</tbody></table>");
}

fn render_rows(html: &mut String, view: &DashboardView) {
    html.push_str("<table><thead><tr>");
    for column in [
        "CustomerID",
        "Recency",
        "Frequency",
        "Monetary",
        "TrueLabel",
        "PredictedLabel",
        "ChurnProbability",
        "Segment",
        "SuggestedAction",
    ] {
        let _ = write!(html, "<th>{column}</th>");
    }
    html.push_str("</tr></thead><tbody>");

    for row in &view.by_probability {
        let _ = write!(
            html,
            "<tr><td class=\"text\">{}</td><td>{}</td><td>{}</td><td>{:.2}</td>\
             <td>{}</td><td>{}</td><td>{:.2}</td><td class=\"text\">{}</td><td class=\"text\">{}</td></tr>",
            escape(&row.customer_id),
            row.recency,
            row.frequency,
            row.monetary,
            row.true_label,
            row.predicted_label,
            row.churn_probability,
            row.segment,
            row.suggested_action,
        );
    }
    html.push_str("</tbody></table>");
}

/// Minimal escaping for text and attribute values
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
