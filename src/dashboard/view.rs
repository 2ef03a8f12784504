//! In-memory dashboard view: segment filter, summary and sorted rows

use crate::error::ChurnError;
use crate::report::{segment_counts, write_report_to, ReportRow, Segment};

/// File name offered for the filtered export
pub const EXPORT_FILE: &str = "filtered_predictions.csv";

/// Query key carrying a selected segment (repeatable)
pub const SEGMENT_PARAM: &str = "segment";

/// Query key marking an explicit selection, so that "nothing selected"
/// differs from "use the default"
pub const APPLIED_PARAM: &str = "applied";

/// Segments present in the report, in order of first appearance
pub fn available_segments(rows: &[ReportRow]) -> Vec<Segment> {
    let mut seen = Vec::new();
    for row in rows {
        if !seen.contains(&row.segment) {
            seen.push(row.segment);
        }
    }
    seen
}

/// Set-membership predicate over segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFilter {
    selected: Vec<Segment>,
}

impl SegmentFilter {
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut selected = Vec::new();
        for segment in segments {
            if !selected.contains(&segment) {
                selected.push(segment);
            }
        }
        Self { selected }
    }

    /// Default selection: every segment present in the report
    pub fn all_present(rows: &[ReportRow]) -> Self {
        Self::new(available_segments(rows))
    }

    pub fn none() -> Self {
        Self::new([])
    }

    /// Build a filter from a URL query string.
    ///
    /// Without the `applied` marker the default filter is used; otherwise
    /// exactly the listed segments are selected (possibly none).
    pub fn from_query(query: Option<&str>, rows: &[ReportRow]) -> crate::Result<Self> {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.unwrap_or("").as_bytes())
            .into_owned()
            .collect();

        if !pairs.iter().any(|(key, _)| key == APPLIED_PARAM) {
            return Ok(Self::all_present(rows));
        }

        let segments = pairs
            .iter()
            .filter(|(key, _)| key == SEGMENT_PARAM)
            .map(|(_, value)| value.parse::<Segment>().map_err(ChurnError::Config))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self::new(segments))
    }

    /// Encode the selection so it can be replayed (e.g. by the export link)
    pub fn to_query(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair(APPLIED_PARAM, "1");
        for segment in &self.selected {
            serializer.append_pair(SEGMENT_PARAM, segment.as_str());
        }
        serializer.finish()
    }

    pub fn contains(&self, segment: Segment) -> bool {
        self.selected.contains(&segment)
    }

    pub fn selected(&self) -> &[Segment] {
        &self.selected
    }

    /// Rows whose segment is selected, in their original order
    pub fn apply(&self, rows: &[ReportRow]) -> Vec<ReportRow> {
        rows.iter()
            .filter(|row| self.contains(row.segment))
            .cloned()
            .collect()
    }
}

/// Everything one dashboard page shows, recomputed per request
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub available: Vec<Segment>,
    pub filter: SegmentFilter,
    /// Filtered rows in report order (what the export contains)
    pub filtered: Vec<ReportRow>,
    /// Filtered rows by churn probability, highest first
    pub by_probability: Vec<ReportRow>,
    pub summary: Vec<(Segment, usize)>,
    pub total_rows: usize,
}

impl DashboardView {
    pub fn build(rows: &[ReportRow], filter: SegmentFilter) -> Self {
        let filtered = filter.apply(rows);
        let mut by_probability = filtered.clone();
        sort_by_probability_desc(&mut by_probability);

        Self {
            available: available_segments(rows),
            summary: segment_counts(&filtered),
            filter,
            filtered,
            by_probability,
            total_rows: rows.len(),
        }
    }

    /// Filtered rows as a CSV export with the report's columns
    pub fn export_csv(&self) -> crate::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        write_report_to(&self.filtered, &mut buffer).map_err(|e| ChurnError::persist(EXPORT_FILE, e))?;
        Ok(buffer)
    }
}

/// Stable sort, highest churn probability first
pub fn sort_by_probability_desc(rows: &mut [ReportRow]) {
    rows.sort_by(|a, b| b.churn_probability.total_cmp(&a.churn_probability));
}
