//! Clinical-history JSON to `AnalysisSnapshot`: DMT classification, patient
//! timeline and EDSS milestones, plus history filtering, patient overview,
//! cohort and critical-case analytics.

use serde_json::Value;
use tracing::debug;

use historia_core::{AnalysisError, AnalysisSnapshot};

pub mod classify;
pub mod cohort;
pub mod critical;
pub mod document;
pub mod filter;
pub mod milestones;
pub mod timeline;

pub use classify::{canonical_dmt_name, classify_treatments, normalize_text, Classification};
pub use cohort::{compare_cohort_value, compare_medications};
pub use critical::detect_critical_cases;
pub use document::{
    HistoryDraft, HistoryRecord, HistorySummary, PatientSummary, TreatmentEntry,
};
pub use filter::{filter_histories, filter_histories_at, HistoryFilters};
pub use milestones::{aggregate_milestones, diff_months};
pub use timeline::{build_timeline, patient_overview};

/// Analyze one patient's histories from a JSON string.
pub fn summarize_histories_str(histories_json: &str) -> Result<AnalysisSnapshot, AnalysisError> {
    let value: Value = serde_json::from_str(histories_json)
        .map_err(|err| AnalysisError::Parse(err.to_string()))?;
    summarize_histories_value(&value)
}

/// Analyze one patient's histories from a `serde_json::Value`: an array (or
/// `{ "items": [...] }`) of draft envelopes or flattened records.
pub fn summarize_histories_value(histories: &Value) -> Result<AnalysisSnapshot, AnalysisError> {
    let records = document::records_from_value(histories)?;
    analyze_records(&records)
}

/// Run the whole pipeline. An empty input has nothing to show and is
/// reported as [`AnalysisError::InsufficientData`].
pub fn analyze_records(records: &[HistoryRecord]) -> Result<AnalysisSnapshot, AnalysisError> {
    if records.is_empty() {
        return Err(AnalysisError::InsufficientData);
    }

    let timeline = build_timeline(records);
    let summary = aggregate_milestones(&timeline);
    debug!(
        records = records.len(),
        switches = summary.switches,
        intervals = summary.intervalos.len(),
        "analysis computed"
    );

    Ok(AnalysisSnapshot::new(records.len(), timeline, summary))
}
