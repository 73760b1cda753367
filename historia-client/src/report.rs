//! Patient report: fetch everything for one patient and analyze it.

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use historia_analytics::{
    analyze_records, detect_critical_cases, patient_overview, PatientSummary,
};
use historia_core::{
    AnalysisConfig, AnalysisError, AnalysisSnapshot, CriticalCase, PatientOverview,
};

use crate::client::{cancellable, BackendClient, FetchFailure};
use crate::error::ClientError;

#[derive(Debug, Clone, Serialize)]
pub struct PatientReport {
    pub patient: Option<PatientSummary>,
    pub overview: PatientOverview,
    /// `None` when no history had structured data.
    pub analysis: Option<AnalysisSnapshot>,
    pub critical: Vec<CriticalCase>,
    pub failures: Vec<FetchFailure>,
}

impl BackendClient {
    /// Load the patient, its histories and their drafts, then run the
    /// analytics over whatever arrived.
    pub async fn patient_report(
        &self,
        dni: &str,
        config: &AnalysisConfig,
        cancel: &CancellationToken,
    ) -> Result<PatientReport, ClientError> {
        let patient = cancellable(cancel, self.get_patient(dni)).await?;
        let histories = cancellable(cancel, self.patient_histories(dni)).await?;
        let loaded = self.load_drafts(&histories, cancel).await?;

        info!(
            patient = dni,
            histories = histories.len(),
            failures = loaded.failure_count(),
            "patient drafts loaded"
        );

        let records = loaded.records();
        let overview = patient_overview(&records);
        let analysis = match analyze_records(&records) {
            Ok(snapshot) => Some(snapshot),
            Err(AnalysisError::InsufficientData) => None,
            Err(err) => return Err(err.into()),
        };
        let critical = detect_critical_cases(&loaded.drafts, Utc::now(), config);

        Ok(PatientReport {
            patient,
            overview,
            analysis,
            critical,
            failures: loaded.failures,
        })
    }
}
