//! Core types for the clinical-history analytics: derived timeline rows,
//! EDSS milestones, summary snapshots and the shared error type.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder DMT label for encounters without a disease-modifying therapy.
pub const SIN_DMT: &str = "Sin DMT";

/// Label used when no DMT was active during an interval.
pub const NINGUNO: &str = "Ninguno";

/// Placeholder for empty display fields (schedule, date).
pub const SIN_DATO: &str = "—";

/// Tunable thresholds for the analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Days a history may stay pending validation before it is flagged.
    pub pending_validation_days: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pending_validation_days: 7,
        }
    }
}

/// Direction of an EDSS change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severidad {
    Empeoro,
    Mejoro,
}

impl Severidad {
    pub fn from_change(old: f64, new: f64) -> Self {
        if new > old {
            Severidad::Empeoro
        } else {
            Severidad::Mejoro
        }
    }
}

/// One row of the patient timeline, derived from one history record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRecord {
    pub id: String,
    /// Canonical DMT label, or [`SIN_DMT`].
    pub dmt: String,
    /// DMT text as written in the record.
    pub dmt_original: String,
    /// Raw DMT text followed by its dose.
    pub dmt_full: String,
    /// Administration schedule, or [`SIN_DATO`].
    pub esquema: String,
    /// Encounter date as `dd/mm/yyyy`, or [`SIN_DATO`].
    pub fecha: String,
    pub fecha_raw: Option<String>,
    /// Parsed encounter date; `None` sorts as the epoch.
    #[serde(skip)]
    pub occurred_at: Option<DateTime<Utc>>,
    pub edss: f64,
    /// `false` when an intolerance was reported for this encounter.
    pub tolerancia: bool,
    pub soporte: Vec<String>,
}

impl DisplayRecord {
    /// Position on the timeline. Records without a date sit at the epoch.
    pub fn timeline_instant(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn has_dmt(&self) -> bool {
        self.dmt != SIN_DMT
    }
}

/// A span of constant EDSS closed by a change of score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneInterval {
    /// `"EDSS <old> → <new>"`.
    pub cambio: String,
    /// `"<n> meses"`.
    pub tiempo: String,
    /// DMTs active during the interval, comma separated, or [`NINGUNO`].
    pub medicacion: String,
    pub severidad: Severidad,
}

/// Output of the milestone aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MilestoneSummary {
    pub switches: u32,
    pub intolerancias: u32,
    pub intervalos: Vec<MilestoneInterval>,
}

/// Full analysis for one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSnapshot {
    pub generated_at: DateTime<Utc>,
    pub total_consultas: usize,
    pub registros: Vec<DisplayRecord>,
    pub switches: u32,
    pub intolerancias: u32,
    pub intervalos: Vec<MilestoneInterval>,
    /// Supportive treatments seen anywhere in the timeline, first-seen order.
    pub soporte: Vec<String>,
}

impl AnalysisSnapshot {
    /// Assemble the snapshot from an ordered timeline and its milestones.
    pub fn new(
        total_consultas: usize,
        registros: Vec<DisplayRecord>,
        summary: MilestoneSummary,
    ) -> Self {
        let mut seen = HashSet::new();
        let soporte = registros
            .iter()
            .flat_map(|record| record.soporte.iter())
            .filter(|label| !label.is_empty())
            .filter(|label| seen.insert(label.as_str()))
            .cloned()
            .collect();

        Self {
            generated_at: Utc::now(),
            total_consultas,
            registros,
            switches: summary.switches,
            intolerancias: summary.intolerancias,
            intervalos: summary.intervalos,
            soporte,
        }
    }

    /// Timeline rows in chronological order.
    pub fn timeline(&self) -> &[DisplayRecord] {
        &self.registros
    }

    pub fn milestones(&self) -> &[MilestoneInterval] {
        &self.intervalos
    }
}

/// Priority of a case flagged for attention.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Prioridad {
    Alta,
    Media,
}

/// A history that needs a clinician's attention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriticalCase {
    pub historia_id: String,
    pub razon: String,
    pub prioridad: Prioridad,
}

/// Exposure summary of one DMT across a cohort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicationComparison {
    pub medicamento: String,
    pub total_pacientes: usize,
    pub consultas: usize,
    pub intolerancias: usize,
}

/// Span and content of a patient's consultations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientOverview {
    pub total_consultas: usize,
    /// Raw date of the earliest dated consultation.
    pub primera_consulta: Option<String>,
    /// Raw date of the latest dated consultation.
    pub ultima_consulta: Option<String>,
    /// Every treatment name, first-seen order.
    pub medicamentos: Vec<String>,
    pub diagnosticos: Vec<String>,
}

/// Errors raised while building an analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Historias clínicas sin datos estructurados suficientes.")]
    InsufficientData,
    #[error("No se pudo leer el documento: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, soporte: &[&str]) -> DisplayRecord {
        DisplayRecord {
            id: id.to_string(),
            dmt: SIN_DMT.to_string(),
            dmt_original: SIN_DMT.to_string(),
            dmt_full: SIN_DMT.to_string(),
            esquema: SIN_DATO.to_string(),
            fecha: SIN_DATO.to_string(),
            fecha_raw: None,
            occurred_at: None,
            edss: 0.0,
            tolerancia: true,
            soporte: soporte.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn snapshot_collects_unique_support_in_first_seen_order() {
        let registros = vec![
            record("a", &["Baclofeno 10mg", "Vitamina D"]),
            record("b", &["", "Vitamina D", "Kinesiología"]),
        ];
        let snapshot = AnalysisSnapshot::new(2, registros, MilestoneSummary::default());
        assert_eq!(
            snapshot.soporte,
            vec!["Baclofeno 10mg", "Vitamina D", "Kinesiología"]
        );
        assert_eq!(snapshot.total_consultas, 2);
    }

    #[test]
    fn missing_date_sits_at_epoch() {
        let row = record("a", &[]);
        assert_eq!(row.timeline_instant().timestamp(), 0);
        assert!(!row.has_dmt());
    }

    #[test]
    fn severity_follows_direction_of_change() {
        assert_eq!(Severidad::from_change(2.0, 2.5), Severidad::Empeoro);
        assert_eq!(Severidad::from_change(2.5, 2.0), Severidad::Mejoro);
    }

    #[test]
    fn display_record_uses_camel_case_keys() {
        let value = serde_json::to_value(record("a", &[])).unwrap();
        assert!(value.get("dmtOriginal").is_some());
        assert!(value.get("fechaRaw").is_some());
        assert!(value.get("occurredAt").is_none());
    }

    #[test]
    fn every_error_variant_has_a_message() {
        for err in [
            AnalysisError::InsufficientData,
            AnalysisError::Parse("x".to_string()),
        ] {
            let message = match &err {
                AnalysisError::InsufficientData | AnalysisError::Parse(_) => err.to_string(),
            };
            assert!(!message.is_empty());
        }
    }

    #[test]
    fn insufficient_data_message_is_user_facing() {
        assert_eq!(
            AnalysisError::InsufficientData.to_string(),
            "Historias clínicas sin datos estructurados suficientes."
        );
    }
}
