//! Selection of histories by pathology, date range, medication, state,
//! criticality, EDSS and time since disease onset.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::normalize_text;
use crate::document::HistoryRecord;
use crate::timeline::parse_encounter_date;

/// Criteria a history must all meet. Unset criteria match everything.
/// Text criteria accept `|`-separated alternatives and match substrings,
/// ignoring case and accents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryFilters {
    /// Against `patologia` or the diagnosis.
    pub patologia: Option<String>,
    /// Inclusive, by calendar day of the consultation.
    pub fecha_desde: Option<NaiveDate>,
    pub fecha_hasta: Option<NaiveDate>,
    /// Against drug or molecule of any treatment.
    pub medicamento: Option<String>,
    pub estado: Option<String>,
    pub criticidad: Option<String>,
    pub edss: Option<f64>,
    /// Whole years since `enfermedad.fecha_inicio`.
    pub tiempo_evolucion: Option<u32>,
}

impl HistoryFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `record` meets every criterion, with `now` as the reference
    /// for the time since onset.
    pub fn matches(&self, record: &HistoryRecord, now: DateTime<Utc>) -> bool {
        if let Some(patologia) = &self.patologia {
            let haystacks = [record.patologia.as_str(), record.diagnostico().unwrap_or_default()];
            if !matches_any(patologia, &haystacks) {
                return false;
            }
        }

        if self.fecha_desde.is_some() || self.fecha_hasta.is_some() {
            let Some(day) = record
                .fecha()
                .and_then(parse_encounter_date)
                .map(|instant| instant.date_naive())
            else {
                return false;
            };
            if self.fecha_desde.is_some_and(|desde| day < desde)
                || self.fecha_hasta.is_some_and(|hasta| day > hasta)
            {
                return false;
            }
        }

        if let Some(medicamento) = &self.medicamento {
            let found = record.tratamientos.iter().any(|entry| {
                matches_any(medicamento, &[entry.droga.as_str(), entry.molecula.as_str()])
            });
            if !found {
                return false;
            }
        }

        if let Some(estado) = &self.estado {
            if record.estado != *estado {
                return false;
            }
        }

        if let Some(criticidad) = &self.criticidad {
            if record.nivel_criticidad.as_deref() != Some(criticidad.as_str()) {
                return false;
            }
        }

        if let Some(edss) = self.edss {
            if record.enfermedad.edss != Some(edss) {
                return false;
            }
        }

        if let Some(years) = self.tiempo_evolucion {
            let onset = record
                .enfermedad
                .fecha_inicio
                .as_deref()
                .and_then(parse_encounter_date);
            match onset {
                Some(onset) if whole_years(onset.date_naive(), now.date_naive()) == years => {}
                _ => return false,
            }
        }

        true
    }
}

/// Histories meeting every criterion of `filters`, in input order.
pub fn filter_histories(records: &[HistoryRecord], filters: &HistoryFilters) -> Vec<HistoryRecord> {
    filter_histories_at(records, filters, Utc::now())
}

pub fn filter_histories_at(
    records: &[HistoryRecord],
    filters: &HistoryFilters,
    now: DateTime<Utc>,
) -> Vec<HistoryRecord> {
    records
        .iter()
        .filter(|record| filters.matches(record, now))
        .cloned()
        .collect()
}

/// Completed years from `start` to `end`; never negative.
pub fn whole_years(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut years = end.year() - start.year();
    if (end.month(), end.day()) < (start.month(), start.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn matches_any(alternatives: &str, haystacks: &[&str]) -> bool {
    let haystacks: Vec<String> = haystacks.iter().map(|text| normalize_text(text)).collect();
    alternatives
        .split('|')
        .map(|alternative| normalize_text(alternative.trim()))
        .filter(|alternative| !alternative.is_empty())
        .any(|alternative| haystacks.iter().any(|text| text.contains(&alternative)))
}
