//! Chronological display rows, one per history record.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use historia_core::{DisplayRecord, PatientOverview, SIN_DATO};

use crate::classify::classify_treatments;
use crate::document::HistoryRecord;

/// Sort `records` by encounter date (missing dates first, ties keep input
/// order) and derive one [`DisplayRecord`] per record.
pub fn build_timeline(records: &[HistoryRecord]) -> Vec<DisplayRecord> {
    let mut ordered: Vec<&HistoryRecord> = records.iter().collect();
    ordered.sort_by_key(|record| encounter_instant(record));
    ordered.into_iter().map(display_record).collect()
}

/// First and last consultation plus every treatment and diagnosis seen, in
/// chronological order. Undated records count but never bound the span.
pub fn patient_overview(records: &[HistoryRecord]) -> PatientOverview {
    let mut ordered: Vec<&HistoryRecord> = records.iter().collect();
    ordered.sort_by_key(|record| encounter_instant(record));

    let dated: Vec<&HistoryRecord> = ordered
        .iter()
        .copied()
        .filter(|record| record.fecha().and_then(parse_encounter_date).is_some())
        .collect();

    let mut seen = HashSet::new();
    let medicamentos = ordered
        .iter()
        .flat_map(|record| record.tratamientos.iter())
        .filter_map(|entry| entry.name())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();

    let mut seen = HashSet::new();
    let diagnosticos = ordered
        .iter()
        .filter_map(|record| record.diagnostico())
        .filter(|diagnostico| seen.insert(*diagnostico))
        .map(str::to_string)
        .collect();

    PatientOverview {
        total_consultas: records.len(),
        primera_consulta: dated.first().and_then(|r| r.fecha()).map(str::to_string),
        ultima_consulta: dated.last().and_then(|r| r.fecha()).map(str::to_string),
        medicamentos,
        diagnosticos,
    }
}

/// Encounter date of a record; undated records sit at the epoch.
pub fn encounter_instant(record: &HistoryRecord) -> DateTime<Utc> {
    record
        .fecha()
        .and_then(parse_encounter_date)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn display_record(record: &HistoryRecord) -> DisplayRecord {
    let classification = classify_treatments(&record.tratamientos);
    let dmt_original = classification.raw_dmt_name();
    let (dosis, frecuencia) = classification
        .primary
        .map(|entry| (entry.dosis.as_str(), entry.frecuencia.as_str()))
        .unwrap_or_default();

    let intolerante = classification
        .primary
        .is_some_and(|entry| entry.reports_intolerance())
        || mentions_intolerance(record.comentario());

    DisplayRecord {
        id: record.id.clone(),
        dmt: classification.dmt_label(),
        dmt_full: format!("{dmt_original} {dosis}").trim().to_string(),
        dmt_original,
        esquema: if frecuencia.is_empty() {
            SIN_DATO.to_string()
        } else {
            frecuencia.to_string()
        },
        fecha: format_display_date(record.fecha()),
        fecha_raw: record.fecha().map(str::to_string),
        occurred_at: record.fecha().and_then(parse_encounter_date),
        edss: coerce_edss(record.enfermedad.edss),
        tolerancia: !intolerante,
        soporte: classification.support_labels(),
    }
}

/// Missing or non-numeric scores read as 0, indistinguishable from a real 0.
pub fn coerce_edss(edss: Option<f64>) -> f64 {
    edss.filter(|value| value.is_finite()).unwrap_or(0.0)
}

fn mentions_intolerance(comentario: &str) -> bool {
    comentario.to_lowercase().contains("intolerancia")
}

/// Parse RFC 3339 timestamps, offsets written without a colon, naive
/// `YYYY-MM-DD[T ]HH:MM[:SS]` (read as UTC) and plain `YYYY-MM-DD` dates.
pub fn parse_encounter_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `YYYY-MM-DD[T...]` as `DD/MM/YYYY`; other shapes pass through unchanged.
pub fn format_display_date(value: Option<&str>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return SIN_DATO.to_string();
    };
    let day_part = value.split('T').next().unwrap_or(value);
    let parts: Vec<&str> = day_part.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => format!("{day}/{month}/{year}"),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> HistoryRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn sorts_by_date_with_missing_dates_first() {
        let records = vec![
            record(json!({ "id": "c", "consulta": { "fecha": "2023-05-01" } })),
            record(json!({ "id": "a", "consulta": { "fecha": null } })),
            record(json!({ "id": "b", "consulta": { "fecha": "2022-12-31T23:00:00Z" } })),
            record(json!({ "id": "d" })),
            record(json!({ "id": "e", "consulta": { "fecha": "no es fecha" } })),
        ];
        let timeline = build_timeline(&records);
        let ids: Vec<&str> = timeline.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "e", "b", "c"]);

        for pair in timeline.windows(2) {
            assert!(pair[0].timeline_instant() <= pair[1].timeline_instant());
        }
    }

    #[test]
    fn accepts_browser_readable_date_shapes() {
        let expected = Utc.with_ymd_and_hms(2023, 8, 15, 11, 0, 0).unwrap();
        for shape in [
            "2023-08-15 11:00",
            "2023-08-15 11:00:00",
            "2023-08-15T11:00",
            "2023-08-15T11:00:00+0000",
            "2023-08-15T08:00:00-0300",
            "2023-08-15T11:00:00.000Z",
        ] {
            assert_eq!(parse_encounter_date(shape), Some(expected), "{shape}");
        }
    }

    #[test]
    fn spaced_and_offset_dates_sort_after_earlier_days() {
        let records = vec![
            record(json!({ "id": "b", "consulta": { "fecha": "2023-08-15 11:00" } })),
            record(json!({ "id": "c", "consulta": { "fecha": "2023-09-01T10:00:00+0000" } })),
            record(json!({ "id": "a", "consulta": { "fecha": "2023-01-01" } })),
        ];
        let ids: Vec<String> = build_timeline(&records).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn overview_spans_dated_consultations() {
        let records = vec![
            record(json!({
                "id": "c",
                "diagnostico": "EM remitente recurrente",
                "consulta": { "fecha": "2023-08-15" },
                "tratamientos": [{ "droga": "Gilenya" }, { "droga": "Baclofeno" }]
            })),
            record(json!({ "id": "sin-fecha", "tratamientos": [{ "droga": "Vitamina D" }] })),
            record(json!({
                "id": "a",
                "enfermedad": { "diagnostico": "Síndrome desmielinizante aislado" },
                "consulta": { "fecha": "2022-03-01" },
                "tratamientos": [{ "droga": "Rebif" }, { "droga": "Baclofeno" }]
            })),
            record(json!({
                "id": "b",
                "diagnostico": "EM remitente recurrente",
                "consulta": { "fecha": "2023-01-10" }
            })),
        ];

        let overview = patient_overview(&records);
        assert_eq!(overview.total_consultas, 4);
        assert_eq!(overview.primera_consulta.as_deref(), Some("2022-03-01"));
        assert_eq!(overview.ultima_consulta.as_deref(), Some("2023-08-15"));
        assert_eq!(
            overview.medicamentos,
            vec!["Vitamina D", "Rebif", "Baclofeno", "Gilenya"]
        );
        assert_eq!(
            overview.diagnosticos,
            vec!["Síndrome desmielinizante aislado", "EM remitente recurrente"]
        );
    }

    #[test]
    fn overview_of_nothing_is_empty() {
        let overview = patient_overview(&[]);
        assert_eq!(overview, PatientOverview::default());
    }

    #[test]
    fn derives_display_fields_from_primary_dmt() {
        let row = display_record(&record(json!({
            "id": "h1",
            "consulta": { "fecha": "2023-08-15" },
            "enfermedad": { "edss": "2.5" },
            "tratamientos": [
                { "droga": "Baclofeno", "dosis": "10mg" },
                { "droga": "Gilenya", "dosis": "0.5mg", "frecuencia": "diaria" }
            ]
        })));

        assert_eq!(row.dmt, "Fingolimod");
        assert_eq!(row.dmt_original, "Gilenya");
        assert_eq!(row.dmt_full, "Gilenya 0.5mg");
        assert_eq!(row.esquema, "diaria");
        assert_eq!(row.fecha, "15/08/2023");
        assert_eq!(row.fecha_raw.as_deref(), Some("2023-08-15"));
        assert_eq!(row.edss, 2.5);
        assert!(row.tolerancia);
        assert_eq!(row.soporte, vec!["Baclofeno 10mg"]);
    }

    #[test]
    fn encounter_without_treatments_has_placeholders() {
        let row = display_record(&record(json!({ "id": "h0" })));
        assert_eq!(row.dmt, "Sin DMT");
        assert_eq!(row.dmt_full, "Sin DMT");
        assert_eq!(row.esquema, SIN_DATO);
        assert_eq!(row.fecha, SIN_DATO);
        assert_eq!(row.edss, 0.0);
        assert!(row.soporte.is_empty());
    }

    #[test]
    fn intolerance_from_flag_or_comment() {
        let flagged = display_record(&record(json!({
            "tratamientos": [{ "droga": "Rebif", "tolerancia": false }]
        })));
        assert!(!flagged.tolerancia);

        let commented = display_record(&record(json!({
            "secciones_texto": { "comentario": "Refiere INTOLERANCIA gastrointestinal" },
            "tratamientos": [{ "droga": "Tecfidera" }]
        })));
        assert!(!commented.tolerancia);

        let supportive_only = display_record(&record(json!({
            "tratamientos": [{ "droga": "Baclofeno", "tolerancia": false }]
        })));
        assert!(supportive_only.tolerancia);
    }

    #[test]
    fn display_date_formats() {
        assert_eq!(format_display_date(Some("2023-01-05")), "05/01/2023");
        assert_eq!(format_display_date(Some("2023-01-05T10:00:00Z")), "05/01/2023");
        assert_eq!(format_display_date(Some("enero 2023")), "enero 2023");
        assert_eq!(format_display_date(Some("")), SIN_DATO);
        assert_eq!(format_display_date(None), SIN_DATO);
    }

    #[test]
    fn edss_coercion_defaults_to_zero() {
        assert_eq!(coerce_edss(Some(3.5)), 3.5);
        assert_eq!(coerce_edss(None), 0.0);
        assert_eq!(coerce_edss(Some(f64::NAN)), 0.0);
    }
}
