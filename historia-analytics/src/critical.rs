//! Histories that need attention: explicit criticality, stale pending
//! validations and EDSS deterioration between the last two encounters.

use chrono::{DateTime, NaiveDateTime, Utc};

use historia_core::{AnalysisConfig, CriticalCase, Prioridad};

use crate::classify::normalize_text;
use crate::document::{HistoryDraft, HistoryRecord};
use crate::timeline::build_timeline;

const RAZON_CRITICIDAD: &str = "Nivel de criticidad marcado como alto o crítico";
const RAZON_DETERIORO: &str = "Deterioro detectado en evolución reciente";

/// Scan one patient's drafts. High priority cases come first; otherwise the
/// order follows the input.
pub fn detect_critical_cases(
    drafts: &[HistoryDraft],
    now: DateTime<Utc>,
    config: &AnalysisConfig,
) -> Vec<CriticalCase> {
    let mut cases = Vec::new();

    for draft in drafts {
        if let Some(prioridad) = draft
            .nivel_criticidad
            .as_deref()
            .and_then(criticality_priority)
        {
            cases.push(CriticalCase {
                historia_id: draft.id.clone(),
                razon: RAZON_CRITICIDAD.to_string(),
                prioridad,
            });
        }

        if draft.is_pending() {
            if let Some(created_at) = creation_instant(&draft.id) {
                let days = now.signed_duration_since(created_at).num_days();
                if days > i64::from(config.pending_validation_days) {
                    cases.push(CriticalCase {
                        historia_id: draft.id.clone(),
                        razon: format!("Historia pendiente de validación por {days} días"),
                        prioridad: Prioridad::Media,
                    });
                }
            }
        }
    }

    let records: Vec<HistoryRecord> = drafts.iter().map(HistoryDraft::record).collect();
    let timeline = build_timeline(&records);
    if let [.., previous, latest] = timeline.as_slice() {
        if latest.edss > previous.edss {
            cases.push(CriticalCase {
                historia_id: latest.id.clone(),
                razon: RAZON_DETERIORO.to_string(),
                prioridad: Prioridad::Alta,
            });
        }
    }

    cases.sort_by_key(|case| case.prioridad);
    cases
}

fn criticality_priority(level: &str) -> Option<Prioridad> {
    match normalize_text(level.trim()).as_str() {
        "critico" => Some(Prioridad::Alta),
        "alto" => Some(Prioridad::Media),
        _ => None,
    }
}

/// Creation time encoded in ids shaped `YYYYMMDDTHHMM...`.
pub fn creation_instant(id: &str) -> Option<DateTime<Utc>> {
    let prefix = id.get(..13)?;
    NaiveDateTime::parse_from_str(prefix, "%Y%m%dT%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn draft(value: serde_json::Value) -> HistoryDraft {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_creation_prefix() {
        let created = creation_instant("20240301T0930-abc").unwrap();
        assert_eq!(created, Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());
        assert!(creation_instant("h-1").is_none());
        assert!(creation_instant("2024030XT0930").is_none());
    }

    #[test]
    fn flags_declared_criticality() {
        let drafts = vec![
            draft(json!({ "id": "a", "nivel_criticidad": "alto" })),
            draft(json!({ "id": "b", "nivel_criticidad": "Crítico" })),
            draft(json!({ "id": "c", "nivel_criticidad": "bajo" })),
        ];
        let cases = detect_critical_cases(&drafts, now(), &AnalysisConfig::default());
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].historia_id, "b");
        assert_eq!(cases[0].prioridad, Prioridad::Alta);
        assert_eq!(cases[1].historia_id, "a");
        assert_eq!(cases[1].prioridad, Prioridad::Media);
        assert_eq!(cases[1].razon, RAZON_CRITICIDAD);
    }

    #[test]
    fn flags_stale_pending_validation() {
        let drafts = vec![
            draft(json!({ "id": "20240301T0930", "estado": "pendiente_validacion" })),
            draft(json!({ "id": "20240318T0930", "estado": "pendiente" })),
            draft(json!({ "id": "20240101T0930", "estado": "validada" })),
        ];
        let cases = detect_critical_cases(&drafts, now(), &AnalysisConfig::default());
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].historia_id, "20240301T0930");
        assert_eq!(cases[0].razon, "Historia pendiente de validación por 19 días");
        assert_eq!(cases[0].prioridad, Prioridad::Media);
    }

    #[test]
    fn pending_state_in_body_is_flagged() {
        let drafts = vec![draft(json!({
            "id": "20240301T0930-x",
            "borrador": { "estado": "pendiente" }
        }))];
        let cases = detect_critical_cases(&drafts, now(), &AnalysisConfig::default());
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].historia_id, "20240301T0930-x");
        assert_eq!(cases[0].prioridad, Prioridad::Media);
    }

    #[test]
    fn pending_threshold_is_configurable() {
        let drafts = vec![draft(
            json!({ "id": "20240318T0930", "estado": "pendiente" }),
        )];
        let config = AnalysisConfig {
            pending_validation_days: 1,
        };
        assert_eq!(detect_critical_cases(&drafts, now(), &config).len(), 1);
    }

    #[test]
    fn flags_deterioration_on_latest_encounter() {
        let drafts = vec![
            draft(json!({
                "id": "h2",
                "validada": { "consulta": { "fecha": "2023-06-01" }, "enfermedad": { "edss": 3.0 } }
            })),
            draft(json!({
                "id": "h1",
                "nivel_criticidad": "alto",
                "borrador": { "consulta": { "fecha": "2023-01-01" }, "enfermedad": { "edss": 2.0 } }
            })),
        ];
        let cases = detect_critical_cases(&drafts, now(), &AnalysisConfig::default());
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].historia_id, "h2");
        assert_eq!(cases[0].razon, RAZON_DETERIORO);
        assert_eq!(cases[1].historia_id, "h1");
    }

    #[test]
    fn stable_or_improving_edss_is_not_deterioration() {
        let drafts = vec![
            draft(json!({ "id": "h1", "borrador": { "consulta": { "fecha": "2023-01-01" }, "enfermedad": { "edss": 3.0 } } })),
            draft(json!({ "id": "h2", "borrador": { "consulta": { "fecha": "2023-06-01" }, "enfermedad": { "edss": 3.0 } } })),
        ];
        assert!(detect_critical_cases(&drafts, now(), &AnalysisConfig::default()).is_empty());
    }
}
