//! WASM <-> JavaScript bridge for the clinical-history analytics.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

use historia_analytics::{classify_treatments, document, HistoryFilters};
use historia_core::{AnalysisConfig, AnalysisError};

#[derive(Deserialize)]
struct JsAnalysisConfig {
    #[serde(default)]
    pending_validation_days: Option<u32>,
}

impl From<JsAnalysisConfig> for AnalysisConfig {
    fn from(cfg: JsAnalysisConfig) -> Self {
        let mut base = AnalysisConfig::default();
        if let Some(days) = cfg.pending_validation_days {
            base.pending_validation_days = days;
        }
        base
    }
}

/// What the front-end shows for one encounter's treatment list.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsClassification {
    dmt: String,
    dmt_original: String,
    soporte: Vec<String>,
}

#[wasm_bindgen(js_name = analyzeHistories)]
pub fn analyze_histories(input: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let histories = read_json(input, "historias")?;
    let snapshot = historia_analytics::summarize_histories_value(&histories)
        .map_err(|err| JsValue::from_str(&format_analysis_error(err)))?;

    write_json(&snapshot)
}

#[wasm_bindgen(js_name = classifyTreatments)]
pub fn classify(tratamientos: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let value = read_json(tratamientos, "tratamientos")?;
    let entries = document::treatments_from_value(&value);
    let classification = classify_treatments(&entries);

    write_json(&JsClassification {
        dmt: classification.dmt_label(),
        dmt_original: classification.raw_dmt_name(),
        soporte: classification.support_labels(),
    })
}

#[wasm_bindgen(js_name = detectCriticalCases)]
pub fn detect_critical_cases(input: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let histories = read_json(input, "historias")?;
    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsAnalysisConfig = from_value(js_cfg).map_err(|err| {
                JsValue::from_str(&format!("No se pudo leer la configuración: {err}"))
            })?;
            AnalysisConfig::from(cfg)
        }
        None => AnalysisConfig::default(),
    };

    let drafts = document::drafts_from_value(&histories)
        .map_err(|err| JsValue::from_str(&format_analysis_error(err)))?;
    let cases = historia_analytics::detect_critical_cases(&drafts, Utc::now(), &cfg);

    write_json(&cases)
}

#[wasm_bindgen(js_name = compareMedications)]
pub fn compare_medications(cohort: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let cohort = read_json(cohort, "cohorte")?;
    let comparisons = historia_analytics::compare_cohort_value(&cohort)
        .map_err(|err| JsValue::from_str(&format_analysis_error(err)))?;

    write_json(&comparisons)
}

#[wasm_bindgen(js_name = filterHistories)]
pub fn filter_histories(input: JsValue, filters: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let histories = read_json(input, "historias")?;
    let filters: HistoryFilters = from_value(filters)
        .map_err(|err| JsValue::from_str(&format!("No se pudieron leer los filtros: {err}")))?;
    let records = document::records_from_value(&histories)
        .map_err(|err| JsValue::from_str(&format_analysis_error(err)))?;

    write_json(&historia_analytics::filter_histories(&records, &filters))
}

#[wasm_bindgen(js_name = patientOverview)]
pub fn patient_overview(input: JsValue) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let histories = read_json(input, "historias")?;
    let records = document::records_from_value(&histories)
        .map_err(|err| JsValue::from_str(&format_analysis_error(err)))?;

    write_json(&historia_analytics::patient_overview(&records))
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn read_json(input: JsValue, what: &str) -> Result<Value, JsValue> {
    from_value::<Value>(input)
        .map_err(|err| JsValue::from_str(&format!("No se pudo leer el JSON de {what}: {err}")))
}

fn write_json<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value)
        .map_err(|err| JsValue::from_str(&format!("No se pudo serializar el resultado: {err}")))
}

fn format_analysis_error(err: AnalysisError) -> String {
    format!("Error de análisis: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: JsAnalysisConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(AnalysisConfig::from(cfg), AnalysisConfig::default());

        let cfg: JsAnalysisConfig =
            serde_json::from_value(json!({ "pending_validation_days": 3 })).unwrap();
        assert_eq!(AnalysisConfig::from(cfg).pending_validation_days, 3);
    }

    #[test]
    fn analysis_errors_are_prefixed() {
        assert!(format_analysis_error(AnalysisError::InsufficientData)
            .starts_with("Error de análisis: "));
    }
}
