//! Backend document shapes.
//!
//! The backend schema is not under our control, so every field is optional
//! and decoded leniently: wrong types and nulls collapse to defaults here and
//! nowhere else.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use historia_core::AnalysisError;

/// One prescribed treatment inside a history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreatmentEntry {
    #[serde(deserialize_with = "lenient_string")]
    pub droga: String,
    #[serde(deserialize_with = "lenient_string")]
    pub molecula: String,
    #[serde(deserialize_with = "lenient_string")]
    pub dosis: String,
    #[serde(deserialize_with = "lenient_string")]
    pub frecuencia: String,
    /// Only an explicit `false` is an intolerance report.
    #[serde(deserialize_with = "lenient_bool")]
    pub tolerancia: Option<bool>,
}

impl TreatmentEntry {
    /// Drug name as written, falling back to the molecule.
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.droga).or_else(|| non_empty(&self.molecula))
    }

    pub fn reports_intolerance(&self) -> bool {
        self.tolerancia == Some(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Consulta {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub fecha: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Enfermedad {
    #[serde(deserialize_with = "lenient_number")]
    pub edss: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub diagnostico: String,
    #[serde(deserialize_with = "lenient_string")]
    pub codigo: String,
    #[serde(deserialize_with = "lenient_string")]
    pub forma: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub fecha_inicio: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeccionesTexto {
    #[serde(deserialize_with = "lenient_string")]
    pub comentario: String,
}

/// One clinical encounter as structured by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estado: String,
    #[serde(deserialize_with = "lenient_string")]
    pub patologia: String,
    #[serde(deserialize_with = "lenient_string")]
    pub diagnostico: String,
    #[serde(deserialize_with = "lenient_string")]
    pub forma: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub nivel_criticidad: Option<String>,
    #[serde(deserialize_with = "lenient_object")]
    pub consulta: Consulta,
    #[serde(deserialize_with = "lenient_object")]
    pub enfermedad: Enfermedad,
    #[serde(deserialize_with = "lenient_object")]
    pub secciones_texto: SeccionesTexto,
    #[serde(deserialize_with = "lenient_treatments")]
    pub tratamientos: Vec<TreatmentEntry>,
}

impl HistoryRecord {
    pub fn fecha(&self) -> Option<&str> {
        self.consulta.fecha.as_deref()
    }

    pub fn comentario(&self) -> &str {
        &self.secciones_texto.comentario
    }

    /// Top-level diagnosis, falling back to the disease section's.
    pub fn diagnostico(&self) -> Option<&str> {
        non_empty(&self.diagnostico).or_else(|| non_empty(&self.enfermedad.diagnostico))
    }
}

/// Per-history document returned by `/historias/{id}/borrador`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryDraft {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estado: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub nivel_criticidad: Option<String>,
    #[serde(deserialize_with = "lenient_opt_object")]
    pub borrador: Option<HistoryRecord>,
    #[serde(deserialize_with = "lenient_opt_object")]
    pub validada: Option<HistoryRecord>,
}

impl HistoryDraft {
    /// The validated version when present, else the draft, else an empty
    /// record. The envelope id and state fill in whatever the body lacks.
    pub fn record(&self) -> HistoryRecord {
        let mut record = self
            .validada
            .as_ref()
            .or(self.borrador.as_ref())
            .cloned()
            .unwrap_or_default();
        if record.id.is_empty() {
            record.id = self.id.clone();
        }
        if record.estado.is_empty() {
            record.estado = self.estado.clone();
        }
        if record.nivel_criticidad.is_none() {
            record.nivel_criticidad = self.nivel_criticidad.clone();
        }
        record
    }

    /// Envelope state, or the body's when the envelope carries none.
    pub fn estado(&self) -> &str {
        if !self.estado.is_empty() {
            return &self.estado;
        }
        self.validada
            .as_ref()
            .or(self.borrador.as_ref())
            .map(|body| body.estado.as_str())
            .unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.estado(), "pendiente" | "pendiente_validacion")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PacienteResumen {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub nombre: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub dni: Option<String>,
}

/// Item of the `/historias` listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistorySummary {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub estado: String,
    #[serde(deserialize_with = "lenient_opt_object")]
    pub paciente: Option<PacienteResumen>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub diagnostico: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub forma: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub fecha_consulta: Option<String>,
}

impl HistorySummary {
    /// Whether the history's patient DNI matches `patient_id`, ignoring dots
    /// and whitespace on both sides.
    pub fn belongs_to(&self, patient_id: &str) -> bool {
        let dni = self
            .paciente
            .as_ref()
            .and_then(|p| p.dni.as_deref())
            .unwrap_or_default();
        normalize_dni(dni) == normalize_dni(patient_id)
    }
}

/// Patient as returned by `/pacientes/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub nombre: String,
    #[serde(deserialize_with = "lenient_string")]
    pub dni: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub fecha_nacimiento: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub obra_social: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub nro_afiliado: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub observaciones: Option<String>,
}

pub fn normalize_dni(dni: &str) -> String {
    dni.chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .collect()
}

/// Items of a listing that is either a bare array or `{ "items": [...] }`.
pub fn list_items(value: &Value) -> Result<&[Value], AnalysisError> {
    if let Some(items) = value.as_array() {
        return Ok(items.as_slice());
    }
    value
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| {
            AnalysisError::Parse("se esperaba una lista de historias".to_string())
        })
}

/// Decode a listing of histories. Each item may be a draft envelope (it has a
/// `borrador` or `validada` key) or an already flattened record.
pub fn records_from_value(value: &Value) -> Result<Vec<HistoryRecord>, AnalysisError> {
    let items = list_items(value)?;
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Some(object) = item.as_object() else {
            debug!("skipping non-object history item");
            continue;
        };
        let record = if object.contains_key("borrador") || object.contains_key("validada") {
            decode_lenient::<HistoryDraft>(item).record()
        } else {
            decode_lenient::<HistoryRecord>(item)
        };
        records.push(record);
    }
    Ok(records)
}

/// Decode draft envelopes from a listing.
pub fn drafts_from_value(value: &Value) -> Result<Vec<HistoryDraft>, AnalysisError> {
    let items = list_items(value)?;
    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .map(decode_lenient::<HistoryDraft>)
        .collect())
}

/// Treatment entries from a bare array; anything else reads as empty.
pub fn treatments_from_value(value: &Value) -> Vec<TreatmentEntry> {
    lenient_treatments(value.clone()).unwrap_or_default()
}

fn decode_lenient<T: DeserializeOwned + Default>(value: &Value) -> T {
    T::deserialize(value).unwrap_or_else(|err| {
        debug!(error = %err, "document did not decode, using defaults");
        T::default()
    })
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let text = lenient_string(deserializer)?;
    Ok(if text.is_empty() { None } else { Some(text) })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_bool())
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_float_prefix(&text),
        _ => None,
    })
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_object() {
        decode_lenient(&value)
    } else {
        T::default()
    })
}

fn lenient_opt_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(if value.is_object() {
        Some(decode_lenient(&value))
    } else {
        None
    })
}

fn lenient_treatments<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<TreatmentEntry>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            debug!("tratamientos is not an array, treating as empty");
        }
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .map(decode_lenient::<TreatmentEntry>)
        .collect())
}

/// Longest leading decimal number of `text`, the way browsers read a numeric
/// prefix ("2.5", " 3", "2,5" -> 2).
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (idx, ch) in trimmed.char_indices() {
        match ch {
            '+' | '-' if idx == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    trimmed[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
