//! DMT exposure compared across patients.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use historia_core::{AnalysisError, DisplayRecord, MedicationComparison};

use crate::document;
use crate::timeline::build_timeline;

#[derive(Default)]
struct Exposure<'a> {
    patients: HashSet<&'a str>,
    consultas: usize,
    intolerancias: usize,
}

/// Aggregate each patient's timeline by canonical DMT. Encounters without a
/// DMT are ignored. Sorted by number of patients, then by name.
pub fn compare_medications<'a, I>(cohort: I) -> Vec<MedicationComparison>
where
    I: IntoIterator<Item = (&'a str, &'a [DisplayRecord])>,
{
    let mut by_dmt: BTreeMap<&'a str, Exposure<'a>> = BTreeMap::new();

    for (patient, timeline) in cohort {
        for record in timeline.iter().filter(|record| record.has_dmt()) {
            let exposure = by_dmt.entry(record.dmt.as_str()).or_default();
            exposure.patients.insert(patient);
            exposure.consultas += 1;
            if !record.tolerancia {
                exposure.intolerancias += 1;
            }
        }
    }

    let mut comparisons: Vec<MedicationComparison> = by_dmt
        .into_iter()
        .map(|(dmt, exposure)| MedicationComparison {
            medicamento: dmt.to_string(),
            total_pacientes: exposure.patients.len(),
            consultas: exposure.consultas,
            intolerancias: exposure.intolerancias,
        })
        .collect();
    comparisons.sort_by(|a, b| b.total_pacientes.cmp(&a.total_pacientes));
    comparisons
}

/// Compare a cohort given as `{ "<patient>": <history listing>, ... }`.
pub fn compare_cohort_value(cohort: &Value) -> Result<Vec<MedicationComparison>, AnalysisError> {
    let patients = cohort.as_object().ok_or_else(|| {
        AnalysisError::Parse("La cohorte debe ser un objeto paciente → historias".to_string())
    })?;

    let mut timelines = Vec::with_capacity(patients.len());
    for (patient, listing) in patients {
        let records = document::records_from_value(listing)?;
        timelines.push((patient.as_str(), build_timeline(&records)));
    }

    Ok(compare_medications(
        timelines
            .iter()
            .map(|(patient, timeline)| (*patient, timeline.as_slice())),
    ))
}
