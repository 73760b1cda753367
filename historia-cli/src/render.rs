//! Plain-text output for the terminal.

use std::fmt::{self, Display, Formatter};

use historia_analytics::HistoryRecord;
use historia_client::PatientReport;
use historia_core::{
    AnalysisSnapshot, CriticalCase, MedicationComparison, PatientOverview, Prioridad, Severidad,
    SIN_DATO,
};

pub struct Analysis<'a> {
    pub overview: &'a PatientOverview,
    pub snapshot: &'a AnalysisSnapshot,
}

impl Display for Analysis<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Overview(self.overview))?;
        write!(f, "{}", Snapshot(self.snapshot))
    }
}

pub struct Overview<'a>(pub &'a PatientOverview);

impl Display for Overview<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let overview = self.0;
        writeln!(
            f,
            "Primera consulta: {}",
            overview.primera_consulta.as_deref().unwrap_or(SIN_DATO)
        )?;
        writeln!(
            f,
            "Última consulta: {}",
            overview.ultima_consulta.as_deref().unwrap_or(SIN_DATO)
        )?;
        writeln!(f, "Diagnósticos: {}", joined(&overview.diagnosticos))?;
        write!(f, "Medicamentos: {}", joined(&overview.medicamentos))
    }
}

pub struct Snapshot<'a>(pub &'a AnalysisSnapshot);

impl Display for Snapshot<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;
        writeln!(f, "Generado: {}", snapshot.generated_at)?;
        writeln!(f, "Consultas: {}", snapshot.total_consultas)?;
        writeln!(f, "Cambios de DMT: {}", snapshot.switches)?;
        write!(f, "Intolerancias: {}", snapshot.intolerancias)?;

        write!(f, "\n\nEvolución:")?;
        for record in snapshot.timeline() {
            write!(
                f,
                "\n  {:<10}  EDSS {:<4}  {}{}",
                record.fecha,
                record.edss,
                record.dmt,
                if record.tolerancia { "" } else { " (intolerancia)" }
            )?;
        }

        if !snapshot.milestones().is_empty() {
            write!(f, "\n\nHitos:")?;
            for interval in snapshot.milestones() {
                write!(
                    f,
                    "\n  {}  {}  [{}]  {}",
                    interval.cambio,
                    interval.tiempo,
                    interval.medicacion,
                    severidad(interval.severidad)
                )?;
            }
        }

        if !snapshot.soporte.is_empty() {
            write!(f, "\n\nTratamiento de soporte: {}", snapshot.soporte.join(", "))?;
        }
        Ok(())
    }
}

pub struct Report<'a> {
    pub id: &'a str,
    pub report: &'a PatientReport,
}

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let report = self.report;
        match &report.patient {
            Some(patient) => writeln!(f, "Paciente: {} (DNI {})", patient.nombre, patient.dni)?,
            None => writeln!(f, "Paciente {}: no encontrado en el backend", self.id)?,
        }
        writeln!(f, "{}", Overview(&report.overview))?;

        match &report.analysis {
            Some(analysis) => write!(f, "{}", Snapshot(analysis))?,
            None => write!(f, "Historias clínicas sin datos estructurados suficientes.")?,
        }

        if !report.critical.is_empty() {
            write!(f, "\n\n{}", CriticalCases(&report.critical))?;
        }

        if !report.failures.is_empty() {
            write!(f, "\n\nHistorias no disponibles:")?;
            for failure in &report.failures {
                write!(f, "\n  {}: {}", failure.historia_id, failure.reason)?;
            }
        }
        Ok(())
    }
}

pub struct CriticalCases<'a>(pub &'a [CriticalCase]);

impl Display for CriticalCases<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "Sin casos críticos.");
        }
        write!(f, "Casos críticos:")?;
        for case in self.0 {
            write!(
                f,
                "\n  [{}] {}: {}",
                prioridad(case.prioridad),
                case.historia_id,
                case.razon
            )?;
        }
        Ok(())
    }
}

pub struct Comparisons<'a>(pub &'a [MedicationComparison]);

impl Display for Comparisons<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "Ningún paciente de la cohorte recibió DMT.");
        }
        write!(
            f,
            "{:<24} {:>9} {:>9} {:>13}",
            "Medicamento", "Pacientes", "Consultas", "Intolerancias"
        )?;
        for row in self.0 {
            write!(
                f,
                "\n{:<24} {:>9} {:>9} {:>13}",
                row.medicamento, row.total_pacientes, row.consultas, row.intolerancias
            )?;
        }
        Ok(())
    }
}

pub struct Histories<'a>(pub &'a [HistoryRecord]);

impl Display for Histories<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Historias encontradas: {}", self.0.len())?;
        for record in self.0 {
            write!(
                f,
                "\n  {:<20} {:<12} {:<22} {}",
                record.id,
                record.fecha().unwrap_or(SIN_DATO),
                if record.estado.is_empty() { SIN_DATO } else { record.estado.as_str() },
                record.diagnostico().unwrap_or(SIN_DATO)
            )?;
        }
        Ok(())
    }
}

fn joined(items: &[String]) -> String {
    if items.is_empty() {
        SIN_DATO.to_string()
    } else {
        items.join(", ")
    }
}

fn severidad(value: Severidad) -> &'static str {
    match value {
        Severidad::Empeoro => "empeoró",
        Severidad::Mejoro => "mejoró",
    }
}

fn prioridad(value: Prioridad) -> &'static str {
    match value {
        Prioridad::Alta => "ALTA",
        Prioridad::Media => "media",
    }
}
