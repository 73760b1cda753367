use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use historia_analytics::{
    analyze_records, compare_cohort_value, detect_critical_cases, document, filter_histories,
    patient_overview, HistoryFilters,
};
use historia_client::{BackendClient, CancellationToken, ClientConfig};
use historia_core::AnalysisConfig;

mod render;

#[derive(Parser, Debug)]
#[command(
    name = "historia",
    about = "Análisis de historias clínicas de esclerosis múltiple: DMT, EDSS y casos críticos."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analiza las historias de un paciente desde un archivo JSON.
    Analyze {
        /// Archivo con el listado de historias.
        #[arg(short, long)]
        input: PathBuf,
        /// Imprime el análisis completo en JSON.
        #[arg(long)]
        json: bool,
    },
    /// Descarga y analiza las historias de un paciente desde el backend.
    Patient {
        /// DNI del paciente.
        #[arg(long)]
        id: String,
        /// URL base del backend (por defecto HISTORIA_API_URL o localhost:8000).
        #[arg(long)]
        base_url: Option<String>,
        /// Tiempo máximo por solicitud, en milisegundos.
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Filtra historias por patología, fechas, medicación, estado y más.
    Filter {
        #[arg(short, long)]
        input: PathBuf,
        /// Patología o diagnóstico; alternativas separadas por `|`.
        #[arg(long)]
        patologia: Option<String>,
        /// Fecha mínima de consulta (AAAA-MM-DD).
        #[arg(long)]
        desde: Option<NaiveDate>,
        /// Fecha máxima de consulta (AAAA-MM-DD).
        #[arg(long)]
        hasta: Option<NaiveDate>,
        /// Droga o molécula; alternativas separadas por `|`.
        #[arg(long)]
        medicamento: Option<String>,
        #[arg(long)]
        estado: Option<String>,
        #[arg(long)]
        criticidad: Option<String>,
        #[arg(long)]
        edss: Option<f64>,
        /// Años completos desde el inicio de la enfermedad.
        #[arg(long)]
        tiempo_evolucion: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Lista los casos que requieren atención.
    Critical {
        #[arg(short, long)]
        input: PathBuf,
        /// Días tras los cuales una historia pendiente se considera atrasada.
        #[arg(long)]
        pending_days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Compara los DMT de una cohorte (objeto paciente → historias).
    Compare {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = match cli.command {
        Command::Analyze { input, json } => {
            let value = read_json(&input)?;
            let records = document::records_from_value(&value)?;
            let snapshot = analyze_records(&records)?;
            if json {
                to_json(&snapshot)?
            } else {
                let overview = patient_overview(&records);
                render::Analysis {
                    overview: &overview,
                    snapshot: &snapshot,
                }
                .to_string()
            }
        }
        Command::Patient {
            id,
            base_url,
            timeout_ms,
            json,
        } => {
            let mut config = ClientConfig::default();
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.timeout_ms = timeout_ms;
            }
            let client = BackendClient::new(&config)?;

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupción recibida, cancelando");
                    on_ctrl_c.cancel();
                }
            });

            let report = client
                .patient_report(&id, &AnalysisConfig::default(), &cancel)
                .await
                .with_context(|| format!("No se pudo obtener el informe del paciente {id}"))?;
            if json {
                to_json(&report)?
            } else {
                render::Report {
                    id: &id,
                    report: &report,
                }
                .to_string()
            }
        }
        Command::Filter {
            input,
            patologia,
            desde,
            hasta,
            medicamento,
            estado,
            criticidad,
            edss,
            tiempo_evolucion,
            json,
        } => {
            let filters = HistoryFilters {
                patologia,
                fecha_desde: desde,
                fecha_hasta: hasta,
                medicamento,
                estado,
                criticidad,
                edss,
                tiempo_evolucion,
            };
            let value = read_json(&input)?;
            let records = document::records_from_value(&value)?;
            let selected = filter_histories(&records, &filters);
            if json {
                to_json(&selected)?
            } else {
                render::Histories(&selected).to_string()
            }
        }
        Command::Critical {
            input,
            pending_days,
            json,
        } => {
            let mut config = AnalysisConfig::default();
            if let Some(days) = pending_days {
                config.pending_validation_days = days;
            }
            let value = read_json(&input)?;
            let drafts = document::drafts_from_value(&value)?;
            let cases = detect_critical_cases(&drafts, Utc::now(), &config);
            if json {
                to_json(&cases)?
            } else {
                render::CriticalCases(&cases).to_string()
            }
        }
        Command::Compare { input, json } => {
            let value = read_json(&input)?;
            let comparisons = compare_cohort_value(&value)?;
            if json {
                to_json(&comparisons)?
            } else {
                render::Comparisons(&comparisons).to_string()
            }
        }
    };

    println!("{output}");
    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("No se pudo leer el archivo {path:?}"))
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let data = read_input(path)?;
    serde_json::from_str(&data).with_context(|| format!("JSON inválido en {path:?}"))
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("No se pudo serializar el resultado")
}
