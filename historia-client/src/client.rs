//! HTTP access to the clinical-records backend.

use std::future::Future;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use historia_analytics::document::{
    self, HistoryDraft, HistoryRecord, HistorySummary, PatientSummary,
};

use crate::config::ClientConfig;
use crate::error::ClientError;

const ERROR_BODY_MAX_CHARS: usize = 200;

/// A history whose draft could not be loaded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetchFailure {
    pub historia_id: String,
    pub reason: String,
}

/// Result of loading several drafts: what arrived and what did not.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub drafts: Vec<HistoryDraft>,
    pub failures: Vec<FetchFailure>,
}

impl LoadReport {
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.drafts.iter().map(HistoryDraft::record).collect()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

pub struct BackendClient {
    client: reqwest::Client,
    base: String,
}

impl BackendClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ClientError::HttpClientInit)?;
        Ok(Self {
            client,
            base: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                message: body_excerpt(&bytes),
            });
        }
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Json {
            path: path.to_string(),
            source,
        })
    }

    /// Every history known to the backend. A listing that is neither an
    /// array nor `{ items }` reads as empty.
    pub async fn list_histories(&self) -> Result<Vec<HistorySummary>, ClientError> {
        let value: Value = self.get_json("historias").await?;
        let items = match document::list_items(&value) {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "unexpected history listing shape");
                return Ok(Vec::new());
            }
        };
        Ok(items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect())
    }

    /// Histories whose patient DNI matches `dni`.
    pub async fn patient_histories(&self, dni: &str) -> Result<Vec<HistorySummary>, ClientError> {
        Ok(self
            .list_histories()
            .await?
            .into_iter()
            .filter(|summary| summary.belongs_to(dni))
            .collect())
    }

    /// The patient, or `None` when the backend does not know it.
    pub async fn get_patient(&self, id: &str) -> Result<Option<PatientSummary>, ClientError> {
        match self.get_json(&format!("pacientes/{id}")).await {
            Ok(patient) => Ok(Some(patient)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn fetch_draft(&self, historia_id: &str) -> Result<HistoryDraft, ClientError> {
        let mut draft: HistoryDraft = self
            .get_json(&format!("historias/{historia_id}/borrador"))
            .await?;
        if draft.id.is_empty() {
            draft.id = historia_id.to_string();
        }
        Ok(draft)
    }

    /// Fetch the drafts of all `histories` at once. A failed fetch is logged
    /// and reported in [`LoadReport::failures`]; cancelling `cancel` aborts
    /// the whole load.
    pub async fn load_drafts(
        &self,
        histories: &[HistorySummary],
        cancel: &CancellationToken,
    ) -> Result<LoadReport, ClientError> {
        let fetches = histories.iter().map(|summary| async move {
            let result = cancellable(cancel, self.fetch_draft(&summary.id)).await;
            (summary.id.as_str(), result)
        });

        let mut report = LoadReport::default();
        for (historia_id, result) in join_all(fetches).await {
            match result {
                Ok(draft) => report.drafts.push(draft),
                Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
                Err(err) => {
                    warn!(historia = historia_id, error = %err, "draft fetch failed");
                    report.failures.push(FetchFailure {
                        historia_id: historia_id.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

fn body_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    let mut excerpt: String = trimmed.chars().take(ERROR_BODY_MAX_CHARS).collect();
    if trimmed.chars().count() > ERROR_BODY_MAX_CHARS {
        excerpt.push('…');
    }
    excerpt
}
