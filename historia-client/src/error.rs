use historia_core::AnalysisError;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("No se pudo inicializar el cliente HTTP: {0}")]
    HttpClientInit(reqwest::Error),

    #[error("Falló la solicitud HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("El backend respondió {status} en {path}: {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },

    #[error("JSON inválido en {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Carga cancelada")]
    Cancelled,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}
