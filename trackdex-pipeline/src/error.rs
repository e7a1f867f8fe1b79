/// Errors that can occur during a fetch run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("API client error: {0}")]
    Client(#[from] trackdex_client::ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
