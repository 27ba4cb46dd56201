use thiserror::Error;

/// Erreurs de rendu et d'export
#[derive(Error, Debug)]
pub enum PresentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geometry encoding failed: {0}")]
    Geometry(#[from] geozero::error::GeozeroError),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
