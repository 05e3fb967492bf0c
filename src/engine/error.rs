use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Authorization(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("opening not found or already filled: {0}")]
    NotFound(String),
    #[error("{0}")]
    ExternalApi(String),
}

impl EngineError {
    /// Short label for metrics and error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Authorization(_) => "authorization",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::NotFound(_) => "not_found",
            EngineError::ExternalApi(_) => "external_api",
        }
    }
}
