#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid schema document: {0}")]
    InvalidDocument(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
