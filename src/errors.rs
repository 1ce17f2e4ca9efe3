use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid probe configuration: {0}")]
    ConfigError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to decode API response: {0}")]
    DecodeError(String),

    #[error("Failed to write console output: {0}")]
    ConsoleError(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(error: std::io::Error) -> Self {
        ProbeError::ConsoleError(error.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(error: reqwest::Error) -> Self {
        ProbeError::HttpError(error.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(error: serde_json::Error) -> Self {
        ProbeError::DecodeError(error.to_string())
    }
}

impl From<url::ParseError> for ProbeError {
    fn from(error: url::ParseError) -> Self {
        ProbeError::ConfigError(error.to_string())
    }
}
