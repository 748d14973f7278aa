use thiserror::Error;

pub type Result<T> = std::result::Result<T, VitalsError>;

#[derive(Debug, Error)]
pub enum VitalsError {
    #[error("Vitals monitor unreachable: {0}")]
    Network(String),

    #[error("Vitals monitor refused the reading history (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The body was not a JSON array. Individual bad readings never land here.
    #[error("Vitals monitor history is not a reading list: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for VitalsError {
    fn from(err: reqwest::Error) -> Self {
        VitalsError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for VitalsError {
    fn from(err: serde_json::Error) -> Self {
        VitalsError::Parse(err.to_string())
    }
}
