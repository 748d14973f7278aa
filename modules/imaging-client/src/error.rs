use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImagingError>;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("Imaging archive unreachable: {0}")]
    Network(String),

    /// The archive's own deadline or ours elapsed before the study list arrived.
    #[error("Imaging archive did not answer in time: {0}")]
    Timeout(String),

    #[error("Imaging archive rejected the study query (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Imaging archive sent an unreadable study list: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ImagingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ImagingError::Timeout(err.to_string())
        } else {
            ImagingError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ImagingError {
    fn from(err: serde_json::Error) -> Self {
        ImagingError::Parse(err.to_string())
    }
}
