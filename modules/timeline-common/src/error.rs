use std::time::Duration;

use thiserror::Error;

use crate::types::Source;

pub type Result<T> = std::result::Result<T, TimelineError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout(Duration),
    Unavailable(String),
}

/// One upstream fetch that produced no usable data for this request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} {}", .origin.display_name(), describe(.reason))]
pub struct SourceFailure {
    pub origin: Source,
    pub reason: FailureReason,
}

impl SourceFailure {
    pub fn timeout(origin: Source, budget: Duration) -> Self {
        Self {
            origin,
            reason: FailureReason::Timeout(budget),
        }
    }

    pub fn unavailable(origin: Source, message: impl Into<String>) -> Self {
        Self {
            origin,
            reason: FailureReason::Unavailable(message.into()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, FailureReason::Timeout(_))
    }
}

fn describe(reason: &FailureReason) -> String {
    match reason {
        FailureReason::Timeout(budget) => format!("timed out after {}ms", budget.as_millis()),
        FailureReason::Unavailable(message) => format!("unavailable: {message}"),
    }
}

fn list(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("All sources failed: {}", list(.0))]
    AllSourcesFailed(Vec<SourceFailure>),

    #[error("Configuration error: {0}")]
    Config(String),
}
