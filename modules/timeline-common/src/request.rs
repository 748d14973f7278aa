use crate::error::{Result, TimelineError};
use crate::records::{parse_instant, FetchWindow};
use crate::types::Role;

/// A validated timeline request. Construction is the only validation point;
/// nothing is fetched for a request that fails here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineRequest {
    pub patient_id: i64,
    pub window: FetchWindow,
    pub role: Role,
}

impl TimelineRequest {
    pub fn new(patient_id: i64, window: FetchWindow, role: Role) -> Result<Self> {
        if patient_id <= 0 {
            return Err(TimelineError::InvalidRequest(format!(
                "patientId must be a positive integer, got {patient_id}"
            )));
        }
        if let (Some(from), Some(to)) = (window.from, window.to) {
            if from > to {
                return Err(TimelineError::InvalidRequest(
                    "from must not be later than to".to_string(),
                ));
            }
        }
        Ok(Self {
            patient_id,
            window,
            role,
        })
    }

    /// Build a request from untyped transport parameters.
    pub fn from_params(
        patient_id: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self> {
        let raw_id = patient_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TimelineError::InvalidRequest("patientId is required".to_string()))?;
        let patient_id: i64 = raw_id.parse().map_err(|_| {
            TimelineError::InvalidRequest(format!("patientId must be a positive integer, got '{raw_id}'"))
        })?;

        let window = FetchWindow::new(instant_param("from", from)?, instant_param("to", to)?);

        let role = role
            .ok_or_else(|| TimelineError::InvalidRequest("role is required".to_string()))?
            .parse::<Role>()
            .map_err(TimelineError::InvalidRequest)?;

        Self::new(patient_id, window, role)
    }
}

fn instant_param(name: &str, raw: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => parse_instant(value).map(Some).ok_or_else(|| {
            TimelineError::InvalidRequest(format!("{name} is not a valid ISO-8601 instant: '{value}'"))
        }),
    }
}
