pub mod error;

pub use error::{Result, VitalsError};

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use timeline_common::{parse_instant, FetchWindow, RawReading};

pub struct VitalsClient {
    client: reqwest::Client,
    base_url: String,
}

impl VitalsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch readings for a patient. The monitor returns the full history, so
    /// the window is applied here.
    pub async fn fetch_readings(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawReading>> {
        let url = format!("{}/vitals/{}", self.base_url, patient_id);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(VitalsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let history: Vec<Value> = serde_json::from_str(&body)?;
        let total = history.len();
        let readings = within_window(readable(patient_id, history), window);
        debug!(patient_id, total, kept = readings.len(), "Fetched vitals readings");
        Ok(readings)
    }
}

/// Readings that decode. A single bad entry in a long monitor history is
/// logged and skipped.
fn readable(patient_id: i64, history: Vec<Value>) -> Vec<RawReading> {
    let mut skipped = 0usize;
    let readings: Vec<RawReading> = history
        .into_iter()
        .filter_map(|entry| {
            serde_json::from_value(entry)
                .inspect_err(|e| {
                    skipped += 1;
                    debug!(patient_id, error = %e, "Skipping unreadable vitals reading");
                })
                .ok()
        })
        .collect();

    if skipped > 0 {
        warn!(patient_id, skipped, "Vitals monitor returned unreadable readings");
    }
    readings
}

/// Keep readings inside the window. Readings whose timestamp cannot be parsed
/// are kept; the normalizer owns that decision.
fn within_window(readings: Vec<RawReading>, window: &FetchWindow) -> Vec<RawReading> {
    readings
        .into_iter()
        .filter(|r| match r.timestamp.as_deref().and_then(parse_instant) {
            Some(at) => window.contains(at),
            None => true,
        })
        .collect()
}
