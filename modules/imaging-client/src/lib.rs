pub mod error;

pub use error::{ImagingError, Result};

use std::time::Duration;

use chrono::SecondsFormat;
use serde_json::Value;
use tracing::{debug, warn};

use timeline_common::{FetchWindow, RawStudy};

pub struct ImagingClient {
    client: reqwest::Client,
    base_url: String,
}

impl ImagingClient {
    /// `timeout` bounds each whole request, connect through body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every imaging study for a patient within the window.
    pub async fn fetch_studies(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawStudy>> {
        let url = format!("{}/patients/{}/studies", self.base_url, patient_id);
        let resp = self
            .client
            .get(&url)
            .query(&window_params(window))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ImagingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // Decode from text so a bad body surfaces as Parse, not Network.
        let body = resp.text().await?;
        let items: Vec<Value> = serde_json::from_str(&body)?;
        let studies = decode_studies(patient_id, items);
        debug!(patient_id, count = studies.len(), "Fetched imaging studies");
        Ok(studies)
    }
}

/// Decode each study on its own; one malformed entry must not cost the
/// patient the rest of the list.
fn decode_studies(patient_id: i64, items: Vec<Value>) -> Vec<RawStudy> {
    let total = items.len();
    let studies: Vec<RawStudy> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(study) => Some(study),
            Err(e) => {
                debug!(patient_id, index, error = %e, "Skipping unreadable imaging study");
                None
            }
        })
        .collect();

    let skipped = total - studies.len();
    if skipped > 0 {
        warn!(patient_id, skipped, total, "Imaging archive returned unreadable studies");
    }
    studies
}

fn window_params(window: &FetchWindow) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(from) = window.from {
        params.push(("from", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Some(to) = window.to {
        params.push(("to", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    params
}
