// Test mocks for the timeline engine.
//
// MockSource<T> stands in for any of the three upstream seams:
// - MockSource<RawEncounter> (EncounterSource)
// - MockSource<RawStudy>     (ImagingSource)
// - MockSource<RawReading>   (VitalsSource)
//
// Plus builders for raw records with realistic defaults.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use timeline_common::{parse_instant, FetchWindow, RawEncounter, RawReading, RawStudy};

use crate::traits::{EncounterSource, ImagingSource, VitalsSource};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

enum Outcome<T> {
    Records(Vec<T>),
    Fail(String),
}

/// Canned upstream. Records every call and notices when an in-flight call is
/// dropped before it finishes.
pub struct MockSource<T> {
    outcome: Outcome<T>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_call: Mutex<Option<(i64, FetchWindow)>>,
    cancelled: Arc<AtomicBool>,
}

impl<T: Clone + Send + Sync> MockSource<T> {
    fn with_outcome(outcome: Outcome<T>) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn records(records: Vec<T>) -> Self {
        Self::with_outcome(Outcome::Records(records))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_outcome(Outcome::Fail(message.to_string()))
    }

    /// Never answers within any realistic budget.
    pub fn hanging() -> Self {
        Self::records(Vec::new()).with_delay(Duration::from_secs(3600))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<(i64, FetchWindow)> {
        *self.last_call.lock().unwrap()
    }

    /// True once a call was dropped mid-flight.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn respond(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some((patient_id, *window));

        let mut guard = InFlight::new(self.cancelled.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        guard.finish();

        match &self.outcome {
            Outcome::Records(records) => Ok(records.clone()),
            Outcome::Fail(message) => bail!("{message}"),
        }
    }
}

/// Flags cancellation if dropped before `finish`.
struct InFlight {
    cancelled: Arc<AtomicBool>,
    done: bool,
}

impl InFlight {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled, done: false }
    }

    fn finish(&mut self) {
        self.done = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl EncounterSource for MockSource<RawEncounter> {
    async fn fetch_encounters(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawEncounter>> {
        self.respond(patient_id, window).await
    }
}

#[async_trait]
impl ImagingSource for MockSource<RawStudy> {
    async fn fetch_studies(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawStudy>> {
        self.respond(patient_id, window).await
    }
}

#[async_trait]
impl VitalsSource for MockSource<RawReading> {
    async fn fetch_readings(&self, patient_id: i64, window: &FetchWindow) -> Result<Vec<RawReading>> {
        self.respond(patient_id, window).await
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Parse a literal instant. Panics on bad input.
pub fn instant(raw: &str) -> DateTime<Utc> {
    parse_instant(raw).unwrap_or_else(|| panic!("bad test instant {raw}"))
}

pub fn surgery(id: &str, start: &str, end: &str) -> RawEncounter {
    RawEncounter {
        id: id.to_string(),
        kind: "surgery".to_string(),
        start: Some(instant(start)),
        end: Some(instant(end)),
        clinician: Some("Dr. Levi".to_string()),
        summary: Some("Appendectomy".to_string()),
        flag: None,
    }
}

pub fn er(id: &str, start: &str, end: &str) -> RawEncounter {
    RawEncounter {
        id: id.to_string(),
        kind: "emergency_room".to_string(),
        start: Some(instant(start)),
        end: Some(instant(end)),
        clinician: Some("Dr. Okafor".to_string()),
        summary: Some("Chest pain".to_string()),
        flag: None,
    }
}

pub fn study(id: &str, timestamp: &str) -> RawStudy {
    RawStudy {
        id: Some(id.to_string()),
        timestamp: Some(timestamp.to_string()),
        modality: Some("CT".to_string()),
        radiologist_note: Some("No acute findings".to_string()),
        flag: None,
    }
}

/// Vitals readings carry no upstream id.
pub fn reading(timestamp: &str) -> RawReading {
    RawReading {
        id: None,
        timestamp: Some(timestamp.to_string()),
        bpm: Some(72),
        bp: Some("120/80".to_string()),
        flag: None,
    }
}
