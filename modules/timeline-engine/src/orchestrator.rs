use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use timeline_common::{
    FetchWindow, RawEncounter, RawReading, RawStudy, Result, Source, SourceFailure, TimelineError,
};

use crate::traits::{EncounterSource, ImagingSource, VitalsSource};

const DEFAULT_BUDGET: Duration = Duration::from_secs(5);

/// Independent timeout budget per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTimeouts {
    pub registry: Duration,
    pub imaging: Duration,
    pub vitals: Duration,
}

impl SourceTimeouts {
    pub fn uniform(budget: Duration) -> Self {
        Self {
            registry: budget,
            imaging: budget,
            vitals: budget,
        }
    }
}

impl Default for SourceTimeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_BUDGET)
    }
}

pub type SourceOutcome<T> = std::result::Result<Vec<T>, SourceFailure>;

/// One result slot per source, each written by its own fetch and read only
/// after all three have settled.
#[derive(Debug)]
pub struct FetchedSnapshot {
    pub encounters: SourceOutcome<RawEncounter>,
    pub studies: SourceOutcome<RawStudy>,
    pub readings: SourceOutcome<RawReading>,
}

impl FetchedSnapshot {
    /// Failures in source order: registry, imaging, vitals.
    pub fn failures(&self) -> Vec<SourceFailure> {
        [
            self.encounters.as_ref().err(),
            self.studies.as_ref().err(),
            self.readings.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }

    pub fn all_failed(&self) -> bool {
        self.encounters.is_err() && self.studies.is_err() && self.readings.is_err()
    }
}

#[derive(Clone)]
pub struct FetchOrchestrator {
    registry: Arc<dyn EncounterSource>,
    imaging: Arc<dyn ImagingSource>,
    vitals: Arc<dyn VitalsSource>,
    timeouts: SourceTimeouts,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<dyn EncounterSource>,
        imaging: Arc<dyn ImagingSource>,
        vitals: Arc<dyn VitalsSource>,
        timeouts: SourceTimeouts,
    ) -> Self {
        Self {
            registry,
            imaging,
            vitals,
            timeouts,
        }
    }

    /// Fetch all three sources concurrently, each under its own budget.
    ///
    /// Returns `AllSourcesFailed` only when no source produced data. Dropping
    /// the returned future drops every in-flight fetch with it.
    pub async fn fetch(&self, patient_id: i64, window: &FetchWindow) -> Result<FetchedSnapshot> {
        let (encounters, studies, readings) = tokio::join!(
            bounded(
                Source::Registry,
                self.timeouts.registry,
                self.registry.fetch_encounters(patient_id, window),
            ),
            bounded(
                Source::ImagingArchive,
                self.timeouts.imaging,
                self.imaging.fetch_studies(patient_id, window),
            ),
            bounded(
                Source::VitalsService,
                self.timeouts.vitals,
                self.vitals.fetch_readings(patient_id, window),
            ),
        );

        let snapshot = FetchedSnapshot {
            encounters,
            studies,
            readings,
        };

        if snapshot.all_failed() {
            return Err(TimelineError::AllSourcesFailed(snapshot.failures()));
        }
        Ok(snapshot)
    }
}

/// Run one fetch under its budget and fold any error into a failure marker.
async fn bounded<T, F>(origin: Source, budget: Duration, fetch: F) -> SourceOutcome<T>
where
    F: Future<Output = anyhow::Result<Vec<T>>>,
{
    let started = Instant::now();
    match tokio::time::timeout(budget, fetch).await {
        Ok(Ok(records)) => {
            debug!(
                source = %origin,
                count = records.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Source fetch succeeded"
            );
            Ok(records)
        }
        Ok(Err(e)) => {
            warn!(source = %origin, error = %e, "Source fetch failed");
            Err(SourceFailure::unavailable(origin, e.to_string()))
        }
        Err(_) => {
            warn!(source = %origin, budget_ms = budget.as_millis() as u64, "Source fetch timed out");
            Err(SourceFailure::timeout(origin, budget))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use timeline_common::FailureReason;

    fn orchestrator(
        registry: MockSource<RawEncounter>,
        imaging: MockSource<RawStudy>,
        vitals: MockSource<RawReading>,
        timeouts: SourceTimeouts,
    ) -> FetchOrchestrator {
        FetchOrchestrator::new(Arc::new(registry), Arc::new(imaging), Arc::new(vitals), timeouts)
    }

    #[tokio::test]
    async fn all_sources_succeed() {
        let orch = orchestrator(
            MockSource::records(vec![surgery("surgery-1", "2024-01-15T10:00:00Z", "2024-01-15T12:00:00Z")]),
            MockSource::records(vec![study("ct-1", "2024-01-15T10:30:00Z")]),
            MockSource::records(vec![reading("2024-01-15T11:00:00Z")]),
            SourceTimeouts::default(),
        );

        let snapshot = orch.fetch(1, &FetchWindow::unbounded()).await.unwrap();
        assert_eq!(snapshot.encounters.as_ref().unwrap().len(), 1);
        assert_eq!(snapshot.studies.as_ref().unwrap().len(), 1);
        assert_eq!(snapshot.readings.as_ref().unwrap().len(), 1);
        assert!(snapshot.failures().is_empty());
    }

    #[tokio::test]
    async fn slow_source_times_out_without_delaying_others() {
        let orch = orchestrator(
            MockSource::records(vec![]),
            MockSource::hanging(),
            MockSource::records(vec![reading("2024-01-15T11:00:00Z")]),
            SourceTimeouts {
                registry: Duration::from_secs(5),
                imaging: Duration::from_millis(50),
                vitals: Duration::from_secs(5),
            },
        );

        let started = Instant::now();
        let snapshot = orch.fetch(1, &FetchWindow::unbounded()).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2), "join waited on the hung source");

        let failures = snapshot.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].origin, Source::ImagingArchive);
        assert_eq!(failures[0].reason, FailureReason::Timeout(Duration::from_millis(50)));
        assert_eq!(snapshot.readings.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_source_is_recorded_as_unavailable() {
        let orch = orchestrator(
            MockSource::failing("connection refused"),
            MockSource::records(vec![]),
            MockSource::records(vec![]),
            SourceTimeouts::default(),
        );

        let snapshot = orch.fetch(1, &FetchWindow::unbounded()).await.unwrap();
        let failures = snapshot.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].origin, Source::Registry);
        assert!(matches!(&failures[0].reason, FailureReason::Unavailable(msg) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn total_failure_is_an_error() {
        let orch = orchestrator(
            MockSource::failing("db down"),
            MockSource::hanging(),
            MockSource::failing("500"),
            SourceTimeouts::uniform(Duration::from_millis(30)),
        );

        match orch.fetch(1, &FetchWindow::unbounded()).await {
            Err(TimelineError::AllSourcesFailed(failures)) => {
                let origins: Vec<Source> = failures.iter().map(|f| f.origin).collect();
                assert_eq!(origins, Source::ALL.to_vec());
                assert!(failures[1].is_timeout());
            }
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn window_and_patient_are_forwarded() {
        let vitals = Arc::new(MockSource::<RawReading>::records(vec![]));
        let orch = FetchOrchestrator::new(
            Arc::new(MockSource::<RawEncounter>::records(vec![])),
            Arc::new(MockSource::<RawStudy>::records(vec![])),
            vitals.clone(),
            SourceTimeouts::default(),
        );
        let window = FetchWindow::new(Some(instant("2024-01-15T00:00:00Z")), None);

        orch.fetch(9, &window).await.unwrap();
        assert_eq!(vitals.last_call(), Some((9, window)));
    }
}
