use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use typed_builder::TypedBuilder;

use timeline_common::{Result, TimelineRequest, TimelineResult};

use crate::assembler::assemble;
use crate::grouping::group;
use crate::normalizer::normalize;
use crate::orchestrator::{FetchOrchestrator, SourceTimeouts};
use crate::traits::{EncounterSource, ImagingSource, VitalsSource};
use crate::visibility::{self, Unrestricted, VisibilityPolicy};

/// Everything a [`TimelineService`] needs. Shared across requests; holds no
/// per-request state.
#[derive(Clone, TypedBuilder)]
pub struct TimelineDeps {
    pub registry: Arc<dyn EncounterSource>,
    pub imaging: Arc<dyn ImagingSource>,
    pub vitals: Arc<dyn VitalsSource>,
    #[builder(default)]
    pub timeouts: SourceTimeouts,
    #[builder(default = Arc::new(Unrestricted) as Arc<dyn VisibilityPolicy>)]
    pub policy: Arc<dyn VisibilityPolicy>,
}

/// Entry point for one timeline request: fetch, normalize, group, assemble,
/// filter.
#[derive(Clone)]
pub struct TimelineService {
    orchestrator: FetchOrchestrator,
    policy: Arc<dyn VisibilityPolicy>,
}

impl TimelineService {
    pub fn new(deps: TimelineDeps) -> Self {
        Self {
            orchestrator: FetchOrchestrator::new(deps.registry, deps.imaging, deps.vitals, deps.timeouts),
            policy: deps.policy,
        }
    }

    pub async fn timeline(&self, request: &TimelineRequest) -> Result<TimelineResult> {
        // Re-validate: the fields are public and nothing may be fetched for a bad request.
        let request = TimelineRequest::new(request.patient_id, request.window, request.role)?;
        let started = Instant::now();

        let snapshot = self.orchestrator.fetch(request.patient_id, &request.window).await?;
        let failures = snapshot.failures();

        let normalized = normalize(request.patient_id, snapshot);
        let grouping = group(normalized.encounters, normalized.points);
        let assembled = assemble(grouping, &failures);
        let result = visibility::apply(assembled, &self.policy.for_role(request.role));

        if result.partial {
            warn!(
                patient_id = request.patient_id,
                failed = failures.len(),
                "Serving partial timeline"
            );
        }
        info!(
            patient_id = request.patient_id,
            role = %request.role,
            parents = result.parents.len(),
            standalone = result.standalone.len(),
            dropped = normalized.dropped,
            partial = result.partial,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Timeline assembled"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::visibility::{RoleVisibility, VisibilityTable};
    use timeline_common::{EventKind, FetchWindow, Role, TimelineError};

    fn deps_with(policy: Arc<dyn VisibilityPolicy>) -> TimelineDeps {
        TimelineDeps::builder()
            .registry(Arc::new(MockSource::records(vec![surgery(
                "surgery-1",
                "2024-01-15T10:00:00Z",
                "2024-01-15T12:00:00Z",
            )])))
            .imaging(Arc::new(MockSource::records(vec![study("ct-1", "2024-01-15T10:30:00Z")])))
            .vitals(Arc::new(MockSource::records(vec![reading("2024-01-15T13:00:00Z")])))
            .policy(policy)
            .build()
    }

    fn request(role: Role) -> TimelineRequest {
        TimelineRequest::new(1, FetchWindow::unbounded(), role).unwrap()
    }

    #[tokio::test]
    async fn default_policy_shows_everything() {
        let deps = TimelineDeps::builder()
            .registry(Arc::new(MockSource::<timeline_common::RawEncounter>::records(vec![])))
            .imaging(Arc::new(MockSource::records(vec![study("ct-1", "2024-01-15T10:30:00Z")])))
            .vitals(Arc::new(MockSource::<timeline_common::RawReading>::records(vec![])))
            .build();
        let result = TimelineService::new(deps).timeline(&request(Role::Intern)).await.unwrap();
        assert_eq!(result.standalone.len(), 1);
        assert!(!result.partial);
    }

    #[tokio::test]
    async fn pipeline_groups_and_filters_by_role() {
        let table = VisibilityTable::new()
            .with_role(Role::Nurse, RoleVisibility::unrestricted().hide_kind(EventKind::EncounterSurgery));
        let service = TimelineService::new(deps_with(Arc::new(table)));

        let doctor = service.timeline(&request(Role::Doctor)).await.unwrap();
        assert_eq!(doctor.parents.len(), 1);
        assert_eq!(doctor.parents[0].children.len(), 1);
        assert_eq!(doctor.standalone.len(), 1);

        let nurse = service.timeline(&request(Role::Nurse)).await.unwrap();
        assert!(nurse.parents.is_empty());
        assert_eq!(nurse.standalone.len(), 1);
    }

    #[tokio::test]
    async fn hand_built_invalid_request_is_rejected_before_fetch() {
        let registry = Arc::new(MockSource::<timeline_common::RawEncounter>::records(vec![]));
        let deps = TimelineDeps::builder()
            .registry(registry.clone())
            .imaging(Arc::new(MockSource::<timeline_common::RawStudy>::records(vec![])))
            .vitals(Arc::new(MockSource::<timeline_common::RawReading>::records(vec![])))
            .build();
        let bad = TimelineRequest {
            patient_id: 1,
            window: FetchWindow::new(
                Some(instant("2024-01-16T00:00:00Z")),
                Some(instant("2024-01-15T00:00:00Z")),
            ),
            role: Role::Doctor,
        };

        let err = TimelineService::new(deps).timeline(&bad).await.unwrap_err();
        assert!(matches!(err, TimelineError::InvalidRequest(_)));
        assert_eq!(registry.calls(), 0);
    }
}
