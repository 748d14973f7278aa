//! Clinical timeline aggregation.
//!
//! Request flow: [`orchestrator`] fans out to the three sources, [`normalizer`]
//! maps raw records to canonical events, [`grouping`] attaches point events to
//! their encounter, [`assembler`] sets the partial/warning signal and
//! [`visibility`] applies the role policy. [`service::TimelineService`] wires
//! the stages together.

pub mod assembler;
pub mod grouping;
pub mod normalizer;
pub mod orchestrator;
pub mod service;
pub mod traits;
pub mod visibility;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use orchestrator::{FetchOrchestrator, FetchedSnapshot, SourceTimeouts};
pub use service::{TimelineDeps, TimelineService};
pub use traits::{EncounterSource, ImagingSource, VitalsSource};
pub use visibility::{RoleVisibility, Unrestricted, VisibilityPolicy, VisibilityTable};
