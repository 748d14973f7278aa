use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Enums ---

/// Upstream service an event was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Registry,
    ImagingArchive,
    VitalsService,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Registry, Source::ImagingArchive, Source::VitalsService];

    /// Name used in user-facing warnings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Registry => "encounter registry",
            Source::ImagingArchive => "imaging archive",
            Source::VitalsService => "vitals service",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Registry => write!(f, "registry"),
            Source::ImagingArchive => write!(f, "imaging_archive"),
            Source::VitalsService => write!(f, "vitals_service"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    EncounterSurgery,
    EncounterEr,
    Imaging,
    Vitals,
}

impl EventKind {
    pub fn is_encounter(&self) -> bool {
        matches!(self, EventKind::EncounterSurgery | EventKind::EncounterEr)
    }

    /// Payload field names valid for this kind, as they appear on the wire.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            EventKind::EncounterSurgery => &["surgeonName", "procedure"],
            EventKind::EncounterEr => &["attendingPhysician", "chiefComplaint"],
            EventKind::Imaging => &["modality", "radiologistNote"],
            EventKind::Vitals => &["bpm", "bp"],
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::EncounterSurgery => write!(f, "encounter_surgery"),
            EventKind::EncounterEr => write!(f, "encounter_er"),
            EventKind::Imaging => write!(f, "imaging"),
            EventKind::Vitals => write!(f, "vitals"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFlag {
    PostDischarge,
}

impl EventFlag {
    /// Lenient parse of the upstream flag column. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "post_discharge" | "post-discharge" => Some(EventFlag::PostDischarge),
            _ => None,
        }
    }
}

/// Caller-declared persona. Not authenticated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Nurse,
    Intern,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Doctor => write!(f, "doctor"),
            Role::Nurse => write!(f, "nurse"),
            Role::Intern => write!(f, "intern"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "intern" => Ok(Role::Intern),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

// --- Payloads ---

fn keep<T>(visible: &BTreeSet<String>, name: &str, value: Option<T>) -> Option<T> {
    value.filter(|_| visible.contains(name))
}

/// Kind tag plus kind-specific fields of an encounter. Serialized as
/// `"type": ..., "data": {...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EncounterPayload {
    #[serde(rename_all = "camelCase")]
    EncounterSurgery {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        surgeon_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        procedure: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    EncounterEr {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attending_physician: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chief_complaint: Option<String>,
    },
}

impl EncounterPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EncounterPayload::EncounterSurgery { .. } => EventKind::EncounterSurgery,
            EncounterPayload::EncounterEr { .. } => EventKind::EncounterEr,
        }
    }

    /// Clear every field whose wire name is not in `visible`.
    pub fn retain_fields(self, visible: &BTreeSet<String>) -> Self {
        match self {
            EncounterPayload::EncounterSurgery { surgeon_name, procedure } => {
                EncounterPayload::EncounterSurgery {
                    surgeon_name: keep(visible, "surgeonName", surgeon_name),
                    procedure: keep(visible, "procedure", procedure),
                }
            }
            EncounterPayload::EncounterEr { attending_physician, chief_complaint } => {
                EncounterPayload::EncounterEr {
                    attending_physician: keep(visible, "attendingPhysician", attending_physician),
                    chief_complaint: keep(visible, "chiefComplaint", chief_complaint),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PointPayload {
    #[serde(rename_all = "camelCase")]
    Imaging {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modality: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        radiologist_note: Option<String>,
    },
    Vitals {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bpm: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bp: Option<String>,
    },
}

impl PointPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            PointPayload::Imaging { .. } => EventKind::Imaging,
            PointPayload::Vitals { .. } => EventKind::Vitals,
        }
    }

    pub fn retain_fields(self, visible: &BTreeSet<String>) -> Self {
        match self {
            PointPayload::Imaging { modality, radiologist_note } => PointPayload::Imaging {
                modality: keep(visible, "modality", modality),
                radiologist_note: keep(visible, "radiologistNote", radiologist_note),
            },
            PointPayload::Vitals { bpm, bp } => PointPayload::Vitals {
                bpm: keep(visible, "bpm", bpm),
                bp: keep(visible, "bp", bp),
            },
        }
    }
}

// --- Events ---

/// An instantaneous clinical record (imaging study or vitals reading).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointEvent {
    pub id: String,
    #[serde(flatten)]
    pub payload: PointPayload,
    pub timestamp: DateTime<Utc>,
    pub patient_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<EventFlag>,
    pub source: Source,
}

impl PointEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// A time-bounded clinical episode that can own point events.
///
/// `timestamp` mirrors `start`. Construct through [`Encounter::new`], which
/// rejects inverted intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: String,
    #[serde(flatten)]
    pub payload: EncounterPayload,
    pub timestamp: DateTime<Utc>,
    pub patient_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<EventFlag>,
    pub source: Source,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub children: Vec<PointEvent>,
}

impl Encounter {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(
        id: String,
        patient_id: i64,
        payload: EncounterPayload,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        flag: Option<EventFlag>,
    ) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self {
            id,
            payload,
            timestamp: start,
            patient_id,
            flag,
            source: Source::Registry,
            start,
            end,
            children: Vec::new(),
        })
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Grouped, filtered timeline for one patient and one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineResult {
    pub parents: Vec<Encounter>,
    pub standalone: Vec<PointEvent>,
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
