// Raw upstream records → canonical events.
//
// Lenient by contract: a record that cannot be normalized is logged and
// dropped, and the rest of the batch goes through.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use timeline_common::{
    parse_instant, Encounter, EncounterPayload, EventFlag, PointEvent, PointPayload, RawEncounter,
    RawReading, RawStudy, Source,
};

use crate::orchestrator::FetchedSnapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("{source_name} record {id} has no usable timestamp")]
    MissingTimestamp { source_name: Source, id: String },

    #[error("encounter {id} has no usable start or end")]
    MissingInterval { id: String },

    #[error("encounter {id} ends before it starts")]
    InvertedInterval { id: String },

    #[error("encounter {id} has unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("encounter record has an empty id")]
    MissingId,
}

#[derive(Debug, Default)]
pub struct NormalizedEvents {
    pub encounters: Vec<Encounter>,
    pub points: Vec<PointEvent>,
    pub dropped: usize,
}

/// Normalize every successful slot of a snapshot. Failed slots contribute
/// nothing.
pub fn normalize(patient_id: i64, snapshot: FetchedSnapshot) -> NormalizedEvents {
    let mut out = NormalizedEvents::default();

    for raw in snapshot.encounters.unwrap_or_default() {
        match normalize_encounter(patient_id, raw) {
            Ok(encounter) => out.encounters.push(encounter),
            Err(e) => out.drop_record(e),
        }
    }
    for raw in snapshot.studies.unwrap_or_default() {
        match normalize_study(patient_id, raw) {
            Ok(event) => out.points.push(event),
            Err(e) => out.drop_record(e),
        }
    }
    for raw in snapshot.readings.unwrap_or_default() {
        match normalize_reading(patient_id, raw) {
            Ok(event) => out.points.push(event),
            Err(e) => out.drop_record(e),
        }
    }

    if out.dropped > 0 {
        debug!(patient_id, dropped = out.dropped, "Dropped malformed records");
    }
    ensure_unique_ids(&mut out.points);
    out
}

impl NormalizedEvents {
    fn drop_record(&mut self, reason: MalformedRecord) {
        debug!(reason = %reason, "Dropping malformed record");
        self.dropped += 1;
    }
}

pub fn normalize_encounter(patient_id: i64, raw: RawEncounter) -> Result<Encounter, MalformedRecord> {
    if raw.id.trim().is_empty() {
        return Err(MalformedRecord::MissingId);
    }

    let payload = match raw.kind.trim().to_ascii_lowercase().as_str() {
        "surgery" => EncounterPayload::EncounterSurgery {
            surgeon_name: raw.clinician,
            procedure: raw.summary,
        },
        "emergency_room" | "er" => EncounterPayload::EncounterEr {
            attending_physician: raw.clinician,
            chief_complaint: raw.summary,
        },
        _ => {
            return Err(MalformedRecord::UnknownKind {
                id: raw.id,
                kind: raw.kind,
            })
        }
    };

    let (Some(start), Some(end)) = (raw.start, raw.end) else {
        return Err(MalformedRecord::MissingInterval { id: raw.id });
    };

    let flag = raw.flag.as_deref().and_then(EventFlag::parse);
    let id = raw.id;
    Encounter::new(id.clone(), patient_id, payload, start, end, flag)
        .ok_or(MalformedRecord::InvertedInterval { id })
}

pub fn normalize_study(patient_id: i64, raw: RawStudy) -> Result<PointEvent, MalformedRecord> {
    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(parse_instant)
        .ok_or_else(|| MalformedRecord::MissingTimestamp {
            source_name: Source::ImagingArchive,
            id: raw.id.clone().unwrap_or_default(),
        })?;

    let payload = PointPayload::Imaging {
        modality: raw.modality,
        radiologist_note: raw.radiologist_note,
    };
    Ok(PointEvent {
        id: non_empty(raw.id).unwrap_or_else(|| derived_id("imaging", patient_id, timestamp, &payload)),
        payload,
        timestamp,
        patient_id,
        flag: raw.flag.as_deref().and_then(EventFlag::parse),
        source: Source::ImagingArchive,
    })
}

pub fn normalize_reading(patient_id: i64, raw: RawReading) -> Result<PointEvent, MalformedRecord> {
    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(parse_instant)
        .ok_or_else(|| MalformedRecord::MissingTimestamp {
            source_name: Source::VitalsService,
            id: raw.id.clone().unwrap_or_default(),
        })?;

    let payload = PointPayload::Vitals {
        bpm: raw.bpm,
        bp: raw.bp,
    };
    Ok(PointEvent {
        id: non_empty(raw.id).unwrap_or_else(|| derived_id("vitals", patient_id, timestamp, &payload)),
        payload,
        timestamp,
        patient_id,
        flag: raw.flag.as_deref().and_then(EventFlag::parse),
        source: Source::VitalsService,
    })
}

fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|s| !s.trim().is_empty())
}

/// Stable id for upstream records that carry none:
/// `{prefix}-{patient}-{epoch millis}-{first 8 hex of sha256(payload)}`.
/// Two readings taken in the same millisecond differ by payload.
fn derived_id(prefix: &str, patient_id: i64, at: DateTime<Utc>, payload: &PointPayload) -> String {
    let digest = hex::encode(Sha256::digest(serde_json::to_vec(payload).unwrap_or_default()));
    format!("{prefix}-{patient_id}-{}-{}", at.timestamp_millis(), &digest[..8])
}

/// Event ids must be unique within one timeline. Exact duplicates (same
/// upstream id, or identical id-less records) get `-2`, `-3`, ... in
/// upstream order.
fn ensure_unique_ids(points: &mut [PointEvent]) {
    let mut taken: HashSet<String> = HashSet::with_capacity(points.len());
    for point in points.iter_mut() {
        if taken.insert(point.id.clone()) {
            continue;
        }
        let mut n = 2;
        let unique = loop {
            let candidate = format!("{}-{n}", point.id);
            if !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        debug!(id = %point.id, renamed = %unique, "Disambiguated duplicate event id");
        taken.insert(unique.clone());
        point.id = unique;
    }
}
