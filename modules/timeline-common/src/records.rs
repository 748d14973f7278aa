// Raw record shapes as returned by the upstream clients, before normalization.
//
// Every field a bad upstream row could omit is optional; the normalizer decides
// what is usable.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional query window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl FetchWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Inclusive on both ends; an open end matches everything on that side.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| from <= at) && self.to.map_or(true, |to| at <= to)
    }
}

/// One row of the encounter registry (surgeries and emergency-room visits).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEncounter {
    pub id: String,
    /// `surgery` or `emergency_room`.
    pub kind: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Surgeon for surgeries, attending physician for ER visits.
    pub clinician: Option<String>,
    /// Procedure for surgeries, chief complaint for ER visits.
    pub summary: Option<String>,
    pub flag: Option<String>,
}

/// One imaging study from the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStudy {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default, alias = "note")]
    pub radiologist_note: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
}

/// One vitals reading from the monitor service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub bpm: Option<u32>,
    #[serde(default)]
    pub bp: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
}

/// Parse an ISO-8601 instant. Accepts RFC 3339 with any offset, or a naive
/// date-time which is taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_instant_accepts_zulu_offset_and_naive() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(parse_instant("2024-01-15T10:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T10:00:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T10:00"), Some(expected));
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("yesterday"), None);
        assert_eq!(parse_instant("2024-13-45T10:00:00Z"), None);
    }

    #[test]
    fn window_contains_is_inclusive_and_open_ended() {
        let from = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let window = FetchWindow::new(Some(from), Some(to));
        assert!(window.contains(from));
        assert!(window.contains(to));
        assert!(!window.contains(to + chrono::Duration::minutes(1)));
        assert!(FetchWindow::new(Some(from), None).contains(to + chrono::Duration::days(30)));
        assert!(FetchWindow::unbounded().contains(from));
    }

    #[test]
    fn raw_study_accepts_legacy_field_names() {
        let study: RawStudy = serde_json::from_str(
            r#"{"_id":"abc","timestamp":"2024-01-15T10:00:00Z","modality":"CT","note":"clear"}"#,
        )
        .unwrap();
        assert_eq!(study.id.as_deref(), Some("abc"));
        assert_eq!(study.radiologist_note.as_deref(), Some("clear"));
    }
}
