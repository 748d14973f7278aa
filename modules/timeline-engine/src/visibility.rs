//! Role-scoped visibility.
//!
//! The policy is data, not code: a [`VisibilityPolicy`] hands back a
//! [`RoleVisibility`] for the caller's role and [`apply`] enforces it on a
//! finished [`TimelineResult`]. The built-in default is [`Unrestricted`].
//! Deployments can load a [`VisibilityTable`] from JSON, for example:
//!
//! ```json
//! {
//!   "nurse":  { "hiddenKinds": ["encounter_surgery"] },
//!   "intern": { "hiddenKinds": ["imaging"], "showPostDischarge": false }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use timeline_common::{EventFlag, EventKind, Result, Role, TimelineError, TimelineResult};

/// What one role may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleVisibility {
    /// Kinds removed entirely. Hiding an encounter kind removes its children too.
    pub hidden_kinds: BTreeSet<EventKind>,
    /// Visible payload fields per kind. Kinds not listed keep every field.
    pub visible_fields: BTreeMap<EventKind, BTreeSet<String>>,
    pub show_post_discharge: bool,
}

impl Default for RoleVisibility {
    fn default() -> Self {
        Self::unrestricted()
    }
}

impl RoleVisibility {
    pub fn unrestricted() -> Self {
        Self {
            hidden_kinds: BTreeSet::new(),
            visible_fields: BTreeMap::new(),
            show_post_discharge: true,
        }
    }

    pub fn hide_kind(mut self, kind: EventKind) -> Self {
        self.hidden_kinds.insert(kind);
        self
    }

    pub fn only_fields(mut self, kind: EventKind, fields: &[&str]) -> Self {
        self.visible_fields
            .insert(kind, fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn hide_post_discharge(mut self) -> Self {
        self.show_post_discharge = false;
        self
    }

    pub fn allows(&self, kind: EventKind, flag: Option<EventFlag>) -> bool {
        if self.hidden_kinds.contains(&kind) {
            return false;
        }
        !(flag == Some(EventFlag::PostDischarge) && !self.show_post_discharge)
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == Self::unrestricted()
    }

    /// Every listed field must be a payload field of its kind.
    fn validate(&self) -> std::result::Result<(), String> {
        for (kind, fields) in &self.visible_fields {
            let valid = kind.fields();
            if let Some(bad) = fields.iter().find(|f| !valid.contains(&f.as_str())) {
                return Err(format!(
                    "field '{bad}' is not valid for {kind} (expected one of {})",
                    valid.join(", ")
                ));
            }
        }
        Ok(())
    }
}

pub trait VisibilityPolicy: Send + Sync {
    fn for_role(&self, role: Role) -> RoleVisibility;
}

/// No redaction for any role.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl VisibilityPolicy for Unrestricted {
    fn for_role(&self, _role: Role) -> RoleVisibility {
        RoleVisibility::unrestricted()
    }
}

/// Explicit role → visibility table. Roles missing from the table are
/// unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisibilityTable {
    roles: BTreeMap<Role, RoleVisibility>,
}

impl VisibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: Role, visibility: RoleVisibility) -> Self {
        self.roles.insert(role, visibility);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(raw)
            .map_err(|e| TimelineError::Config(format!("invalid visibility table: {e}")))?;
        for (role, visibility) in &table.roles {
            visibility
                .validate()
                .map_err(|e| TimelineError::Config(format!("visibility table, role {role}: {e}")))?;
        }
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TimelineError::Config(format!("cannot read visibility table {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

impl VisibilityPolicy for VisibilityTable {
    fn for_role(&self, role: Role) -> RoleVisibility {
        self.roles.get(&role).cloned().unwrap_or_default()
    }
}

/// Enforce `rules` on a finished result. Hidden encounters take their children
/// with them; surviving payloads lose non-visible fields. `partial` and
/// `warning` pass through untouched.
pub fn apply(result: TimelineResult, rules: &RoleVisibility) -> TimelineResult {
    if rules.is_unrestricted() {
        return result;
    }

    let point = |event: timeline_common::PointEvent| {
        if !rules.allows(event.kind(), event.flag) {
            return None;
        }
        let mut event = event;
        if let Some(fields) = rules.visible_fields.get(&event.kind()) {
            event.payload = event.payload.retain_fields(fields);
        }
        Some(event)
    };

    let parents = result
        .parents
        .into_iter()
        .filter(|p| rules.allows(p.kind(), p.flag))
        .map(|mut parent| {
            if let Some(fields) = rules.visible_fields.get(&parent.kind()) {
                parent.payload = parent.payload.retain_fields(fields);
            }
            parent.children = std::mem::take(&mut parent.children)
                .into_iter()
                .filter_map(point)
                .collect();
            parent
        })
        .collect();

    TimelineResult {
        parents,
        standalone: result.standalone.into_iter().filter_map(point).collect(),
        partial: result.partial,
        warning: result.warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group;
    use crate::normalizer::{normalize_encounter, normalize_reading, normalize_study};
    use crate::testing::*;
    use timeline_common::{EncounterPayload, PointPayload};

    fn sample() -> TimelineResult {
        let mut flagged = reading("2024-01-15T18:00:00Z");
        flagged.flag = Some("post_discharge".into());

        let grouping = group(
            vec![
                normalize_encounter(1, surgery("surgery-1", "2024-01-15T10:00:00Z", "2024-01-15T12:00:00Z")).unwrap(),
                normalize_encounter(1, er("er-1", "2024-01-15T14:00:00Z", "2024-01-15T16:00:00Z")).unwrap(),
            ],
            vec![
                normalize_study(1, study("ct-1", "2024-01-15T10:30:00Z")).unwrap(),
                normalize_reading(1, reading("2024-01-15T11:00:00Z")).unwrap(),
                normalize_study(1, study("xr-1", "2024-01-15T15:00:00Z")).unwrap(),
                normalize_reading(1, flagged).unwrap(),
            ],
        );
        TimelineResult {
            parents: grouping.parents,
            standalone: grouping.standalone,
            partial: true,
            warning: Some("vitals degraded".into()),
        }
    }

    #[test]
    fn unrestricted_is_identity() {
        let result = sample();
        assert_eq!(apply(result.clone(), &Unrestricted.for_role(Role::Intern)), result);
    }

    #[test]
    fn hidden_encounter_kind_removes_parent_and_children() {
        let rules = RoleVisibility::unrestricted().hide_kind(EventKind::EncounterSurgery);
        let out = apply(sample(), &rules);

        let ids: Vec<&str> = out.parents.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["er-1"]);
        assert!(out.partial);
        assert_eq!(out.warning.as_deref(), Some("vitals degraded"));
    }

    #[test]
    fn hidden_point_kind_removed_everywhere() {
        let rules = RoleVisibility::unrestricted().hide_kind(EventKind::Imaging);
        let out = apply(sample(), &rules);
        let all_points = out
            .parents
            .iter()
            .flat_map(|p| p.children.iter())
            .chain(out.standalone.iter());
        assert!(all_points.clone().all(|e| e.kind() != EventKind::Imaging));
        assert_eq!(all_points.count(), 2);
    }

    #[test]
    fn post_discharge_events_can_be_hidden() {
        let out = apply(sample(), &RoleVisibility::unrestricted().hide_post_discharge());
        assert!(out.standalone.is_empty());
        assert_eq!(out.parents.len(), 2);
    }

    #[test]
    fn field_redaction_clears_only_unlisted_fields() {
        let rules = RoleVisibility::unrestricted()
            .only_fields(EventKind::Imaging, &["modality"])
            .only_fields(EventKind::EncounterSurgery, &[]);
        let out = apply(sample(), &rules);

        let surgery = out.parents.iter().find(|p| p.id == "surgery-1").unwrap();
        assert_eq!(
            surgery.payload,
            EncounterPayload::EncounterSurgery { surgeon_name: None, procedure: None }
        );
        let ct = surgery.children.iter().find(|c| c.id == "ct-1").unwrap();
        match &ct.payload {
            PointPayload::Imaging { modality, radiologist_note } => {
                assert_eq!(modality.as_deref(), Some("CT"));
                assert_eq!(*radiologist_note, None);
            }
            other => panic!("unexpected payload {other:?}"),
        }
        let er = out.parents.iter().find(|p| p.id == "er-1").unwrap();
        assert!(matches!(
            &er.payload,
            EncounterPayload::EncounterEr { attending_physician: Some(_), .. }
        ));
    }

    #[test]
    fn table_loads_from_json_and_defaults_missing_roles() {
        let table = VisibilityTable::from_json(
            r#"{
                "nurse":  { "hiddenKinds": ["encounter_surgery"] },
                "intern": { "hiddenKinds": ["imaging"], "visibleFields": { "vitals": ["bpm"] } }
            }"#,
        )
        .unwrap();

        assert!(table.for_role(Role::Doctor).is_unrestricted());
        assert!(!table.for_role(Role::Nurse).allows(EventKind::EncounterSurgery, None));
        let intern = table.for_role(Role::Intern);
        assert!(intern.show_post_discharge);
        assert_eq!(intern.visible_fields[&EventKind::Vitals].len(), 1);
    }

    #[test]
    fn table_rejects_fields_of_the_wrong_kind() {
        let err = VisibilityTable::from_json(r#"{ "nurse": { "visibleFields": { "vitals": ["modality"] } } }"#)
            .unwrap_err();
        assert!(matches!(err, TimelineError::Config(ref msg) if msg.contains("modality")));
    }

    #[test]
    fn table_rejects_unknown_roles_and_keys() {
        assert!(VisibilityTable::from_json(r#"{ "janitor": {} }"#).is_err());
        assert!(VisibilityTable::from_json(r#"{ "nurse": { "hiddenKind": [] } }"#).is_err());
    }

    #[test]
    fn shipped_example_table_is_valid() {
        let raw = include_str!("../../../config/visibility.example.json");
        let table = VisibilityTable::from_json(raw).unwrap();
        assert!(!table.for_role(Role::Nurse).allows(EventKind::EncounterSurgery, None));
        assert!(!table.for_role(Role::Intern).allows(EventKind::Imaging, None));
        assert!(table.for_role(Role::Doctor).is_unrestricted());
    }
}
