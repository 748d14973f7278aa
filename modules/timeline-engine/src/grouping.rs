//! Interval-containment grouping.
//!
//! A point event belongs to encounter `p` iff `p.start <= t <= p.end`. When
//! several encounters contain `t`, the winner is the one with the latest
//! `start`, then the latest `end`, then the greatest id.
//!
//! Encounters are sorted ascending by that precedence key. For a timestamp
//! `t`, a binary search bounds the encounters that started at or before `t`;
//! scanning that prefix backwards, the first encounter still open at `t` is
//! the winner, since everything after it in sort order has either started
//! after `t` or already ended.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use timeline_common::{Encounter, PointEvent};

/// Encounters with their attached children, plus everything left over.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grouping {
    /// Most recent first: descending start, end, id.
    pub parents: Vec<Encounter>,
    /// Ascending timestamp, then id.
    pub standalone: Vec<PointEvent>,
}

fn precedence(a: &Encounter, b: &Encounter) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| a.end.cmp(&b.end))
        .then_with(|| a.id.cmp(&b.id))
}

fn chronological(a: &PointEvent, b: &PointEvent) -> Ordering {
    a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id))
}

/// Index of the encounter that owns `at`, if any. `parents` must be sorted by
/// [`precedence`] and `starts` must be their start instants in the same order.
fn owner_of(parents: &[Encounter], starts: &[DateTime<Utc>], at: DateTime<Utc>) -> Option<usize> {
    let started = starts.partition_point(|start| *start <= at);
    (0..started).rev().find(|&i| parents[i].end >= at)
}

/// Partition point events into encounter children and standalone events.
///
/// Children already attached to an encounter are kept. Pure and
/// deterministic: the output does not depend on input order.
pub fn group(encounters: Vec<Encounter>, points: Vec<PointEvent>) -> Grouping {
    let mut parents = encounters;
    parents.sort_by(precedence);
    let starts: Vec<DateTime<Utc>> = parents.iter().map(|p| p.start).collect();

    let mut standalone = Vec::new();
    for point in points {
        match owner_of(&parents, &starts, point.timestamp) {
            Some(idx) => parents[idx].children.push(point),
            None => standalone.push(point),
        }
    }

    for parent in &mut parents {
        parent.children.sort_by(chronological);
    }
    parents.reverse();
    standalone.sort_by(chronological);

    Grouping { parents, standalone }
}
