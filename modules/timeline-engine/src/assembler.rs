use timeline_common::{FailureReason, SourceFailure, TimelineResult};

use crate::grouping::Grouping;

/// Package a grouping with the fetch failures that shaped it.
pub fn assemble(grouping: Grouping, failures: &[SourceFailure]) -> TimelineResult {
    TimelineResult {
        parents: grouping.parents,
        standalone: grouping.standalone,
        partial: !failures.is_empty(),
        warning: compose_warning(failures),
    }
}

/// User-facing warning naming every source that contributed nothing.
///
/// `None` when nothing failed.
pub fn compose_warning(failures: &[SourceFailure]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    let names: Vec<String> = failures
        .iter()
        .map(|f| match f.reason {
            FailureReason::Timeout(_) => format!("{} (timed out)", f.origin.display_name()),
            FailureReason::Unavailable(_) => f.origin.display_name().to_string(),
        })
        .collect();
    let verb = if names.len() == 1 { "was" } else { "were" };
    Some(format!(
        "Timeline is incomplete: {} {verb} unavailable.",
        join_names(&names)
    ))
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
