//! Output formatting for CLI display.

use uuid::Uuid;

use crate::model::{AccessLogEntry, Assignment, Disposition, Origin, Project};

/// First eight characters of an id, enough to pass back as a prefix.
pub(super) fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub(super) fn format_disposition(disposition: Disposition) -> &'static str {
    match disposition {
        Disposition::Submitted => "submitted",
        Disposition::Skipped => "skipped",
        Disposition::Deferred => "deferred",
    }
}

/// Status of an entry; stale wins over skipped, deferred over submitted.
pub(super) fn format_status(entry: &AccessLogEntry) -> &'static str {
    if entry.is_open() {
        "open"
    } else if entry.is_stale {
        "stale"
    } else if entry.is_deferred {
        "deferred"
    } else if entry.is_skipped {
        "skipped"
    } else {
        "submitted"
    }
}

pub(super) fn format_entry(entry: &AccessLogEntry) -> String {
    format!(
        "#{:<5} {:<10} {}:{:<6} {:<9} {}",
        entry.id,
        entry.user,
        short_id(entry.datasource_id),
        entry.datapoint,
        format_status(entry),
        entry.updated_at
    )
}

pub(super) fn format_flags(project: &Project) -> String {
    let mut flags = Vec::new();
    if project.disjoint_annotation {
        flags.push("disjoint");
    }
    flags.push(if project.auto_advance {
        "auto-advance"
    } else {
        "manual"
    });
    flags.join(", ")
}

/// One-line summary of an assignment, for stderr.
pub(super) fn describe_assignment(assignment: &Assignment) -> String {
    let handle = match assignment {
        Assignment::Datapoint(handle) => handle,
        Assignment::Empty => return "Nothing left to annotate".to_string(),
        Assignment::NoData => return "Project has no data".to_string(),
    };

    let origin = match handle.origin {
        Origin::Open => "resumed",
        Origin::LastSubmitted => "last submitted",
        Origin::Fresh => "new",
        Origin::Deferred => "deferred",
    };
    let mut line = format!(
        "Datapoint {} from {} [{origin}]",
        handle.datapoint,
        short_id(handle.datasource_id)
    );
    if !handle.source_name.is_empty() {
        line.push_str(&format!(" ({})", handle.source_name));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::model::DatapointHandle;

    fn entry() -> AccessLogEntry {
        AccessLogEntry {
            id: 1,
            user: "ann".into(),
            project_id: Uuid::new_v4(),
            datasource_id: Uuid::new_v4(),
            datapoint: 4,
            is_submitted: false,
            is_skipped: false,
            is_deferred: false,
            is_stale: false,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
            revision: 1,
        }
    }

    #[test]
    fn status_precedence() {
        let mut e = entry();
        assert_eq!(format_status(&e), "open");
        e.is_submitted = true;
        assert_eq!(format_status(&e), "submitted");
        e.is_deferred = true;
        assert_eq!(format_status(&e), "deferred");
        e.is_deferred = false;
        e.is_skipped = true;
        e.is_stale = true;
        assert_eq!(format_status(&e), "stale");
    }

    #[test]
    fn short_id_is_a_prefix() {
        let id = Uuid::new_v4();
        assert!(id.to_string().starts_with(&short_id(id)));
        assert_eq!(short_id(id).len(), 8);
    }

    #[test]
    fn describe_terminal_states() {
        assert_eq!(describe_assignment(&Assignment::Empty), "Nothing left to annotate");
        assert_eq!(describe_assignment(&Assignment::NoData), "Project has no data");
    }

    #[test]
    fn describe_datapoint_with_source_name() {
        let datasource_id: Uuid = "5c1e09aa-0000-4000-8000-000000000000".parse().unwrap();
        let handle = DatapointHandle {
            datapoint: 2,
            text: "hello".into(),
            datasource_id,
            source_name: "letter.txt".into(),
            is_deferred: false,
            origin: Origin::Fresh,
            entry_id: Some(7),
        };
        assert_eq!(
            describe_assignment(&Assignment::Datapoint(handle)),
            "Datapoint 2 from 5c1e09aa [new] (letter.txt)"
        );
    }
}
