// src/snapshot/restore.rs

use tracing::{debug, warn};

use crate::{
    accessors::Accessors,
    models::{CapturedState, ResourceKind, SnapshotRecord, StartupMode, TaskRef},
    report::Outcome,
};

/// Writes one captured state back through the matching accessor.
///
/// Never fails the caller: every result, including "nothing to do", comes
/// back as an `Outcome`.
pub fn restore_record(record: &SnapshotRecord, accessors: &Accessors<'_>) -> Outcome {
    let identity = &record.identity;
    let subject = identity.to_string();
    debug!("Restoring {} captured at {}.", identity, record.captured_at);

    match (identity.kind, &record.state) {
        (ResourceKind::Key, CapturedState::Absent) => {
            match accessors.keys.remove_subtree(&identity.name) {
                Ok(()) => Outcome::restored(subject, "removed key that did not exist before apply"),
                Err(e) if e.is_not_found() => Outcome::unchanged(subject, "key was absent and still is"),
                Err(e) => {
                    warn!("Failed to remove {}: {}", identity, e);
                    Outcome::failed(subject, e)
                }
            }
        }
        (_, CapturedState::Absent) => {
            Outcome::unchanged(subject, "resource did not exist before apply")
        }
        (ResourceKind::Service, CapturedState::StartupMode(raw)) => {
            let mode = StartupMode::parse_lenient(raw);
            match accessors.services.set_startup_mode(&identity.name, mode) {
                Ok(()) => Outcome::restored(subject, format!("startup mode set to {}", mode)),
                Err(e) if e.is_not_found() => {
                    Outcome::skipped(subject, "service is no longer installed")
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", identity, e);
                    Outcome::failed(subject, e)
                }
            }
        }
        (ResourceKind::Key, CapturedState::Subtree(blob)) => {
            match accessors.keys.import_blob(blob) {
                Ok(()) => Outcome::restored(subject, "prior subtree re-imported"),
                Err(e) => {
                    warn!("Failed to restore {}: {}", identity, e);
                    Outcome::failed(subject, e)
                }
            }
        }
        (ResourceKind::Task, CapturedState::TaskEnabled(enabled)) => {
            let task = TaskRef::from_full_name(&identity.name);
            let result = if *enabled {
                accessors.tasks.enable(&task)
            } else {
                accessors.tasks.disable(&task)
            };
            match result {
                Ok(()) => Outcome::restored(
                    subject,
                    if *enabled { "task enabled" } else { "task disabled" },
                ),
                Err(e) if e.is_not_found() => Outcome::skipped(subject, "task no longer exists"),
                Err(e) => Outcome::failed(subject, e),
            }
        }
        (kind, _) => Outcome::skipped(
            subject,
            format!("captured state does not apply to a {} resource", kind),
        ),
    }
}
