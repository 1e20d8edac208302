// src/operations/cache.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::GlobSet;
use tracing::{debug, info, warn};

use super::{Mutation, MutationContext, OperationId};
use crate::{matching::pattern_set, report::Outcome};

/// Deletes cached discovery files. Nothing is captured, so this cannot be
/// undone.
#[derive(Debug, Clone)]
pub struct CachePurge {
    /// `None` when the cache location could not be resolved on this host.
    pub directory: Option<PathBuf>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Default)]
struct PurgeTally {
    deleted: usize,
    failures: Vec<(PathBuf, String)>,
}

impl CachePurge {
    pub fn new(directory: Option<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            directory,
            patterns,
        }
    }

    fn purge_dir(&self, dir: &Path, matcher: &GlobSet, tally: &mut PurgeTally) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tally.failures.push((dir.to_path_buf(), e.to_string()));
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tally.failures.push((dir.to_path_buf(), e.to_string()));
                    continue;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                self.purge_dir(&path, matcher, tally);
                continue;
            }
            if !matcher.is_match(entry.file_name().to_string_lossy().as_ref()) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("{:?} -> Deleted '{}'.", self.id(), path.display());
                    tally.deleted += 1;
                }
                Err(e) => {
                    warn!(
                        "{:?} -> Failed to delete '{}': {}",
                        self.id(),
                        path.display(),
                        e
                    );
                    tally.failures.push((path, e.to_string()));
                }
            }
        }
    }
}

impl Mutation for CachePurge {
    fn id(&self) -> OperationId {
        OperationId::PurgeDiscoveryCache
    }

    fn reversible(&self) -> bool {
        false
    }

    fn apply(&self, _ctx: &MutationContext<'_>) -> Vec<Outcome> {
        let Some(directory) = self.directory.as_deref() else {
            return vec![Outcome::skipped(
                "discovery cache",
                "cache location could not be resolved",
            )];
        };
        let subject = format!("cache '{}'", directory.display());

        if !directory.is_dir() {
            debug!(
                "{:?} -> '{}' does not exist, nothing to purge.",
                self.id(),
                directory.display()
            );
            return vec![Outcome::skipped(subject, "directory does not exist")];
        }

        let matcher = match pattern_set(&self.patterns) {
            Ok(matcher) => matcher,
            Err(e) => return vec![Outcome::failed(subject, format!("bad pattern: {}", e))],
        };

        let mut tally = PurgeTally::default();
        self.purge_dir(directory, &matcher, &mut tally);
        info!(
            "{:?} -> Deleted {} file(s), {} failure(s).",
            self.id(),
            tally.deleted,
            tally.failures.len()
        );

        let mut outcomes: Vec<Outcome> = tally
            .failures
            .into_iter()
            .map(|(path, reason)| Outcome::failed(format!("'{}'", path.display()), reason))
            .collect();
        let summary = if tally.deleted == 0 {
            Outcome::unchanged(subject, "no matching files")
        } else {
            Outcome::applied(subject, format!("deleted {} file(s)", tally.deleted))
        };
        outcomes.insert(0, summary);
        outcomes
    }
}
