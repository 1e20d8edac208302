// src/operations/tasks.rs

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Mutation, MutationContext, OperationId};
use crate::{
    models::{ResourceIdentity, TaskInfo, TaskRef},
    report::Outcome,
};

/// A task selector: a task matches on its name **or** on its folder path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPattern {
    pub name: String,
    pub path: String,
}

impl TaskPattern {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Disables every enabled task matching any pattern and records which ones it
/// disabled, so undo re-enables exactly those.
#[derive(Debug, Clone)]
pub struct TaskMutation {
    pub patterns: Vec<TaskPattern>,
}

impl TaskMutation {
    pub fn new(patterns: Vec<TaskPattern>) -> Self {
        Self { patterns }
    }

    /// Union of all pattern matches, first-seen order, deduplicated on the
    /// case-insensitive full name.
    fn candidates(&self, ctx: &MutationContext<'_>, outcomes: &mut Vec<Outcome>) -> Vec<TaskInfo> {
        let mut found: IndexMap<String, TaskInfo> = IndexMap::new();
        for pattern in &self.patterns {
            match ctx.accessors.tasks.list_tasks(&pattern.name, &pattern.path) {
                Ok(tasks) => {
                    debug!(
                        "{:?} -> Pattern ('{}', '{}') matched {} task(s).",
                        self.id(),
                        pattern.name,
                        pattern.path,
                        tasks.len()
                    );
                    for task in tasks {
                        found
                            .entry(task.task_ref().full_name().to_lowercase())
                            .or_insert(task);
                    }
                }
                Err(e) => {
                    warn!("{:?} -> Failed to list tasks: {}", self.id(), e);
                    outcomes.push(Outcome::failed(
                        format!("task pattern ('{}', '{}')", pattern.name, pattern.path),
                        e,
                    ));
                }
            }
        }
        found.into_values().collect()
    }
}

impl Mutation for TaskMutation {
    fn id(&self) -> OperationId {
        OperationId::DisableDiscoveryTasks
    }

    fn apply(&self, ctx: &MutationContext<'_>) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        let candidates = self.candidates(ctx, &mut outcomes);
        let mut disabled: Vec<TaskRef> = Vec::new();

        for task in candidates {
            let task_ref = task.task_ref();
            let identity = ResourceIdentity::task(&task_ref);
            let subject = identity.to_string();

            if !task.state.is_enabled() {
                outcomes.push(Outcome::unchanged(subject, "already disabled"));
                continue;
            }

            if let Err(e) = ctx.capture(&identity) {
                warn!("{:?} -> Not touching {}: {}", self.id(), identity, e);
                outcomes.push(Outcome::failed(subject, e));
                continue;
            }

            if let Err(e) = ctx.accessors.tasks.disable(&task_ref) {
                warn!("{:?} -> Failed to disable {}: {}", self.id(), identity, e);
                outcomes.push(Outcome::failed(subject, e));
                continue;
            }

            disabled.push(task_ref);
            match ctx.store.record_disabled_tasks(ctx.generation, &disabled) {
                Ok(()) => {
                    info!("{:?} -> Disabled {}.", self.id(), identity);
                    outcomes.push(Outcome::applied(subject, "disabled"));
                }
                Err(e) => {
                    warn!(
                        "{:?} -> Disabled {} but could not record it: {}",
                        self.id(),
                        identity,
                        e
                    );
                    outcomes.push(Outcome::failed(
                        subject,
                        format!("disabled, but the disabled-task list was not saved: {}", e),
                    ));
                }
            }
        }
        outcomes
    }
}
