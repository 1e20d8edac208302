// src/orchestrator.rs

use tracing::{debug, error, info, warn};

use crate::{
    accessors::{Accessors, PrivilegeCheck},
    errors::{PreconditionError, RunError},
    models::{ResourceIdentity, TaskRef},
    operations::{
        CachePurge, FlagMutation, Mutation, MutationContext, OperationId, ServiceMutation,
        TaskMutation,
    },
    profile::Profile,
    report::{Outcome, Report, Status},
    snapshot::{RestoreSummary, SnapshotStore},
};

pub const RESTORE_SECTION: &str = "Restore snapshot";
pub const REENABLE_SECTION: &str = "Re-enable tasks";

/// Optional apply steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub clear_cache: bool,
    pub deep_clean: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Apply(ApplyOptions),
    Undo,
}

/// Drives one apply or undo pass against a snapshot store.
pub struct Orchestrator<'a> {
    store: SnapshotStore,
    accessors: Accessors<'a>,
    privilege: &'a dyn PrivilegeCheck,
    profile: Profile,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: SnapshotStore,
        accessors: Accessors<'a>,
        privilege: &'a dyn PrivilegeCheck,
        profile: Profile,
    ) -> Self {
        Self {
            store,
            accessors,
            privilege,
            profile,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Runs `command` to completion.
    ///
    /// # Returns
    ///
    /// - `Ok(Report)` once the pass finished, even if some resources failed.
    /// - `Err(RunError)` if the process is not elevated or, on apply, the
    ///   snapshot generation could not be started. Nothing is mutated in
    ///   either case.
    pub fn run(&self, command: Command) -> Result<Report, RunError> {
        if !self.privilege.is_elevated() {
            error!("Refusing to run: {}", PreconditionError::NotElevated);
            return Err(PreconditionError::NotElevated.into());
        }
        match command {
            Command::Apply(options) => self.apply(options),
            Command::Undo => Ok(self.undo()),
        }
    }

    /// Mutations for one apply pass, in run order.
    fn plan(&self, options: ApplyOptions) -> Vec<Box<dyn Mutation>> {
        let profile = &self.profile;
        let mut plan: Vec<Box<dyn Mutation>> = vec![
            Box::new(ServiceMutation::new(
                OperationId::CurbBackgroundScanning,
                profile.core_services.clone(),
            )),
            Box::new(FlagMutation::new(profile.flag_locations.clone())),
            Box::new(TaskMutation::new(profile.task_patterns.clone())),
        ];
        if options.deep_clean {
            plan.push(Box::new(ServiceMutation::new(
                OperationId::ExtendedSuppression,
                profile.extended_services.clone(),
            )));
        }
        if options.clear_cache {
            plan.push(Box::new(CachePurge::new(
                profile.cache_dir.clone(),
                profile.cache_patterns.clone(),
            )));
        }
        plan
    }

    fn apply(&self, options: ApplyOptions) -> Result<Report, RunError> {
        let generation = self.store.begin_generation()?;
        let ctx = MutationContext {
            store: &self.store,
            generation: &generation,
            accessors: self.accessors,
        };

        let mut report = Report::new();
        report.note(format!(
            "Prior state saved to generation '{}' in '{}'.",
            generation.name(),
            self.store.root().display()
        ));

        for mutation in self.plan(options) {
            let id = mutation.id();
            info!("{:?} -> Applying.", id);
            report.extend(id.to_string(), mutation.apply(&ctx));
            if !mutation.reversible() {
                report.note(format!(
                    "{} cannot be undone: deleted files are not restored by --undo.",
                    id
                ));
            }
        }

        if report.has_failures() {
            warn!("Apply finished with {} failure(s).", report.count(Status::Failed));
        } else {
            info!("Apply finished.");
        }
        Ok(report)
    }

    fn undo(&self) -> Report {
        let mut report = Report::new();

        let summary = match self.store.restore_latest(&self.accessors) {
            Ok(Some(summary)) => Some(summary),
            Ok(None) => self.restore_fallback(&mut report),
            Err(e) => {
                warn!("Could not read the latest snapshot: {}", e);
                report.push(RESTORE_SECTION, Outcome::failed("latest snapshot", e));
                self.restore_fallback(&mut report)
            }
        };

        let Some(summary) = summary else {
            report.extend(RESTORE_SECTION, Vec::new());
            report.note("No snapshot found: nothing to restore.");
            return report;
        };

        report.note(format!("Restored from the {}.", summary.source));
        let RestoreSummary {
            outcomes,
            disabled_tasks,
            ..
        } = summary;
        let reenabled = self.reenable_tasks(&disabled_tasks, &outcomes);
        report.extend(RESTORE_SECTION, outcomes);
        report.extend(REENABLE_SECTION, reenabled);

        if report.has_failures() {
            warn!("Undo finished with {} failure(s).", report.count(Status::Failed));
        } else {
            info!("Undo finished.");
        }
        report
    }

    fn restore_fallback(&self, report: &mut Report) -> Option<RestoreSummary> {
        debug!("No latest snapshot, falling back to the newest generation.");
        match self.store.restore_most_recent_generation(&self.accessors) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Could not read snapshot generations: {}", e);
                report.push(RESTORE_SECTION, Outcome::failed("snapshot generations", e));
                None
            }
        }
    }

    /// Re-enables each listed task. Tasks whose own record already restored
    /// them are reported unchanged.
    fn reenable_tasks(&self, tasks: &[TaskRef], restored: &[Outcome]) -> Vec<Outcome> {
        tasks
            .iter()
            .map(|task| {
                let subject = ResourceIdentity::task(task).to_string();
                let already = restored
                    .iter()
                    .any(|o| o.subject == subject && o.status == Status::Restored);
                if already {
                    return Outcome::unchanged(subject, "already re-enabled from its snapshot");
                }
                match self.accessors.tasks.enable(task) {
                    Ok(()) => {
                        info!("Re-enabled task '{}'.", task);
                        Outcome::restored(subject, "task enabled")
                    }
                    Err(e) if e.is_not_found() => {
                        Outcome::skipped(subject, "task no longer exists")
                    }
                    Err(e) => {
                        warn!("Failed to re-enable task '{}': {}", task, e);
                        Outcome::failed(subject, e)
                    }
                }
            })
            .collect()
    }
}
