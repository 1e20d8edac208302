// src/operations/services.rs

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Mutation, MutationContext, OperationId};
use crate::{
    models::{CapturedState, ResourceIdentity, StartupMode},
    report::Outcome,
};

/// Desired startup mode for one service, optionally followed by a stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    pub name: String,
    pub mode: StartupMode,
    #[serde(default)]
    pub stop: bool,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, mode: StartupMode) -> Self {
        Self {
            name: name.into(),
            mode,
            stop: false,
        }
    }

    pub fn and_stop(mut self) -> Self {
        self.stop = true;
        self
    }
}

/// Sets startup modes for a list of services, capturing each one first.
#[derive(Debug, Clone)]
pub struct ServiceMutation {
    pub id: OperationId,
    pub targets: Vec<ServiceTarget>,
}

impl ServiceMutation {
    pub fn new(id: OperationId, targets: Vec<ServiceTarget>) -> Self {
        Self { id, targets }
    }

    fn apply_target(&self, ctx: &MutationContext<'_>, target: &ServiceTarget) -> Vec<Outcome> {
        let identity = ResourceIdentity::service(&target.name);
        let subject = identity.to_string();

        let record = match ctx.capture(&identity) {
            Ok(record) => record,
            Err(e) => {
                warn!("{:?} -> Not touching {}: {}", self.id, identity, e);
                return vec![Outcome::failed(subject, e)];
            }
        };

        let current = match &record.state {
            CapturedState::StartupMode(raw) => StartupMode::parse_lenient(raw),
            CapturedState::Absent => {
                debug!("{:?} -> {} is not installed.", self.id, identity);
                return vec![Outcome::skipped(subject, "service is not installed")];
            }
            other => {
                return vec![Outcome::skipped(
                    subject,
                    format!("unexpected captured state {:?}", other),
                )]
            }
        };

        let mut outcomes = Vec::with_capacity(2);
        if current == target.mode {
            outcomes.push(Outcome::unchanged(
                subject.clone(),
                format!("startup mode already {}", target.mode),
            ));
        } else {
            match ctx.accessors.services.set_startup_mode(&target.name, target.mode) {
                Ok(()) => {
                    info!(
                        "{:?} -> {} startup mode {} -> {}.",
                        self.id, identity, current, target.mode
                    );
                    outcomes.push(Outcome::applied(
                        subject.clone(),
                        format!("startup mode {} -> {}", current, target.mode),
                    ));
                }
                Err(e) => {
                    warn!("{:?} -> Failed to set {}: {}", self.id, identity, e);
                    outcomes.push(Outcome::failed(subject.clone(), e));
                }
            }
        }

        if target.stop {
            let stop_subject = format!("{} (stop)", subject);
            match ctx.accessors.services.stop(&target.name) {
                Ok(()) => outcomes.push(Outcome::applied(stop_subject, "stopped")),
                Err(e) => {
                    warn!("{:?} -> Failed to stop {}: {}", self.id, identity, e);
                    outcomes.push(Outcome::failed(stop_subject, e));
                }
            }
        }
        outcomes
    }
}

impl Mutation for ServiceMutation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn apply(&self, ctx: &MutationContext<'_>) -> Vec<Outcome> {
        self.targets
            .iter()
            .flat_map(|target| self.apply_target(ctx, target))
            .collect()
    }
}
