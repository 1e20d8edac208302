// src/operations/flags.rs

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Mutation, MutationContext, OperationId};
use crate::{
    models::{CapturedState, KeyNode, ResourceIdentity},
    report::Outcome,
};

/// A registry key and the DWORD flags under it that must read 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagLocation {
    pub path: String,
    pub flags: Vec<String>,
}

impl FlagLocation {
    pub fn new<S: Into<String>>(path: impl Into<String>, flags: impl IntoIterator<Item = S>) -> Self {
        Self {
            path: path.into(),
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    fn already_suppressed(&self, node: &KeyNode) -> bool {
        self.flags.iter().all(|flag| {
            node.values
                .get(flag)
                .and_then(|value| value.as_dword())
                == Some(0)
        })
    }
}

#[derive(Debug, Clone)]
pub struct FlagMutation {
    pub locations: Vec<FlagLocation>,
}

impl FlagMutation {
    pub fn new(locations: Vec<FlagLocation>) -> Self {
        Self { locations }
    }

    fn apply_location(&self, ctx: &MutationContext<'_>, location: &FlagLocation) -> Outcome {
        let identity = ResourceIdentity::key(&location.path);
        let subject = identity.to_string();

        let record = match ctx.capture(&identity) {
            Ok(record) => record,
            Err(e) => {
                warn!("{:?} -> Not touching {}: {}", self.id(), identity, e);
                return Outcome::failed(subject, e);
            }
        };

        if let CapturedState::Subtree(blob) = &record.state {
            if location.already_suppressed(&blob.root) {
                debug!("{:?} -> {} already suppressed.", self.id(), identity);
                return Outcome::unchanged(subject, "all flags already 0");
            }
        }

        let mut failures = Vec::new();
        for flag in &location.flags {
            if let Err(e) = ctx.accessors.keys.set_value(&location.path, flag, 0) {
                warn!(
                    "{:?} -> Failed to set '{}' under {}: {}",
                    self.id(),
                    flag,
                    identity,
                    e
                );
                failures.push(format!("'{}': {}", flag, e));
            }
        }

        if !failures.is_empty() {
            return Outcome::failed(subject, failures.join("; "));
        }

        info!(
            "{:?} -> Set {} flag(s) to 0 under {}.",
            self.id(),
            location.flags.len(),
            identity
        );
        Outcome::applied(
            subject,
            format!("{} set to 0", location.flags.join(", ")),
        )
    }
}

impl Mutation for FlagMutation {
    fn id(&self) -> OperationId {
        OperationId::SuppressDiscoveryFlags
    }

    fn apply(&self, ctx: &MutationContext<'_>) -> Vec<Outcome> {
        self.locations
            .iter()
            .map(|location| self.apply_location(ctx, location))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accessors::{memory::MemorySystem, Accessors},
        models::KeyValueData,
        operations::test_support::open_generation,
        report::Status,
        snapshot::DISABLED_TASKS_FILE,
    };

    const POLICY: &str = "HKEY_LOCAL_MACHINE\\SOFTWARE\\Policies\\Test";
    const USER: &str = "HKEY_CURRENT_USER\\Software\\Test\\Discovery";

    fn mutation() -> FlagMutation {
        FlagMutation::new(vec![
            FlagLocation::new(POLICY, ["EnableScan", "EnableNetwork"]),
            FlagLocation::new(USER, ["EnableScan"]),
        ])
    }

    #[test]
    fn test_writes_flags_and_creates_missing_keys() {
        let (_tmp, store, handle) = open_generation();
        let system = MemorySystem::new().with_value(POLICY, "EnableScan", KeyValueData::dword(1));
        let ctx = MutationContext {
            store: &store,
            generation: &handle,
            accessors: Accessors::from_system(&system),
        };

        let outcomes = mutation().apply(&ctx);

        assert!(outcomes.iter().all(|o| o.status == Status::Applied));
        assert_eq!(system.value(POLICY, "EnableScan"), Some(KeyValueData::dword(0)));
        assert_eq!(system.value(POLICY, "EnableNetwork"), Some(KeyValueData::dword(0)));
        assert_eq!(system.value(USER, "EnableScan"), Some(KeyValueData::dword(0)));

        let files: Vec<_> = std::fs::read_dir(handle.dir()).unwrap().collect();
        assert_eq!(files.len(), 2);
        assert!(!handle.dir().join(DISABLED_TASKS_FILE).exists());
    }

    #[test]
    fn test_suppressed_location_is_unchanged() {
        let (_tmp, store, handle) = open_generation();
        let system = MemorySystem::new()
            .with_value(USER, "EnableScan", KeyValueData::dword(0))
            .with_value(USER, "Other", KeyValueData::dword(9));
        let ctx = MutationContext {
            store: &store,
            generation: &handle,
            accessors: Accessors::from_system(&system),
        };

        let outcomes = FlagMutation::new(vec![FlagLocation::new(USER, ["EnableScan"])]).apply(&ctx);

        assert_eq!(outcomes[0].status, Status::Unchanged);
        assert_eq!(system.value(USER, "Other"), Some(KeyValueData::dword(9)));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let (_tmp, store, handle) = open_generation();
        let system = MemorySystem::new();
        let ctx = MutationContext {
            store: &store,
            generation: &handle,
            accessors: Accessors::from_system(&system),
        };
        system.fail_on(USER);

        let outcomes = mutation().apply(&ctx);

        assert_eq!(outcomes[0].status, Status::Applied);
        assert_eq!(outcomes[1].status, Status::Failed);
        assert_eq!(system.subtree(USER), None);
    }

    #[test]
    fn test_one_failing_flag_does_not_stop_the_others() {
        let (_tmp, store, handle) = open_generation();
        let system = MemorySystem::new();
        system.fail_on(&format!("{}:EnableScan", POLICY));
        let ctx = MutationContext {
            store: &store,
            generation: &handle,
            accessors: Accessors::from_system(&system),
        };

        let outcomes = FlagMutation::new(vec![FlagLocation::new(
            POLICY,
            ["EnableScan", "EnableNetwork", "EnableLibrary"],
        )])
        .apply(&ctx);

        assert_eq!(outcomes[0].status, Status::Failed);
        assert!(outcomes[0].detail.contains("'EnableScan'"));
        assert!(!outcomes[0].detail.contains("'EnableNetwork'"));
        assert_eq!(system.value(POLICY, "EnableScan"), None);
        assert_eq!(system.value(POLICY, "EnableNetwork"), Some(KeyValueData::dword(0)));
        assert_eq!(system.value(POLICY, "EnableLibrary"), Some(KeyValueData::dword(0)));
    }
}
