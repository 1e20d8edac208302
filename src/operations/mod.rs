// src/operations/mod.rs

pub mod cache;
pub mod flags;
pub mod services;
pub mod tasks;

use strum_macros::Display;

use crate::{
    accessors::Accessors,
    errors::SnapshotError,
    models::{ResourceIdentity, SnapshotRecord},
    report::Outcome,
    snapshot::{GenerationHandle, SnapshotStore},
};

pub use cache::CachePurge;
pub use flags::{FlagLocation, FlagMutation};
pub use services::{ServiceMutation, ServiceTarget};
pub use tasks::{TaskMutation, TaskPattern};

/// Every mutation an apply pass can run, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OperationId {
    #[strum(serialize = "Curb background scanning")]
    CurbBackgroundScanning,
    #[strum(serialize = "Suppress discovery flags")]
    SuppressDiscoveryFlags,
    #[strum(serialize = "Disable discovery tasks")]
    DisableDiscoveryTasks,
    #[strum(serialize = "Extended suppression")]
    ExtendedSuppression,
    #[strum(serialize = "Purge cached discovery artifacts")]
    PurgeDiscoveryCache,
}

/// Everything a mutation needs to capture before it writes.
pub struct MutationContext<'a> {
    pub store: &'a SnapshotStore,
    pub generation: &'a GenerationHandle,
    pub accessors: Accessors<'a>,
}

impl MutationContext<'_> {
    /// Write-ahead capture of `identity` into the open generation.
    pub fn capture(&self, identity: &ResourceIdentity) -> Result<SnapshotRecord, SnapshotError> {
        self.store
            .capture(self.generation, identity, &self.accessors)
    }
}

/// One step of an apply pass.
///
/// Implementations never return early on a per-resource error: each resource
/// gets its own `Outcome` and the pass moves on.
pub trait Mutation {
    fn id(&self) -> OperationId;

    /// Whether undo can reverse this step. Defaults to `true`.
    fn reversible(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &MutationContext<'_>) -> Vec<Outcome>;
}
