// src/snapshot/mod.rs

//! Write-ahead snapshot store.
//!
//! Layout under the state directory:
//!
//! ```text
//! <root>/
//!   20261017T120000Z/        one directory per apply, never modified later
//!     service--GamingServices.json
//!     key--HKEY_...json
//!     disabled-tasks.json    only if a task was disabled
//!   latest/                  recreated at the start of every apply
//! ```

pub mod generation;
pub mod restore;
pub mod store;

pub use generation::GenerationName;
pub use restore::restore_record;
pub use store::{
    GenerationHandle, RestoreSummary, SnapshotSource, SnapshotStore, DISABLED_TASKS_FILE,
    LATEST_DIR,
};
