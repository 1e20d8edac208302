// src/accessors/mod.rs

//! Narrow interfaces over the OS resources this tool touches.
//!
//! Every call is individually best-effort: it returns an explicit
//! `Result<_, AccessError>` and never aborts the run.

pub mod memory;
#[cfg(windows)]
pub mod win32;

use crate::{
    errors::{AccessError, PreconditionError},
    models::{KeyBlob, StartupMode, TaskInfo, TaskRef},
};

pub type AccessResult<T> = Result<T, AccessError>;

pub trait ServiceControl {
    /// Reads the persisted startup mode. `NotFound` if the service is not installed.
    fn startup_mode(&self, name: &str) -> AccessResult<StartupMode>;

    fn set_startup_mode(&self, name: &str, mode: StartupMode) -> AccessResult<()>;

    /// Stops the service if it is running. Stopping a stopped service succeeds.
    fn stop(&self, name: &str) -> AccessResult<()>;
}

pub trait KeyValueStore {
    /// Exports the key at `path` with all of its values and subkeys.
    /// Returns `Ok(None)` when the key does not exist.
    fn export_subtree(&self, path: &str) -> AccessResult<Option<KeyBlob>>;

    /// Replaces the subtree at `blob.path` with the blob's contents.
    fn import_blob(&self, blob: &KeyBlob) -> AccessResult<()>;

    /// Deletes the key at `path` and everything beneath it.
    fn remove_subtree(&self, path: &str) -> AccessResult<()>;

    /// Writes a DWORD value, creating the key if needed.
    fn set_value(&self, path: &str, name: &str, value: u32) -> AccessResult<()>;
}

pub trait TaskScheduler {
    /// Lists tasks whose name matches `name_pattern` or whose folder path
    /// matches `path_pattern` (case-insensitive globs).
    fn list_tasks(&self, name_pattern: &str, path_pattern: &str) -> AccessResult<Vec<TaskInfo>>;

    fn disable(&self, task: &TaskRef) -> AccessResult<()>;

    fn enable(&self, task: &TaskRef) -> AccessResult<()>;
}

pub trait PrivilegeCheck {
    fn is_elevated(&self) -> bool;
}

/// Bundle of the three resource accessors handed to the snapshot store and
/// the mutation operations.
#[derive(Clone, Copy)]
pub struct Accessors<'a> {
    pub services: &'a dyn ServiceControl,
    pub keys: &'a dyn KeyValueStore,
    pub tasks: &'a dyn TaskScheduler,
}

impl<'a> Accessors<'a> {
    /// Uses one backend that implements every accessor.
    pub fn from_system<S>(system: &'a S) -> Self
    where
        S: ServiceControl + KeyValueStore + TaskScheduler,
    {
        Self {
            services: system,
            keys: system,
            tasks: system,
        }
    }
}

#[cfg(windows)]
pub type NativeSystem = win32::WindowsSystem;

#[cfg(not(windows))]
pub type NativeSystem = memory::MemorySystem;

/// Returns the accessors for the host OS.
#[cfg(windows)]
pub fn native() -> Result<NativeSystem, PreconditionError> {
    Ok(win32::WindowsSystem)
}

/// Returns the accessors for the host OS.
#[cfg(not(windows))]
pub fn native() -> Result<NativeSystem, PreconditionError> {
    Err(PreconditionError::UnsupportedPlatform(std::env::consts::OS))
}
