// src/snapshot/store.rs

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use super::{
    generation::{self, GenerationName},
    restore::restore_record,
};
use crate::{
    accessors::Accessors,
    errors::{AccessError, SnapshotError},
    models::{CapturedState, ResourceIdentity, ResourceKind, SnapshotRecord, TaskRef},
    report::Outcome,
};

/// Directory mirroring the newest generation.
pub const LATEST_DIR: &str = "latest";

/// Ordered list of tasks disabled by the run that wrote it.
pub const DISABLED_TASKS_FILE: &str = "disabled-tasks.json";

const RECORD_EXTENSION: &str = "json";

/// An open generation. Every record goes to the generation directory and to
/// the latest pointer.
#[derive(Debug, Clone)]
pub struct GenerationHandle {
    name: GenerationName,
    dir: PathBuf,
    latest: PathBuf,
}

impl GenerationHandle {
    pub fn name(&self) -> &GenerationName {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Where an undo pass read its records from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    Latest,
    Generation(String),
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Latest => f.write_str("latest snapshot"),
            SnapshotSource::Generation(name) => write!(f, "generation '{}'", name),
        }
    }
}

#[derive(Debug)]
pub struct RestoreSummary {
    pub source: SnapshotSource,
    /// One outcome per record file, in file-name order.
    pub outcomes: Vec<Outcome>,
    /// Tasks the source run disabled; re-enabling them is the caller's job.
    pub disabled_tasks: Vec<TaskRef>,
}

/// Records read from one directory. Unreadable files are kept as errors so
/// restore can report and skip them.
struct LoadedDir {
    records: Vec<(String, Result<SnapshotRecord, SnapshotError>)>,
    disabled_tasks: Option<Result<Vec<TaskRef>, SnapshotError>>,
}

impl LoadedDir {
    fn is_empty(&self) -> bool {
        self.records.is_empty() && self.disabled_tasks.is_none()
    }
}

/// Append-only log of generations plus a replaceable `latest` cursor.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_dir(&self) -> PathBuf {
        self.root.join(LATEST_DIR)
    }

    /// Creates a new generation directory and resets the latest pointer.
    ///
    /// Must be called once per apply, before any mutation. The previous
    /// latest contents are discarded, not merged.
    pub fn begin_generation(&self) -> Result<GenerationHandle, SnapshotError> {
        fs::create_dir_all(&self.root).map_err(|source| SnapshotError::CreateDir {
            path: self.root.clone(),
            source,
        })?;

        let mut name = GenerationName::now();
        let dir = loop {
            let candidate = self.root.join(name.to_string());
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => name = name.next(),
                Err(source) => {
                    return Err(SnapshotError::CreateDir {
                        path: candidate,
                        source,
                    })
                }
            }
        };

        let latest = self.latest_dir();
        if latest.exists() {
            fs::remove_dir_all(&latest).map_err(|source| SnapshotError::ResetLatest {
                path: latest.clone(),
                source,
            })?;
        }
        fs::create_dir_all(&latest).map_err(|source| SnapshotError::ResetLatest {
            path: latest.clone(),
            source,
        })?;

        info!(
            "Started snapshot generation '{}' in '{}'.",
            name,
            self.root.display()
        );
        Ok(GenerationHandle { name, dir, latest })
    }

    /// Captures the current state of `identity` and durably writes it to the
    /// generation and to latest before returning.
    ///
    /// # Returns
    ///
    /// - `Ok(record)` with the captured state, `Absent` if the resource does
    ///   not exist. If the identity was already captured in this generation,
    ///   the record on disk is returned unchanged.
    /// - `Err(SnapshotError)` if the state could not be read or persisted; the
    ///   caller must not mutate the resource in that case.
    pub fn capture(
        &self,
        handle: &GenerationHandle,
        identity: &ResourceIdentity,
        accessors: &Accessors<'_>,
    ) -> Result<SnapshotRecord, SnapshotError> {
        let file_name = record_file_name(identity);
        let generation_path = handle.dir.join(&file_name);

        if generation_path.exists() {
            let record = read_record(&generation_path)?;
            debug!(
                "{} already captured in generation '{}', keeping the first capture.",
                identity, handle.name
            );
            return Ok(record);
        }

        let state = read_state(identity, accessors).map_err(|source| SnapshotError::Capture {
            identity: identity.to_string(),
            source,
        })?;
        let record = SnapshotRecord::new(identity.clone(), state);
        let bytes =
            serde_json::to_vec_pretty(&record).map_err(|source| SnapshotError::Serialize {
                subject: identity.to_string(),
                source,
            })?;

        write_atomic(&generation_path, &bytes)?;
        write_atomic(&handle.latest.join(&file_name), &bytes)?;

        debug!(
            "Captured {} as {:?} in generation '{}'.",
            identity, record.state, handle.name
        );
        Ok(record)
    }

    /// Persists the disabled-task list to the generation and to latest.
    /// An empty list writes nothing, so "no file" means "nothing disabled".
    pub fn record_disabled_tasks(
        &self,
        handle: &GenerationHandle,
        tasks: &[TaskRef],
    ) -> Result<(), SnapshotError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(tasks).map_err(|source| SnapshotError::Serialize {
            subject: DISABLED_TASKS_FILE.to_string(),
            source,
        })?;
        write_atomic(&handle.dir.join(DISABLED_TASKS_FILE), &bytes)?;
        write_atomic(&handle.latest.join(DISABLED_TASKS_FILE), &bytes)?;
        debug!(
            "Recorded {} disabled task(s) in generation '{}'.",
            tasks.len(),
            handle.name
        );
        Ok(())
    }

    /// Retained generations, oldest first.
    pub fn generations(&self) -> Result<Vec<GenerationName>, SnapshotError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| SnapshotError::List {
            path: self.root.clone(),
            source,
        })?;

        let mut names: Vec<GenerationName> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| GenerationName::parse(&entry.file_name().to_string_lossy()))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Replays every record in the latest pointer.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` if latest is missing or holds nothing.
    /// - `Ok(Some(summary))` with one outcome per record; failures do not stop
    ///   the replay.
    pub fn restore_latest(
        &self,
        accessors: &Accessors<'_>,
    ) -> Result<Option<RestoreSummary>, SnapshotError> {
        match load_dir(&self.latest_dir())? {
            Some(loaded) => {
                info!("Restoring from the latest snapshot.");
                Ok(Some(replay(SnapshotSource::Latest, loaded, accessors)))
            }
            None => {
                debug!("Latest snapshot is missing or empty.");
                Ok(None)
            }
        }
    }

    /// Fallback for a missing latest pointer: replays the newest generation
    /// that holds any records.
    pub fn restore_most_recent_generation(
        &self,
        accessors: &Accessors<'_>,
    ) -> Result<Option<RestoreSummary>, SnapshotError> {
        let mut remaining = self.generations()?;
        while let Some(name) = generation::newest(remaining.iter().cloned()) {
            remaining.retain(|candidate| candidate != &name);
            match load_dir(&self.root.join(name.to_string()))? {
                Some(loaded) => {
                    info!("Restoring from generation '{}'.", name);
                    return Ok(Some(replay(
                        SnapshotSource::Generation(name.to_string()),
                        loaded,
                        accessors,
                    )));
                }
                None => warn!("Generation '{}' is empty, trying an older one.", name),
            }
        }
        Ok(None)
    }
}

fn record_file_name(identity: &ResourceIdentity) -> String {
    format!("{}.{}", identity.file_stem(), RECORD_EXTENSION)
}

fn read_state(
    identity: &ResourceIdentity,
    accessors: &Accessors<'_>,
) -> Result<CapturedState, AccessError> {
    match identity.kind {
        ResourceKind::Service => match accessors.services.startup_mode(&identity.name) {
            Ok(mode) => Ok(CapturedState::StartupMode(mode.to_string())),
            Err(e) if e.is_not_found() => Ok(CapturedState::Absent),
            Err(e) => Err(e),
        },
        ResourceKind::Key => Ok(accessors
            .keys
            .export_subtree(&identity.name)?
            .map_or(CapturedState::Absent, CapturedState::Subtree)),
        ResourceKind::Task => {
            let wanted = TaskRef::from_full_name(&identity.name);
            let found = accessors
                .tasks
                .list_tasks("*", "*")?
                .into_iter()
                .find(|task| {
                    task.name.eq_ignore_ascii_case(&wanted.name)
                        && task.path.eq_ignore_ascii_case(&wanted.path)
                });
            Ok(found.map_or(CapturedState::Absent, |task| {
                CapturedState::TaskEnabled(task.state.is_enabled())
            }))
        }
    }
}

fn replay(source: SnapshotSource, loaded: LoadedDir, accessors: &Accessors<'_>) -> RestoreSummary {
    let mut outcomes = Vec::with_capacity(loaded.records.len());
    for (file_name, record) in loaded.records {
        match record {
            Ok(record) => outcomes.push(restore_record(&record, accessors)),
            Err(e) => {
                warn!("Skipping unreadable snapshot '{}': {}", file_name, e);
                outcomes.push(Outcome::skipped(
                    file_name,
                    format!("no prior value known ({})", e),
                ));
            }
        }
    }

    let disabled_tasks = match loaded.disabled_tasks {
        Some(Ok(tasks)) => tasks,
        Some(Err(e)) => {
            warn!("Skipping unreadable disabled-task list: {}", e);
            outcomes.push(Outcome::skipped(
                DISABLED_TASKS_FILE,
                format!("no prior value known ({})", e),
            ));
            Vec::new()
        }
        None => Vec::new(),
    };

    RestoreSummary {
        source,
        outcomes,
        disabled_tasks,
    }
}

/// Reads every record file in `dir`.
///
/// Returns `Ok(None)` if the directory does not exist or contains nothing.
fn load_dir(dir: &Path) -> Result<Option<LoadedDir>, SnapshotError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let entries = fs::read_dir(dir).map_err(|source| SnapshotError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXTENSION)
        })
        .collect();
    paths.sort();

    let mut loaded = LoadedDir {
        records: Vec::new(),
        disabled_tasks: None,
    };
    for path in paths {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name == DISABLED_TASKS_FILE {
            loaded.disabled_tasks = Some(read_json(&path));
        } else {
            loaded.records.push((file_name, read_record(&path)));
        }
    }

    Ok((!loaded.is_empty()).then_some(loaded))
}

fn read_record(path: &Path) -> Result<SnapshotRecord, SnapshotError> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(SnapshotError::Empty(path.to_path_buf()));
    }
    serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a temp file and a rename so a crash never leaves a torn
/// record behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes)
        .and_then(|()| fs::rename(&tmp, path))
        .map_err(|source| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        })
}
