// src/models.rs

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

/// Persisted start configuration of a service (not its runtime status).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum StartupMode {
    Automatic,
    Manual,
    Disabled,
}

impl StartupMode {
    /// Parses a persisted startup mode string.
    ///
    /// Anything unrecognized falls back to `Manual`, the most conservative mode,
    /// so one odd record never fails a whole restore.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_else(|_| {
            warn!("Unrecognized startup mode '{}', falling back to Manual.", raw);
            StartupMode::Manual
        })
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Service,
    Key,
    Task,
}

/// Uniquely identifies one mutable OS resource. Used as the snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub kind: ResourceKind,
    /// Service name, full registry path, or `task path + task name`.
    pub name: String,
}

impl ResourceIdentity {
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Service,
            name: name.into(),
        }
    }

    pub fn key(path: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Key,
            name: path.into(),
        }
    }

    pub fn task(task: &TaskRef) -> Self {
        Self {
            kind: ResourceKind::Task,
            name: task.full_name(),
        }
    }

    /// File stem of this identity's state file inside a generation.
    ///
    /// Every byte outside `[A-Za-z0-9_-]` is percent-encoded, so two distinct
    /// identities never map to the same file.
    pub fn file_stem(&self) -> String {
        let mut out = format!("{}--", self.kind);
        for byte in self.name.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
                _ => out.push_str(&format!("%{:02X}", byte)),
            }
        }
        out
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// A scheduled task addressed by name and folder path (e.g. `\Microsoft\Foo\`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub name: String,
    pub path: String,
}

impl TaskRef {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Splits `\Folder\Name` back into path (`\Folder\`) and name.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.rsplit_once('\\') {
            Some((path, name)) => Self::new(name, format!("{}\\", path)),
            None => Self::new(full_name, "\\"),
        }
    }

    pub fn full_name(&self) -> String {
        if self.path.ends_with('\\') {
            format!("{}{}", self.path, self.name)
        } else {
            format!("{}\\{}", self.path, self.name)
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TaskState {
    Unknown,
    Disabled,
    Queued,
    Ready,
    Running,
}

impl TaskState {
    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse().unwrap_or(TaskState::Unknown)
    }

    /// "Enabled or unknown" counts as enabled.
    pub fn is_enabled(self) -> bool {
        self != TaskState::Disabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub path: String,
    pub state: TaskState,
}

impl TaskInfo {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef::new(self.name.clone(), self.path.clone())
    }
}

/// Every registry value type; all of them survive an export/import round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    None,
    String,
    ExpandString,
    Binary,
    Dword,
    DwordBigEndian,
    Link,
    MultiString,
    ResourceList,
    FullResourceDescriptor,
    ResourceRequirementsList,
    Qword,
}

/// Raw registry value: type tag plus the exact bytes the store returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueData {
    pub kind: ValueKind,
    pub bytes: Vec<u8>,
}

impl KeyValueData {
    pub fn dword(value: u32) -> Self {
        Self {
            kind: ValueKind::Dword,
            bytes: value.to_le_bytes().to_vec(),
        }
    }

    pub fn as_dword(&self) -> Option<u32> {
        match (self.kind, self.bytes.as_slice()) {
            (ValueKind::Dword, [a, b, c, d, ..]) => Some(u32::from_le_bytes([*a, *b, *c, *d])),
            _ => None,
        }
    }
}

/// One registry key: its values and nested subkeys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNode {
    #[serde(default)]
    pub values: BTreeMap<String, KeyValueData>,
    #[serde(default)]
    pub subkeys: BTreeMap<String, KeyNode>,
}

/// Exported registry subtree rooted at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBlob {
    pub path: String,
    pub root: KeyNode,
}

/// Prior state of one resource as persisted in a generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CapturedState {
    /// The resource did not exist when it was captured.
    Absent,
    /// Raw startup mode string, parsed leniently on restore.
    StartupMode(String),
    Subtree(KeyBlob),
    TaskEnabled(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub identity: ResourceIdentity,
    pub state: CapturedState,
    /// RFC 3339, UTC.
    pub captured_at: String,
}

impl SnapshotRecord {
    pub fn new(identity: ResourceIdentity, state: CapturedState) -> Self {
        Self {
            identity,
            state,
            captured_at: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_mode_parses_case_insensitively() {
        assert_eq!(StartupMode::parse_lenient("automatic"), StartupMode::Automatic);
        assert_eq!(StartupMode::parse_lenient(" Disabled "), StartupMode::Disabled);
    }

    #[test]
    fn test_unrecognized_startup_mode_falls_back_to_manual() {
        assert_eq!(StartupMode::parse_lenient("AutomaticDelayed"), StartupMode::Manual);
        assert_eq!(StartupMode::parse_lenient(""), StartupMode::Manual);
    }

    #[test]
    fn test_file_stems_do_not_collide() {
        let a = ResourceIdentity::key("HKEY_CURRENT_USER\\Software\\A_B");
        let b = ResourceIdentity::key("HKEY_CURRENT_USER\\Software\\A\\B");
        assert_ne!(a.file_stem(), b.file_stem());
        assert!(a.file_stem().starts_with("key--"));
        assert!(!b.file_stem().contains('\\'));
    }

    #[test]
    fn test_resource_value_kinds_keep_their_bytes() {
        let value = KeyValueData {
            kind: ValueKind::FullResourceDescriptor,
            bytes: vec![1, 0, 0, 0, 0xff],
        };
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.contains("\"full_resource_descriptor\""));
        assert_eq!(serde_json::from_str::<KeyValueData>(&json).unwrap(), value);
        assert_eq!(value.as_dword(), None);
    }

    #[test]
    fn test_task_full_name_joins_path() {
        assert_eq!(
            TaskRef::new("Scan", "\\Microsoft\\GamingServices\\").full_name(),
            "\\Microsoft\\GamingServices\\Scan"
        );
        assert_eq!(TaskRef::new("Scan", "\\Folder").full_name(), "\\Folder\\Scan");

        let task = TaskRef::new("Scan", "\\Microsoft\\GamingServices\\");
        assert_eq!(TaskRef::from_full_name(&task.full_name()), task);
        assert_eq!(TaskRef::from_full_name("\\Root"), TaskRef::new("Root", "\\"));
    }

    #[test]
    fn test_task_state_enabled_or_unknown() {
        assert!(TaskState::parse_lenient("Ready").is_enabled());
        assert!(TaskState::parse_lenient("something new").is_enabled());
        assert!(!TaskState::parse_lenient("disabled").is_enabled());
    }

    #[test]
    fn test_record_state_serializes_with_type_tag() {
        let record = SnapshotRecord::new(
            ResourceIdentity::service("GamingServicesNet"),
            CapturedState::StartupMode("Automatic".to_string()),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"startup_mode\""));
        assert!(json.contains("\"kind\":\"service\""));

        let absent = serde_json::to_string(&CapturedState::Absent).unwrap();
        assert_eq!(absent, "{\"type\":\"absent\"}");
    }

    #[test]
    fn test_dword_value_reads_back() {
        assert_eq!(KeyValueData::dword(7).as_dword(), Some(7));
        let text = KeyValueData {
            kind: ValueKind::String,
            bytes: vec![0, 0, 0, 0],
        };
        assert_eq!(text.as_dword(), None);
    }
}
