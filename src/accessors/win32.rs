// src/accessors/win32.rs

//! Live Windows backend: the Service Control Manager, the registry, the Task
//! Scheduler (through PowerShell) and the process token.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{AccessResult, KeyValueStore, PrivilegeCheck, ServiceControl, TaskScheduler};
use crate::{
    errors::AccessError,
    matching::TaskFilter,
    models::{KeyBlob, StartupMode, TaskInfo, TaskRef, TaskState},
    utils::{
        elevation,
        powershell::{execute_powershell_script, quote},
        registry, services,
    },
};

/// Written by the toggle script when the task does not exist. Keyed on the
/// error category, which is not localized, unlike the error message.
const TASK_NOT_FOUND: &str = "DISCOVERY-CURB-TASK-NOT-FOUND";

const LIST_TASKS_SCRIPT: &str = "Get-ScheduledTask | ForEach-Object { \
     [pscustomobject]@{ name = $_.TaskName; path = $_.TaskPath; state = $_.State.ToString() } \
     } | ConvertTo-Json -Compress";

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsSystem;

fn failed(resource: &str, e: anyhow::Error) -> AccessError {
    AccessError::failed(resource, format!("{:#}", e))
}

fn service_error(name: &str, e: anyhow::Error) -> AccessError {
    if services::is_missing_service(&e) {
        AccessError::NotFound(name.to_string())
    } else {
        failed(name, e)
    }
}


#[derive(Debug, Deserialize)]
struct RawTask {
    name: String,
    path: String,
    #[serde(default)]
    state: String,
}

/// `ConvertTo-Json` emits nothing for no tasks, an object for one, and an
/// array for more.
fn parse_task_listing(raw: &str) -> Result<Vec<TaskInfo>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let tasks: Vec<RawTask> = match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()?,
        Value::Null => Vec::new(),
        single => vec![serde_json::from_value(single)?],
    };
    Ok(tasks
        .into_iter()
        .map(|task| TaskInfo {
            state: TaskState::parse_lenient(&task.state),
            name: task.name,
            path: task.path,
        })
        .collect())
}

fn toggle_script(verb: &str, task: &TaskRef) -> String {
    format!(
        "try {{ {}-ScheduledTask -TaskName {} -TaskPath {} -ErrorAction Stop | Out-Null }} \
         catch {{ if ($_.CategoryInfo.Category -eq 'ObjectNotFound') {{ Write-Output '{}' }} \
         else {{ throw }} }}",
        verb,
        quote(&task.name),
        quote(&task.path),
        TASK_NOT_FOUND
    )
}

fn reports_missing_task(stdout: &str) -> bool {
    stdout.lines().any(|line| line.trim() == TASK_NOT_FOUND)
}

fn toggle_task(verb: &str, task: &TaskRef) -> AccessResult<()> {
    let stdout = execute_powershell_script(&toggle_script(verb, task))
        .map_err(|e| failed(&task.full_name(), e))?;
    if reports_missing_task(&stdout) {
        return Err(AccessError::NotFound(task.full_name()));
    }
    debug!("{}d task '{}'.", verb, task);
    Ok(())
}

impl ServiceControl for WindowsSystem {
    fn startup_mode(&self, name: &str) -> AccessResult<StartupMode> {
        services::query_startup_mode(name).map_err(|e| service_error(name, e))
    }

    fn set_startup_mode(&self, name: &str, mode: StartupMode) -> AccessResult<()> {
        services::set_startup_mode(name, mode).map_err(|e| service_error(name, e))
    }

    fn stop(&self, name: &str) -> AccessResult<()> {
        services::stop_service(name).map_err(|e| service_error(name, e))
    }
}

impl KeyValueStore for WindowsSystem {
    fn export_subtree(&self, path: &str) -> AccessResult<Option<KeyBlob>> {
        let root = registry::export_key(path).map_err(|e| failed(path, e))?;
        Ok(root.map(|root| KeyBlob {
            path: path.to_string(),
            root,
        }))
    }

    fn import_blob(&self, blob: &KeyBlob) -> AccessResult<()> {
        registry::import_key(&blob.path, &blob.root).map_err(|e| failed(&blob.path, e))
    }

    fn remove_subtree(&self, path: &str) -> AccessResult<()> {
        match registry::delete_key(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AccessError::NotFound(path.to_string())),
            Err(e) => Err(failed(path, e)),
        }
    }

    fn set_value(&self, path: &str, name: &str, value: u32) -> AccessResult<()> {
        registry::set_dword(path, name, value).map_err(|e| failed(path, e))
    }
}

impl TaskScheduler for WindowsSystem {
    fn list_tasks(&self, name_pattern: &str, path_pattern: &str) -> AccessResult<Vec<TaskInfo>> {
        let filter = TaskFilter::new(name_pattern, path_pattern)
            .map_err(|e| AccessError::failed(name_pattern, e))?;
        let raw = execute_powershell_script(LIST_TASKS_SCRIPT)
            .map_err(|e| failed("scheduled tasks", e))?;
        let tasks =
            parse_task_listing(&raw).map_err(|e| AccessError::failed("scheduled tasks", e))?;
        Ok(tasks.into_iter().filter(|task| filter.matches(task)).collect())
    }

    fn disable(&self, task: &TaskRef) -> AccessResult<()> {
        toggle_task("Disable", task)
    }

    fn enable(&self, task: &TaskRef) -> AccessResult<()> {
        toggle_task("Enable", task)
    }
}

impl PrivilegeCheck for WindowsSystem {
    fn is_elevated(&self) -> bool {
        elevation::is_elevated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_listing_shapes() {
        assert!(parse_task_listing("").unwrap().is_empty());

        let one = parse_task_listing(
            r#"{"name":"Scan","path":"\\Microsoft\\GamingServices\\","state":"Ready"}"#,
        )
        .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].state, TaskState::Ready);

        let many = parse_task_listing(
            r#"[{"name":"A","path":"\\","state":"Disabled"},{"name":"B","path":"\\","state":"Weird"}]"#,
        )
        .unwrap();
        assert_eq!(many[0].state, TaskState::Disabled);
        assert_eq!(many[1].state, TaskState::Unknown);
    }

    #[test]
    fn test_toggle_script_reports_missing_task_by_category() {
        let task = TaskRef::new("Game's Scan", "\\Microsoft\\GamingServices\\");
        let script = toggle_script("Disable", &task);

        assert!(script.contains("Disable-ScheduledTask -TaskName 'Game''s Scan'"));
        assert!(script.contains("-TaskPath '\\Microsoft\\GamingServices\\'"));
        assert!(script.contains("$_.CategoryInfo.Category -eq 'ObjectNotFound'"));
        assert!(script.contains(TASK_NOT_FOUND));
        assert!(script.contains("else { throw }"));
    }

    #[test]
    fn test_missing_task_detected_from_output_only() {
        assert!(reports_missing_task(&format!("{}\r\n", TASK_NOT_FOUND)));
        assert!(!reports_missing_task(""));
        assert!(!reports_missing_task("Aucun objet MSFT_ScheduledTask trouvé"));
    }
}
