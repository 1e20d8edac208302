// src/accessors/memory.rs

//! In-memory resource backend.
//!
//! Holds services, a registry tree and a task list behind `RefCell`s, with
//! per-resource failure injection. Used to exercise the snapshot engine and
//! the mutation operations without touching a live system.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
};

use super::{AccessResult, KeyValueStore, PrivilegeCheck, ServiceControl, TaskScheduler};
use crate::{
    errors::AccessError,
    matching::TaskFilter,
    models::{KeyBlob, KeyNode, KeyValueData, StartupMode, TaskInfo, TaskRef, TaskState},
};

/// Resource name used to inject failures into `list_tasks`.
pub const TASK_LISTING: &str = "task-listing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryService {
    pub mode: StartupMode,
    pub running: bool,
}

#[derive(Debug, Default)]
pub struct MemorySystem {
    services: RefCell<BTreeMap<String, MemoryService>>,
    registry: RefCell<KeyNode>,
    tasks: RefCell<Vec<TaskInfo>>,
    failing: RefCell<BTreeSet<String>>,
    elevated: Cell<bool>,
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('\\').filter(|part| !part.is_empty()).collect()
}

fn find_node<'n>(mut node: &'n KeyNode, parts: &[&str]) -> Option<&'n KeyNode> {
    for part in parts {
        node = node.subkeys.get(*part)?;
    }
    Some(node)
}

fn find_node_mut<'n>(mut node: &'n mut KeyNode, parts: &[&str]) -> Option<&'n mut KeyNode> {
    for part in parts {
        node = node.subkeys.get_mut(*part)?;
    }
    Some(node)
}

fn create_node<'n>(mut node: &'n mut KeyNode, parts: &[&str]) -> &'n mut KeyNode {
    for part in parts {
        node = node.subkeys.entry(part.to_string()).or_default();
    }
    node
}

impl MemorySystem {
    /// An empty, elevated system.
    pub fn new() -> Self {
        Self {
            elevated: Cell::new(true),
            ..Default::default()
        }
    }

    pub fn with_service(self, name: &str, mode: StartupMode, running: bool) -> Self {
        self.services
            .borrow_mut()
            .insert(name.to_string(), MemoryService { mode, running });
        self
    }

    pub fn with_value(self, path: &str, name: &str, value: KeyValueData) -> Self {
        create_node(&mut self.registry.borrow_mut(), &split_path(path))
            .values
            .insert(name.to_string(), value);
        self
    }

    pub fn with_task(self, name: &str, path: &str, state: TaskState) -> Self {
        self.tasks.borrow_mut().push(TaskInfo {
            name: name.to_string(),
            path: path.to_string(),
            state,
        });
        self
    }

    pub fn without_elevation(self) -> Self {
        self.elevated.set(false);
        self
    }

    /// Makes every subsequent call touching `resource` fail. A single value
    /// is addressed as `path:name`, a service stop as `name:stop`.
    pub fn fail_on(&self, resource: &str) {
        self.failing.borrow_mut().insert(resource.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.borrow_mut().clear();
    }

    pub fn service(&self, name: &str) -> Option<MemoryService> {
        self.services.borrow().get(name).cloned()
    }

    pub fn set_service_mode(&self, name: &str, mode: StartupMode) {
        if let Some(service) = self.services.borrow_mut().get_mut(name) {
            service.mode = mode;
        }
    }

    pub fn subtree(&self, path: &str) -> Option<KeyNode> {
        find_node(&self.registry.borrow(), &split_path(path)).cloned()
    }

    pub fn value(&self, path: &str, name: &str) -> Option<KeyValueData> {
        self.subtree(path)
            .and_then(|node| node.values.get(name).cloned())
    }

    pub fn task_state(&self, name: &str, path: &str) -> Option<TaskState> {
        self.tasks
            .borrow()
            .iter()
            .find(|task| task.name == name && task.path == path)
            .map(|task| task.state)
    }

    fn check(&self, resource: &str) -> AccessResult<()> {
        if self.failing.borrow().contains(resource) {
            return Err(AccessError::failed(resource, "injected failure"));
        }
        Ok(())
    }

    fn set_task_state(&self, task: &TaskRef, state: TaskState) -> AccessResult<()> {
        let full_name = task.full_name();
        self.check(&full_name)?;
        let mut tasks = self.tasks.borrow_mut();
        let entry = tasks
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(&task.name) && t.path.eq_ignore_ascii_case(&task.path))
            .ok_or(AccessError::NotFound(full_name))?;
        entry.state = state;
        Ok(())
    }
}

impl ServiceControl for MemorySystem {
    fn startup_mode(&self, name: &str) -> AccessResult<StartupMode> {
        self.check(name)?;
        self.services
            .borrow()
            .get(name)
            .map(|service| service.mode)
            .ok_or_else(|| AccessError::NotFound(name.to_string()))
    }

    fn set_startup_mode(&self, name: &str, mode: StartupMode) -> AccessResult<()> {
        self.check(name)?;
        let mut services = self.services.borrow_mut();
        let service = services
            .get_mut(name)
            .ok_or_else(|| AccessError::NotFound(name.to_string()))?;
        service.mode = mode;
        Ok(())
    }

    fn stop(&self, name: &str) -> AccessResult<()> {
        self.check(&format!("{}:stop", name))?;
        let mut services = self.services.borrow_mut();
        let service = services
            .get_mut(name)
            .ok_or_else(|| AccessError::NotFound(name.to_string()))?;
        service.running = false;
        Ok(())
    }
}

impl KeyValueStore for MemorySystem {
    fn export_subtree(&self, path: &str) -> AccessResult<Option<KeyBlob>> {
        self.check(path)?;
        Ok(self.subtree(path).map(|root| KeyBlob {
            path: path.to_string(),
            root,
        }))
    }

    fn import_blob(&self, blob: &KeyBlob) -> AccessResult<()> {
        self.check(&blob.path)?;
        let parts = split_path(&blob.path);
        let Some((last, parents)) = parts.split_last() else {
            return Err(AccessError::failed(&blob.path, "empty key path"));
        };
        let mut registry = self.registry.borrow_mut();
        create_node(&mut registry, parents)
            .subkeys
            .insert(last.to_string(), blob.root.clone());
        Ok(())
    }

    fn remove_subtree(&self, path: &str) -> AccessResult<()> {
        self.check(path)?;
        let parts = split_path(path);
        let Some((last, parents)) = parts.split_last() else {
            return Err(AccessError::failed(path, "empty key path"));
        };
        let mut registry = self.registry.borrow_mut();
        find_node_mut(&mut registry, parents)
            .and_then(|parent| parent.subkeys.remove(*last))
            .map(|_| ())
            .ok_or_else(|| AccessError::NotFound(path.to_string()))
    }

    fn set_value(&self, path: &str, name: &str, value: u32) -> AccessResult<()> {
        self.check(path)?;
        self.check(&format!("{}:{}", path, name))?;
        create_node(&mut self.registry.borrow_mut(), &split_path(path))
            .values
            .insert(name.to_string(), KeyValueData::dword(value));
        Ok(())
    }
}

impl TaskScheduler for MemorySystem {
    fn list_tasks(&self, name_pattern: &str, path_pattern: &str) -> AccessResult<Vec<TaskInfo>> {
        self.check(TASK_LISTING)?;
        let filter = TaskFilter::new(name_pattern, path_pattern)
            .map_err(|e| AccessError::failed(TASK_LISTING, e))?;
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    fn disable(&self, task: &TaskRef) -> AccessResult<()> {
        self.set_task_state(task, TaskState::Disabled)
    }

    fn enable(&self, task: &TaskRef) -> AccessResult<()> {
        self.set_task_state(task, TaskState::Ready)
    }
}

impl PrivilegeCheck for MemorySystem {
    fn is_elevated(&self) -> bool {
        self.elevated.get()
    }
}
