// src/utils/registry.rs

use std::io;

use anyhow::{Context, Result};
use tracing::debug;
use winreg::{
    enums::{
        RegDisposition,
        RegType::{self, *},
        HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
        KEY_READ,
    },
    RegKey, RegValue,
};

use crate::models::{KeyNode, KeyValueData, ValueKind};

/// Parses the full registry path into hive and subkey path.
///
/// Accepts both long (`HKEY_LOCAL_MACHINE`) and short (`HKLM`) hive names.
///
/// # Parameters
///
/// - `path`: The full registry path (e.g., "HKEY_LOCAL_MACHINE\\Software\\...").
///
/// # Returns
///
/// - `Ok((RegKey, String))` with the parsed hive and subkey path.
/// - `Err(anyhow::Error)` if parsing fails.
pub fn parse_registry_path(path: &str) -> Result<(RegKey, String)> {
    let Some((hive, subkey)) = path.split_once('\\') else {
        anyhow::bail!(
            "Invalid registry path: '{}'. Expected format 'HKEY_*\\Subkey\\...'",
            path
        );
    };
    let subkey = subkey.trim_matches('\\');
    if subkey.is_empty() {
        anyhow::bail!("Registry path '{}' names a hive, not a key", path);
    }
    let hive = match hive.to_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => HKEY_LOCAL_MACHINE,
        "HKEY_CURRENT_USER" | "HKCU" => HKEY_CURRENT_USER,
        "HKEY_CLASSES_ROOT" | "HKCR" => HKEY_CLASSES_ROOT,
        "HKEY_USERS" | "HKU" => HKEY_USERS,
        "HKEY_CURRENT_CONFIG" | "HKCC" => HKEY_CURRENT_CONFIG,
        other => anyhow::bail!("Unsupported registry hive: '{}'", other),
    };
    Ok((RegKey::predef(hive), subkey.to_string()))
}

fn value_kind(vtype: &RegType) -> ValueKind {
    match vtype {
        REG_NONE => ValueKind::None,
        REG_SZ => ValueKind::String,
        REG_EXPAND_SZ => ValueKind::ExpandString,
        REG_BINARY => ValueKind::Binary,
        REG_DWORD => ValueKind::Dword,
        REG_DWORD_BIG_ENDIAN => ValueKind::DwordBigEndian,
        REG_LINK => ValueKind::Link,
        REG_MULTI_SZ => ValueKind::MultiString,
        REG_RESOURCE_LIST => ValueKind::ResourceList,
        REG_FULL_RESOURCE_DESCRIPTOR => ValueKind::FullResourceDescriptor,
        REG_RESOURCE_REQUIREMENTS_LIST => ValueKind::ResourceRequirementsList,
        REG_QWORD => ValueKind::Qword,
    }
}

fn reg_type(kind: ValueKind) -> RegType {
    match kind {
        ValueKind::None => REG_NONE,
        ValueKind::String => REG_SZ,
        ValueKind::ExpandString => REG_EXPAND_SZ,
        ValueKind::Binary => REG_BINARY,
        ValueKind::Dword => REG_DWORD,
        ValueKind::DwordBigEndian => REG_DWORD_BIG_ENDIAN,
        ValueKind::Link => REG_LINK,
        ValueKind::MultiString => REG_MULTI_SZ,
        ValueKind::ResourceList => REG_RESOURCE_LIST,
        ValueKind::FullResourceDescriptor => REG_FULL_RESOURCE_DESCRIPTOR,
        ValueKind::ResourceRequirementsList => REG_RESOURCE_REQUIREMENTS_LIST,
        ValueKind::Qword => REG_QWORD,
    }
}

fn read_node(key: &RegKey, path: &str) -> Result<KeyNode> {
    let mut node = KeyNode::default();

    for value in key.enum_values() {
        let (name, value) =
            value.with_context(|| format!("Failed to enumerate values of '{}'", path))?;
        node.values.insert(
            name,
            KeyValueData {
                kind: value_kind(&value.vtype),
                bytes: value.bytes,
            },
        );
    }

    for name in key.enum_keys() {
        let name = name.with_context(|| format!("Failed to enumerate subkeys of '{}'", path))?;
        let child_path = format!("{}\\{}", path, name);
        let child = key
            .open_subkey_with_flags(&name, KEY_READ)
            .with_context(|| format!("Failed to open subkey '{}'", child_path))?;
        node.subkeys.insert(name, read_node(&child, &child_path)?);
    }

    Ok(node)
}

/// Exports the key at `path` with all values and subkeys.
///
/// # Returns
///
/// - `Ok(Some(KeyNode))` if the key exists.
/// - `Ok(None)` if it does not.
/// - `Err(anyhow::Error)` on any other failure.
pub fn export_key(path: &str) -> Result<Option<KeyNode>> {
    let (hive, subkey_path) = parse_registry_path(path)?;
    let key = match hive.open_subkey_with_flags(&subkey_path, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open subkey '{}'", subkey_path))
        }
    };
    read_node(&key, path).map(Some)
}

fn write_node(hive: &RegKey, subkey_path: &str, node: &KeyNode) -> Result<()> {
    let (key, _) = hive
        .create_subkey(subkey_path)
        .with_context(|| format!("Failed to create or open subkey '{}'", subkey_path))?;
    for (name, data) in &node.values {
        key.set_raw_value(
            name,
            &RegValue {
                bytes: data.bytes.clone(),
                vtype: reg_type(data.kind),
            },
        )
        .with_context(|| format!("Failed to set value '{}' in '{}'", name, subkey_path))?;
    }
    for (name, child) in &node.subkeys {
        write_node(hive, &format!("{}\\{}", subkey_path, name), child)?;
    }
    Ok(())
}

/// Replaces the key at `path` with `node`: the existing subtree is deleted
/// first, so values not in `node` do not survive.
pub fn import_key(path: &str, node: &KeyNode) -> Result<()> {
    let (hive, subkey_path) = parse_registry_path(path)?;
    match hive.delete_subkey_all(&subkey_path) {
        Ok(()) => debug!("Cleared '{}' before import.", path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to clear subkey '{}'", subkey_path))
        }
    }
    write_node(&hive, &subkey_path, node)
}

/// Deletes the key at `path` and everything beneath it.
///
/// # Returns
///
/// - `Ok(true)` if the key was deleted.
/// - `Ok(false)` if it did not exist.
pub fn delete_key(path: &str) -> Result<bool> {
    let (hive, subkey_path) = parse_registry_path(path)?;
    match hive.delete_subkey_all(&subkey_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to delete subkey '{}'", subkey_path)),
    }
}

/// Sets a DWORD value, creating any missing keys along `path`.
pub fn set_dword(path: &str, value_name: &str, value: u32) -> Result<()> {
    let (hive, subkey_path) = parse_registry_path(path)?;
    let (key, disposition) = hive
        .create_subkey(&subkey_path)
        .with_context(|| format!("Failed to create or open subkey '{}'", subkey_path))?;
    if let RegDisposition::REG_CREATED_NEW_KEY = disposition {
        debug!("Created new registry key '{}'.", path);
    }
    key.set_value(value_name, &value)
        .with_context(|| format!("Failed to set DWORD value '{}' to '{}'", value_name, value))
}
