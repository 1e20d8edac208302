// src/profile.rs

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    constants::{
        CACHE_DIR_BASE_ENV, CACHE_DIR_RELATIVE, CACHE_PATTERNS, DISCOVERY_FLAGS,
        EXTENDED_SERVICES, FLAG_LOCATIONS, HELPER_SERVICE, PRIMARY_SERVICE, STATE_DIR_APP,
        STATE_DIR_BASE_ENV, STATE_DIR_FALLBACK_BASE, STATE_DIR_LEAF, TASK_PATTERNS,
    },
    models::StartupMode,
    operations::{FlagLocation, ServiceTarget, TaskPattern},
};

/// The lists every mutation works from.
///
/// A JSON profile may override any subset of fields; omitted fields keep
/// their built-in values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub core_services: Vec<ServiceTarget>,
    pub flag_locations: Vec<FlagLocation>,
    pub task_patterns: Vec<TaskPattern>,
    pub extended_services: Vec<ServiceTarget>,
    pub cache_dir: Option<PathBuf>,
    pub cache_patterns: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Profile {
    pub fn builtin() -> Self {
        Self {
            core_services: vec![
                ServiceTarget::new(PRIMARY_SERVICE, StartupMode::Automatic),
                ServiceTarget::new(HELPER_SERVICE, StartupMode::Manual).and_stop(),
            ],
            flag_locations: FLAG_LOCATIONS
                .iter()
                .map(|path| FlagLocation::new(*path, DISCOVERY_FLAGS.iter().copied()))
                .collect(),
            task_patterns: TASK_PATTERNS
                .iter()
                .map(|(name, path)| TaskPattern::new(*name, *path))
                .collect(),
            extended_services: EXTENDED_SERVICES
                .iter()
                .map(|name| ServiceTarget::new(*name, StartupMode::Manual).and_stop())
                .collect(),
            cache_dir: default_cache_dir(),
            cache_patterns: CACHE_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Reads a JSON profile, filling omitted fields from the built-in one.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile '{}'", path.display()))?;
        let profile: Profile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse profile '{}'", path.display()))?;
        info!("Loaded profile '{}'.", path.display());
        debug!("Profile: {:?}", profile);
        Ok(profile)
    }
}

/// `%ProgramData%\DiscoveryCurb\snapshots`.
pub fn default_state_dir() -> PathBuf {
    env::var_os(STATE_DIR_BASE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(STATE_DIR_FALLBACK_BASE))
        .join(STATE_DIR_APP)
        .join(STATE_DIR_LEAF)
}

/// The Gaming Services local cache, if `%LOCALAPPDATA%` is set.
pub fn default_cache_dir() -> Option<PathBuf> {
    env::var_os(CACHE_DIR_BASE_ENV).map(|base| PathBuf::from(base).join(CACHE_DIR_RELATIVE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lists() {
        let profile = Profile::builtin();
        assert_eq!(profile.core_services.len(), 2);
        assert!(profile.core_services[1].stop);
        assert_eq!(profile.flag_locations.len(), 2);
        assert!(profile.flag_locations.iter().all(|l| l.flags.len() == 3));
        assert!(!profile.task_patterns.is_empty());
        assert!(profile.extended_services.iter().all(|s| s.mode == StartupMode::Manual));
    }

    #[test]
    fn test_partial_profile_keeps_builtin_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("profile.json");
        std::fs::write(
            &path,
            r#"{ "task_patterns": [ { "name": "Only*", "path": "\\Nowhere\\*" } ] }"#,
        )
        .unwrap();

        let profile = Profile::load(&path).unwrap();
        assert_eq!(profile.task_patterns, vec![TaskPattern::new("Only*", "\\Nowhere\\*")]);
        assert_eq!(profile.core_services, Profile::builtin().core_services);
    }

    #[test]
    fn test_bad_profile_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("profile.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(Profile::load(&path).is_err());
        assert!(Profile::load(&tmp.path().join("missing.json")).is_err());
    }
}
