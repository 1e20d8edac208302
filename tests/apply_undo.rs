// tests/apply_undo.rs

use std::{fs, path::Path};

use discovery_curb::{
    accessors::{memory::MemorySystem, Accessors},
    constants::{DISCOVERY_FLAGS, FLAG_LOCATIONS, HELPER_SERVICE, PRIMARY_SERVICE},
    errors::{PreconditionError, RunError},
    models::{KeyValueData, StartupMode, TaskState},
    orchestrator::{ApplyOptions, Command, Orchestrator, RESTORE_SECTION},
    profile::Profile,
    report::Status,
    snapshot::{SnapshotStore, DISABLED_TASKS_FILE},
};

const GS_FOLDER: &str = "\\Microsoft\\GamingServices\\";
const SAVE_FOLDER: &str = "\\Microsoft\\XblGameSave\\";
const OTHER_FOLDER: &str = "\\Microsoft\\Windows\\Defrag\\";

fn machine() -> MemorySystem {
    MemorySystem::new()
        .with_service(PRIMARY_SERVICE, StartupMode::Automatic, true)
        .with_service(HELPER_SERVICE, StartupMode::Automatic, true)
        .with_service("XblAuthManager", StartupMode::Automatic, true)
        .with_value(FLAG_LOCATIONS[1], "EnableGameDiscovery", KeyValueData::dword(1))
        .with_value(FLAG_LOCATIONS[1], "Unrelated", KeyValueData::dword(42))
        .with_task("GameDiscoveryScan", GS_FOLDER, TaskState::Ready)
        .with_task("LibraryRefresh", GS_FOLDER, TaskState::Running)
        .with_task("XblGameSaveTask", SAVE_FOLDER, TaskState::Ready)
        .with_task("OldDiscovery", GS_FOLDER, TaskState::Disabled)
        .with_task("XblGameSaveTaskLogon", SAVE_FOLDER, TaskState::Disabled)
        .with_task("ScheduledDefrag", OTHER_FOLDER, TaskState::Ready)
}

fn orchestrator<'a>(system: &'a MemorySystem, state_dir: &Path, cache_dir: &Path) -> Orchestrator<'a> {
    Orchestrator::new(
        SnapshotStore::new(state_dir),
        Accessors::from_system(system),
        system,
        Profile {
            cache_dir: Some(cache_dir.to_path_buf()),
            ..Profile::builtin()
        },
    )
}

fn flag(system: &MemorySystem, location: usize, name: &str) -> Option<u32> {
    system
        .value(FLAG_LOCATIONS[location], name)
        .and_then(|value| value.as_dword())
}

#[test]
fn test_apply_then_undo_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let original_user_key = system.subtree(FLAG_LOCATIONS[1]);
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));

    let report = orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();
    assert!(!report.has_failures(), "{}", report);

    let helper = system.service(HELPER_SERVICE).unwrap();
    assert_eq!(helper.mode, StartupMode::Manual);
    assert!(!helper.running);
    assert_eq!(system.service(PRIMARY_SERVICE).unwrap().mode, StartupMode::Automatic);
    for location in 0..FLAG_LOCATIONS.len() {
        for name in DISCOVERY_FLAGS {
            assert_eq!(flag(&system, location, name), Some(0));
        }
    }
    assert_eq!(flag(&system, 1, "Unrelated"), Some(42));
    assert_eq!(system.task_state("GameDiscoveryScan", GS_FOLDER), Some(TaskState::Disabled));
    assert_eq!(system.task_state("ScheduledDefrag", OTHER_FOLDER), Some(TaskState::Ready));
    assert_eq!(system.service("XblAuthManager").unwrap().mode, StartupMode::Automatic);

    let report = orchestrator.run(Command::Undo).unwrap();
    assert!(!report.has_failures(), "{}", report);

    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Automatic);
    assert_eq!(system.service(PRIMARY_SERVICE).unwrap().mode, StartupMode::Automatic);
    assert_eq!(system.subtree(FLAG_LOCATIONS[0]), None);
    assert_eq!(system.subtree(FLAG_LOCATIONS[1]), original_user_key);
    assert_eq!(system.task_state("GameDiscoveryScan", GS_FOLDER), Some(TaskState::Ready));
    assert_eq!(system.task_state("LibraryRefresh", GS_FOLDER), Some(TaskState::Ready));
    assert_eq!(system.task_state("XblGameSaveTask", SAVE_FOLDER), Some(TaskState::Ready));
}

#[test]
fn test_apply_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));

    orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();
    let services = (system.service(PRIMARY_SERVICE), system.service(HELPER_SERVICE));
    let keys = (system.subtree(FLAG_LOCATIONS[0]), system.subtree(FLAG_LOCATIONS[1]));

    let second = orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();

    assert_eq!((system.service(PRIMARY_SERVICE), system.service(HELPER_SERVICE)), services);
    assert_eq!((system.subtree(FLAG_LOCATIONS[0]), system.subtree(FLAG_LOCATIONS[1])), keys);
    assert_eq!(second.count(Status::Failed), 0);
    assert!(second
        .section("Suppress discovery flags")
        .iter()
        .all(|o| o.status == Status::Unchanged));
    assert!(second
        .section("Disable discovery tasks")
        .iter()
        .all(|o| o.status == Status::Unchanged));
    assert_eq!(orchestrator.store().generations().unwrap().len(), 2);
    assert!(!orchestrator.store().latest_dir().join(DISABLED_TASKS_FILE).exists());
}

#[test]
fn test_undo_reenables_exactly_the_disabled_tasks() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));

    orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();

    let listed: Vec<serde_json::Value> = serde_json::from_slice(
        &fs::read(orchestrator.store().latest_dir().join(DISABLED_TASKS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(listed.len(), 3);

    orchestrator.run(Command::Undo).unwrap();

    assert_eq!(system.task_state("OldDiscovery", GS_FOLDER), Some(TaskState::Disabled));
    assert_eq!(
        system.task_state("XblGameSaveTaskLogon", SAVE_FOLDER),
        Some(TaskState::Disabled)
    );
    for (name, folder) in [
        ("GameDiscoveryScan", GS_FOLDER),
        ("LibraryRefresh", GS_FOLDER),
        ("XblGameSaveTask", SAVE_FOLDER),
    ] {
        assert_eq!(system.task_state(name, folder), Some(TaskState::Ready), "{}", name);
    }
}

#[test]
fn test_undo_falls_back_to_newest_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));

    orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();
    system.set_service_mode(HELPER_SERVICE, StartupMode::Disabled);
    orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();

    fs::remove_dir_all(orchestrator.store().latest_dir()).unwrap();
    let newest = orchestrator.store().generations().unwrap().pop().unwrap();

    let report = orchestrator.run(Command::Undo).unwrap();

    assert!(
        report
            .notes()
            .iter()
            .any(|note| note.contains(&newest.to_string())),
        "{}",
        report
    );
    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Disabled);
}

#[test]
fn test_optional_steps_and_cache_purge() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tmp.path().join("cache");
    fs::create_dir_all(cache.join("sub")).unwrap();
    fs::write(cache.join("library.discovery"), b"x").unwrap();
    fs::write(cache.join("sub").join("GameDiscovery-1.json"), b"x").unwrap();
    fs::write(cache.join("settings.json"), b"x").unwrap();

    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &cache);

    let report = orchestrator
        .run(Command::Apply(ApplyOptions {
            clear_cache: true,
            deep_clean: true,
        }))
        .unwrap();

    assert!(!cache.join("library.discovery").exists());
    assert!(!cache.join("sub").join("GameDiscovery-1.json").exists());
    assert!(cache.join("settings.json").exists());
    assert!(report.notes().iter().any(|n| n.contains("cannot be undone")));

    let auth = system.service("XblAuthManager").unwrap();
    assert_eq!(auth.mode, StartupMode::Manual);
    assert!(!auth.running);
    assert!(report
        .section("Extended suppression")
        .iter()
        .any(|o| o.status == Status::Skipped));

    orchestrator.run(Command::Undo).unwrap();
    assert_eq!(system.service("XblAuthManager").unwrap().mode, StartupMode::Automatic);
    assert!(!cache.join("library.discovery").exists());
}

#[test]
fn test_partial_failure_is_reported_and_undone() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));
    system.fail_on(FLAG_LOCATIONS[0]);

    let report = orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();

    assert_eq!(report.count(Status::Failed), 1);
    assert_eq!(system.subtree(FLAG_LOCATIONS[0]), None);
    assert_eq!(flag(&system, 1, "EnableGameDiscovery"), Some(0));
    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Manual);

    system.clear_failures();
    let report = orchestrator.run(Command::Undo).unwrap();
    assert!(!report.has_failures(), "{}", report);
    assert_eq!(flag(&system, 1, "EnableGameDiscovery"), Some(1));
    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Automatic);
}

#[test]
fn test_corrupt_record_is_skipped_on_undo() {
    let tmp = tempfile::tempdir().unwrap();
    let system = machine();
    let orchestrator = orchestrator(&system, &tmp.path().join("state"), &tmp.path().join("cache"));

    orchestrator
        .run(Command::Apply(ApplyOptions::default()))
        .unwrap();
    let latest = orchestrator.store().latest_dir();
    let primary = latest.join(format!("service--{}.json", PRIMARY_SERVICE));
    fs::write(&primary, b"").unwrap();

    let report = orchestrator.run(Command::Undo).unwrap();

    assert!(report
        .section(RESTORE_SECTION)
        .iter()
        .any(|o| o.status == Status::Skipped));
    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Automatic);
}

#[test]
fn test_not_elevated_changes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let state = tmp.path().join("state");
    let system = machine().without_elevation();
    let orchestrator = orchestrator(&system, &state, &tmp.path().join("cache"));

    for command in [Command::Apply(ApplyOptions::default()), Command::Undo] {
        let err = orchestrator.run(command).unwrap_err();
        assert!(matches!(
            err,
            RunError::Precondition(PreconditionError::NotElevated)
        ));
    }
    assert!(!state.exists());
    assert_eq!(system.service(HELPER_SERVICE).unwrap().mode, StartupMode::Automatic);
}
