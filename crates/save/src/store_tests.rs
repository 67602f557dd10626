//! End-to-end tests: a headless app with the limits plugin and the session
//! store writing to a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use bevy::prelude::*;
use limits::cleanup::{CleanupTimers, TimerRecord};
use limits::config::LimitsConfig;
use limits::{LimitsPlugin, Saveable};

use crate::{
    persist_world, restore_world, PersistSessionEvent, RestoreSessionEvent, SaveError,
    SaveableAppExt, SessionStorePath, SessionStorePlugin,
};

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("limits_session_store_test_{name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn app_with_store(path: &Path, config: LimitsConfig) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.insert_resource(config);
    app.insert_resource(SessionStorePath(path.to_path_buf()));
    app.add_plugins((LimitsPlugin, SessionStorePlugin));
    // Startup runs here, including the restore.
    app.update();
    app
}

fn record(grid_id: u64, millis_remaining: u64) -> TimerRecord {
    TimerRecord {
        grid_id,
        millis_remaining,
        phase: 1,
        probation: 4,
    }
}

/// Park a countdown record. The detached host never confirms a grid, so it
/// stays pending and is persisted as-is.
fn park(app: &mut App, records: Vec<TimerRecord>) {
    app.world_mut()
        .insert_resource(CleanupTimers::restored(records));
}

fn pending(app: &App) -> Vec<TimerRecord> {
    app.world().resource::<CleanupTimers>().pending_restore().to_vec()
}

#[test]
fn test_records_survive_restart() {
    let dir = test_dir("restart");
    let path = dir.join("session.bin");

    let mut first = app_with_store(&path, LimitsConfig::default());
    park(&mut first, vec![record(7, 297_000), record(9, 12_500)]);
    persist_world(first.world(), &path).unwrap();
    drop(first);

    let second = app_with_store(&path, LimitsConfig::default());
    assert_eq!(pending(&second), vec![record(7, 297_000), record(9, 12_500)]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_file_starts_fresh() {
    let dir = test_dir("missing");
    let path = dir.join("never_written.bin");

    let mut app = app_with_store(&path, LimitsConfig::default());
    assert!(pending(&app).is_empty());
    assert!(matches!(
        restore_world(app.world_mut(), &path),
        Err(SaveError::NoData)
    ));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_corrupt_file_leaves_state_untouched() {
    let dir = test_dir("corrupt");
    let path = dir.join("session.bin");

    let mut app = app_with_store(&path, LimitsConfig::default());
    park(&mut app, vec![record(3, 1_000)]);
    persist_world(app.world(), &path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    park(&mut app, vec![record(5, 2_000)]);
    let err = restore_world(app.world_mut(), &path).unwrap_err();
    assert!(matches!(err, SaveError::Corrupt(_)), "got: {err}");
    assert_eq!(pending(&app), vec![record(5, 2_000)]);

    // A fresh app over the damaged file starts with nothing.
    let fresh = app_with_store(&path, LimitsConfig::default());
    assert!(pending(&fresh).is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_autosave_on_persist_interval() {
    let dir = test_dir("autosave");
    let path = dir.join("session.bin");
    let config = LimitsConfig {
        persist_interval_ticks: 5,
        ..LimitsConfig::default()
    };

    let mut app = app_with_store(&path, config);
    park(&mut app, vec![record(11, 60_000)]);

    for _ in 0..4 {
        app.world_mut().run_schedule(FixedUpdate);
    }
    app.world_mut().run_schedule(Last);
    assert!(!path.exists(), "nothing persisted before the interval");

    app.world_mut().run_schedule(FixedUpdate);
    app.world_mut().run_schedule(Last);
    assert!(path.exists(), "tick 5 should persist");

    let restored = app_with_store(&path, LimitsConfig::default());
    assert_eq!(pending(&restored), vec![record(11, 60_000)]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_persist_event_writes_file() {
    let dir = test_dir("persist_event");
    let path = dir.join("session.bin");

    let mut app = app_with_store(&path, LimitsConfig::default());
    park(&mut app, vec![record(2, 5_000)]);
    app.world_mut().send_event(PersistSessionEvent);
    app.update();
    assert!(path.exists());

    // Restore on request replaces whatever is parked now.
    park(&mut app, Vec::new());
    app.world_mut().send_event(RestoreSessionEvent);
    app.update();
    assert_eq!(pending(&app), vec![record(2, 5_000)]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_app_exit_persists() {
    let dir = test_dir("app_exit");
    let path = dir.join("session.bin");

    let mut app = app_with_store(&path, LimitsConfig::default());
    park(&mut app, vec![record(4, 9_000)]);
    app.world_mut().send_event(AppExit::Success);
    app.update();

    let restored = app_with_store(&path, LimitsConfig::default());
    assert_eq!(pending(&restored), vec![record(4, 9_000)]);

    let _ = fs::remove_dir_all(&dir);
}

#[derive(Resource, Default, Debug, PartialEq)]
struct OperatorNote(u32);

impl Saveable for OperatorNote {
    const SAVE_KEY: &'static str = "operator_note";

    fn save_to_bytes(&self) -> Option<Vec<u8>> {
        (self.0 != 0).then(|| self.0.to_le_bytes().to_vec())
    }

    fn load_from_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        Self(u32::from_le_bytes(raw))
    }
}

#[test]
fn test_registered_extension_travels_with_timers() {
    let dir = test_dir("extension");
    let path = dir.join("session.bin");

    let mut first = app_with_store(&path, LimitsConfig::default());
    first.init_resource::<OperatorNote>().register_saveable::<OperatorNote>();
    first.world_mut().insert_resource(OperatorNote(42));
    park(&mut first, vec![record(8, 3_000)]);
    persist_world(first.world(), &path).unwrap();

    let mut second = app_with_store(&path, LimitsConfig::default());
    second.init_resource::<OperatorNote>().register_saveable::<OperatorNote>();
    assert_eq!(restore_world(second.world_mut(), &path).unwrap(), 2);
    assert_eq!(*second.world().resource::<OperatorNote>(), OperatorNote(42));
    assert_eq!(pending(&second), vec![record(8, 3_000)]);

    let _ = fs::remove_dir_all(&dir);
}
