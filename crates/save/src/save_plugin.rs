use std::path::{Path, PathBuf};

use bevy::prelude::*;
use limits::config::LimitsConfig;
use limits::enforcement_sets::EnforcementSet;
use limits::{SaveableRegistry, TickCounter};

use crate::atomic_write::atomic_write;
use crate::save_codec::{decode_snapshot, encode_snapshot, SessionSnapshot};
use crate::save_error::SaveError;

/// Default session file, relative to the working directory.
pub const DEFAULT_SESSION_FILE: &str = "grid_limits_session.bin";

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Where the session store reads and writes.
#[derive(Resource, Debug, Clone)]
pub struct SessionStorePath(pub PathBuf);

impl Default for SessionStorePath {
    fn default() -> Self {
        Self(PathBuf::from(DEFAULT_SESSION_FILE))
    }
}

/// Requests gathered during the frame, served by one exclusive system in
/// `Last`.
#[derive(Resource, Default, Debug)]
pub(crate) struct StoreRequests {
    persist: bool,
    restore: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Event)]
pub struct PersistSessionEvent;

#[derive(Event)]
pub struct RestoreSessionEvent;

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Persists every registered `Saveable` to a session file: periodically,
/// on request, and when the app exits. The file is restored at startup.
pub struct SessionStorePlugin;

impl Plugin for SessionStorePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PersistSessionEvent>()
            .add_event::<RestoreSessionEvent>()
            .init_resource::<SessionStorePath>()
            .init_resource::<SaveableRegistry>()
            .init_resource::<StoreRequests>()
            .add_systems(Startup, restore_on_startup)
            .add_systems(
                FixedUpdate,
                schedule_autosave.after(EnforcementSet::Cleanup),
            )
            .add_systems(Last, (detect_store_requests, exclusive_store).chain());
    }
}

// ---------------------------------------------------------------------------
// Request detection (lightweight)
// ---------------------------------------------------------------------------

fn schedule_autosave(
    tick: Res<TickCounter>,
    config: Res<LimitsConfig>,
    mut requests: ResMut<StoreRequests>,
) {
    if tick.0 > 0 && tick.0 % config.persist_interval_ticks.max(1) == 0 {
        requests.persist = true;
    }
}

fn detect_store_requests(
    mut persist: EventReader<PersistSessionEvent>,
    mut restore: EventReader<RestoreSessionEvent>,
    mut exit: EventReader<AppExit>,
    mut requests: ResMut<StoreRequests>,
) {
    // Drain every reader; one write per frame covers all of them.
    let asked = persist.read().count() > 0;
    let exiting = exit.read().count() > 0;
    if asked || exiting {
        requests.persist = true;
    }
    if restore.read().count() > 0 {
        requests.restore = true;
    }
}

// ---------------------------------------------------------------------------
// Exclusive systems
// ---------------------------------------------------------------------------

fn restore_on_startup(world: &mut World) {
    let path = world.resource::<SessionStorePath>().0.clone();
    if !path.exists() {
        info!("No session file at {}, starting fresh", path.display());
        return;
    }
    log_restore(&path, restore_world(world, &path));
}

fn exclusive_store(world: &mut World) {
    let requests = std::mem::take(&mut *world.resource_mut::<StoreRequests>());
    if !requests.persist && !requests.restore {
        return;
    }
    let path = world.resource::<SessionStorePath>().0.clone();

    if requests.restore {
        log_restore(&path, restore_world(world, &path));
    }
    if requests.persist {
        match persist_world(world, &path) {
            Ok(bytes) => debug!("Session persisted to {} ({bytes} bytes)", path.display()),
            Err(e) => warn!("Failed to persist session to {}: {e}", path.display()),
        }
    }
}

fn log_restore(path: &Path, result: Result<usize, SaveError>) {
    match result {
        Ok(sections) => info!(
            "Restored {sections} saved section(s) from {}",
            path.display()
        ),
        Err(SaveError::NoData) => info!("No session file at {}", path.display()),
        Err(e) => warn!("Ignoring session file {}: {e}", path.display()),
    }
}

// ---------------------------------------------------------------------------
// Persist / restore
// ---------------------------------------------------------------------------

/// Snapshot every registered `Saveable` and write it atomically to `path`.
/// Returns the number of bytes written.
pub fn persist_world(world: &World, path: &Path) -> Result<usize, SaveError> {
    let extensions = world.resource::<SaveableRegistry>().save_all(world);
    let tick = world.get_resource::<TickCounter>().map_or(0, |t| t.0);
    let bytes = encode_snapshot(&SessionSnapshot::new(tick, extensions))?;
    atomic_write(path, &bytes)?;
    Ok(bytes.len())
}

/// Read the session file at `path` and hand each section to its `Saveable`.
/// Returns the number of sections found in the file.
///
/// A damaged or newer file leaves the world untouched.
pub fn restore_world(world: &mut World, path: &Path) -> Result<usize, SaveError> {
    let bytes = std::fs::read(path)?;
    let snapshot = decode_snapshot(&bytes)?;
    world.resource_scope(|world, registry: Mut<SaveableRegistry>| {
        registry.load_all(world, &snapshot.extensions);
    });
    Ok(snapshot.extensions.len())
}
