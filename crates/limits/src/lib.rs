use bevy::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

pub mod catalog;
pub mod classifier;
pub mod cleanup;
pub mod compliance;
pub mod config;
pub mod enforcement_sets;
pub mod error;
pub mod fleet;
pub mod host;
pub mod notifications;

#[cfg(any(test, feature = "bench"))]
pub mod sandbox;
#[cfg(any(test, feature = "bench"))]
pub mod test_harness;

use catalog::RuleCatalog;
use cleanup::CleanupTimers;
use compliance::ComplianceRegistry;
use config::{LimitsConfig, TICK_MILLIS};
use enforcement_sets::{EnforcementSet, EnforcementSetsPlugin};
use fleet::FleetLedger;
use host::{HostEvent, HostLink};
use notifications::NotificationsPlugin;

// ---------------------------------------------------------------------------
// Saveable trait + registry for the extension map save pattern
// ---------------------------------------------------------------------------

/// Trait for resources that survive a restart via the session store.
///
/// Each implementing resource provides its own serialization logic; the store
/// only sees opaque bytes under `SAVE_KEY`.
pub trait Saveable: Resource + Default + Send + Sync + 'static {
    /// Unique key for this resource in the store's extension map.
    /// Must be stable across versions (used for deserialization lookup).
    const SAVE_KEY: &'static str;

    /// Serialize this resource to bytes.
    /// Return `None` to skip saving (e.g. when there is nothing to resume).
    fn save_to_bytes(&self) -> Option<Vec<u8>>;

    /// Deserialize from bytes, returning the restored resource.
    fn load_from_bytes(bytes: &[u8]) -> Self;
}

/// Decode bytes via `bitcode::decode`, logging a warning and returning `Default` on failure.
pub fn decode_or_warn<T: bitcode::DecodeOwned + Default>(key: &str, bytes: &[u8]) -> T {
    match bitcode::decode(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                "Saveable {}: failed to decode {} bytes, falling back to default: {}",
                key,
                bytes.len(),
                e
            );
            T::default()
        }
    }
}

pub type SaveFn = Box<dyn Fn(&World) -> Option<Vec<u8>> + Send + Sync>;
pub type LoadFn = Box<dyn Fn(&mut World, &[u8]) + Send + Sync>;

/// Type-erased save/load operations for a single registered resource.
pub struct SaveableEntry {
    pub key: String,
    pub save_fn: SaveFn,
    pub load_fn: LoadFn,
}

/// Registry of all saveable resources, populated during plugin setup.
#[derive(Resource, Default)]
pub struct SaveableRegistry {
    pub entries: Vec<SaveableEntry>,
}

impl SaveableRegistry {
    /// Register a resource type that implements `Saveable`. A duplicate key is
    /// ignored with a warning.
    pub fn register<T: Saveable>(&mut self) {
        let key = T::SAVE_KEY.to_string();
        if self.entries.iter().any(|e| e.key == key) {
            warn!(
                "SaveableRegistry: duplicate key '{}', ignoring second registration",
                key
            );
            return;
        }
        self.entries.push(SaveableEntry {
            key,
            save_fn: Box::new(|world: &World| {
                world.get_resource::<T>().and_then(|r| r.save_to_bytes())
            }),
            load_fn: Box::new(|world: &mut World, bytes: &[u8]| {
                let value = T::load_from_bytes(bytes);
                world.insert_resource(value);
            }),
        });
    }

    /// Save all registered resources into an extension map.
    pub fn save_all(&self, world: &World) -> BTreeMap<String, Vec<u8>> {
        let mut extensions = BTreeMap::new();
        for entry in &self.entries {
            if let Some(bytes) = (entry.save_fn)(world) {
                extensions.insert(entry.key.clone(), bytes);
            }
        }
        extensions
    }

    /// Load registered resources from an extension map.
    /// Resources whose key is absent are left unchanged.
    pub fn load_all(&self, world: &mut World, extensions: &BTreeMap<String, Vec<u8>>) {
        for entry in &self.entries {
            if let Some(bytes) = extensions.get(&entry.key) {
                (entry.load_fn)(world, bytes);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Core resources
// ---------------------------------------------------------------------------

/// Session tick, incremented at the start of every `FixedUpdate`.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

fn advance_tick(mut tick: ResMut<TickCounter>) {
    tick.0 += 1;
}

/// Enforcement of per-grid construction limits.
///
/// Insert a [`HostLink`] (and optionally a [`RuleCatalog`] and
/// [`LimitsConfig`]) before adding the plugin; missing ones fall back to
/// defaults, which enforce nothing.
pub struct LimitsPlugin;

impl Plugin for LimitsPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<HostLink>() {
            warn!("LimitsPlugin: no host attached, enforcement stays idle");
            app.insert_resource(HostLink::detached());
        }

        app.insert_resource(Time::<Fixed>::from_duration(Duration::from_millis(TICK_MILLIS)))
            .init_resource::<TickCounter>()
            .init_resource::<RuleCatalog>()
            .init_resource::<LimitsConfig>()
            .init_resource::<ComplianceRegistry>()
            .init_resource::<FleetLedger>()
            .init_resource::<CleanupTimers>()
            .add_event::<HostEvent>()
            .add_plugins((EnforcementSetsPlugin, NotificationsPlugin))
            .init_resource::<SaveableRegistry>()
            .add_systems(FixedUpdate, advance_tick.in_set(EnforcementSet::Clock))
            .add_systems(
                FixedUpdate,
                compliance::systems::process_host_events.in_set(EnforcementSet::Intake),
            )
            .add_systems(
                FixedUpdate,
                (
                    cleanup::systems::resume_restored_timers,
                    compliance::systems::evaluate_grids,
                )
                    .chain()
                    .in_set(EnforcementSet::Evaluate),
            )
            .add_systems(
                FixedUpdate,
                cleanup::systems::advance_cleanup_timers.in_set(EnforcementSet::Cleanup),
            );

        let world = app.world_mut();
        world.resource_mut::<SaveableRegistry>().register::<CleanupTimers>();
        world.resource_mut::<LimitsConfig>().sanitize();
    }
}
