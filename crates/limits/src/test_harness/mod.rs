//! # TestSession: headless harness for enforcement tests
//!
//! Wraps a `bevy::app::App` with `LimitsPlugin` and an in-memory
//! [`SandboxHost`]. Setup helpers mutate the sandbox and send the matching
//! host event, then tick once so the event is processed; queries read the
//! resulting resources.

mod queries;
mod setup;

use bevy::app::App;
use bevy::prelude::*;

use crate::catalog::RuleCatalog;
use crate::config::LimitsConfig;
use crate::host::HostLink;
use crate::sandbox::SandboxHost;
use crate::LimitsPlugin;

pub struct TestSession {
    app: App,
    host: SandboxHost,
    next_block: u64,
}

impl TestSession {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// A session enforcing `catalog` with default tunables.
    pub fn new(catalog: RuleCatalog) -> Self {
        Self::with_config(catalog, LimitsConfig::default())
    }

    pub fn with_config(catalog: RuleCatalog, config: LimitsConfig) -> Self {
        Self::build(catalog, config, SandboxHost::new(), |_| {})
    }

    /// A session over an existing sandbox, e.g. to simulate a restart. `seed`
    /// runs against the world before the plugin's first update.
    pub fn resume(
        catalog: RuleCatalog,
        config: LimitsConfig,
        host: SandboxHost,
        seed: impl FnOnce(&mut World),
    ) -> Self {
        Self::build(catalog, config, host, seed)
    }

    fn build(
        catalog: RuleCatalog,
        config: LimitsConfig,
        host: SandboxHost,
        seed: impl FnOnce(&mut World),
    ) -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(HostLink::new(host.clone()));
        app.insert_resource(catalog);
        app.insert_resource(config);
        app.add_plugins(LimitsPlugin);
        seed(app.world_mut());

        // Run one update so Startup systems execute.
        app.update();

        let next_block = host.with(|w| {
            w.grids
                .values()
                .flat_map(|g| g.blocks.keys())
                .map(|b| b.0 + 1)
                .max()
                .unwrap_or(1)
        });
        Self {
            app,
            host,
            next_block,
        }
    }
}
