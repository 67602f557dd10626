// ---------------------------------------------------------------------------
// App extension for registering Saveable resources
// ---------------------------------------------------------------------------

use bevy::prelude::*;
use limits::{Saveable, SaveableRegistry};

/// One-line registration of an extra resource that should ride along with
/// the cleanup countdowns in the session file.
///
/// ```ignore
/// use save::SaveableAppExt;
///
/// app.init_resource::<OperatorNotes>()
///     .register_saveable::<OperatorNotes>();
/// ```
pub trait SaveableAppExt {
    fn register_saveable<T: Saveable>(&mut self) -> &mut Self;
}

impl SaveableAppExt for App {
    fn register_saveable<T: Saveable>(&mut self) -> &mut Self {
        self.world_mut()
            .get_resource_or_insert_with(SaveableRegistry::default)
            .register::<T>();
        self
    }
}
