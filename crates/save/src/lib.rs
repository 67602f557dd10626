//! Session store for the limits plugin: a checksummed, compressed file that
//! carries every registered `Saveable` across restarts.

mod atomic_write;
pub mod file_header;
pub mod save_codec;
mod save_error;
mod save_plugin;
pub mod saveable_ext;

#[cfg(test)]
mod store_tests;

pub use save_codec::{decode_snapshot, encode_snapshot, SessionSnapshot};
pub use save_error::SaveError;
pub use save_plugin::{
    persist_world, restore_world, PersistSessionEvent, RestoreSessionEvent, SessionStorePath,
    SessionStorePlugin, DEFAULT_SESSION_FILE,
};
pub use saveable_ext::SaveableAppExt;
