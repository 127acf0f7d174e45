//! HLS storage providers
//!
//! Moves encoder output (media segments, variant playlists, the master
//! playlist) to where viewers fetch it: a local public directory or an
//! S3-compatible object store. Variant playlists are rewritten to absolute
//! serving URLs and are never made visible before the segments they
//! reference.

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod layout;
mod lifecycle;
pub mod playlist;
pub mod provider;
pub mod retry;
pub mod store;
pub mod sweeper;

pub use dispatcher::{DispatchSummary, HookDispatcher, HookEvent, ParseHookError};
pub use error::{Result, StorageError};
pub use layout::{ArtifactKind, ArtifactPath};
pub use provider::{provider_from_config, LocalStorage, RemoteStorage, StorageProvider};
pub use store::{MemoryObjectStore, ObjectStore, PutOptions};
