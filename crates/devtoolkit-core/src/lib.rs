//! Dev Toolkit Core
//!
//! Pending-action tracking, response chunking, command dispatch and the
//! inbound runtime

pub mod chunk;
pub mod command;
pub mod dispatch;
pub mod pending;
pub mod runtime;
pub mod store;

pub use chunk::{chunk, ChunkError, ResponseSegment, Segments};
pub use command::Command;
pub use dispatch::Dispatcher;
pub use pending::{InMemoryPendingStore, PendingAction, PendingStore};
pub use runtime::{provider_from_config, DevToolkitRuntime};
pub use store::{SnippetStore, SqliteSnippetStore};
