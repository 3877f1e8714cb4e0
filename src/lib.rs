// TodoStore - Todo-list state with write-through persistence to a key-value backend

pub mod backend;
pub mod config;
pub mod filter;
pub mod models;
pub mod store;

// Re-export main types for convenience
pub use backend::{FileBackend, MemoryBackend, SqliteBackend, StorageBackend};
pub use config::{BackendKind, Config};
pub use filter::Filter;
pub use models::{TodoItem, now_ms};
pub use store::{FILTER_KEY, FaultKind, ITEMS_KEY, StorageFault, TodoStore};
