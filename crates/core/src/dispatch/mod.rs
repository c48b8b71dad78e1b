//! Dispatch records, their state machines and storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteDispatchStore;
pub use store::{DispatchStore, DispatchStoreError};
pub use types::*;
