pub mod config;
pub mod connect;
pub mod error;
pub mod local_state;
pub mod sync;

pub use error::StoreError;
pub use sync::{ApplyOutcome, SyncState};
