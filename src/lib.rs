pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod record;
pub mod sink;
pub mod store;
pub mod sync;
pub mod timestamp;
pub mod tasks {
    pub mod poller;
    pub mod viewer;
}

pub use error::Error;
pub use sync::{SyncOptions, WindowSynchronizer};
