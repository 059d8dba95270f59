pub mod config;
pub mod couch;
pub mod error;
pub mod storage;

pub use error::{Result, StorageError};
