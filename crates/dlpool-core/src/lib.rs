pub mod config;
pub mod destination;
pub mod error;
pub mod hash;
pub mod logging;
pub mod pool;
pub mod scheduler;
pub mod transfer;

pub use error::{Error, Result};
