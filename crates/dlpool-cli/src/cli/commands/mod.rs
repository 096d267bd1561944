//! CLI command handlers, one per file.

mod checksum;
pub(crate) mod fetch;
mod worker;

pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use worker::run_worker;
