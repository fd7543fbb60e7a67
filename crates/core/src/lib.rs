//! Domain building blocks for the scanbatch upload client.
//!
//! Everything in this crate is pure: job identity, the polling backoff
//! schedule, progress snapshots, and upload option validation. Network
//! and timer concerns live in `scanbatch-client` and `scanbatch-session`.

pub mod backoff;
pub mod error;
pub mod progress;
pub mod types;
pub mod upload;
