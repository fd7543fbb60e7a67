//! HTTP client for the scanbatch processing backend.
//!
//! Provides the wire message types, multipart form encoding, a
//! [`reqwest`]-based API wrapper, the backend traits the session layer
//! depends on, and the two-phase job submission handshake.

pub mod api;
pub mod backend;
pub mod form;
pub mod messages;
pub mod submit;
