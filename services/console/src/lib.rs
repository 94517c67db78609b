//! Tutorbot Console Library Crate
//!
//! Everything the `tutorbot` binary needs around the realtime chat core:
//! configuration, the stored bearer token, and a typed client for the
//! backend's REST API. The binary in `bin/tutorbot.rs` is a thin wrapper.

pub mod api;
pub mod config;
pub mod credentials;
pub mod models;
