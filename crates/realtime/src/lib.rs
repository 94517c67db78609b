//! Tutorbot Realtime
//!
//! Owns the single shared realtime connection to the bot backend and routes
//! its events to chat windows.
//!
//! - `transport`: the `Connector` seam and the WebSocket implementation.
//! - `session`: the `SessionManager`, connection lifecycle and event bus.
//! - `window`: `ChatWindow`, one conversation attached to the shared session.

pub mod session;
pub mod transport;
pub mod window;

#[cfg(test)]
mod testing;

pub use session::{ConnectionState, CredentialSource, SessionManager, StaticToken};
pub use transport::{Connector, Link, WsConnector};
pub use window::{ChatWindow, WindowUpdate};
