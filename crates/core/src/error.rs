/// Errors raised when handing a user turn to the realtime session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The shared connection is not in the `connected` state.
    #[error("Not connected to server")]
    NotConnected,
    #[error("Failed to encode outbound event: {0}")]
    Encode(#[from] serde_json::Error),
}
