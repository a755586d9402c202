//! Error types surfaced through [`crate::ChatListener::on_error`] and construction.

use tokio_tungstenite::tungstenite;

/// Failures of the underlying WebSocket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server url `{0}`")]
    InvalidUrl(String),
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("connect to {0} timed out")]
    Timeout(String),
    #[error("websocket error: {0}")]
    Protocol(#[from] Box<tungstenite::Error>),
}

/// Everything the chat client can report to its observers.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("server url must not be blank")]
    InvalidTarget,
    #[error("channel must not be blank")]
    BlankChannel,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}
