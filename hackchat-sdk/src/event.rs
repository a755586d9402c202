//! Events emitted by the chat client for the host layer to consume.

/// Sender used for server notices and client-generated status lines.
pub const INFO: &str = "info";
/// Sender used for server warnings.
pub const WARN: &str = "warn";

/// One decoded room line. Only ever produced from inbound frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// `"info"` / `"warn"` for system lines, empty when the server omitted it.
    pub nick: String,
    pub text: String,
}

impl ChatEvent {
    pub fn new(nick: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(INFO, text)
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self::new(WARN, text)
    }

    pub fn is_info(&self) -> bool {
        self.nick.eq_ignore_ascii_case(INFO)
    }

    pub fn is_warn(&self) -> bool {
        self.nick.eq_ignore_ascii_case(WARN)
    }
}

/// Observer notifications flattened into one enum, for channel consumers
/// (see [`crate::ChatClient::subscribe`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(ChatEvent),
    Connected,
    Disconnected { code: u16, reason: String },
    /// Rendered cause; the error itself is not `Clone`.
    Error { message: String },
}
