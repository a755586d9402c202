//! Connection settings record supplied by the host.
//!
//! The SDK only reads this; loading and saving it is the host's job.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_URL: &str = "wss://hack.chat/chat-ws";
pub const DEFAULT_CHANNEL: &str = "mc-irc-mod-2026";
pub const DEFAULT_PREFIX: &str = "@";
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// WebSocket URL of the chat server.
    pub server_url: String,
    pub channel: String,
    /// Desired nickname. Blank means "let the host pick one".
    pub nick: String,
    /// Join password; empty for none.
    pub password: String,
    /// Outgoing lines must start with this to be sent to the room.
    pub prefix: String,
    /// Connect as soon as the host starts.
    pub auto_connect: bool,
    /// Outgoing text must be shorter than this many characters.
    pub max_message_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            nick: String::new(),
            password: String::new(),
            prefix: DEFAULT_PREFIX.to_string(),
            auto_connect: true,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

impl Settings {
    /// Repair values a hand-edited file may have broken.
    pub fn normalized(mut self) -> Self {
        if self.prefix.trim().is_empty() {
            self.prefix = DEFAULT_PREFIX.to_string();
        }
        self.max_message_length = self.max_message_length.max(1);
        self.server_url = self.server_url.trim().to_string();
        self.channel = self.channel.trim().to_string();
        self.nick = self.nick.trim().to_string();
        self
    }

    /// Both the server and the channel are set.
    pub fn has_target(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.channel.trim().is_empty()
    }
}
