//! Turn client notifications into terminal lines.

use hackchat_sdk::{ChatEvent, Event};

pub const TAG: &str = "[IRC]";

pub const CONNECTING: &str = "Connecting To IRC Server...";
pub const CONNECTED: &str = "Connected!";
pub const DISCONNECTED: &str = "Disconnected!";
pub const NOT_CONNECTED: &str = "Not connected.";
pub const MISSING_TARGET: &str = "IRC config missing server URL or channel.";

/// A room line, or `None` when there is nothing worth printing.
pub fn format_chat(event: &ChatEvent) -> Option<String> {
    if event.text.trim().is_empty() {
        return None;
    }
    let line = if event.is_info() {
        format!("{TAG} {}", event.text)
    } else if event.is_warn() {
        format!("{TAG} ! {}", event.text)
    } else {
        let nick = if event.nick.trim().is_empty() { "?" } else { event.nick.as_str() };
        format!("{TAG} <{nick}> {}", event.text)
    };
    Some(line)
}

pub fn system(text: &str) -> String {
    format!("{TAG} {text}")
}

pub fn too_long(max: usize) -> String {
    format!("You cannot send more than {max} characters.")
}

pub fn format_event(event: &Event) -> Option<String> {
    match event {
        Event::Message(chat) => format_chat(chat),
        Event::Connected => Some(system(CONNECTED)),
        Event::Disconnected { .. } => Some(system(DISCONNECTED)),
        Event::Error { message } => Some(system(&format!("IRC error: {message}"))),
    }
}
