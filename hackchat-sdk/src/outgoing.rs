//! Decide whether a line typed into the host goes to the chat room.

use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingRoute {
    /// No prefix: the host keeps the line.
    NotForChat,
    /// Prefixed but nothing left to send.
    Blank,
    /// Text reaches the length cap.
    TooLong { max: usize },
    Send(String),
}

pub fn route_outgoing(settings: &Settings, line: &str) -> OutgoingRoute {
    let prefix = if settings.prefix.trim().is_empty() {
        crate::settings::DEFAULT_PREFIX
    } else {
        settings.prefix.as_str()
    };
    let Some(text) = line.strip_prefix(prefix) else {
        return OutgoingRoute::NotForChat;
    };
    let max = settings.max_message_length.max(1);
    if text.chars().count() >= max {
        return OutgoingRoute::TooLong { max };
    }
    if text.trim().is_empty() {
        return OutgoingRoute::Blank;
    }
    OutgoingRoute::Send(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(prefix: &str, max: usize) -> Settings {
        Settings {
            prefix: prefix.into(),
            max_message_length: max,
            ..Settings::default()
        }
    }

    #[test]
    fn unprefixed_lines_stay_local() {
        assert_eq!(route_outgoing(&settings("@", 150), "hello"), OutgoingRoute::NotForChat);
    }

    #[test]
    fn prefixed_line_is_sent_without_prefix() {
        assert_eq!(
            route_outgoing(&settings("@", 150), "@hello there"),
            OutgoingRoute::Send("hello there".into())
        );
        assert_eq!(
            route_outgoing(&settings("!!", 150), "!!x"),
            OutgoingRoute::Send("x".into())
        );
    }

    #[test]
    fn length_cap_is_exclusive() {
        let s = settings("@", 5);
        assert_eq!(route_outgoing(&s, "@abcd"), OutgoingRoute::Send("abcd".into()));
        assert_eq!(route_outgoing(&s, "@abcde"), OutgoingRoute::TooLong { max: 5 });
        assert_eq!(route_outgoing(&s, "@ééééé"), OutgoingRoute::TooLong { max: 5 });
    }

    #[test]
    fn blank_after_prefix_is_swallowed() {
        assert_eq!(route_outgoing(&settings("@", 150), "@   "), OutgoingRoute::Blank);
        assert_eq!(route_outgoing(&settings("@", 150), "@"), OutgoingRoute::Blank);
    }

    #[test]
    fn blank_prefix_falls_back_to_at() {
        assert_eq!(route_outgoing(&settings("", 150), "@hi"), OutgoingRoute::Send("hi".into()));
    }
}
