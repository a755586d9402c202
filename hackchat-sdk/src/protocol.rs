//! hack.chat wire format: one JSON object per text frame, keyed by `cmd`.

use serde_json::{Map, Value, json};

/// Outbound `join`. The password field is omitted when empty.
pub fn join_frame(channel: &str, nick: &str, password: &str) -> String {
    let mut frame = json!({
        "cmd": "join",
        "channel": channel,
        "nick": nick,
    });
    if !password.is_empty() {
        frame["password"] = Value::from(password);
    }
    frame.to_string()
}

/// Outbound `chat`.
pub fn chat_frame(text: &str) -> String {
    json!({ "cmd": "chat", "text": text }).to_string()
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Chat { nick: String, text: String },
    Info { text: String },
    Warn { text: String },
    /// Room roster; the server sends it once our join went through.
    OnlineSet,
    OnlineAdd { nick: String },
    OnlineRemove { nick: String },
    /// Unknown `cmd`, missing `cmd`, missing required field, or not an object.
    Ignored,
}

/// Decode one complete frame. Only invalid JSON is an error; anything
/// well-formed but unexpected comes back as [`Inbound::Ignored`].
pub fn decode(payload: &str) -> Result<Inbound, serde_json::Error> {
    let root: Value = serde_json::from_str(payload)?;
    let Value::Object(obj) = root else {
        return Ok(Inbound::Ignored);
    };
    let Some(cmd) = field(&obj, "cmd") else {
        return Ok(Inbound::Ignored);
    };

    let inbound = match cmd.as_str() {
        "chat" => match field(&obj, "text") {
            Some(text) => Inbound::Chat {
                nick: field(&obj, "nick").unwrap_or_default(),
                text,
            },
            None => Inbound::Ignored,
        },
        "info" => field(&obj, "text").map_or(Inbound::Ignored, |text| Inbound::Info { text }),
        "warn" => field(&obj, "text").map_or(Inbound::Ignored, |text| Inbound::Warn { text }),
        "onlineSet" => Inbound::OnlineSet,
        "onlineAdd" => field(&obj, "nick").map_or(Inbound::Ignored, |nick| Inbound::OnlineAdd { nick }),
        "onlineRemove" => {
            field(&obj, "nick").map_or(Inbound::Ignored, |nick| Inbound::OnlineRemove { nick })
        }
        _ => Inbound::Ignored,
    };
    Ok(inbound)
}

/// Scalar field as a string. Numbers and booleans are rendered; null,
/// arrays and objects count as absent.
fn field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether a `warn` text reads like "that nickname is taken".
///
/// Deliberately loose: deployments word this differently.
pub fn is_nick_in_use_warning(text: &str) -> bool {
    let t = text.to_lowercase();
    (t.contains("nick") || t.contains("name"))
        && ["in use", "already", "taken", "registered"]
            .iter()
            .any(|needle| t.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn join_frame_with_password() {
        let v = parse(&join_frame("lobby", "bob", "hunter2"));
        assert_eq!(v["cmd"], "join");
        assert_eq!(v["channel"], "lobby");
        assert_eq!(v["nick"], "bob");
        assert_eq!(v["password"], "hunter2");
    }

    #[test]
    fn join_frame_omits_empty_password() {
        let v = parse(&join_frame("lobby", "bob", ""));
        assert!(v.get("password").is_none());
    }

    #[test]
    fn chat_frame_escapes_text() {
        let text = "say \"hi\" \\ ünïcode 🚀\n";
        let v = parse(&chat_frame(text));
        assert_eq!(v["cmd"], "chat");
        assert_eq!(v["text"], text);
    }

    #[test]
    fn decode_chat() {
        let frame = decode(r#"{"cmd":"chat","nick":"bob","text":"hi"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Chat {
                nick: "bob".into(),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn decode_chat_without_nick_has_empty_sender() {
        let frame = decode(r#"{"cmd":"chat","text":"hi"}"#).unwrap();
        assert_eq!(
            frame,
            Inbound::Chat {
                nick: String::new(),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn decode_chat_without_text_is_ignored() {
        assert_eq!(decode(r#"{"cmd":"chat","nick":"bob"}"#).unwrap(), Inbound::Ignored);
        assert_eq!(decode(r#"{"cmd":"chat","text":null}"#).unwrap(), Inbound::Ignored);
    }

    #[test]
    fn decode_scalars_are_stringified() {
        let frame = decode(r#"{"cmd":"info","text":42}"#).unwrap();
        assert_eq!(frame, Inbound::Info { text: "42".into() });
    }

    #[test]
    fn decode_roster_frames() {
        assert_eq!(decode(r#"{"cmd":"onlineSet","nicks":["a"]}"#).unwrap(), Inbound::OnlineSet);
        assert_eq!(
            decode(r#"{"cmd":"onlineAdd","nick":"alice"}"#).unwrap(),
            Inbound::OnlineAdd { nick: "alice".into() }
        );
        assert_eq!(
            decode(r#"{"cmd":"onlineRemove","nick":"alice"}"#).unwrap(),
            Inbound::OnlineRemove { nick: "alice".into() }
        );
        assert_eq!(decode(r#"{"cmd":"onlineAdd"}"#).unwrap(), Inbound::Ignored);
    }

    #[test]
    fn decode_tolerates_unknown_shapes() {
        assert_eq!(decode(r#"{"cmd":"emote","text":"x"}"#).unwrap(), Inbound::Ignored);
        assert_eq!(decode(r#"{"text":"x"}"#).unwrap(), Inbound::Ignored);
        assert_eq!(decode(r#"[1,2,3]"#).unwrap(), Inbound::Ignored);
        assert_eq!(decode(r#""chat""#).unwrap(), Inbound::Ignored);
        assert_eq!(decode(r#"{"cmd":{"x":1}}"#).unwrap(), Inbound::Ignored);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(decode("{not json").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn nick_in_use_heuristic() {
        assert!(is_nick_in_use_warning("Nickname already in use"));
        assert!(is_nick_in_use_warning("NICKNAME TAKEN"));
        assert!(is_nick_in_use_warning("That name is registered"));
        assert!(is_nick_in_use_warning("Username is already connected"));
        assert!(!is_nick_in_use_warning("You are sending too fast"));
        assert!(!is_nick_in_use_warning("Nickname must be alphanumeric"));
        assert!(!is_nick_in_use_warning("Channel already exists"));
    }
}
