//! Nickname sanitizing and the collision-retry naming rule.
//!
//! A nickname is at most [`MAX_NICK_LEN`] characters from `[A-Za-z0-9_]`.
//! Retries append `_N` to the base, shortening the base so the whole name
//! still fits.

pub const MAX_NICK_LEN: usize = 24;
/// Hard cap on collision retries before the client gives up.
pub const MAX_RETRIES: u32 = 20;
/// Used when sanitizing leaves nothing.
pub const DEFAULT_NICK: &str = "guest";
/// Base used when the retry suffix alone would not leave room for a real one.
const OVERFLOW_BASE: &str = "n";

fn is_nick_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Strip disallowed characters and truncate; never returns an empty string.
pub fn sanitize(raw: &str) -> String {
    let nick: String = raw.chars().filter(|c| is_nick_char(*c)).take(MAX_NICK_LEN).collect();
    if nick.is_empty() {
        DEFAULT_NICK.to_string()
    } else {
        nick
    }
}

/// Effective nickname for `base` after `retry` collisions.
pub fn derive(base: &str, retry: u32) -> String {
    let base = if base.is_empty() { DEFAULT_NICK } else { base };
    if retry == 0 {
        return truncate(base, MAX_NICK_LEN);
    }
    let suffix = format!("_{retry}");
    // Unreachable for u32 counts, kept so the length bound holds for any suffix.
    if suffix.len() >= MAX_NICK_LEN {
        return truncate(&format!("{OVERFLOW_BASE}{suffix}"), MAX_NICK_LEN);
    }
    let room = MAX_NICK_LEN - suffix.len();
    format!("{}{suffix}", truncate(base, room))
}

/// Split a caller-supplied nickname into `(sanitized base, retry count)`.
///
/// Recognizes `name_N` and the older `name(N)` form when `N` is within
/// `1..=MAX_RETRIES` and `name` still has a usable character. Anything else
/// is taken whole as the base with no retries.
pub fn split_retry_suffix(raw: &str) -> (String, u32) {
    let raw = raw.trim();
    let candidate = raw
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once('('))
        .or_else(|| raw.rsplit_once('_'));

    if let Some((base, digits)) = candidate {
        let base = base.trim();
        let parsed = if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            digits.parse::<u32>().ok()
        } else {
            None
        };
        if let Some(retry) = parsed
            && (1..=MAX_RETRIES).contains(&retry)
            && base.chars().any(is_nick_char)
        {
            return (sanitize(base), retry);
        }
    }
    (sanitize(raw), 0)
}

/// Outcome of a nickname-collision warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collision {
    /// Already joined: the warning is about something else, show it.
    AfterJoin,
    /// Retry cap reached: give up and disconnect.
    Exhausted,
    /// Already gave up on this connection; swallow the warning.
    GaveUp,
    /// Try again under this nickname.
    Retry(String),
}

/// Nickname bookkeeping owned by the chat client behind one lock.
#[derive(Debug, Clone)]
pub struct NickState {
    base: String,
    retry_count: u32,
    current: String,
    joined: bool,
    gave_up: bool,
}

impl NickState {
    pub fn new(raw: &str) -> Self {
        let (base, retry_count) = split_retry_suffix(raw);
        let current = derive(&base, retry_count);
        Self {
            base,
            retry_count,
            current,
            joined: false,
            gave_up: false,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Server sent the room roster: the current nick is in.
    pub fn mark_joined(&mut self) {
        self.joined = true;
    }

    /// Start of a connection attempt.
    pub fn reset_join(&mut self) {
        self.joined = false;
        self.gave_up = false;
    }

    pub fn on_collision(&mut self) -> Collision {
        if self.joined {
            return Collision::AfterJoin;
        }
        if self.gave_up {
            return Collision::GaveUp;
        }
        if self.retry_count >= MAX_RETRIES {
            self.gave_up = true;
            return Collision::Exhausted;
        }
        self.retry_count += 1;
        self.current = derive(&self.base, self.retry_count);
        Collision::Retry(self.current.clone())
    }
}
