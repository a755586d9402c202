//! Chat client: connection policy, join handshake and nickname retries.
//!
//! This is the main entry point for SDK consumers. Every public method
//! returns immediately; the connection runs on a tokio task and results come
//! back through registered [`ChatListener`]s.
//!
//! ## Nickname collisions
//!
//! Until the server confirms the join (the `onlineSet` roster frame), a
//! warning that reads like "nickname in use" makes the client retry the join
//! as `base_1`, `base_2`, ... on the same socket. After
//! [`nick::MAX_RETRIES`](crate::nick::MAX_RETRIES) attempts it gives up and
//! disconnects.
//!
//! ## Reconnection
//!
//! The client never reconnects on its own. Sending a message while offline
//! queues it and starts a connection; otherwise reconnecting is up to the
//! caller (listen for `on_disconnected`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::error::{ChatError, TransportError};
use crate::event::{ChatEvent, Event};
use crate::nick::{Collision, NickState};
use crate::protocol::{self, Inbound};
use crate::settings::Settings;
use crate::transport::{SessionEvents, SessionHandle, SessionListener, Transport, WsTransport};

/// Close code and reason used by [`ChatClient::disconnect`].
pub const NORMAL_CLOSE: u16 = 1000;
pub const DISCONNECT_REASON: &str = "bye";
pub const TOO_MANY_RETRIES: &str = "Nick already in use. Too many retries.";

/// Receives client notifications, in registration order, on the transport's
/// task. Handlers should return quickly: frame processing waits for them.
pub trait ChatListener: Send + Sync + 'static {
    fn on_message(&self, event: &ChatEvent);

    fn on_connected(&self) {}

    fn on_disconnected(&self, _code: u16, _reason: &str) {}

    fn on_error(&self, _error: &ChatError) {}
}

/// A client for one room on one server.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    channel: String,
    password: String,
    transport: Arc<dyn Transport>,
    listeners: RwLock<Vec<Arc<dyn ChatListener>>>,
    /// Encoded chat frames waiting for a live session.
    pending: Mutex<VecDeque<String>>,
    connected: AtomicBool,
    connecting: AtomicBool,
    nick: Mutex<NickState>,
    /// Numbers connection attempts so late callbacks can be told apart.
    attempts: AtomicU64,
    session: Mutex<Option<LiveSession>>,
}

/// The open session and the attempt that installed it.
struct LiveSession {
    attempt: u64,
    handle: SessionHandle,
}

impl ChatClient {
    /// Client on the WebSocket transport.
    pub fn new(url: &str, channel: &str, nick: &str, password: &str) -> Result<Self, ChatError> {
        Self::with_transport(url, channel, nick, password, Arc::new(WsTransport::new()))
    }

    /// Client on a caller-supplied transport.
    pub fn with_transport(
        url: &str,
        channel: &str,
        nick: &str,
        password: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ChatError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ChatError::InvalidTarget);
        }
        if channel.trim().is_empty() {
            return Err(ChatError::BlankChannel);
        }
        let nick = NickState::new(nick);
        tracing::debug!(url, channel, nick = nick.current(), "Chat client created");
        Ok(Self {
            inner: Arc::new(Inner {
                url: url.to_string(),
                channel: channel.to_string(),
                password: password.to_string(),
                transport,
                listeners: RwLock::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                connected: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                nick: Mutex::new(nick),
                attempts: AtomicU64::new(0),
                session: Mutex::new(None),
            }),
        })
    }

    /// Client for the target in `settings`. `fallback_nick` is used when the
    /// settings leave the nickname blank.
    pub fn from_settings(settings: &Settings, fallback_nick: &str) -> Result<Self, ChatError> {
        let nick = if settings.nick.trim().is_empty() {
            fallback_nick
        } else {
            settings.nick.trim()
        };
        Self::new(&settings.server_url, settings.channel.trim(), nick, &settings.password)
    }

    pub fn add_listener(&self, listener: Arc<dyn ChatListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Register a listener that forwards every notification into a channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_listener(Arc::new(ChannelListener { tx }));
        rx
    }

    /// Start connecting unless connected or already connecting.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Ask the server to close the session. No-op when there is none.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn is_connecting(&self) -> bool {
        self.inner.connecting.load(Ordering::SeqCst)
    }

    /// Send `text` to the room. While offline the message is queued and a
    /// connection is started; queued messages go out right after the join.
    pub fn send_message(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let inner = &self.inner;
        inner.pending.lock().push_back(protocol::chat_frame(text));
        if inner.connected.load(Ordering::SeqCst) {
            inner.flush_pending();
        } else {
            inner.connect();
        }
    }

    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    pub fn current_nick(&self) -> String {
        self.inner.nick.lock().current().to_string()
    }

    pub fn retry_count(&self) -> u32 {
        self.inner.nick.lock().retry_count()
    }

    /// The server confirmed the room join for the current nickname.
    pub fn is_joined(&self) -> bool {
        self.inner.nick.lock().joined()
    }

    /// Messages queued for the next connection.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl Inner {
    fn connect(self: &Arc<Self>) {
        if self.connected.load(Ordering::SeqCst) || self.connecting.swap(true, Ordering::SeqCst) {
            return;
        }
        // An open may have completed between the two checks above.
        if self.connected.load(Ordering::SeqCst) {
            self.connecting.store(false, Ordering::SeqCst);
            return;
        }
        self.nick.lock().reset_join();
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(url = %self.url, channel = %self.channel, attempt, "Connecting");
        let bridge = Arc::new(SessionBridge::new(Arc::downgrade(self), attempt));
        self.transport.open(&self.url, SessionEvents::new(bridge));
    }

    fn disconnect(&self) {
        if let Some(session) = self.live_session() {
            tracing::info!(channel = %self.channel, "Disconnecting");
            session.close(NORMAL_CLOSE, DISCONNECT_REASON);
        }
    }

    fn live_session(&self) -> Option<SessionHandle> {
        self.session.lock().as_ref().map(|live| live.handle.clone())
    }

    /// Forget the live session if `attempt` installed it. Returns false for
    /// callbacks from a session that has already been replaced.
    fn release_session(&self, attempt: u64) -> bool {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|live| live.attempt == attempt) {
            *session = None;
            true
        } else {
            false
        }
    }

    fn send_join(&self, session: &SessionHandle, nick: &str) {
        tracing::debug!(channel = %self.channel, nick, "Sending join");
        session.send_frame(protocol::join_frame(&self.channel, nick, &self.password));
    }

    /// Drain the queue into the live session, oldest first.
    fn flush_pending(&self) {
        let Some(session) = self.live_session() else {
            return;
        };
        let mut pending = self.pending.lock();
        if session.is_closed() {
            return;
        }
        while let Some(payload) = pending.pop_front() {
            session.send_frame(payload);
        }
    }

    fn handle_payload(&self, payload: &str) {
        let frame = match protocol::decode(payload) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "Malformed payload");
                self.fire_error(&ChatError::MalformedPayload(error));
                return;
            }
        };
        match frame {
            Inbound::Chat { nick, text } => self.fire_message(&ChatEvent::new(nick, text)),
            Inbound::Info { text } => self.fire_message(&ChatEvent::info(text)),
            Inbound::Warn { text } => {
                if !self.intercept_collision(&text) {
                    self.fire_message(&ChatEvent::warn(text));
                }
            }
            Inbound::OnlineSet => {
                let mut nick = self.nick.lock();
                nick.mark_joined();
                tracing::debug!(nick = nick.current(), "Join confirmed");
            }
            Inbound::OnlineAdd { nick } => self.fire_message(&ChatEvent::info(format!("{nick} joined"))),
            Inbound::OnlineRemove { nick } => self.fire_message(&ChatEvent::info(format!("{nick} left"))),
            Inbound::Ignored => tracing::trace!("Ignoring frame"),
        }
    }

    /// Returns true when the warning was a collision handled here.
    fn intercept_collision(&self, text: &str) -> bool {
        if !protocol::is_nick_in_use_warning(text) {
            return false;
        }
        let Some(session) = self.live_session() else {
            return true;
        };
        let outcome = self.nick.lock().on_collision();
        match outcome {
            Collision::AfterJoin => false,
            Collision::GaveUp => true,
            Collision::Exhausted => {
                tracing::warn!(channel = %self.channel, "Nickname retries exhausted");
                self.fire_message(&ChatEvent::info(TOO_MANY_RETRIES));
                session.close(NORMAL_CLOSE, DISCONNECT_REASON);
                true
            }
            Collision::Retry(nick) => {
                tracing::info!(nick = %nick, "Nickname in use, retrying");
                self.fire_message(&ChatEvent::info(format!("Nick already in use, trying {nick}")));
                self.send_join(&session, &nick);
                true
            }
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn ChatListener>> {
        self.listeners.read().clone()
    }

    fn fire_message(&self, event: &ChatEvent) {
        for listener in self.listeners() {
            listener.on_message(event);
        }
    }

    fn fire_connected(&self) {
        for listener in self.listeners() {
            listener.on_connected();
        }
    }

    fn fire_disconnected(&self, code: u16, reason: &str) {
        for listener in self.listeners() {
            listener.on_disconnected(code, reason);
        }
    }

    fn fire_error(&self, error: &ChatError) {
        for listener in self.listeners() {
            listener.on_error(error);
        }
    }
}

/// Session callbacks for one connection attempt. Holds the client weakly so
/// dropping every `ChatClient` lets the session close.
///
/// `connecting` belongs to the attempt until it opens or fails; after that
/// only `connect()` touches it. Close and error callbacks change client state
/// only while their own session is still the live one.
struct SessionBridge {
    inner: Weak<Inner>,
    attempt: u64,
    opened: AtomicBool,
}

impl SessionBridge {
    fn new(inner: Weak<Inner>, attempt: u64) -> Self {
        Self {
            inner,
            attempt,
            opened: AtomicBool::new(false),
        }
    }

    /// Common teardown for close and error. `connected` is cleared last so a
    /// racing `connect()` only starts once this session is fully released.
    fn release(&self, inner: &Inner) {
        if !self.opened.load(Ordering::SeqCst) {
            inner.connecting.store(false, Ordering::SeqCst);
            return;
        }
        if inner.release_session(self.attempt) {
            inner.connected.store(false, Ordering::SeqCst);
        } else {
            tracing::debug!(attempt = self.attempt, "Stale session callback");
        }
    }
}

impl SessionListener for SessionBridge {
    fn on_open(&self, session: SessionHandle) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        self.opened.store(true, Ordering::SeqCst);
        *inner.session.lock() = Some(LiveSession {
            attempt: self.attempt,
            handle: session.clone(),
        });
        let nick = inner.nick.lock().current().to_string();
        inner.send_join(&session, &nick);
        inner.connected.store(true, Ordering::SeqCst);
        inner.connecting.store(false, Ordering::SeqCst);
        inner.flush_pending();
        tracing::info!(url = %inner.url, nick = %nick, "Connected");
        inner.fire_connected();
    }

    fn on_message(&self, text: String) {
        if let Some(inner) = self.inner.upgrade() {
            tracing::trace!(payload = %text, "Frame received");
            inner.handle_payload(&text);
        }
    }

    fn on_close(&self, code: u16, reason: String) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        self.release(&inner);
        tracing::info!(code, reason = %reason, "Disconnected");
        inner.fire_disconnected(code, &reason);
    }

    fn on_error(&self, error: TransportError) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        self.release(&inner);
        tracing::warn!(%error, "Transport error");
        inner.fire_error(&ChatError::Transport(error));
    }
}

/// Forwards notifications into an unbounded channel.
struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChatListener for ChannelListener {
    fn on_message(&self, event: &ChatEvent) {
        let _ = self.tx.send(Event::Message(event.clone()));
    }

    fn on_connected(&self) {
        let _ = self.tx.send(Event::Connected);
    }

    fn on_disconnected(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Event::Disconnected {
            code,
            reason: reason.to_string(),
        });
    }

    fn on_error(&self, error: &ChatError) {
        let _ = self.tx.send(Event::Error {
            message: error.to_string(),
        });
    }
}
