//! Transport session: one streaming connection per session.
//!
//! A [`Transport`] opens the connection and reports through [`SessionEvents`],
//! which owns the text reassembly buffer and makes sure a session ends with
//! exactly one close or error signal. Outbound traffic goes through a
//! [`SessionHandle`], a cheap clonable sender drained by the connection task.
//!
//! [`WsTransport`] is the WebSocket implementation used in production.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::TransportError;

/// How long [`WsTransport`] waits for the handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Close code reported when the peer vanished without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;
/// Close code reported when the close frame carried no status.
pub const NO_STATUS_CLOSE: u16 = 1005;

/// Receives the lifecycle of one session. Called from the transport's task.
pub trait SessionListener: Send + Sync + 'static {
    fn on_open(&self, session: SessionHandle);
    /// One complete, reassembled text message.
    fn on_message(&self, text: String);
    fn on_close(&self, code: u16, reason: String);
    fn on_error(&self, error: TransportError);
}

/// Something that can open sessions.
pub trait Transport: Send + Sync + 'static {
    /// Start opening a session to `url` and return immediately.
    ///
    /// Exactly one of `events.opened(..)` or `events.failed(..)` must follow.
    fn open(&self, url: &str, events: SessionEvents);
}

/// Outbound work for the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// Sending side of a live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl SessionHandle {
    /// A handle plus the receiver the connection task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue one complete text frame. Dropped if the session is gone.
    pub fn send_frame(&self, text: impl Into<String>) {
        if self.tx.send(Outgoing::Text(text.into())).is_err() {
            tracing::debug!("Session closed, dropping outbound frame");
        }
    }

    /// Ask for a graceful close; the close signal arrives later.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// The connection task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event sink handed to a [`Transport`] for one session.
///
/// Fragments are appended to a buffer under a single lock and the complete
/// message is delivered, and the buffer cleared, inside that same lock, so
/// two messages can never interleave. After `closed` or `failed` every
/// further call is ignored.
#[derive(Clone)]
pub struct SessionEvents {
    inner: Arc<EventsInner>,
}

struct EventsInner {
    listener: Arc<dyn SessionListener>,
    incoming: Mutex<String>,
    finished: AtomicBool,
}

impl SessionEvents {
    pub fn new(listener: Arc<dyn SessionListener>) -> Self {
        Self {
            inner: Arc::new(EventsInner {
                listener,
                incoming: Mutex::new(String::new()),
                finished: AtomicBool::new(false),
            }),
        }
    }

    pub fn opened(&self, session: SessionHandle) {
        if self.is_finished() {
            return;
        }
        self.inner.listener.on_open(session);
    }

    /// Deliver one fragment; `last` marks the end of a message.
    pub fn fragment(&self, data: &str, last: bool) {
        if self.is_finished() {
            return;
        }
        let mut incoming = self.inner.incoming.lock();
        incoming.push_str(data);
        if last {
            let payload = std::mem::take(&mut *incoming);
            self.inner.listener.on_message(payload);
        }
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.incoming.lock().clear();
        self.inner.listener.on_close(code, reason.into());
    }

    pub fn failed(&self, error: TransportError) {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.incoming.lock().clear();
        self.inner.listener.on_error(error);
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }
}

/// WebSocket transport on top of `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    runtime: tokio::runtime::Handle,
    connect_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WsTransport {
    pub fn new() -> Self {
        Self {
            runtime: crate::runtime_handle(),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, events: SessionEvents) {
        let url = url.to_string();
        let connect_timeout = self.connect_timeout;
        self.runtime.spawn(run_session(url, connect_timeout, events));
    }
}

async fn run_session(url: String, connect_timeout: Duration, events: SessionEvents) {
    tracing::debug!(%url, "Opening websocket");
    let ws = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(error)) => {
            let error = match error {
                tungstenite::Error::Url(_) => TransportError::InvalidUrl(url),
                other => TransportError::Connect {
                    url,
                    source: Box::new(other),
                },
            };
            events.failed(error);
            return;
        }
        Err(_) => {
            events.failed(TransportError::Timeout(url));
            return;
        }
    };
    tracing::debug!(%url, "Websocket open");

    let (mut sink, mut stream) = ws.split();
    let (session, mut outgoing) = SessionHandle::channel();
    // The listener holds the only sender; the channel closes once it lets go.
    events.opened(session);

    let mut outgoing_open = true;
    let mut close_sent = false;
    let mut close_received: Option<(u16, String)> = None;

    loop {
        tokio::select! {
            out = outgoing.recv(), if outgoing_open => {
                let message = match out {
                    Some(Outgoing::Text(text)) if !close_sent => Message::Text(text.into()),
                    Some(Outgoing::Text(_)) => continue,
                    Some(Outgoing::Close { code, reason }) => {
                        if close_sent {
                            continue;
                        }
                        close_sent = true;
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        }))
                    }
                    None => {
                        outgoing_open = false;
                        if close_sent {
                            continue;
                        }
                        close_sent = true;
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        }))
                    }
                };
                if let Err(error) = sink.send(message).await {
                    finish_with_error(&events, error, close_sent, close_received.take());
                    return;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.fragment(text.as_str(), true),
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map_or_else(
                        || (NO_STATUS_CLOSE, String::new()),
                        |f| (u16::from(f.code), f.reason.to_string()),
                    );
                    tracing::debug!(code = info.0, reason = %info.1, "Close frame received");
                    close_received = Some(info);
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    finish_with_error(&events, error, close_sent, close_received.take());
                    return;
                }
                None => {
                    let (code, reason) = close_received
                        .take()
                        .unwrap_or_else(|| (ABNORMAL_CLOSE, "connection closed".to_string()));
                    tracing::debug!(code, "Websocket closed");
                    events.closed(code, reason);
                    return;
                }
            }
        }
    }
}

/// Errors after we asked to close, or on an already-closed socket, end the
/// session as a close rather than a failure.
fn finish_with_error(
    events: &SessionEvents,
    error: tungstenite::Error,
    close_sent: bool,
    close_received: Option<(u16, String)>,
) {
    match error {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            let (code, reason) =
                close_received.unwrap_or_else(|| (ABNORMAL_CLOSE, "connection closed".to_string()));
            events.closed(code, reason);
        }
        other if close_sent => {
            tracing::debug!(error = %other, "Peer dropped the socket during close");
            let (code, reason) =
                close_received.unwrap_or_else(|| (ABNORMAL_CLOSE, "connection closed".to_string()));
            events.closed(code, reason);
        }
        other => {
            tracing::warn!(error = %other, "Websocket failed");
            events.failed(TransportError::Protocol(Box::new(other)));
        }
    }
}
