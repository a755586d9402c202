//! Client SDK for hack.chat-style WebSocket chat rooms.
//!
//! [`client::ChatClient`] is the entry point: it owns the connection policy,
//! the join handshake, nickname-collision retries and the offline send queue.
//! [`transport`] holds the mechanical part: one WebSocket per session,
//! text-frame reassembly and open/message/close/error signalling.

pub mod client;
pub mod error;
pub mod event;
pub mod nick;
pub mod outgoing;
pub mod protocol;
pub mod settings;
pub mod transport;

use once_cell::sync::Lazy;

/// Fallback runtime for hosts that call in from plain threads.
/// Two worker threads are plenty for one chat socket.
static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("hackchat-io")
        .build()
        .expect("Failed to create tokio runtime")
});

/// Runtime handle to spawn connection work on: the caller's runtime if there
/// is one, otherwise the shared fallback.
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
    tokio::runtime::Handle::try_current().unwrap_or_else(|_| RUNTIME.handle().clone())
}

pub use client::{ChatClient, ChatListener};
pub use error::{ChatError, TransportError};
pub use event::{ChatEvent, Event};
pub use settings::Settings;
