//! In-memory transport
//!
//! Serves preloaded messages without a server. Every fetch is counted per
//! kind so callers can observe how often the reader goes to the wire.

use super::{SessionId, Transport, Uid};
use crate::error::{Error, Result};
use crate::header::HeaderInfo;
use crate::mime::{PartDescriptor, PartPath};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// One stored message: its structure, header and part payloads.
#[derive(Debug, Clone, Default)]
pub struct MemoryMessage {
    structure: Option<PartDescriptor>,
    header: HeaderInfo,
    sections: HashMap<PartPath, Vec<u8>>,
}

impl MemoryMessage {
    #[must_use]
    pub fn new(structure: PartDescriptor) -> Self {
        Self {
            structure: Some(structure),
            ..Self::default()
        }
    }

    /// A message the server reports no body structure for.
    #[must_use]
    pub fn without_structure() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, header: HeaderInfo) -> Self {
        self.header = header;
        self
    }

    /// Raw payload of the part at `path` (`"1.2"`). An unparsable path
    /// is ignored.
    #[must_use]
    pub fn with_section(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        if let Some(path) = PartPath::parse(path) {
            self.sections.insert(path, bytes.into());
        }
        self
    }

    /// Raw payload of the whole message body.
    #[must_use]
    pub fn with_body(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_section("", bytes)
    }
}

/// Number of calls served per fetch kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub structure: usize,
    pub payload: usize,
    pub header: usize,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    messages: Mutex<HashMap<Uid, MemoryMessage>>,
    generation: AtomicU64,
    offline: AtomicBool,
    structure_fetches: AtomicUsize,
    payload_fetches: AtomicUsize,
    header_fetches: AtomicUsize,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the message at `uid`.
    #[must_use]
    pub fn with_message(self, uid: Uid, message: MemoryMessage) -> Self {
        self.insert(uid, message);
        self
    }

    pub fn insert(&self, uid: Uid, message: MemoryMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.insert(uid, message);
        }
    }

    /// Simulate a reconnect: start a new session and invalidate the old
    /// handle.
    pub fn rotate_session(&self) -> SessionId {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Memory transport moved to session#{}", next);
        SessionId::new(next)
    }

    /// While offline every fetch fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fetch_counts(&self) -> FetchCounts {
        FetchCounts {
            structure: self.structure_fetches.load(Ordering::SeqCst),
            payload: self.payload_fetches.load(Ordering::SeqCst),
            header: self.header_fetches.load(Ordering::SeqCst),
        }
    }

    fn check(&self, session: SessionId) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport("Connection lost".to_string()));
        }
        let current = self.session();
        if session == current {
            Ok(())
        } else {
            Err(Error::StaleSession {
                held: session.generation(),
                current: current.generation(),
            })
        }
    }

    fn with_stored<R>(&self, uid: Uid, f: impl FnOnce(&MemoryMessage) -> Result<R>) -> Result<R> {
        let messages = self
            .messages
            .lock()
            .map_err(|e| Error::Transport(format!("Message store poisoned: {e}")))?;
        let message = messages.get(&uid).ok_or(Error::MessageNotFound { uid })?;
        f(message)
    }
}

impl Transport for MemoryTransport {
    fn session(&self) -> SessionId {
        SessionId::new(self.generation.load(Ordering::SeqCst))
    }

    async fn ensure_session(&self) -> Result<SessionId> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport("Connection lost".to_string()));
        }
        Ok(self.session())
    }

    async fn fetch_structure(&self, session: SessionId, uid: Uid) -> Result<PartDescriptor> {
        self.structure_fetches.fetch_add(1, Ordering::SeqCst);
        self.check(session)?;
        debug!("Fetching structure of UID {}", uid);
        self.with_stored(uid, |m| {
            m.structure
                .clone()
                .ok_or(Error::StructureUnavailable { uid })
        })
    }

    async fn fetch_payload(&self, session: SessionId, uid: Uid, path: &PartPath) -> Result<Vec<u8>> {
        self.payload_fetches.fetch_add(1, Ordering::SeqCst);
        self.check(session)?;
        debug!("Fetching payload of UID {} part '{}'", uid, path);
        self.with_stored(uid, |m| {
            m.sections
                .get(path)
                .cloned()
                .ok_or_else(|| Error::PartNotFound {
                    uid,
                    path: path.to_string(),
                })
        })
    }

    async fn fetch_header_info(&self, session: SessionId, uid: Uid) -> Result<HeaderInfo> {
        self.header_fetches.fetch_add(1, Ordering::SeqCst);
        self.check(session)?;
        debug!("Fetching header of UID {}", uid);
        self.with_stored(uid, |m| {
            let mut header = m.header.clone();
            header.uid = uid;
            Ok(header)
        })
    }
}
