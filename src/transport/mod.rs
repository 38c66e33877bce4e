//! Mail transport abstraction
//!
//! The MIME interpreter only ever talks to the server through
//! [`Transport`]: one structure fetch, ranged payload fetches and a
//! header fetch per message. Implementations serialize their own calls;
//! callers issue them one at a time and never speculate.

mod imap;
mod memory;

pub use imap::ImapTransport;
pub use memory::{FetchCounts, MemoryMessage, MemoryTransport};

use crate::error::Result;
use crate::header::HeaderInfo;
use crate::mime::{PartDescriptor, PartPath};
use serde::Serialize;
use std::fmt;
use std::future::Future;

/// IMAP UID of a message in the selected mailbox.
pub type Uid = u32;

/// Opaque handle of one server session.
///
/// A transport hands out a new handle every time it closes or reopens
/// its session. Anything cached under an older handle is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Operations the message reader needs from a mail server.
///
/// Every call names the session it expects; implementations reject
/// calls made with a handle they no longer serve
/// ([`Error::StaleSession`](crate::Error::StaleSession)).
pub trait Transport: Send + Sync {
    /// Handle of the session currently serving calls. No I/O.
    fn session(&self) -> SessionId;

    /// Make sure a usable session is open (connecting, probing or
    /// reopening as the implementation sees fit) and return its handle.
    fn ensure_session(&self) -> impl Future<Output = Result<SessionId>> + Send;

    /// MIME structure of a message.
    ///
    /// Fails with `StructureUnavailable` when the server reports none.
    fn fetch_structure(
        &self,
        session: SessionId,
        uid: Uid,
    ) -> impl Future<Output = Result<PartDescriptor>> + Send;

    /// Raw (still transfer-encoded) bytes of one part. The root path
    /// means the whole message body.
    fn fetch_payload(
        &self,
        session: SessionId,
        uid: Uid,
        path: &PartPath,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Header fields, size and flags of a message.
    fn fetch_header_info(
        &self,
        session: SessionId,
        uid: Uid,
    ) -> impl Future<Output = Result<HeaderInfo>> + Send;
}
