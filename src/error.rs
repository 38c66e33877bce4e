//! Error types for imap-message-reader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Network or IMAP session failure. Never retried inside the crate.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered without a body structure for this message.
    #[error("No body structure available for UID {uid}")]
    StructureUnavailable { uid: u32 },

    /// The call carried a session handle from before a reconnect.
    #[error("Session {held} was replaced by session {current}")]
    StaleSession { held: u64, current: u64 },

    #[error("Message UID {uid} not found")]
    MessageNotFound { uid: u32 },

    #[error("Part '{path}' not found in message UID {uid}")]
    PartNotFound { uid: u32, path: String },

    /// Malformed transfer encoding or unknown charset.
    ///
    /// Body assembly recovers from this locally; it only reaches callers
    /// of the low-level decode functions.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

pub type Result<T> = std::result::Result<T, Error>;
