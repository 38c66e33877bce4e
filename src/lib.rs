//! IMAP message reader
//!
//! Reads messages from an IMAP mailbox as subject, rendered body,
//! attachments and inline content. Everything is derived from the
//! server's BODYSTRUCTURE: parts are classified from their declared
//! type and disposition, and only the payloads actually needed are
//! fetched, each at most once.
//!
//! ```no_run
//! use imap_message_reader::{ImapConfig, MailClient};
//!
//! # async fn run() -> imap_message_reader::Result<()> {
//! let client = MailClient::new(ImapConfig::from_env()?);
//! if let Some(mut message) = client.first_message().await? {
//!     println!("{}", message.subject().await?);
//!     println!("{}", message.render_body("plain").await?.unwrap_or_default());
//!     for part in message.attachments().await? {
//!         println!("{} ({})", part.filename, part.mimetype);
//!     }
//! }
//! client.close().await
//! # }
//! ```

mod client;
mod config;
mod connection;
mod error;
mod flag;
mod header;
mod message;
pub mod mime;
pub mod transport;

pub use client::{DEFAULT_QUERY, MailClient};
pub use config::ImapConfig;
pub use error::{Error, Result};
pub use flag::Flag;
pub use header::HeaderInfo;
pub use message::{AttachmentPayload, MessageView};
pub use mime::{AttachmentRef, BodyAssemblyResult, PartNode, PartPath, PartType, TransferEncoding};
pub use transport::{ImapTransport, MemoryMessage, MemoryTransport, SessionId, Transport, Uid};
