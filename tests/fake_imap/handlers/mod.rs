//! Command handlers for the fake server.
//!
//! Handlers never touch the socket. Each one takes the parsed command
//! and the mailbox state and returns a [`Reply`]: the untagged data lines
//! followed by the tagged completion. The server writes it out in one go.

mod expunge;
mod search;
mod select;
mod store;

use super::mailbox::{Folder, Mailbox};

pub use expunge::expunge;
pub use fetch::{fetch, requested_items};
pub use search::search;
pub use select::select;
pub use session::{capability, login, logout, noop};
pub use store::store_deleted;

/// Bytes answering one command.
#[derive(Debug, Default)]
pub struct Reply(Vec<u8>);

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `* <line>\r\n`.
    pub fn data(mut self, line: &str) -> Self {
        self.0.extend_from_slice(b"* ");
        self.0.extend_from_slice(line.as_bytes());
        self.0.extend_from_slice(b"\r\n");
        self
    }

    /// Append pre-framed bytes (used for literals).
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    /// Finish with `<tag> <status>\r\n`.
    pub fn done(mut self, tag: &str, status: &str) -> Vec<u8> {
        self.0.extend_from_slice(format!("{tag} {status}\r\n").as_bytes());
        self.0
    }
}

/// The folder a command operates on, or the `BAD` reply when there is none.
pub fn selected<'a>(
    tag: &str,
    mailbox: &'a Mailbox,
    folder: Option<&str>,
) -> Result<&'a Folder, Vec<u8>> {
    let name = folder.ok_or_else(|| Reply::new().done(tag, "BAD No folder selected"))?;
    mailbox
        .get_folder(name)
        .ok_or_else(|| Reply::new().done(tag, "BAD Folder not found"))
}

pub fn selected_mut<'a>(
    tag: &str,
    mailbox: &'a mut Mailbox,
    folder: Option<&str>,
) -> Result<&'a mut Folder, Vec<u8>> {
    let name = folder.ok_or_else(|| Reply::new().done(tag, "BAD No folder selected"))?;
    mailbox
        .get_folder_mut(name)
        .ok_or_else(|| Reply::new().done(tag, "BAD Folder not found"))
}

/// Reply bytes as text, for assertions.
#[cfg(test)]
pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
