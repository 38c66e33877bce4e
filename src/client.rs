//! Mailbox client
//!
//! Entry point for reading one mailbox: search for messages and get a
//! [`MessageView`] for each. All views share the client's single IMAP
//! session.

use crate::config::ImapConfig;
use crate::error::Result;
use crate::message::MessageView;
use crate::transport::{ImapTransport, Transport, Uid};
use std::sync::Arc;
use tracing::{debug, info};

/// Query used when the caller gives none.
pub const DEFAULT_QUERY: &str = "UNSEEN UNDELETED";

/// IMAP client for the mailbox named in its [`ImapConfig`].
pub struct MailClient {
    transport: Arc<ImapTransport>,
}

impl MailClient {
    #[must_use]
    pub fn new(config: ImapConfig) -> Self {
        Self {
            transport: Arc::new(ImapTransport::new(config)),
        }
    }

    /// The shared transport, for building views directly.
    #[must_use]
    pub fn transport(&self) -> Arc<ImapTransport> {
        Arc::clone(&self.transport)
    }

    /// UIDs matching `query` (default [`DEFAULT_QUERY`]), ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, or SEARCH fails.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<Uid>> {
        self.transport.search(query.unwrap_or(DEFAULT_QUERY)).await
    }

    /// Views for every message matching `query`. Nothing but the search
    /// itself is fetched yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, or SEARCH fails.
    pub async fn messages(&self, query: Option<&str>) -> Result<Vec<MessageView<ImapTransport>>> {
        let uids = self.search(query).await?;
        Ok(uids.into_iter().map(|uid| self.message(uid)).collect())
    }

    /// View for a single UID. The UID is not checked until the view is
    /// first used.
    #[must_use]
    pub fn message(&self, uid: Uid) -> MessageView<ImapTransport> {
        MessageView::new(Arc::clone(&self.transport), uid)
    }

    /// First message of the default query, or of the whole mailbox when
    /// nothing matches it. `None` for an empty mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection, SELECT, or SEARCH fails.
    pub async fn first_message(&self) -> Result<Option<MessageView<ImapTransport>>> {
        let mut uids = self.search(None).await?;
        if uids.is_empty() {
            debug!("No message matches '{}', falling back to ALL", DEFAULT_QUERY);
            uids = self.search(Some("ALL")).await?;
        }
        Ok(uids.first().map(|&uid| self.message(uid)))
    }

    /// Number of messages in the mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or SELECT fails.
    pub async fn count(&self) -> Result<u32> {
        self.transport.count().await
    }

    /// Mark a message deleted; it is removed on [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or STORE fails.
    pub async fn delete(&self, uid: Uid) -> Result<()> {
        self.transport.delete(uid).await
    }

    /// Expunge and log out. Open views refetch on their next use.
    ///
    /// # Errors
    ///
    /// Returns an error if EXPUNGE fails.
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await?;
        info!("Closed mailbox, next session is {}", self.transport.session());
        Ok(())
    }
}
