//! Message view
//!
//! [`MessageView`] is bound to one message UID. Header info and the
//! assembled body are fetched on first use and cached until the view is
//! refreshed, rebound to another UID, or the transport moves to a new
//! session.

use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::header::HeaderInfo;
use crate::mime::{AttachmentRef, BodyAssemblyResult, PartNode, PartType, assemble, decode_header};
use crate::transport::{SessionId, Transport, Uid};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::debug;

/// Payload of an attachment or inline part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentPayload {
    /// Text parts, converted from their charset.
    Text(String),
    /// Everything else, with only the transfer encoding removed.
    Binary(Vec<u8>),
}

impl AttachmentPayload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

pub struct MessageView<T> {
    transport: Arc<T>,
    uid: Uid,
    session: SessionId,
    header: Option<HeaderInfo>,
    root: PartNode<T>,
    body: Option<BodyAssemblyResult>,
}

impl<T: Transport> MessageView<T> {
    #[must_use]
    pub fn new(transport: Arc<T>, uid: Uid) -> Self {
        let session = transport.session();
        let root = PartNode::root(Arc::clone(&transport), session, uid);
        Self {
            transport,
            uid,
            session,
            header: None,
            root,
            body: None,
        }
    }

    #[must_use]
    pub const fn uid(&self) -> Uid {
        self.uid
    }

    /// Session the cached data belongs to.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Root of the message's part tree.
    #[must_use]
    pub const fn root(&self) -> &PartNode<T> {
        &self.root
    }

    /// Bind the view to another message, dropping everything cached.
    pub fn rebind(&mut self, uid: Uid) {
        self.uid = uid;
        self.reset(self.transport.session());
    }

    /// Drop everything cached; the next access fetches again.
    pub fn refresh(&mut self) {
        self.reset(self.transport.session());
    }

    fn reset(&mut self, session: SessionId) {
        self.session = session;
        self.header = None;
        self.body = None;
        self.root = PartNode::root(Arc::clone(&self.transport), session, self.uid);
    }

    async fn sync_session(&mut self) -> Result<()> {
        let current = self.transport.ensure_session().await?;
        if current != self.session {
            debug!(
                "UID {}: {} replaced by {}, clearing caches",
                self.uid, self.session, current
            );
            self.reset(current);
        }
        Ok(())
    }

    /// Header info of the message.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn header(&mut self) -> Result<&HeaderInfo> {
        self.sync_session().await?;
        let header = match self.header.take() {
            Some(header) => header,
            None => {
                self.transport
                    .fetch_header_info(self.session, self.uid)
                    .await?
            }
        };
        Ok(self.header.insert(header))
    }

    async fn header_field<R>(&mut self, f: impl FnOnce(&HeaderInfo) -> R) -> Result<R> {
        self.header().await.map(f)
    }

    /// Decoded subject; empty when the message has none.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn subject(&mut self) -> Result<String> {
        self.header_field(|h| decoded(h.subject.as_deref())).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn from(&mut self) -> Result<String> {
        self.header_field(|h| decoded(h.from.as_deref())).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn to(&mut self) -> Result<String> {
        self.header_field(|h| decoded(h.to.as_deref())).await
    }

    /// Raw `Date` header.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn date(&mut self) -> Result<Option<String>> {
        self.header_field(|h| h.date.clone()).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn parsed_date(&mut self) -> Result<Option<DateTime<FixedOffset>>> {
        self.header_field(HeaderInfo::parsed_date).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn message_id(&mut self) -> Result<Option<String>> {
        self.header_field(|h| h.message_id.clone()).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn references(&mut self) -> Result<Option<String>> {
        self.header_field(|h| h.references.clone()).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn in_reply_to(&mut self) -> Result<Option<String>> {
        self.header_field(|h| h.in_reply_to.clone()).await
    }

    /// Size in octets as reported by the server.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn size(&mut self) -> Result<Option<u32>> {
        self.header_field(|h| h.size).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn flags(&mut self) -> Result<Vec<Flag>> {
        self.header_field(|h| h.flags.clone()).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_seen(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Seen)).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_recent(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Recent)).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_flagged(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Flagged)).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_answered(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Answered)).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_deleted(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Deleted)).await
    }

    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn is_draft(&mut self) -> Result<bool> {
        self.header_field(|h| h.has_flag(&Flag::Draft)).await
    }

    /// The assembled body, built on first use.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the structure or a text part
    /// cannot be fetched.
    pub async fn body(&mut self) -> Result<&BodyAssemblyResult> {
        self.sync_session().await?;
        let body = match self.body.take() {
            Some(body) => body,
            None => assemble(&self.root).await?,
        };
        Ok(self.body.insert(body))
    }

    /// Body in the `preferred` text subtype (`"html"`, `"plain"`), or
    /// every text part joined when that subtype is missing. `None` when
    /// the message has no text parts.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn render_body(&mut self, preferred: &str) -> Result<Option<String>> {
        Ok(self.body().await?.render(preferred))
    }

    /// Parts with an attachment disposition, in tree order.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn attachments(&mut self) -> Result<&[AttachmentRef]> {
        Ok(self.body().await?.attachments())
    }

    /// Non-text parts without an attachment disposition, in tree order.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn inline_content(&mut self) -> Result<&[AttachmentRef]> {
        Ok(self.body().await?.inline_content())
    }

    /// Fetch and decode the payload of a part listed by this view.
    ///
    /// # Errors
    ///
    /// `PartNotFound` if the reference belongs to another message or its
    /// path does not exist; otherwise the transport's error.
    pub async fn attachment_payload(&mut self, part: &AttachmentRef) -> Result<AttachmentPayload> {
        let not_found = || Error::PartNotFound {
            uid: part.uid,
            path: part.path.to_string(),
        };
        if part.uid != self.uid {
            return Err(not_found());
        }
        self.sync_session().await?;

        let node = self.root.find(&part.path).await?.ok_or_else(not_found)?;
        if node.part_type().await? == PartType::Text {
            Ok(AttachmentPayload::Text(node.decoded_payload().await?.to_string()))
        } else {
            Ok(AttachmentPayload::Binary(node.decoded_octets().await?.to_vec()))
        }
    }
}

fn decoded(raw: Option<&str>) -> String {
    raw.map(decode_header).unwrap_or_default()
}
