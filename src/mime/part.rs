//! Lazily materialized MIME tree
//!
//! A [`PartNode`] is a handle on one body part of one message. Its
//! descriptor, children and payloads are fetched on first access and kept
//! for the lifetime of the node. Every cache cell is a
//! [`tokio::sync::OnceCell`], so concurrent first accesses share a single
//! fetch instead of racing.

use crate::error::{Error, Result};
use crate::mime::classify::{Classification, classify};
use crate::mime::decode::{DEFAULT_CHARSET, decode, decode_octets};
use crate::mime::descriptor::{Params, PartDescriptor, PartPath};
use crate::mime::types::{PartType, TransferEncoding};
use crate::transport::{SessionId, Transport, Uid};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub struct PartNode<T> {
    transport: Arc<T>,
    session: SessionId,
    uid: Uid,
    path: PartPath,
    descriptor: OnceCell<Arc<PartDescriptor>>,
    children: OnceCell<Vec<Self>>,
    raw: OnceCell<Vec<u8>>,
    decoded: OnceCell<String>,
    octets: OnceCell<Vec<u8>>,
}

impl<T> fmt::Debug for PartNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartNode")
            .field("session", &self.session)
            .field("uid", &self.uid)
            .field("path", &self.path)
            .field("descriptor", &self.descriptor.get())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PartNode<T> {
    /// Top-level part of message `uid`. Nothing is fetched until first use.
    #[must_use]
    pub fn root(transport: Arc<T>, session: SessionId, uid: Uid) -> Self {
        Self::with_descriptor(transport, session, uid, PartPath::root(), None)
    }

    fn with_descriptor(
        transport: Arc<T>,
        session: SessionId,
        uid: Uid,
        path: PartPath,
        descriptor: Option<Arc<PartDescriptor>>,
    ) -> Self {
        Self {
            transport,
            session,
            uid,
            path,
            descriptor: OnceCell::new_with(descriptor),
            children: OnceCell::new(),
            raw: OnceCell::new(),
            decoded: OnceCell::new(),
            octets: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn path(&self) -> &PartPath {
        &self.path
    }

    #[must_use]
    pub const fn uid(&self) -> Uid {
        self.uid
    }

    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Structural description of this part.
    ///
    /// Only the root fetches; children receive their descriptor from the
    /// parent's structure response.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, e.g. `StructureUnavailable`. Errors
    /// are not cached; the next call fetches again.
    pub async fn descriptor(&self) -> Result<&PartDescriptor> {
        let desc = self
            .descriptor
            .get_or_try_init(|| async {
                debug!("Resolving structure of UID {}", self.uid);
                self.transport
                    .fetch_structure(self.session, self.uid)
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(desc)
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn part_type(&self) -> Result<PartType> {
        Ok(self.descriptor().await?.part_type())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn subtype(&self) -> Result<Option<&str>> {
        Ok(self.descriptor().await?.subtype())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn encoding(&self) -> Result<TransferEncoding> {
        Ok(self.descriptor().await?.encoding())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn disposition(&self) -> Result<Option<&str>> {
        Ok(self.descriptor().await?.disposition())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn parameters(&self) -> Result<&Params> {
        Ok(self.descriptor().await?.parameters())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn disposition_parameters(&self) -> Result<&Params> {
        Ok(self.descriptor().await?.disposition_parameters())
    }

    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn kind(&self) -> Result<Classification> {
        Ok(classify(self.descriptor().await?))
    }

    /// Child parts in declaration order; empty unless this part is a
    /// multipart container. Built once and kept.
    ///
    /// # Errors
    ///
    /// Fails if the structure cannot be fetched.
    pub async fn children(&self) -> Result<&[Self]> {
        let children = self
            .children
            .get_or_try_init(|| async {
                let desc = self.descriptor().await?;
                let parts = if desc.part_type() == PartType::Multipart {
                    desc.parts()
                } else {
                    &[]
                };
                Ok::<_, Error>(
                    parts
                        .iter()
                        .enumerate()
                        .map(|(index, child)| {
                            Self::with_descriptor(
                                Arc::clone(&self.transport),
                                self.session,
                                self.uid,
                                self.path.child(index),
                                Some(Arc::clone(child)),
                            )
                        })
                        .collect(),
                )
            })
            .await?;
        Ok(children)
    }

    /// Bytes of this part as stored on the server, still
    /// transfer-encoded. The root part fetches the whole message body.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn raw_payload(&self) -> Result<&[u8]> {
        let raw = self
            .raw
            .get_or_try_init(|| async {
                debug!("Fetching UID {} part '{}'", self.uid, self.path);
                self.transport
                    .fetch_payload(self.session, self.uid, &self.path)
                    .await
            })
            .await?;
        Ok(raw)
    }

    /// Payload decoded to text using the part's transfer encoding and its
    /// `charset` parameter (UTF-8 when absent). Malformed content degrades
    /// to best-effort text instead of failing.
    ///
    /// # Errors
    ///
    /// Fails only if the structure or payload cannot be fetched.
    pub async fn decoded_payload(&self) -> Result<&str> {
        let text = self
            .decoded
            .get_or_try_init(|| async {
                let desc = self.descriptor().await?;
                let raw = self.raw_payload().await?;
                let charset = desc.parameter("charset").unwrap_or(DEFAULT_CHARSET);
                Ok::<_, Error>(decode(raw, desc.encoding(), charset))
            })
            .await?;
        Ok(text)
    }

    /// Payload with only the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Fails only if the structure or payload cannot be fetched.
    pub async fn decoded_octets(&self) -> Result<&[u8]> {
        let octets = self
            .octets
            .get_or_try_init(|| async {
                let desc = self.descriptor().await?;
                let raw = self.raw_payload().await?;
                Ok::<_, Error>(decode_octets(raw, desc.encoding()))
            })
            .await?;
        Ok(octets)
    }

    /// Descend to the part at `path`, counted from this node.
    ///
    /// # Errors
    ///
    /// Fails if a structure along the way cannot be fetched.
    pub async fn find(&self, path: &PartPath) -> Result<Option<&Self>> {
        let mut node = self;
        for &index in path.indices() {
            let children = node.children().await?;
            let Some(child) = index
                .checked_sub(1)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| children.get(i))
            else {
                return Ok(None);
            };
            node = child;
        }
        Ok(Some(node))
    }
}
