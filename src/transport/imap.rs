//! IMAP transport
//!
//! One logged-in session per transport, opened on first use and kept
//! behind an async mutex so every command on it runs one at a time.

use super::{SessionId, Transport, Uid};
use crate::config::ImapConfig;
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::header::HeaderInfo;
use crate::mime::{PartDescriptor, PartPath, PartType, TransferEncoding};
use async_imap::imap_proto::{
    BodyContentCommon, BodyContentSinglePart, BodyStructure, ContentEncoding, SectionPath,
};
use async_imap::types::{Fetch, Flag as ImapFlag};
use futures::TryStreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const STRUCTURE_QUERY: &str = "BODYSTRUCTURE";
const BODY_TEXT_QUERY: &str = "BODY.PEEK[TEXT]";
const HEADER_QUERY: &str = "(FLAGS RFC822.SIZE BODY.PEEK[HEADER])";

type SessionSlot<'a> = MutexGuard<'a, Option<ImapSession>>;

/// [`Transport`] over a live IMAP connection.
pub struct ImapTransport {
    config: ImapConfig,
    session: Mutex<Option<ImapSession>>,
    generation: AtomicU64,
}

impl ImapTransport {
    /// Nothing is opened until the first call.
    #[must_use]
    pub fn new(config: ImapConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ImapConfig {
        &self.config
    }

    /// UIDs matching an IMAP SEARCH query, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or UID SEARCH fails.
    pub async fn search(&self, query: &str) -> Result<Vec<Uid>> {
        let mut slot = self.lock().await?;
        let session = live(&mut slot)?;
        match session.uid_search(query).await {
            Ok(uids) => {
                let mut uids: Vec<Uid> = uids.into_iter().collect();
                uids.sort_unstable();
                info!("Found {} messages matching '{}'", uids.len(), query);
                Ok(uids)
            }
            Err(e) => Err(self.fail(&mut slot, "Search", e)),
        }
    }

    /// Number of messages in the configured mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or SELECT fails.
    pub async fn count(&self) -> Result<u32> {
        let mut slot = self.lock().await?;
        let session = live(&mut slot)?;
        connection::select(session, &self.config.mailbox).await
    }

    /// Set `\Deleted` on a message. It disappears on [`close`](Self::close).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or UID STORE fails.
    pub async fn delete(&self, uid: Uid) -> Result<()> {
        let mut slot = self.lock().await?;
        let session = live(&mut slot)?;
        let stored = match session.uid_store(uid.to_string(), "+FLAGS (\\Deleted)").await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        match stored {
            Ok(_) => {
                debug!("Marked UID {} deleted", uid);
                Ok(())
            }
            Err(e) => Err(self.fail(&mut slot, "Store", e)),
        }
    }

    /// Expunge deleted messages and log out. Handles issued before this
    /// call become stale; the next call opens a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if EXPUNGE fails. The session is dropped either
    /// way.
    pub async fn close(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        let Some(mut session) = slot.take() else {
            return Ok(());
        };
        self.generation.fetch_add(1, Ordering::SeqCst);

        let expunged = match session.expunge().await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        session.logout().await.ok();

        let expunged = expunged.map_err(|e| Error::Transport(format!("Expunge failed: {e}")))?;
        info!("Session closed, {} message(s) expunged", expunged.len());
        Ok(())
    }

    /// Lock the session slot, opening a session when there is none. An
    /// open session is first checked with NOOP (if configured) and
    /// replaced when the check fails.
    async fn lock(&self) -> Result<SessionSlot<'_>> {
        let mut slot = self.session.lock().await;

        if self.config.ping_session
            && let Some(session) = slot.as_mut()
            && let Err(e) = session.noop().await
        {
            warn!("Session probe failed, reconnecting: {}", e);
            self.discard(&mut slot);
        }

        if slot.is_none() {
            *slot = Some(connection::connect(&self.config).await?);
            debug!("Opened {}", self.session());
        }
        Ok(slot)
    }

    fn discard(&self, slot: &mut Option<ImapSession>) {
        if slot.take().is_some() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Map a protocol error, dropping the session if the connection
    /// itself broke.
    fn fail(&self, slot: &mut Option<ImapSession>, what: &str, e: async_imap::error::Error) -> Error {
        if matches!(
            e,
            async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost
        ) {
            warn!("Connection broke during {}: {}", what, e);
            self.discard(slot);
        }
        Error::Transport(format!("{what} failed: {e}"))
    }

    fn check(&self, expected: SessionId) -> Result<()> {
        let current = self.session();
        if expected == current {
            Ok(())
        } else {
            Err(Error::StaleSession {
                held: expected.generation(),
                current: current.generation(),
            })
        }
    }

    /// Run one UID FETCH on the session `expected` names. Never opens a
    /// session; that is left to [`ensure_session`](Transport::ensure_session).
    async fn fetch_one(&self, expected: SessionId, uid: Uid, query: &str) -> Result<Fetch> {
        let mut slot = self.session.lock().await;
        self.check(expected)?;
        let session = live(&mut slot)?;
        debug!("UID FETCH {} {}", uid, query);

        let fetched = match session.uid_fetch(uid.to_string(), query).await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        match fetched {
            Ok(fetches) => fetches
                .into_iter()
                // Unsolicited flag updates for other messages carry no UID.
                .find(|f| f.uid == Some(uid))
                .ok_or(Error::MessageNotFound { uid }),
            Err(e) => Err(self.fail(&mut slot, "Fetch", e)),
        }
    }
}

impl Transport for ImapTransport {
    fn session(&self) -> SessionId {
        SessionId::new(self.generation.load(Ordering::SeqCst))
    }

    async fn ensure_session(&self) -> Result<SessionId> {
        let _slot = self.lock().await?;
        Ok(self.session())
    }

    async fn fetch_structure(&self, session: SessionId, uid: Uid) -> Result<PartDescriptor> {
        let fetch = self.fetch_one(session, uid, STRUCTURE_QUERY).await?;
        fetch
            .bodystructure()
            .map(descriptor_from)
            .ok_or(Error::StructureUnavailable { uid })
    }

    async fn fetch_payload(&self, session: SessionId, uid: Uid, path: &PartPath) -> Result<Vec<u8>> {
        let payload = if path.is_root() {
            let fetch = self.fetch_one(session, uid, BODY_TEXT_QUERY).await?;
            fetch.text().map(<[u8]>::to_vec)
        } else {
            let query = format!("BODY.PEEK[{path}]");
            let fetch = self.fetch_one(session, uid, &query).await?;
            fetch
                .section(&SectionPath::Part(path.indices().to_vec(), None))
                .map(<[u8]>::to_vec)
        };
        payload.ok_or_else(|| Error::PartNotFound {
            uid,
            path: path.to_string(),
        })
    }

    async fn fetch_header_info(&self, session: SessionId, uid: Uid) -> Result<HeaderInfo> {
        let fetch = self.fetch_one(session, uid, HEADER_QUERY).await?;
        let mut info = HeaderInfo::from_header_block(uid, fetch.header().unwrap_or_default())
            .with_flags(fetch.flags().filter_map(|f| convert_flag(&f)));
        if let Some(size) = fetch.size {
            info = info.with_size(size);
        }
        Ok(info)
    }
}

fn live(slot: &mut Option<ImapSession>) -> Result<&mut ImapSession> {
    slot.as_mut()
        .ok_or_else(|| Error::Transport("No open session".to_string()))
}

fn convert_flag(flag: &ImapFlag<'_>) -> Option<Flag> {
    Some(match flag {
        ImapFlag::Seen => Flag::Seen,
        ImapFlag::Answered => Flag::Answered,
        ImapFlag::Flagged => Flag::Flagged,
        ImapFlag::Deleted => Flag::Deleted,
        ImapFlag::Draft => Flag::Draft,
        ImapFlag::Recent => Flag::Recent,
        ImapFlag::Custom(name) => Flag::from_imap_str(name),
        ImapFlag::MayCreate => return None,
    })
}

/// Convert a server body structure into a descriptor tree.
///
/// Encapsulated messages (`message/rfc822`) stay leaves.
fn descriptor_from(structure: &BodyStructure<'_>) -> PartDescriptor {
    match structure {
        BodyStructure::Multipart { common, bodies, .. } => {
            let parts = bodies.iter().map(descriptor_from).collect();
            with_common(PartDescriptor::multipart(&*common.ty.subtype, parts), common)
        }
        BodyStructure::Basic { common, other, .. } => single_part(common, other, None),
        BodyStructure::Text {
            common,
            other,
            lines,
            ..
        }
        | BodyStructure::Message {
            common,
            other,
            lines,
            ..
        } => single_part(common, other, Some(*lines)),
    }
}

fn single_part(
    common: &BodyContentCommon<'_>,
    other: &BodyContentSinglePart<'_>,
    lines: Option<u32>,
) -> PartDescriptor {
    let mut desc = with_common(
        PartDescriptor::leaf(PartType::from_name(&common.ty.ty), &*common.ty.subtype),
        common,
    )
    .with_encoding(encoding_from(&other.transfer_encoding))
    .with_size(other.octets);

    if let Some(id) = &other.id {
        desc = desc.with_id(&**id);
    }
    if let Some(description) = &other.description {
        desc = desc.with_description(&**description);
    }
    if let Some(lines) = lines {
        desc = desc.with_lines(lines);
    }
    desc
}

fn with_common(desc: PartDescriptor, common: &BodyContentCommon<'_>) -> PartDescriptor {
    let mut desc = common
        .ty
        .params
        .iter()
        .flatten()
        .fold(desc, |d, (name, value)| d.with_param(&**name, value));

    if let Some(disposition) = &common.disposition {
        desc = disposition
            .params
            .iter()
            .flatten()
            .fold(desc.with_disposition(&*disposition.ty), |d, (name, value)| {
                d.with_disposition_param(&**name, value)
            });
    }
    desc
}

fn encoding_from(encoding: &ContentEncoding<'_>) -> TransferEncoding {
    match encoding {
        ContentEncoding::SevenBit => TransferEncoding::SevenBit,
        ContentEncoding::EightBit => TransferEncoding::EightBit,
        ContentEncoding::Binary => TransferEncoding::Binary,
        ContentEncoding::Base64 => TransferEncoding::Base64,
        ContentEncoding::QuotedPrintable => TransferEncoding::QuotedPrintable,
        ContentEncoding::Other(name) => TransferEncoding::from_name(name),
    }
}
