//! Body assembly
//!
//! Walks a message's part tree once, depth-first and left to right,
//! collecting decoded text per subtype plus the attachment and
//! inline-content parts. [`BodyAssemblyResult::render`] then picks the
//! caller's preferred text format or falls back to everything it found.

use crate::error::Result;
use crate::mime::classify::{AttachmentOrigin, Classification, classify};
use crate::mime::descriptor::{PartDescriptor, PartPath};
use crate::mime::part::PartNode;
use crate::mime::types::{PartType, TransferEncoding};
use crate::transport::{Transport, Uid};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Subtype used for text leaves that declare none.
const UNNAMED_TEXT_SUBTYPE: &str = "plain";

/// Decoded text fragments grouped by lowercase subtype. Buckets keep the
/// order in which their subtype was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuckets(Vec<(String, Vec<String>)>);

impl TextBuckets {
    pub fn push(&mut self, subtype: &str, fragment: String) {
        let key = subtype.to_ascii_lowercase();
        if let Some((_, fragments)) = self.0.iter_mut().find(|(k, _)| *k == key) {
            fragments.push(fragment);
        } else {
            self.0.push((key, vec![fragment]));
        }
    }

    #[must_use]
    pub fn get(&self, subtype: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(subtype))
            .map(|(_, v)| v.as_slice())
    }

    pub fn subtypes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A non-body part found during assembly. Carries enough to list the
/// part and to fetch its payload later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub uid: Uid,
    pub path: PartPath,
    pub mimetype: String,
    pub filename: String,
    pub title: Option<String>,
    pub size: Option<u32>,
    pub encoding: TransferEncoding,
    pub part_type: PartType,
    pub content_id: Option<String>,
    /// `true` for parts with an attachment disposition.
    pub is_attachment: bool,
}

impl AttachmentRef {
    #[must_use]
    pub fn from_descriptor(
        uid: Uid,
        path: PartPath,
        desc: &PartDescriptor,
        origin: AttachmentOrigin,
        now: DateTime<Utc>,
    ) -> Self {
        let (filename, title) = resolve_filename(desc, now);
        Self {
            uid,
            path,
            mimetype: desc.mime_type(),
            filename,
            title,
            size: desc.size(),
            encoding: desc.encoding(),
            part_type: desc.part_type(),
            content_id: desc.id().map(str::to_string),
            is_attachment: origin == AttachmentOrigin::Disposition,
        }
    }
}

/// Pick the exposed filename of a part, returning it with the part's
/// `title` (the disposition `filename` parameter).
///
/// Order: the Content-Type `name` parameter, then the title (with
/// `.<subtype>` added when it has no extension), then a name made from
/// `now`.
#[must_use]
pub fn resolve_filename(desc: &PartDescriptor, now: DateTime<Utc>) -> (String, Option<String>) {
    let title = desc
        .disposition_parameter("filename")
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let subtype = desc.subtype().unwrap_or_default().to_ascii_lowercase();

    let filename = match (desc.parameter("name").filter(|n| !n.is_empty()), &title) {
        (Some(name), _) => name.to_string(),
        (None, Some(title)) if Path::new(title).extension().is_some() || subtype.is_empty() => {
            title.clone()
        }
        (None, Some(title)) => format!("{title}.{subtype}"),
        (None, None) if subtype.is_empty() => now.timestamp().to_string(),
        (None, None) => format!("{}.{subtype}", now.timestamp()),
    };
    (filename, title)
}

/// Everything one assembly pass found in a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyAssemblyResult {
    texts: TextBuckets,
    attachments: Vec<AttachmentRef>,
    inline_content: Vec<AttachmentRef>,
}

impl BodyAssemblyResult {
    #[must_use]
    pub const fn texts(&self) -> &TextBuckets {
        &self.texts
    }

    /// Parts with an attachment disposition.
    #[must_use]
    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    /// Non-text parts without an attachment disposition.
    #[must_use]
    pub fn inline_content(&self) -> &[AttachmentRef] {
        &self.inline_content
    }

    /// Render the body in `preferred` format (a text subtype such as
    /// `"html"` or `"plain"`, any case).
    ///
    /// When no fragment of that subtype exists, every text bucket is
    /// joined with CRLF instead; for `html` the line breaks of that
    /// fallback become `<br/>`. `None` when the message has no text at
    /// all.
    #[must_use]
    pub fn render(&self, preferred: &str) -> Option<String> {
        if let Some(fragments) = self.texts.get(preferred).filter(|f| !f.is_empty()) {
            return Some(fragments.concat());
        }
        if self.texts.is_empty() {
            return None;
        }

        let joined = self
            .texts
            .iter()
            .map(|(_, fragments)| fragments.concat())
            .collect::<Vec<_>>()
            .join("\r\n");

        if preferred.eq_ignore_ascii_case("html") {
            Some(joined.replace("\r\n", "<br/>").replace('\n', "<br/>"))
        } else {
            Some(joined)
        }
    }
}

/// Walk the tree under `root` and collect its body text, attachments and
/// inline content.
///
/// Text leaves whose payload is malformed contribute best-effort text;
/// only transport failures abort the walk.
///
/// # Errors
///
/// Returns the transport's error if the structure or a text payload
/// cannot be fetched.
pub async fn assemble<T: Transport>(root: &PartNode<T>) -> Result<BodyAssemblyResult> {
    let now = Utc::now();
    let mut result = BodyAssemblyResult::default();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let desc = node.descriptor().await?;
        match classify(desc) {
            Classification::Multipart => {
                stack.extend(node.children().await?.iter().rev());
            }
            Classification::InlineContent => {
                let subtype = desc.subtype().unwrap_or(UNNAMED_TEXT_SUBTYPE);
                let text = node.decoded_payload().await?;
                result.texts.push(subtype, text.to_string());
            }
            Classification::Attachment(origin) => {
                let part = AttachmentRef::from_descriptor(
                    node.uid(),
                    node.path().clone(),
                    desc,
                    origin,
                    now,
                );
                match origin {
                    AttachmentOrigin::Disposition => result.attachments.push(part),
                    AttachmentOrigin::NonText => result.inline_content.push(part),
                }
            }
        }
    }

    debug!(
        "Assembled UID {}: {} text bucket(s), {} attachment(s), {} inline part(s)",
        root.uid(),
        result.texts.len(),
        result.attachments.len(),
        result.inline_content.len()
    );
    Ok(result)
}
