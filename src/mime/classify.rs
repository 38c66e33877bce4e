//! Multipart / inline content / attachment classification

use crate::mime::descriptor::PartDescriptor;
use crate::mime::types::PartType;

/// Why a leaf was classified as an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentOrigin {
    /// `Content-Disposition: attachment` was declared.
    Disposition,
    /// A non-text leaf without an attachment disposition.
    NonText,
}

/// How body assembly treats a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Container; recurse into its children.
    Multipart,
    /// Text leaf that contributes to the rendered body.
    InlineContent,
    Attachment(AttachmentOrigin),
}

impl Classification {
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        !matches!(self, Self::Multipart)
    }
}

/// Classify one part. Rules apply in order:
///
/// 1. multipart containers always recurse, whatever their disposition;
/// 2. a declared `attachment` disposition (any case) makes an attachment;
/// 3. remaining text leaves are body content;
/// 4. every other leaf is surfaced as an attachment-like part.
#[must_use]
pub fn classify(desc: &PartDescriptor) -> Classification {
    if desc.part_type() == PartType::Multipart {
        Classification::Multipart
    } else if desc
        .disposition()
        .is_some_and(|d| d.eq_ignore_ascii_case("attachment"))
    {
        Classification::Attachment(AttachmentOrigin::Disposition)
    } else if desc.part_type() == PartType::Text {
        Classification::InlineContent
    } else {
        Classification::Attachment(AttachmentOrigin::NonText)
    }
}
