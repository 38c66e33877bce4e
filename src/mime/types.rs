//! Primary MIME types and transfer encodings

use serde::Serialize;
use std::fmt;

/// Primary body type of a MIME part.
///
/// The ordinals follow the numbering mail servers and c-client style
/// libraries use for body types (`text` = 0 ... `other` = 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartType {
    Text,
    Multipart,
    Message,
    Application,
    Audio,
    Image,
    Video,
    Model,
    Other,
}

impl PartType {
    const ALL: [Self; 9] = [
        Self::Text,
        Self::Multipart,
        Self::Message,
        Self::Application,
        Self::Audio,
        Self::Image,
        Self::Video,
        Self::Model,
        Self::Other,
    ];

    /// Lowercase token used to build `"<type>/<subtype>"` strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Multipart => "multipart",
            Self::Message => "message",
            Self::Application => "application",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
            Self::Model => "model",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Out-of-range ordinals map to [`PartType::Other`].
    #[must_use]
    pub fn from_ordinal(ordinal: u8) -> Self {
        Self::ALL
            .get(usize::from(ordinal))
            .copied()
            .unwrap_or(Self::Other)
    }

    /// Case-insensitive; unknown names map to [`PartType::Other`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Self::Other)
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-Transfer-Encoding of a part's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Other,
}

impl TransferEncoding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Other => "other",
        }
    }

    /// Case-insensitive; unknown names map to [`TransferEncoding::Other`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
