//! Message header info
//!
//! Raw header values (still containing encoded-words) plus the size and
//! flags the server reports alongside them.

use crate::flag::Flag;
use crate::transport::Uid;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Header fields of one message as delivered by the server.
///
/// String fields are kept raw; decoding happens on access through
/// [`MessageView`](crate::MessageView).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    pub uid: Uid,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
    pub message_id: Option<String>,
    pub references: Option<String>,
    pub in_reply_to: Option<String>,
    pub size: Option<u32>,
    pub flags: Vec<Flag>,
}

impl HeaderInfo {
    /// Extract the known fields from a raw header block. Parsing stops at
    /// the first empty line.
    #[must_use]
    pub fn from_header_block(uid: Uid, raw: &[u8]) -> Self {
        let headers = unfold_headers(raw);
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };

        Self {
            uid,
            subject: get("subject"),
            from: get("from"),
            to: get("to"),
            date: get("date"),
            message_id: get("message-id"),
            references: get("references"),
            in_reply_to: get("in-reply-to"),
            size: None,
            flags: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: impl IntoIterator<Item = Flag>) -> Self {
        self.flags = flags.into_iter().collect();
        self
    }

    #[must_use]
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    /// The `Date` header as an RFC 2822 timestamp, if it parses.
    #[must_use]
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        self.date
            .as_deref()
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
    }
}

/// Split a header block into `(name, value)` pairs, joining folded
/// continuation lines with a single space.
///
/// Bytes that are not UTF-8 are read as Windows-1252.
#[must_use]
fn unfold_headers(raw: &[u8]) -> Vec<(String, String)> {
    let text = match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => encoding_rs::WINDOWS_1252.decode(raw).0.into_owned(),
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    headers
}
