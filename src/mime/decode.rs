//! Payload and header decoding
//!
//! Bodies go through two stages: the transfer encoding is undone to get
//! raw octets, then the octets are converted from the part's declared
//! charset to UTF-8. Header values are split into RFC 2047 encoded-words,
//! each decoded with its own charset.
//!
//! Malformed input never aborts decoding at the pipeline level: the
//! failing stage is logged and the raw bytes are used instead.

use crate::error::{Error, Result};
use crate::mime::types::TransferEncoding;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use encoding_rs::Encoding;
use std::borrow::Cow;
use tracing::warn;

/// Charset assumed for parts and header segments that declare none.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Charset name encoded-word splitting reports for unencoded runs.
pub const UNDECLARED_CHARSET: &str = "default";

/// Mail bodies frequently drop or mangle trailing padding.
const MAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Undo a transfer encoding.
///
/// 7bit, 8bit and binary bodies are already raw octets, as is anything
/// with an unrecognized encoding; those are returned borrowed.
pub fn decode_transfer(raw: &[u8], encoding: TransferEncoding) -> Result<Cow<'_, [u8]>> {
    match encoding {
        TransferEncoding::SevenBit
        | TransferEncoding::EightBit
        | TransferEncoding::Binary
        | TransferEncoding::Other => Ok(Cow::Borrowed(raw)),
        TransferEncoding::Base64 => {
            let compact: Vec<u8> = raw
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            MAIL_BASE64
                .decode(compact)
                .map(Cow::Owned)
                .map_err(|e| Error::Decode(format!("invalid base64: {e}")))
        }
        TransferEncoding::QuotedPrintable => {
            quoted_printable::decode(raw, quoted_printable::ParseMode::Strict)
                .map(Cow::Owned)
                .map_err(|e| Error::Decode(format!("invalid quoted-printable: {e}")))
        }
    }
}

/// Undo a transfer encoding, falling back to best-effort output.
///
/// Malformed quoted-printable is re-read leniently; anything else that
/// fails to decode is returned as-is.
#[must_use]
pub fn decode_octets(raw: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match decode_transfer(raw, encoding) {
        Ok(bytes) => bytes.into_owned(),
        Err(e) => {
            warn!(%encoding, error = %e, "Transfer decoding failed, using raw bytes");
            match encoding {
                TransferEncoding::QuotedPrintable => {
                    quoted_printable::decode(raw, quoted_printable::ParseMode::Robust)
                        .unwrap_or_else(|_| raw.to_vec())
                }
                _ => raw.to_vec(),
            }
        }
    }
}

fn is_canonical(charset: &str) -> bool {
    let charset = charset.trim();
    charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8")
}

/// Convert `bytes` from `charset` to UTF-8.
///
/// Invalid sequences inside a known charset are replaced with U+FFFD;
/// an unknown charset label is an error.
pub fn decode_charset(bytes: &[u8], charset: &str) -> Result<String> {
    if is_canonical(charset) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }
    let encoding = Encoding::for_label(charset.trim().as_bytes())
        .ok_or_else(|| Error::Decode(format!("unsupported charset '{charset}'")))?;
    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

/// Full body pipeline: transfer decoding, then charset conversion.
///
/// Never fails; every fallback is logged.
#[must_use]
pub fn decode(raw: &[u8], encoding: TransferEncoding, charset: &str) -> String {
    let octets = decode_octets(raw, encoding);
    decode_charset(&octets, charset).unwrap_or_else(|e| {
        warn!(charset, error = %e, "Charset conversion failed, using UTF-8");
        String::from_utf8_lossy(&octets).into_owned()
    })
}

/// One run of a header value: either an encoded-word or the plain text
/// around it (charset [`UNDECLARED_CHARSET`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSegment {
    pub charset: String,
    pub bytes: Vec<u8>,
}

impl HeaderSegment {
    fn plain(text: String) -> Self {
        Self {
            charset: UNDECLARED_CHARSET.to_string(),
            bytes: text.into_bytes(),
        }
    }

    fn decode(&self) -> String {
        let charset = if self.charset.eq_ignore_ascii_case(UNDECLARED_CHARSET) {
            DEFAULT_CHARSET
        } else {
            &self.charset
        };
        decode_charset(&self.bytes, charset).unwrap_or_else(|e| {
            warn!(charset, error = %e, "Unknown header charset, using UTF-8");
            String::from_utf8_lossy(&self.bytes).into_owned()
        })
    }
}

/// Split a raw header value into plain runs and decoded encoded-words,
/// in order. Whitespace separating two adjacent encoded-words is
/// dropped; malformed encoded-words are kept as literal text.
#[must_use]
pub fn split_encoded_words(raw: &str) -> Vec<HeaderSegment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut rest = raw;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        if let Some((segment, consumed)) = parse_encoded_word(&rest[start..]) {
            let gap = &rest[..start];
            if !(after_word && gap.trim().is_empty()) {
                plain.push_str(gap);
            }
            if !plain.is_empty() {
                segments.push(HeaderSegment::plain(std::mem::take(&mut plain)));
            }
            segments.push(segment);
            rest = &rest[start + consumed..];
            after_word = true;
        } else {
            plain.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
            after_word = false;
        }
    }

    plain.push_str(rest);
    if !plain.is_empty() {
        segments.push(HeaderSegment::plain(plain));
    }
    segments
}

/// Decode a MIME header value (subject, address list, parameter value).
#[must_use]
pub fn decode_header(raw: &str) -> String {
    split_encoded_words(raw)
        .iter()
        .map(HeaderSegment::decode)
        .collect()
}

/// Parse `=?charset?enc?text?=` at the start of `s`, returning the
/// segment and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(HeaderSegment, usize)> {
    let body = s.strip_prefix("=?")?;
    let (charset, rest) = body.split_once('?')?;
    let (enc, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let text = &rest[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) || text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match enc {
        "B" | "b" => MAIL_BASE64.decode(text).ok()?,
        "Q" | "q" => decode_q(text),
        _ => return None,
    };

    let consumed = 2 + charset.len() + 1 + enc.len() + 1 + end + 2;
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((
        HeaderSegment {
            charset: charset.to_string(),
            bytes,
        },
        consumed,
    ))
}

/// RFC 2047 "Q" encoding: `_` is a space, `=XX` a hex octet.
fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
