//! IMAP message flags
//!
//! System flags reported in a message's header info get dedicated
//! variants; anything else the server reports is kept as a keyword.

use serde::{Serialize, Serializer};
use std::fmt;

/// An IMAP message flag.
///
/// # Examples
///
/// ```
/// use imap_message_reader::Flag;
///
/// assert_eq!(Flag::from_imap_str("\\seen"), Flag::Seen);
/// assert_eq!(Flag::Recent.as_imap_str(), "\\Recent");
///
/// let kw = Flag::from_imap_str("$Important");
/// assert_eq!(kw, Flag::Keyword("$Important".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    /// Session-scoped: first session to see the message (`\Recent`).
    Recent,
    /// Any other flag, kept verbatim.
    Keyword(String),
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(kw) => kw,
        }
    }

    /// Parse a flag as it appears on the wire. System flag names are
    /// matched case-insensitively.
    #[must_use]
    pub fn from_imap_str(s: &str) -> Self {
        let system = [
            Self::Seen,
            Self::Answered,
            Self::Flagged,
            Self::Deleted,
            Self::Draft,
            Self::Recent,
        ];
        system
            .into_iter()
            .find(|f| f.as_imap_str().eq_ignore_ascii_case(s))
            .unwrap_or_else(|| Self::Keyword(s.to_string()))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_imap_str())
    }
}
