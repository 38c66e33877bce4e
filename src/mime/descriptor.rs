//! Server-provided description of a message's MIME tree
//!
//! A [`PartDescriptor`] is what the transport reports for one body part
//! before any payload is fetched. Fields the server qualifies with an
//! "is declared" flag are stored as [`Declared`] values: when the flag is
//! unset the field reads as absent even if a value was transmitted, which
//! keeps "no disposition" distinct from "empty disposition".

use crate::mime::decode::decode_header;
use crate::mime::types::{PartType, TransferEncoding};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A value whose presence is gated by a separate declaration flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared<T> {
    declared: bool,
    value: Option<T>,
}

impl<T> Declared<T> {
    #[must_use]
    pub const fn new(declared: bool, value: Option<T>) -> Self {
        Self { declared, value }
    }

    #[must_use]
    pub const fn absent() -> Self {
        Self {
            declared: false,
            value: None,
        }
    }

    #[must_use]
    pub const fn present(value: T) -> Self {
        Self {
            declared: true,
            value: Some(value),
        }
    }

    /// The value, or `None` when the declaration flag is unset.
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        if self.declared {
            self.value.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub const fn is_declared(&self) -> bool {
        self.declared
    }
}

impl<T> Default for Declared<T> {
    fn default() -> Self {
        Self::absent()
    }
}

impl<T> From<Option<T>> for Declared<T> {
    fn from(value: Option<T>) -> Self {
        Self {
            declared: value.is_some(),
            value,
        }
    }
}

/// Descriptor fields that carry a declaration flag, with the field and
/// flag names servers use for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedField {
    Id,
    Description,
    Disposition,
    Parameters,
    DispositionParameters,
}

impl GuardedField {
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Description => "description",
            Self::Disposition => "disposition",
            Self::Parameters => "parameters",
            Self::DispositionParameters => "dparameters",
        }
    }

    #[must_use]
    pub const fn flag_name(self) -> &'static str {
        match self {
            Self::Id => "ifid",
            Self::Description => "ifdescription",
            Self::Disposition => "ifdisposition",
            Self::Parameters => "ifparameters",
            Self::DispositionParameters => "ifdparameters",
        }
    }
}

/// Ordered `name -> value` parameters of a Content-Type or
/// Content-Disposition header. Values are MIME-decoded on insertion;
/// lookups ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub const EMPTY: &'static Self = &Self(Vec::new());

    /// Build from raw (possibly encoded-word) values.
    pub fn from_raw<I, K, V>(raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self(
            raw.into_iter()
                .map(|(k, v)| (k.into(), decode_header(v.as_ref())))
                .collect(),
        )
    }

    fn push_raw(&mut self, name: impl Into<String>, value: &str) {
        self.0.push((name.into(), decode_header(value)));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
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

/// Location of a part inside the MIME tree: 1-based child indices,
/// rendered dot-separated. The top-level part has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PartPath(Vec<u32>);

impl PartPath {
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the child at 0-based `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1)));
        Self(indices)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Parse `"1.2.3"`. The empty string is the root path.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return Some(Self::root());
        }
        s.split('.')
            .map(|seg| seg.parse::<u32>().ok().filter(|n| *n > 0))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for PartPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

impl Serialize for PartPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Structural description of one body part and its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    part_type: PartType,
    subtype: Option<String>,
    encoding: TransferEncoding,
    id: Declared<String>,
    description: Declared<String>,
    disposition: Declared<String>,
    parameters: Declared<Params>,
    disposition_parameters: Declared<Params>,
    bytes: Option<u32>,
    lines: Option<u32>,
    parts: Vec<Arc<PartDescriptor>>,
}

impl PartDescriptor {
    /// A single (non-multipart) part.
    #[must_use]
    pub fn leaf(part_type: PartType, subtype: impl Into<String>) -> Self {
        Self {
            part_type,
            subtype: Some(subtype.into()),
            encoding: TransferEncoding::default(),
            id: Declared::absent(),
            description: Declared::absent(),
            disposition: Declared::absent(),
            parameters: Declared::absent(),
            disposition_parameters: Declared::absent(),
            bytes: None,
            lines: None,
            parts: Vec::new(),
        }
    }

    /// A multipart container holding `parts` in declaration order.
    #[must_use]
    pub fn multipart(subtype: impl Into<String>, parts: Vec<Self>) -> Self {
        let mut desc = Self::leaf(PartType::Multipart, subtype);
        desc.parts = parts.into_iter().map(Arc::new).collect();
        desc
    }

    #[must_use]
    pub const fn with_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Append a Content-Type parameter; `value` may contain encoded-words.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: &str) -> Self {
        declare_params(&mut self.parameters).push_raw(name, value);
        self
    }

    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = Declared::present(disposition.into());
        self
    }

    /// Append a Content-Disposition parameter; `value` may contain
    /// encoded-words.
    #[must_use]
    pub fn with_disposition_param(mut self, name: impl Into<String>, value: &str) -> Self {
        declare_params(&mut self.disposition_parameters).push_raw(name, value);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Declared::present(id.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Declared::present(description.into());
        self
    }

    #[must_use]
    pub const fn with_size(mut self, bytes: u32) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[must_use]
    pub const fn with_lines(mut self, lines: u32) -> Self {
        self.lines = Some(lines);
        self
    }

    /// Clear the declaration flag of `field`, keeping any stored value.
    #[must_use]
    pub fn undeclared(mut self, field: GuardedField) -> Self {
        match field {
            GuardedField::Id => self.id.declared = false,
            GuardedField::Description => self.description.declared = false,
            GuardedField::Disposition => self.disposition.declared = false,
            GuardedField::Parameters => self.parameters.declared = false,
            GuardedField::DispositionParameters => self.disposition_parameters.declared = false,
        }
        self
    }

    #[must_use]
    pub const fn is_declared(&self, field: GuardedField) -> bool {
        match field {
            GuardedField::Id => self.id.is_declared(),
            GuardedField::Description => self.description.is_declared(),
            GuardedField::Disposition => self.disposition.is_declared(),
            GuardedField::Parameters => self.parameters.is_declared(),
            GuardedField::DispositionParameters => self.disposition_parameters.is_declared(),
        }
    }

    #[must_use]
    pub const fn part_type(&self) -> PartType {
        self.part_type
    }

    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    #[must_use]
    pub const fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.get().map(String::as_str)
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.get().map(String::as_str)
    }

    #[must_use]
    pub fn disposition(&self) -> Option<&str> {
        self.disposition.get().map(String::as_str)
    }

    #[must_use]
    pub fn parameters(&self) -> &Params {
        self.parameters.get().unwrap_or(Params::EMPTY)
    }

    #[must_use]
    pub fn disposition_parameters(&self) -> &Params {
        self.disposition_parameters.get().unwrap_or(Params::EMPTY)
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters().get(name)
    }

    #[must_use]
    pub fn disposition_parameter(&self, name: &str) -> Option<&str> {
        self.disposition_parameters().get(name)
    }

    #[must_use]
    pub const fn size(&self) -> Option<u32> {
        self.bytes
    }

    #[must_use]
    pub const fn lines(&self) -> Option<u32> {
        self.lines
    }

    #[must_use]
    pub fn parts(&self) -> &[Arc<Self>] {
        &self.parts
    }

    /// Lowercase `"<type>/<subtype>"`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!(
            "{}/{}",
            self.part_type.as_str(),
            self.subtype.as_deref().unwrap_or_default()
        )
        .to_ascii_lowercase()
    }
}

fn declare_params(slot: &mut Declared<Params>) -> &mut Params {
    slot.declared = true;
    slot.value.get_or_insert_with(Params::default)
}
