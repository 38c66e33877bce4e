//! MIME structure interpretation
//!
//! - `types` / `descriptor`: what the server says about each part
//! - `part`: lazily fetched tree of parts for one message
//! - `classify`: multipart / body text / attachment rules
//! - `decode`: transfer-encoding, charset and header-word decoding
//! - `assemble`: one pass over the tree producing body text and part lists

mod assemble;
mod classify;
pub mod decode;
mod descriptor;
mod part;
mod types;

pub use assemble::{AttachmentRef, BodyAssemblyResult, TextBuckets, assemble, resolve_filename};
pub use classify::{AttachmentOrigin, Classification, classify};
pub use decode::{decode, decode_header};
pub use descriptor::{Declared, GuardedField, Params, PartDescriptor, PartPath};
pub use part::PartNode;
pub use types::{PartType, TransferEncoding};
