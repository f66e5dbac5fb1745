//! Hashline engine: per-line content hashes, anchor validation, and bottom-up splicing.
//!
//! Files shown to the model carry a `line:hash|content` display form computed
//! here; edits reference lines by anchor and are rejected if the anchor's hash
//! no longer matches the file on disk.

pub mod anchor;
pub mod edit;
pub mod format;
pub mod hash;

pub use anchor::Anchor;
pub use edit::{apply_edits, EditOp, EditOutcome};
pub use format::{format_lines, strip_echoed_prefixes};
pub use hash::hash_line;

use thiserror::Error;

pub const MAX_LINES: usize = 2000;
pub const MAX_BYTES: usize = 256 * 1024;

#[derive(Error, Debug, Clone)]
pub enum HashlineError {
    #[error("malformed anchor: {raw}")]
    MalformedAnchor { raw: String },

    #[error("range inverted: start line {start} is after end line {end}")]
    RangeInverted { start: usize, end: usize },

    #[error("insert_after requires non-empty text")]
    EmptyInsert,

    #[error("anchor mismatch:\n{report}")]
    HashMismatch { report: String },

    #[error("no changes: edit produced identical content")]
    NoOp,
}
