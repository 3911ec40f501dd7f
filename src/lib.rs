//! Two Worlds `.par` parameter files: a byte-exact codec for the binary
//! container and its zlib envelope, plus a name-keyed compare/merge engine
//! over the decoded model.
//!
//! ```text
//! bytes ─ envelope::unwrap ─ record::decode ─ ParFile
//! ParFile × ParFile ─ diff ─ Vec<DiffRecord> ─ (selection) ─ merge ─ ParFile
//! ParFile ─ record::encode ─ envelope::wrap ─ bytes
//! ```

pub mod cursor;
pub mod error;
pub mod model;
pub mod record;
pub mod envelope;
pub mod file;
pub mod labels;
pub mod diff;
pub mod merge;
pub mod document;
pub mod edit;

pub use error::ParError;
pub use model::{Field, FieldType, ParEntry, ParFile, ParList};
pub use envelope::{EnvelopeError, EnvelopeOptions};
pub use file::{load, save, read_par_file, write_par_file};
pub use labels::{FieldLabels, LabelResolver};
pub use diff::{diff, DiffKind, DiffOptions, DiffRecord, Differ, DuplicatePolicy};
pub use merge::{merge, MergeError, MergeStats};
