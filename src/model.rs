//! In-memory model of a parameter file: file → list → entry → field.
//!
//! Field values are a sum type keyed by the same tag enumeration used on
//! the wire, so a value can never disagree with its type tag.  The opaque
//! integers (list tags, entry flag byte and tag pair, the reserved header
//! word) are kept by name but never interpreted.

use std::fmt;

/// Container version written by Two Worlds.
pub const PAR_VERSION_TW1: u32 = 0x600;

// ── FieldType ────────────────────────────────────────────────────────────────

/// Wire type tag of a field.  The discriminants are the on-disk byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Int32       = 0,
    Float32     = 1,
    Uint32      = 2,
    String      = 3,
    Int32Array  = 4,
    Float32Array = 5,
    Uint32Array = 6,
    StringArray = 7,
}

impl FieldType {
    pub const ALL: [FieldType; 8] = [
        FieldType::Int32,
        FieldType::Float32,
        FieldType::Uint32,
        FieldType::String,
        FieldType::Int32Array,
        FieldType::Float32Array,
        FieldType::Uint32Array,
        FieldType::StringArray,
    ];

    #[inline]
    pub fn tag(self) -> u8 { self as u8 }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Display name, e.g. `int32[]`.
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Int32        => "int32",
            FieldType::Float32      => "float32",
            FieldType::Uint32       => "uint32",
            FieldType::String       => "string",
            FieldType::Int32Array   => "int32[]",
            FieldType::Float32Array => "float32[]",
            FieldType::Uint32Array  => "uint32[]",
            FieldType::StringArray  => "string[]",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == s)
    }

    pub fn is_array(self) -> bool {
        self.tag() >= FieldType::Int32Array.tag()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Field ────────────────────────────────────────────────────────────────────

/// A typed field value.
///
/// Array variants hold `None` when the presence marker on disk was 0 and
/// `Some(..)` when it was 1, so `Some(vec![])` (present, zero count) and
/// `None` re-encode differently.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int32(i32),
    Float32(f32),
    Uint32(u32),
    String(String),
    Int32Array(Option<Vec<i32>>),
    Float32Array(Option<Vec<f32>>),
    Uint32Array(Option<Vec<u32>>),
    StringArray(Option<Vec<String>>),
}

impl Field {
    /// The filler value used when a field slot must exist but has no data.
    pub const ZERO: Field = Field::Int32(0);

    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int32(_)        => FieldType::Int32,
            Field::Float32(_)      => FieldType::Float32,
            Field::Uint32(_)       => FieldType::Uint32,
            Field::String(_)       => FieldType::String,
            Field::Int32Array(_)   => FieldType::Int32Array,
            Field::Float32Array(_) => FieldType::Float32Array,
            Field::Uint32Array(_)  => FieldType::Uint32Array,
            Field::StringArray(_)  => FieldType::StringArray,
        }
    }

    /// Element count for array fields; `None` for scalars.  An absent
    /// array counts as zero elements.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Field::Int32Array(v)   => Some(v.as_ref().map_or(0, Vec::len)),
            Field::Float32Array(v) => Some(v.as_ref().map_or(0, Vec::len)),
            Field::Uint32Array(v)  => Some(v.as_ref().map_or(0, Vec::len)),
            Field::StringArray(v)  => Some(v.as_ref().map_or(0, Vec::len)),
            _ => None,
        }
    }
}

// ── Entry / List / File ──────────────────────────────────────────────────────

/// A named record.  The name is the join key when two files are compared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParEntry {
    pub name:   String,
    pub flag:   i8,
    pub tag_a:  u16,
    pub tag_b:  u16,
    pub fields: Vec<Field>,
}

impl ParEntry {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self { name: name.into(), fields, ..Default::default() }
    }

    /// Comma-separated type names, e.g. `int32, string, float32[]`.
    pub fn type_signature(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.field_type().name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A list of entries.  Lists carry no name; they are identified by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParList {
    pub tag1:    u32,
    pub tag2:    u32,
    pub entries: Vec<ParEntry>,
}

impl ParList {
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Field count of the first entry; entries sharing a field count share
    /// a column layout by convention.
    pub fn schema_width(&self) -> Option<usize> {
        self.entries.first().map(|e| e.fields.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParFile {
    pub version:         u32,
    /// Header word after the list count.  Read for diagnostics only; the
    /// encoder always writes 0.
    pub reserved:        u32,
    pub lists:           Vec<ParList>,
    /// Unparsed bytes after the last list, re-emitted verbatim.
    pub trailing:        Option<Vec<u8>>,
    /// Decompressed first stream of a dual-stream envelope.
    pub envelope_header: Option<Vec<u8>>,
    pub was_wrapped:     bool,
}

impl Default for ParFile {
    fn default() -> Self {
        Self {
            version:         PAR_VERSION_TW1,
            reserved:        0,
            lists:           Vec::new(),
            trailing:        None,
            envelope_header: None,
            was_wrapped:     false,
        }
    }
}

impl ParFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.lists.iter().map(|l| l.entries.len()).sum()
    }

    pub fn entry(&self, list: usize, entry: usize) -> Option<&ParEntry> {
        self.lists.get(list)?.entries.get(entry)
    }

    pub fn entry_mut(&mut self, list: usize, entry: usize) -> Option<&mut ParEntry> {
        self.lists.get_mut(list)?.entries.get_mut(entry)
    }
}
