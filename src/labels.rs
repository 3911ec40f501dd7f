//! Human-readable field labels.
//!
//! Entries with the same field count share a column layout, so labels are
//! keyed by `(field_count, field_index)`.  A [`FieldLabels`] table is an
//! explicit value handed to the diff engine; it is never global state.
//!
//! Label files are JSON objects of the form
//! `{"65": {"0": "classID", "1": "mesh"}}`.  Layers loaded later override
//! earlier ones key by key.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Resolves a label for a field position.  Used for annotation only.
pub trait LabelResolver {
    fn lookup(&self, field_count: usize, field_index: usize) -> Option<&str>;
}

/// Resolver that never has a label.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl LabelResolver for NoLabels {
    fn lookup(&self, _: usize, _: usize) -> Option<&str> { None }
}

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed label file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("label key {0:?} is not a non-negative integer")]
    BadKey(String),
}

/// Built-in fallback labels for two well-known layouts.
const DEFAULT_LABELS: &[(usize, &[(usize, &str)])] = &[
    (6, &[
        (0, "soundCue"),
        (1, "volume"),
        (2, "distanceMinA"),
        (3, "distanceMaxA"),
        (4, "soundFlags"),
        (5, "playPriority"),
    ]),
    (65, &[
        (0, "classID"),
        (1, "mesh"),
        (15, "moveWalkSpeed"),
        (16, "moveRunSpeed"),
        (34, "initParamHP"),
        (35, "initParamDamage"),
        (36, "initParamAttack"),
        (37, "initParamDefence"),
    ]),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLabels {
    labels: BTreeMap<usize, BTreeMap<usize, String>>,
}

impl FieldLabels {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in fallback table.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (field_count, fields) in DEFAULT_LABELS {
            for (index, label) in fields.iter() {
                table.set(*field_count, *index, *label);
            }
        }
        table
    }

    pub fn get(&self, field_count: usize, field_index: usize) -> Option<&str> {
        self.labels.get(&field_count)?.get(&field_index).map(String::as_str)
    }

    pub fn set(&mut self, field_count: usize, field_index: usize, label: impl Into<String>) {
        self.labels.entry(field_count).or_default().insert(field_index, label.into());
    }

    pub fn remove(&mut self, field_count: usize, field_index: usize) -> Option<String> {
        let fields = self.labels.get_mut(&field_count)?;
        let removed = fields.remove(&field_index);
        if fields.is_empty() {
            self.labels.remove(&field_count);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.labels.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Overlay labels from a JSON document onto this table.
    pub fn merge_json(&mut self, json: &str) -> Result<(), LabelError> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(json)?;
        for (count_key, fields) in raw {
            let field_count = parse_key(&count_key)?;
            for (index_key, label) in fields {
                self.set(field_count, parse_key(&index_key)?, label);
            }
        }
        Ok(())
    }

    /// Overlay labels from a JSON file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LabelError> {
        self.merge_json(&fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String, LabelError> {
        let raw: BTreeMap<String, BTreeMap<String, &str>> = self
            .labels
            .iter()
            .map(|(count, fields)| {
                let fields: BTreeMap<String, &str> = fields.iter().map(|(i, l)| (i.to_string(), l.as_str())).collect();
                (count.to_string(), fields)
            })
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LabelError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl LabelResolver for FieldLabels {
    fn lookup(&self, field_count: usize, field_index: usize) -> Option<&str> {
        self.get(field_count, field_index)
    }
}

fn parse_key(key: &str) -> Result<usize, LabelError> {
    key.trim().parse().map_err(|_| LabelError::BadKey(key.to_owned()))
}
