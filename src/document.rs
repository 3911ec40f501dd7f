//! JSON document mapping of a parameter file.
//!
//! The document keeps everything needed to rebuild the exact container:
//! opaque tags, per-field type ids, and base64 copies of the trailing bytes
//! and envelope header.  Absent arrays are written as `null` and present
//! arrays (empty or not) as JSON arrays, so the presence marker survives.
//!
//! Import is lenient about value shapes: numbers are truncated or wrapped to
//! the field's wire width, floats are narrowed to `f32`, and non-string
//! scalars are stringified for string fields.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::labels::LabelResolver;
use crate::model::{Field, FieldType, ParEntry, ParFile, ParList, PAR_VERSION_TW1};

pub const FORMAT_TAG: &str = "TW1_PAR";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 in {0}: {1}")]
    Base64(&'static str, base64::DecodeError),
    #[error("unsupported document format {0:?}")]
    UnknownFormat(String),
    #[error("unknown field type id {0}")]
    UnknownType(u8),
    #[error("cannot read {value} as {field_type}")]
    BadValue { field_type: FieldType, value: String },
}

// ── Document shape ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParDocument {
    #[serde(rename = "_format", default = "format_tag")]
    pub format: String,
    #[serde(rename = "_version", default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub lists: Vec<ListDocument>,
    #[serde(rename = "_trailing_data", default, skip_serializing_if = "Option::is_none")]
    pub trailing_data: Option<String>,
    #[serde(rename = "_wrapper_header", default, skip_serializing_if = "Option::is_none")]
    pub wrapper_header: Option<String>,
    #[serde(rename = "_was_compressed", default)]
    pub was_compressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDocument {
    #[serde(rename = "_index", default)]
    pub index: usize,
    #[serde(rename = "_unknown1", default)]
    pub tag1: u32,
    #[serde(rename = "_unknown2", default)]
    pub tag2: u32,
    /// Informational; import uses the length of `entries`.
    #[serde(rename = "_entry_count", default)]
    pub entry_count: usize,
    #[serde(default)]
    pub entries: Vec<EntryDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDocument {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "_unknown_byte", default)]
    pub flag: i8,
    #[serde(rename = "_unknown_u16a", default)]
    pub tag_a: u16,
    #[serde(rename = "_unknown_u16b", default)]
    pub tag_b: u16,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub type_id: u8,
    #[serde(default)]
    pub value: Value,
}

fn format_tag() -> String { FORMAT_TAG.to_owned() }
fn default_version() -> u32 { PAR_VERSION_TW1 }

// ── Export ───────────────────────────────────────────────────────────────────

impl ParDocument {
    pub fn from_par(par: &ParFile, labels: Option<&dyn LabelResolver>) -> Self {
        let lists = par
            .lists
            .iter()
            .enumerate()
            .map(|(index, list)| ListDocument {
                index,
                tag1: list.tag1,
                tag2: list.tag2,
                entry_count: list.entries.len(),
                entries: list.entries.iter().map(|e| entry_document(e, labels)).collect(),
            })
            .collect();

        Self {
            format: format_tag(),
            version: par.version,
            lists,
            trailing_data: par.trailing.as_ref().map(|t| STANDARD.encode(t)),
            wrapper_header: par.envelope_header.as_ref().map(|h| STANDARD.encode(h)),
            was_compressed: par.was_wrapped,
        }
    }

    pub fn into_par(self) -> Result<ParFile, DocumentError> {
        if self.format != FORMAT_TAG {
            return Err(DocumentError::UnknownFormat(self.format));
        }
        let decode = |what: &'static str, s: Option<String>| {
            s.map(|s| STANDARD.decode(s).map_err(|e| DocumentError::Base64(what, e)))
                .transpose()
        };

        let mut lists = Vec::with_capacity(self.lists.len());
        for list in self.lists {
            let mut entries = Vec::with_capacity(list.entries.len());
            for entry in list.entries {
                let fields = entry
                    .fields
                    .into_iter()
                    .map(field_from_document)
                    .collect::<Result<Vec<_>, _>>()?;
                entries.push(ParEntry {
                    name:  entry.name,
                    flag:  entry.flag,
                    tag_a: entry.tag_a,
                    tag_b: entry.tag_b,
                    fields,
                });
            }
            lists.push(ParList { tag1: list.tag1, tag2: list.tag2, entries });
        }

        let envelope_header = decode("_wrapper_header", self.wrapper_header)?;
        Ok(ParFile {
            version: self.version,
            reserved: 0,
            lists,
            trailing: decode("_trailing_data", self.trailing_data)?,
            was_wrapped: self.was_compressed || envelope_header.is_some(),
            envelope_header,
        })
    }
}

/// Serialize a model as pretty-printed JSON.
pub fn to_json(par: &ParFile, labels: Option<&dyn LabelResolver>) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(&ParDocument::from_par(par, labels))?)
}

/// Rebuild a model from JSON produced by [`to_json`] or by hand.
pub fn from_json(json: &str) -> Result<ParFile, DocumentError> {
    serde_json::from_str::<ParDocument>(json)?.into_par()
}

fn entry_document(entry: &ParEntry, labels: Option<&dyn LabelResolver>) -> EntryDocument {
    let field_count = entry.fields.len();
    let fields = entry
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let field_type = field.field_type();
            FieldDocument {
                label: labels.and_then(|l| l.lookup(field_count, i)).map(str::to_owned),
                type_name: field_type.name().to_owned(),
                type_id: field_type.tag(),
                value: field_value(field),
            }
        })
        .collect();

    EntryDocument {
        name: entry.name.clone(),
        flag: entry.flag,
        tag_a: entry.tag_a,
        tag_b: entry.tag_b,
        fields,
    }
}

fn field_value(field: &Field) -> Value {
    // JSON has no NaN or infinity; those go out as strings `to_float` reads back.
    fn float(v: f32) -> Value {
        match serde_json::Number::from_f64(v as f64) {
            Some(n) => Value::Number(n),
            None if v.is_nan() => Value::from("NaN"),
            None if v > 0.0 => Value::from("inf"),
            None => Value::from("-inf"),
        }
    }
    match field {
        Field::Int32(v)        => Value::from(*v),
        Field::Float32(v)      => float(*v),
        Field::Uint32(v)       => Value::from(*v),
        Field::String(s)       => Value::from(s.as_str()),
        Field::Int32Array(v)   => v.as_ref().map_or(Value::Null, |v| Value::from(v.clone())),
        Field::Float32Array(v) => v.as_ref().map_or(Value::Null, |v| Value::Array(v.iter().map(|x| float(*x)).collect())),
        Field::Uint32Array(v)  => v.as_ref().map_or(Value::Null, |v| Value::from(v.clone())),
        Field::StringArray(v)  => v.as_ref().map_or(Value::Null, |v| Value::from(v.clone())),
    }
}

// ── Import coercion ──────────────────────────────────────────────────────────

fn field_from_document(doc: FieldDocument) -> Result<Field, DocumentError> {
    let field_type = FieldType::from_tag(doc.type_id).ok_or(DocumentError::UnknownType(doc.type_id))?;
    let value = doc.value;
    Ok(match field_type {
        FieldType::Int32        => Field::Int32(to_int(field_type, &value)? as i32),
        FieldType::Float32      => Field::Float32(to_float(field_type, &value)?),
        FieldType::Uint32       => Field::Uint32(to_int(field_type, &value)? as u32),
        FieldType::String       => Field::String(to_text(&value)),
        FieldType::Int32Array   => Field::Int32Array(to_array(field_type, &value, |v| Ok(to_int(field_type, v)? as i32))?),
        FieldType::Float32Array => Field::Float32Array(to_array(field_type, &value, |v| to_float(field_type, v))?),
        FieldType::Uint32Array  => Field::Uint32Array(to_array(field_type, &value, |v| Ok(to_int(field_type, v)? as u32))?),
        FieldType::StringArray  => Field::StringArray(to_array(field_type, &value, |v| Ok(to_text(v)))?),
    })
}

fn bad_value(field_type: FieldType, value: &Value) -> DocumentError {
    DocumentError::BadValue { field_type, value: value.to_string() }
}

fn to_int(field_type: FieldType, value: &Value) -> Result<i64, DocumentError> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(*b as i64),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| u as i64))
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| bad_value(field_type, value)),
        Value::String(s) => s.trim().parse().map_err(|_| bad_value(field_type, value)),
        _ => Err(bad_value(field_type, value)),
    }
}

fn to_float(field_type: FieldType, value: &Value) -> Result<f32, DocumentError> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n.as_f64().map(|f| f as f32).ok_or_else(|| bad_value(field_type, value)),
        Value::String(s) => s.trim().parse().map_err(|_| bad_value(field_type, value)),
        _ => Err(bad_value(field_type, value)),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null      => String::new(),
        Value::String(s) => s.clone(),
        other            => other.to_string(),
    }
}

fn to_array<T>(
    field_type: FieldType,
    value: &Value,
    one: impl Fn(&Value) -> Result<T, DocumentError>,
) -> Result<Option<Vec<T>>, DocumentError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items.iter().map(one).collect::<Result<Vec<_>, _>>().map(Some),
        _ => Err(bad_value(field_type, value)),
    }
}
