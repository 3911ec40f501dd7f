//! Container codec: `PAR\0` header, lists, entries and typed fields.
//!
//! # Layout (little-endian throughout)
//!
//! ```text
//! magic "PAR\0" | version u32 | list_count u32 | reserved u32
//! list:  tag1 u32 | tag2 u32 | entry_count u32 | entry*
//! entry: name str | flag i8 | field_count u16 | tag_a u16 | tag_b u16
//!        | type_tag u8 × field_count | value × field_count
//! ```
//!
//! Scalars are written at their natural width, strings are length-prefixed.
//! Array values carry a `u64` presence marker; when it is 1 a `u32` count
//! and the elements follow.
//!
//! Bytes left over after the last list are kept in [`ParFile::trailing`]
//! and appended unchanged on encode, which makes decode→encode byte-exact.

use log::{debug, warn};

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::ParError;
use crate::model::{Field, FieldType, ParEntry, ParFile, ParList};

pub const PAR_MAGIC: &[u8; 4] = b"PAR\0";

const PRESENCE_ABSENT:  u64 = 0;
const PRESENCE_PRESENT: u64 = 1;

// ── Decode ───────────────────────────────────────────────────────────────────

/// Parse raw (decompressed) container bytes.
pub fn decode(data: &[u8]) -> Result<ParFile, ParError> {
    let mut r = ByteReader::new(data);

    let magic = r.read_bytes(4).map_err(|_| ParError::BadMagic { found: data.to_vec() })?;
    if magic != PAR_MAGIC {
        return Err(ParError::BadMagic { found: magic.to_vec() });
    }

    let version    = r.read_u32()?;
    let list_count = r.read_u32()?;
    let reserved   = r.read_u32()?;
    if reserved != 0 {
        warn!("reserved header word is 0x{reserved:08X}; it will be written back as 0");
    }

    let mut lists = Vec::new();
    for _ in 0..list_count {
        lists.push(read_list(&mut r)?);
    }

    let trailing = (r.remaining() > 0).then(|| r.rest().to_vec());
    if let Some(t) = &trailing {
        debug!("preserving {} trailing bytes at 0x{:X}", t.len(), r.position());
    }
    debug!("decoded container v0x{version:X}: {} lists", lists.len());

    Ok(ParFile {
        version,
        reserved,
        lists,
        trailing,
        envelope_header: None,
        was_wrapped: false,
    })
}

fn read_list(r: &mut ByteReader<'_>) -> Result<ParList, ParError> {
    let tag1 = r.read_u32()?;
    let tag2 = r.read_u32()?;
    let entry_count = r.read_u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        entries.push(read_entry(r)?);
    }
    Ok(ParList { tag1, tag2, entries })
}

fn read_entry(r: &mut ByteReader<'_>) -> Result<ParEntry, ParError> {
    let name        = r.read_string()?;
    let flag        = r.read_i8()?;
    let field_count = r.read_u16()? as usize;
    let tag_a       = r.read_u16()?;
    let tag_b       = r.read_u16()?;

    // Type tags are stored up front; values follow in the same order.
    let types = r.read_bytes(field_count)?;
    let types_offset = r.position() - field_count;

    let mut fields = Vec::with_capacity(field_count);
    for (i, &tag) in types.iter().enumerate() {
        let field_type = FieldType::from_tag(tag)
            .ok_or(ParError::UnknownFieldType { offset: types_offset + i, tag })?;
        fields.push(read_value(r, field_type)?);
    }

    Ok(ParEntry { name, flag, tag_a, tag_b, fields })
}

fn read_value(r: &mut ByteReader<'_>, field_type: FieldType) -> Result<Field, ParError> {
    Ok(match field_type {
        FieldType::Int32        => Field::Int32(r.read_i32()?),
        FieldType::Float32      => Field::Float32(r.read_f32()?),
        FieldType::Uint32       => Field::Uint32(r.read_u32()?),
        FieldType::String       => Field::String(r.read_string()?),
        FieldType::Int32Array   => Field::Int32Array(read_array(r, ByteReader::read_i32)?),
        FieldType::Float32Array => Field::Float32Array(read_array(r, ByteReader::read_f32)?),
        FieldType::Uint32Array  => Field::Uint32Array(read_array(r, ByteReader::read_u32)?),
        FieldType::StringArray  => Field::StringArray(read_array(r, ByteReader::read_string)?),
    })
}

fn read_array<'a, T>(
    r: &mut ByteReader<'a>,
    mut read_one: impl FnMut(&mut ByteReader<'a>) -> Result<T, ParError>,
) -> Result<Option<Vec<T>>, ParError> {
    let offset = r.position();
    match r.read_u64()? {
        PRESENCE_ABSENT => Ok(None),
        PRESENCE_PRESENT => {
            let count = r.read_u32()? as usize;
            // Every element is at least 4 bytes; cap the reservation by what
            // the buffer could possibly hold.
            let mut values = Vec::with_capacity(count.min(r.remaining() / 4));
            for _ in 0..count {
                values.push(read_one(r)?);
            }
            Ok(Some(values))
        }
        marker => Err(ParError::InvalidPresence { offset, marker }),
    }
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Serialize a model back to raw container bytes.
///
/// Fails only when a count or string does not fit its wire width.
pub fn encode(par: &ParFile) -> Result<Vec<u8>, ParError> {
    let mut w = ByteWriter::with_capacity(4096);

    w.write_bytes(PAR_MAGIC);
    w.write_u32(par.version);
    w.write_u32(count_u32("list count", par.lists.len())?);
    w.write_u32(0);

    for list in &par.lists {
        w.write_u32(list.tag1);
        w.write_u32(list.tag2);
        w.write_u32(count_u32("entry count", list.entries.len())?);
        for entry in &list.entries {
            write_entry(&mut w, entry)?;
        }
    }

    if let Some(trailing) = &par.trailing {
        w.write_bytes(trailing);
    }
    debug!("encoded container: {} bytes", w.len());
    Ok(w.into_inner())
}

fn write_entry(w: &mut ByteWriter, entry: &ParEntry) -> Result<(), ParError> {
    let field_count = u16::try_from(entry.fields.len())
        .map_err(|_| ParError::Overflow { what: "field count", len: entry.fields.len() })?;

    w.write_string(&entry.name)?;
    w.write_i8(entry.flag);
    w.write_u16(field_count);
    w.write_u16(entry.tag_a);
    w.write_u16(entry.tag_b);

    for field in &entry.fields {
        w.write_u8(field.field_type().tag());
    }
    for field in &entry.fields {
        write_value(w, field)?;
    }
    Ok(())
}

fn write_value(w: &mut ByteWriter, field: &Field) -> Result<(), ParError> {
    match field {
        Field::Int32(v)        => w.write_i32(*v),
        Field::Float32(v)      => w.write_f32(*v),
        Field::Uint32(v)       => w.write_u32(*v),
        Field::String(s)       => w.write_string(s)?,
        Field::Int32Array(v)   => write_array(w, v.as_deref(), |w, x| { w.write_i32(*x); Ok(()) })?,
        Field::Float32Array(v) => write_array(w, v.as_deref(), |w, x| { w.write_f32(*x); Ok(()) })?,
        Field::Uint32Array(v)  => write_array(w, v.as_deref(), |w, x| { w.write_u32(*x); Ok(()) })?,
        Field::StringArray(v)  => write_array(w, v.as_deref(), |w, s| w.write_string(s))?,
    }
    Ok(())
}

fn write_array<T>(
    w: &mut ByteWriter,
    values: Option<&[T]>,
    mut write_one: impl FnMut(&mut ByteWriter, &T) -> Result<(), ParError>,
) -> Result<(), ParError> {
    match values {
        None => w.write_u64(PRESENCE_ABSENT),
        Some(values) => {
            w.write_u64(PRESENCE_PRESENT);
            w.write_u32(count_u32("array length", values.len())?);
            for v in values {
                write_one(w, v)?;
            }
        }
    }
    Ok(())
}

fn count_u32(what: &'static str, len: usize) -> Result<u32, ParError> {
    u32::try_from(len).map_err(|_| ParError::Overflow { what, len })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `PAR\0`, v0x600, one list (tags 0,0) holding `Test` with one int32 = 42.
    fn minimal_file() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(PAR_MAGIC);
        w.write_u32(0x600);
        w.write_u32(1);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u32(1);
        w.write_string("Test").unwrap();
        w.write_i8(0);
        w.write_u16(1);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u8(0);
        w.write_i32(42);
        w.into_inner()
    }

    #[test]
    fn minimal_file_round_trips() {
        let bytes = minimal_file();
        let par = decode(&bytes).unwrap();
        assert_eq!(par.version, 0x600);
        assert_eq!(par.lists.len(), 1);
        let entry = &par.lists[0].entries[0];
        assert_eq!(entry.name, "Test");
        assert_eq!(entry.fields, vec![Field::Int32(42)]);
        assert!(par.trailing.is_none());
        assert_eq!(encode(&par).unwrap(), bytes);
    }

    #[test]
    fn trailing_bytes_are_preserved() {
        let mut bytes = minimal_file();
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);
        let par = decode(&bytes).unwrap();
        assert_eq!(par.trailing.as_deref(), Some(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00][..]));
        assert_eq!(encode(&par).unwrap(), bytes);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = minimal_file();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(ParError::BadMagic { found }) if found == b"XAR\0"));
        assert!(matches!(decode(b"PA"), Err(ParError::BadMagic { .. })));
    }

    #[test]
    fn unknown_type_tag_is_fatal() {
        let mut bytes = minimal_file();
        // Type tag byte sits right before the 4-byte value.
        let at = bytes.len() - 5;
        bytes[at] = 9;
        match decode(&bytes) {
            Err(ParError::UnknownFieldType { offset, tag }) => {
                assert_eq!(offset, at);
                assert_eq!(tag, 9);
            }
            other => panic!("expected UnknownFieldType, got {other:?}"),
        }
    }

    #[test]
    fn truncated_file_is_out_of_bounds() {
        let bytes = minimal_file();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 2]),
            Err(ParError::OutOfBounds { requested: 4, available: 2, .. })
        ));
    }

    #[test]
    fn empty_array_encodes_as_eight_zero_bytes() {
        let mut w = ByteWriter::new();
        write_value(&mut w, &Field::Int32Array(None)).unwrap();
        assert_eq!(w.into_inner(), [0u8; 8]);
    }

    #[test]
    fn present_but_empty_array_is_distinct_from_absent() {
        let mut w = ByteWriter::new();
        write_value(&mut w, &Field::Uint32Array(Some(Vec::new()))).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let mut r = ByteReader::new(&bytes);
        assert_eq!(read_value(&mut r, FieldType::Uint32Array).unwrap(), Field::Uint32Array(Some(vec![])));
    }

    #[test]
    fn arrays_keep_order_and_count() {
        let fields = vec![
            Field::Int32Array(Some(vec![3, -1, 7])),
            Field::Float32Array(Some(vec![0.5, 2.25])),
            Field::StringArray(Some(vec!["b".into(), "a".into(), String::new()])),
        ];
        let mut w = ByteWriter::new();
        for f in &fields {
            write_value(&mut w, f).unwrap();
        }
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        for f in &fields {
            assert_eq!(&read_value(&mut r, f.field_type()).unwrap(), f);
        }
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn bad_presence_marker_is_rejected() {
        let mut w = ByteWriter::new();
        w.write_u64(2);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            read_value(&mut r, FieldType::Int32Array),
            Err(ParError::InvalidPresence { offset: 0, marker: 2 })
        ));
    }

    #[test]
    fn reserved_word_is_read_but_written_as_zero() {
        let mut bytes = minimal_file();
        bytes[12] = 0x7F;
        let par = decode(&bytes).unwrap();
        assert_eq!(par.reserved, 0x7F);
        let out = encode(&par).unwrap();
        assert_eq!(out[12], 0);
        assert_eq!(out[13..], bytes[13..]);
    }

    #[test]
    fn opaque_tags_survive() {
        let mut par = ParFile::new();
        par.lists.push(ParList {
            tag1: 0xAABB_CCDD,
            tag2: 7,
            entries: vec![ParEntry {
                name:   "Sword".into(),
                flag:   -3,
                tag_a:  0xFFFF,
                tag_b:  12,
                fields: vec![Field::Uint32(u32::MAX), Field::String("blade".into())],
            }],
        });
        let decoded = decode(&encode(&par).unwrap()).unwrap();
        assert_eq!(decoded.lists, par.lists);
    }

    #[test]
    fn latin1_names_and_strings_are_byte_exact() {
        let base = minimal_file();
        // Swap the 4-byte "Test" name (length prefix at 28) for raw "K\xE4fer".
        let mut bytes = base[..28].to_vec();
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(b"K\xE4fer");
        bytes.extend_from_slice(&base[36..]);

        let par = decode(&bytes).unwrap();
        assert_eq!(par.lists[0].entries[0].name, "K\u{E4}fer");
        assert_eq!(encode(&par).unwrap(), bytes);

        let mut w = ByteWriter::new();
        w.write_bytes(&bytes[..bytes.len() - 5]);
        w.write_u8(FieldType::String.tag());
        w.write_u32(3);
        w.write_bytes(&[0xFC, 0x80, 0xFF]);
        let with_string = w.into_inner();
        let par = decode(&with_string).unwrap();
        assert_eq!(par.lists[0].entries[0].fields[0], Field::String("\u{FC}\u{80}\u{FF}".into()));
        assert_eq!(encode(&par).unwrap(), with_string);
    }
}
