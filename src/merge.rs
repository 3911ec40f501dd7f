//! Apply selected diff records from an input file onto a source file.
//!
//! The selection is validated as a whole before anything is touched: a
//! single invalid record rejects the batch and leaves `source` unmodified.
//!
//! Applying the same selection twice yields the same model as applying it
//! once.  Changed fields are overwritten with the same value and counted
//! only when something actually changed; input-only entries are skipped
//! when the target list already holds an entry of that name.

use log::{debug, warn};
use thiserror::Error;

use crate::diff::{DiffKind, DiffRecord, EntryLocator};
use crate::model::{Field, ParFile, ParList};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MergeError {
    /// Source-only records have nothing on the input side to bring over.
    #[error("list {list}: {entry:?} exists only in the source and cannot be merged")]
    NotMergeable { list: usize, entry: String },
    /// A stored coordinate no longer resolves against the given files.
    #[error("list {list}: {entry:?} ({kind}) does not resolve against the {side} file")]
    StaleLocator {
        kind:  DiffKind,
        side:  &'static str,
        list:  usize,
        entry: String,
    },
}

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub fields_changed: usize,
    pub entries_added:  usize,
    /// Records that resolved but had nothing to apply.
    pub skipped:        usize,
}

/// Every record that may be passed to [`merge`].
pub fn mergeable(records: &[DiffRecord]) -> Vec<&DiffRecord> {
    records.iter().filter(|r| r.kind.is_mergeable()).collect()
}

/// Records of one kind.
pub fn of_kind(records: &[DiffRecord], kind: DiffKind) -> Vec<&DiffRecord> {
    records.iter().filter(|r| r.kind == kind).collect()
}

/// Apply `selected` onto `source`, copying values out of `input`.
pub fn merge<'r, I>(source: &mut ParFile, input: &ParFile, selected: I) -> Result<MergeStats, MergeError>
where
    I: IntoIterator<Item = &'r DiffRecord>,
{
    let selected: Vec<&DiffRecord> = selected.into_iter().collect();
    for record in &selected {
        validate(source, input, record)?;
    }

    let mut stats = MergeStats::default();
    for record in selected {
        match record.kind {
            DiffKind::Changed    => apply_changed(source, input, record, &mut stats),
            DiffKind::InputOnly  => apply_input_only(source, input, record, &mut stats),
            // rejected by validate()
            DiffKind::SourceOnly => {}
        }
    }
    debug!(
        "merge: {} fields changed, {} entries added, {} skipped",
        stats.fields_changed, stats.entries_added, stats.skipped
    );
    Ok(stats)
}

fn validate(source: &ParFile, input: &ParFile, record: &DiffRecord) -> Result<(), MergeError> {
    let stale = |side| MergeError::StaleLocator {
        kind:  record.kind,
        side,
        list:  record.list_index,
        entry: record.entry_name.clone(),
    };
    let resolves = |file: &ParFile, at: Option<EntryLocator>| {
        at.and_then(|at| file.entry(at.list, at.entry))
            .is_some_and(|e| e.name == record.entry_name)
    };

    match record.kind {
        DiffKind::SourceOnly => Err(MergeError::NotMergeable {
            list:  record.list_index,
            entry: record.entry_name.clone(),
        }),
        DiffKind::Changed => {
            if record.field_index.is_none() || !resolves(source, record.source) {
                return Err(stale("source"));
            }
            if !resolves(input, record.input) {
                return Err(stale("input"));
            }
            Ok(())
        }
        DiffKind::InputOnly => {
            if !resolves(input, record.input) {
                return Err(stale("input"));
            }
            Ok(())
        }
    }
}

fn apply_changed(source: &mut ParFile, input: &ParFile, record: &DiffRecord, stats: &mut MergeStats) {
    let (Some(fi), Some(src_at), Some(inp_at)) = (record.field_index, record.source, record.input) else {
        return;
    };
    let Some(new_value) = input.entry(inp_at.list, inp_at.entry).and_then(|e| e.fields.get(fi)) else {
        // Input has fewer fields than source here; there is no value to copy.
        warn!("{}: input has no field {fi}, skipped", record.path());
        stats.skipped += 1;
        return;
    };
    let Some(target) = source.entry_mut(src_at.list, src_at.entry) else {
        return;
    };

    let padded = target.fields.len() <= fi;
    if padded {
        target.fields.resize(fi + 1, Field::ZERO);
    }
    if padded || !identical(&target.fields[fi], new_value) {
        target.fields[fi] = new_value.clone();
        stats.fields_changed += 1;
    } else {
        stats.skipped += 1;
    }
}

/// Exact equality with floats compared by bit pattern, so a copied NaN
/// counts as unchanged on a second pass.
fn identical(a: &Field, b: &Field) -> bool {
    let same_bits = |x: &[f32], y: &[f32]| x.len() == y.len() && x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits());
    match (a, b) {
        (Field::Float32(x), Field::Float32(y)) => x.to_bits() == y.to_bits(),
        (Field::Float32Array(Some(x)), Field::Float32Array(Some(y))) => same_bits(x, y),
        _ => a == b,
    }
}

fn apply_input_only(source: &mut ParFile, input: &ParFile, record: &DiffRecord, stats: &mut MergeStats) {
    let Some(entry) = record.input.and_then(|at| input.entry(at.list, at.entry)) else {
        return;
    };

    let li = record.list_index;
    if source.lists.len() <= li {
        source.lists.resize_with(li + 1, ParList::default);
    }
    let list = &mut source.lists[li];
    if list.contains_name(&entry.name) {
        debug!("{}: already present, skipped", record.path());
        stats.skipped += 1;
        return;
    }
    list.entries.push(entry.clone());
    stats.entries_added += 1;
}
