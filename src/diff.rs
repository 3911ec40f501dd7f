//! Structural comparison of two parameter files.
//!
//! Lists are matched by position.  Inside a list present on both sides,
//! entries are joined by name and compared field by field; names are
//! visited in sorted order so the output is deterministic.  An optional
//! baseline file contributes a third display column and nothing else.
//!
//! Every record stores the entry coordinates it was computed from on both
//! sides, so [`crate::merge`] can apply it without repeating the join.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use log::warn;

use crate::labels::{LabelResolver, NoLabels};
use crate::model::{Field, ParEntry, ParFile, ParList};

/// Shown where a side has no value.
pub const PLACEHOLDER: &str = "\u{2014}";

/// Absolute tolerance for float comparison; absorbs re-encoding noise.
pub const FLOAT_TOLERANCE: f64 = 1e-7;

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffKind {
    /// Entry exists on both sides; one field differs.
    Changed,
    /// Whole entry exists only in the input file.
    InputOnly,
    /// Whole entry exists only in the source file.  Never mergeable.
    SourceOnly,
}

impl DiffKind {
    pub fn is_mergeable(self) -> bool {
        !matches!(self, DiffKind::SourceOnly)
    }

    pub fn name(self) -> &'static str {
        match self {
            DiffKind::Changed    => "changed",
            DiffKind::InputOnly  => "input only",
            DiffKind::SourceOnly => "source only",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of an entry inside one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryLocator {
    pub list:  usize,
    pub entry: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    pub kind:           DiffKind,
    pub list_index:     usize,
    pub entry_name:     String,
    /// `None` for whole-entry records.
    pub field_index:    Option<usize>,
    pub field_label:    Option<String>,
    pub source_value:   String,
    pub input_value:    String,
    pub baseline_value: String,
    pub source:         Option<EntryLocator>,
    pub input:          Option<EntryLocator>,
}

impl DiffRecord {
    /// `List[i] → name → [fi] label`, or `List[i] → name  (entire entry)`.
    pub fn path(&self) -> String {
        match self.field_index {
            Some(fi) => {
                let label = self
                    .field_label
                    .clone()
                    .unwrap_or_else(|| format!("field_{fi}"));
                format!("List[{}] \u{2192} {} \u{2192} [{fi}] {label}", self.list_index, self.entry_name)
            }
            None => format!("List[{}] \u{2192} {}  (entire entry)", self.list_index, self.entry_name),
        }
    }

    fn whole_entry(kind: DiffKind, list_index: usize, entry: &ParEntry, at: EntryLocator) -> Self {
        let summary = format!("({} fields)", entry.fields.len());
        let (source_value, input_value, source, input) = match kind {
            DiffKind::SourceOnly => (summary, PLACEHOLDER.to_owned(), Some(at), None),
            _                    => (PLACEHOLDER.to_owned(), summary, None, Some(at)),
        };
        Self {
            kind,
            list_index,
            entry_name: entry.name.clone(),
            field_index: None,
            field_label: None,
            source_value,
            input_value,
            baseline_value: PLACEHOLDER.to_owned(),
            source,
            input,
        }
    }
}

/// Per-kind tallies over a diff result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub changed:     usize,
    pub input_only:  usize,
    pub source_only: usize,
}

impl DiffCounts {
    pub fn of(records: &[DiffRecord]) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.kind {
                DiffKind::Changed    => counts.changed += 1,
                DiffKind::InputOnly  => counts.input_only += 1,
                DiffKind::SourceOnly => counts.source_only += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.changed + self.input_only + self.source_only
    }
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Which entry represents a name that occurs more than once in one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    FirstWins,
    #[default]
    LastWins,
}

#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub duplicates:      DuplicatePolicy,
    pub float_tolerance: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            duplicates:      DuplicatePolicy::default(),
            float_tolerance: FLOAT_TOLERANCE,
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Diff with default options and no labels.
pub fn diff(source: &ParFile, input: &ParFile) -> Vec<DiffRecord> {
    Differ::new(&NoLabels).diff(source, input, None)
}

pub struct Differ<'a> {
    labels:  &'a dyn LabelResolver,
    options: DiffOptions,
}

impl<'a> Differ<'a> {
    pub fn new(labels: &'a dyn LabelResolver) -> Self {
        Self { labels, options: DiffOptions::default() }
    }

    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    pub fn diff(&self, source: &ParFile, input: &ParFile, baseline: Option<&ParFile>) -> Vec<DiffRecord> {
        let mut out = Vec::new();
        let list_count = source.lists.len().max(input.lists.len());

        for li in 0..list_count {
            let baseline_list = baseline.and_then(|b| b.lists.get(li));
            match (source.lists.get(li), input.lists.get(li)) {
                (Some(src), Some(inp)) => self.diff_lists(li, src, inp, baseline_list, &mut out),
                (Some(src), None) => {
                    for (ei, entry) in src.entries.iter().enumerate() {
                        let at = EntryLocator { list: li, entry: ei };
                        out.push(DiffRecord::whole_entry(DiffKind::SourceOnly, li, entry, at));
                    }
                }
                (None, Some(inp)) => {
                    for (ei, entry) in inp.entries.iter().enumerate() {
                        let at = EntryLocator { list: li, entry: ei };
                        out.push(DiffRecord::whole_entry(DiffKind::InputOnly, li, entry, at));
                    }
                }
                (None, None) => {}
            }
        }
        out
    }

    fn diff_lists(
        &self,
        li: usize,
        src: &ParList,
        inp: &ParList,
        baseline: Option<&ParList>,
        out: &mut Vec<DiffRecord>,
    ) {
        let src_by_name = self.index_by_name(li, src);
        let inp_by_name = self.index_by_name(li, inp);
        let base_by_name = baseline.map(|b| self.index_by_name(li, b));

        let field_count = src.schema_width().or_else(|| inp.schema_width()).unwrap_or(0);

        let names: BTreeSet<&str> = src_by_name.keys().chain(inp_by_name.keys()).copied().collect();
        for name in names {
            match (src_by_name.get(name), inp_by_name.get(name)) {
                (Some(&sei), None) => {
                    let at = EntryLocator { list: li, entry: sei };
                    out.push(DiffRecord::whole_entry(DiffKind::SourceOnly, li, &src.entries[sei], at));
                }
                (None, Some(&iei)) => {
                    let at = EntryLocator { list: li, entry: iei };
                    out.push(DiffRecord::whole_entry(DiffKind::InputOnly, li, &inp.entries[iei], at));
                }
                (Some(&sei), Some(&iei)) => {
                    let base_entry = match (baseline, &base_by_name) {
                        (Some(b), Some(index)) => index.get(name).map(|&bei| &b.entries[bei]),
                        _ => None,
                    };
                    self.diff_entries(
                        li,
                        field_count,
                        (&src.entries[sei], EntryLocator { list: li, entry: sei }),
                        (&inp.entries[iei], EntryLocator { list: li, entry: iei }),
                        base_entry,
                        out,
                    );
                }
                (None, None) => {}
            }
        }
    }

    fn diff_entries(
        &self,
        li: usize,
        field_count: usize,
        (se, src_at): (&ParEntry, EntryLocator),
        (ie, inp_at): (&ParEntry, EntryLocator),
        baseline: Option<&ParEntry>,
        out: &mut Vec<DiffRecord>,
    ) {
        let width = se.fields.len().max(ie.fields.len());
        for fi in 0..width {
            let sf = se.fields.get(fi);
            let inf = ie.fields.get(fi);
            if let (Some(a), Some(b)) = (sf, inf) {
                if fields_equal(a, b, self.options.float_tolerance) {
                    continue;
                }
            }
            let bf = baseline.and_then(|b| b.fields.get(fi));
            out.push(DiffRecord {
                kind:           DiffKind::Changed,
                list_index:     li,
                entry_name:     se.name.clone(),
                field_index:    Some(fi),
                field_label:    self.labels.lookup(field_count, fi).map(str::to_owned),
                source_value:   format_field(sf),
                input_value:    format_field(inf),
                baseline_value: format_field(bf),
                source:         Some(src_at),
                input:          Some(inp_at),
            });
        }
    }

    fn index_by_name<'l>(&self, li: usize, list: &'l ParList) -> HashMap<&'l str, usize> {
        let mut index = HashMap::with_capacity(list.entries.len());
        for (ei, entry) in list.entries.iter().enumerate() {
            let name = entry.name.as_str();
            if let Some(&prev) = index.get(name) {
                warn!("list {li}: entry name {name:?} appears at {prev} and {ei}");
                if self.options.duplicates == DuplicatePolicy::FirstWins {
                    continue;
                }
            }
            index.insert(name, ei);
        }
        index
    }
}

// ── Equality and formatting ──────────────────────────────────────────────────

/// Field equality used by the diff.
///
/// Type tags must match.  Floats (scalar and element-wise in float arrays)
/// are equal within `tolerance`; everything else compares exactly.  An
/// absent array differs from a present empty one, as it does on disk.
pub fn fields_equal(a: &Field, b: &Field, tolerance: f64) -> bool {
    match (a, b) {
        (Field::Float32(x), Field::Float32(y)) => floats_close(*x, *y, tolerance),
        (Field::Float32Array(Some(x)), Field::Float32Array(Some(y))) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| floats_close(*p, *q, tolerance))
        }
        _ => a == b,
    }
}

fn floats_close(x: f32, y: f32, tolerance: f64) -> bool {
    x.to_bits() == y.to_bits() || (x as f64 - y as f64).abs() < tolerance
}

fn elements<T>(v: &Option<Vec<T>>) -> &[T] {
    v.as_deref().unwrap_or(&[])
}

/// Display form of a field value, or the placeholder when absent.
pub fn format_field(field: Option<&Field>) -> String {
    let Some(field) = field else {
        return PLACEHOLDER.to_owned();
    };
    match field {
        Field::Int32(v)        => v.to_string(),
        Field::Uint32(v)       => v.to_string(),
        Field::Float32(v)      => format_float(*v),
        Field::String(s)       => s.clone(),
        Field::Int32Array(v)   => format_array(elements(v), |x| x.to_string()),
        Field::Uint32Array(v)  => format_array(elements(v), |x| x.to_string()),
        Field::Float32Array(v) => format_array(elements(v), |x| format!("{:?}", *x as f64)),
        Field::StringArray(v)  => format_array(elements(v), |s| format!("'{s}'")),
    }
}

fn format_float(v: f32) -> String {
    let v = v as f64;
    if !v.is_finite() {
        v.to_string()
    } else if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v:.4}")
    }
}

/// Short arrays are listed in full; longer ones are summarized.
fn format_array<T>(items: &[T], one: impl Fn(&T) -> String) -> String {
    if items.len() <= 4 {
        format!("[{}]", items.iter().map(one).collect::<Vec<_>>().join(", "))
    } else {
        format!("[{} items]", items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::FieldLabels;

    fn file(lists: Vec<Vec<ParEntry>>) -> ParFile {
        let mut par = ParFile::new();
        par.lists = lists
            .into_iter()
            .map(|entries| ParList { entries, ..Default::default() })
            .collect();
        par
    }

    fn orc(name: &str, hp: i32) -> ParEntry {
        ParEntry::new(name, vec![Field::Int32(hp), Field::String("orc.mesh".into())])
    }

    #[test]
    fn identical_files_have_no_differences() {
        let par = file(vec![vec![orc("Orc01", 10), orc("Orc02", 20)], vec![]]);
        assert!(diff(&par, &par).is_empty());
    }

    #[test]
    fn scalar_change_is_reported_once() {
        let source = file(vec![vec![orc("Orc01", 10)]]);
        let input = file(vec![vec![orc("Orc01", 12)]]);
        let records = diff(&source, &input);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.kind, DiffKind::Changed);
        assert_eq!(r.field_index, Some(0));
        assert_eq!(r.source_value, "10");
        assert_eq!(r.input_value, "12");
        assert_eq!(r.baseline_value, PLACEHOLDER);
        assert_eq!(r.source, Some(EntryLocator { list: 0, entry: 0 }));
        assert_eq!(r.input, Some(EntryLocator { list: 0, entry: 0 }));
    }

    #[test]
    fn one_sided_entries_are_whole_entry_records() {
        let source = file(vec![vec![orc("Orc01", 10), orc("Goblin", 3)]]);
        let input = file(vec![vec![orc("Orc99", 1), orc("Orc01", 10)]]);
        let records = diff(&source, &input);
        let kinds: Vec<_> = records.iter().map(|r| (r.kind, r.entry_name.as_str())).collect();
        assert_eq!(kinds, vec![(DiffKind::SourceOnly, "Goblin"), (DiffKind::InputOnly, "Orc99")]);

        let added = &records[1];
        assert_eq!(added.field_index, None);
        assert_eq!(added.input_value, "(2 fields)");
        assert_eq!(added.source_value, PLACEHOLDER);
        assert_eq!(added.input, Some(EntryLocator { list: 0, entry: 0 }));
        assert_eq!(added.source, None);
    }

    #[test]
    fn unmatched_lists_expand_per_entry() {
        let source = file(vec![vec![orc("A", 1)]]);
        let input = file(vec![vec![orc("A", 1)], vec![orc("B", 2), orc("C", 3)]]);
        let records = diff(&source, &input);
        assert_eq!(DiffCounts::of(&records), DiffCounts { changed: 0, input_only: 2, source_only: 0 });
        assert!(records.iter().all(|r| r.list_index == 1));

        let reversed = diff(&input, &source);
        assert_eq!(DiffCounts::of(&reversed).source_only, 2);
    }

    #[test]
    fn missing_fields_use_the_placeholder() {
        let source = file(vec![vec![ParEntry::new("X", vec![Field::Int32(1)])]]);
        let input = file(vec![vec![ParEntry::new("X", vec![Field::Int32(1), Field::Uint32(5)])]]);
        let records = diff(&source, &input);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field_index, Some(1));
        assert_eq!(records[0].source_value, PLACEHOLDER);
        assert_eq!(records[0].input_value, "5");
    }

    #[test]
    fn float_noise_is_ignored_but_type_changes_are_not() {
        assert!(fields_equal(&Field::Float32(1.0), &Field::Float32(1.0 + 1e-8), FLOAT_TOLERANCE));
        assert!(!fields_equal(&Field::Float32(1.0), &Field::Float32(1.001), FLOAT_TOLERANCE));
        assert!(fields_equal(&Field::Float32(f32::NAN), &Field::Float32(f32::NAN), FLOAT_TOLERANCE));
        assert!(!fields_equal(&Field::Int32(1), &Field::Uint32(1), FLOAT_TOLERANCE));
        assert!(!fields_equal(&Field::Int32Array(None), &Field::Int32Array(Some(vec![])), FLOAT_TOLERANCE));
        assert!(!fields_equal(&Field::Float32Array(None), &Field::Float32Array(Some(vec![])), FLOAT_TOLERANCE));
        assert!(fields_equal(&Field::StringArray(None), &Field::StringArray(None), FLOAT_TOLERANCE));
        assert!(fields_equal(
            &Field::Float32Array(Some(vec![0.5, 2.0])),
            &Field::Float32Array(Some(vec![0.5, 2.0 + 1e-8])),
            FLOAT_TOLERANCE
        ));
    }

    #[test]
    fn baseline_is_display_only() {
        let source = file(vec![vec![orc("Orc01", 10)]]);
        let input = file(vec![vec![orc("Orc01", 12)]]);
        let baseline = file(vec![vec![orc("Orc01", 8)]]);
        let plain = diff(&source, &input);
        let with_base = Differ::new(&NoLabels).diff(&source, &input, Some(&baseline));
        assert_eq!(with_base.len(), plain.len());
        assert_eq!(with_base[0].baseline_value, "8");
        assert_eq!(with_base[0].kind, plain[0].kind);
    }

    #[test]
    fn labels_come_from_the_first_entry_width() {
        let mut labels = FieldLabels::new();
        labels.set(2, 0, "hp");
        let source = file(vec![vec![orc("Orc01", 10)]]);
        let input = file(vec![vec![orc("Orc01", 12)]]);
        let records = Differ::new(&labels).diff(&source, &input, None);
        assert_eq!(records[0].field_label.as_deref(), Some("hp"));
        assert_eq!(records[0].path(), "List[0] \u{2192} Orc01 \u{2192} [0] hp");

        let unlabeled = diff(&source, &input);
        assert_eq!(unlabeled[0].path(), "List[0] \u{2192} Orc01 \u{2192} [0] field_0");
    }

    #[test]
    fn duplicate_policy_selects_the_representative() {
        let source = file(vec![vec![orc("Dup", 1), orc("Dup", 2)]]);
        let input = file(vec![vec![orc("Dup", 2)]]);

        let last = diff(&source, &input);
        assert!(last.is_empty());

        let first = Differ::new(&NoLabels)
            .with_options(DiffOptions { duplicates: DuplicatePolicy::FirstWins, ..Default::default() })
            .diff(&source, &input, None);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].source, Some(EntryLocator { list: 0, entry: 0 }));
        assert_eq!(first[0].source_value, "1");
    }

    #[test]
    fn names_are_visited_in_sorted_order() {
        let source = file(vec![vec![orc("b", 1), orc("a", 1), orc("c", 1)]]);
        let input = file(vec![vec![orc("c", 2), orc("a", 2), orc("b", 2)]]);
        let names: Vec<_> = diff(&source, &input).into_iter().map(|r| r.entry_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_field(Some(&Field::Float32(2.0))), "2.0");
        assert_eq!(format_field(Some(&Field::Float32(0.25))), "0.2500");
        assert_eq!(format_field(Some(&Field::Int32Array(Some(vec![1, 2, 3])))), "[1, 2, 3]");
        assert_eq!(format_field(Some(&Field::Uint32Array(Some(vec![1, 2, 3, 4, 5])))), "[5 items]");
        assert_eq!(format_field(Some(&Field::StringArray(Some(vec!["a".into()])))), "['a']");
        assert_eq!(format_field(Some(&Field::Float32Array(Some(vec![0.5])))), "[0.5]");
        assert_eq!(format_field(Some(&Field::Int32Array(None))), "[]");
        assert_eq!(format_field(None), PLACEHOLDER);
    }
}
