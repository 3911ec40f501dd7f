//! Entry editing: duplicate, rename, remove, and add from a list's template.
//!
//! Entries often repeat their own name inside string fields (mesh or
//! texture paths).  Duplicating or renaming rewrites the first
//! case-insensitive occurrence of the old name in each `string` field;
//! string arrays are left alone.

use log::debug;

use crate::model::{Field, ParEntry, ParFile, ParList};

/// Next name in a numbered series, keeping zero padding:
/// `Orc09` → `Orc10`, `Sword` → `Sword_COPY`.
pub fn suggest_next_name(name: &str) -> String {
    let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[prefix.len()..];
    if digits.is_empty() {
        return format!("{name}_COPY");
    }
    // Decimal increment on the digit text, carrying leftwards.
    let mut out: Vec<u8> = digits.bytes().collect();
    let mut carry = true;
    for d in out.iter_mut().rev() {
        if !carry {
            break;
        }
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            carry = false;
        }
    }
    if carry {
        out.insert(0, b'1');
    }
    format!("{prefix}{}", String::from_utf8_lossy(&out))
}

impl Field {
    /// Same type, empty value: 0, 0.0, `""`, or an absent array.
    pub fn blank(&self) -> Field {
        match self {
            Field::Int32(_)        => Field::Int32(0),
            Field::Float32(_)      => Field::Float32(0.0),
            Field::Uint32(_)       => Field::Uint32(0),
            Field::String(_)       => Field::String(String::new()),
            Field::Int32Array(_)   => Field::Int32Array(None),
            Field::Float32Array(_) => Field::Float32Array(None),
            Field::Uint32Array(_)  => Field::Uint32Array(None),
            Field::StringArray(_)  => Field::StringArray(None),
        }
    }
}

impl ParEntry {
    /// Replace the first case-insensitive match of `old` with `new` in each
    /// string field.  Returns how many fields changed.
    pub fn replace_name_in_strings(&mut self, old: &str, new: &str) -> usize {
        if old.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for field in &mut self.fields {
            if let Field::String(s) = field {
                if let Some(range) = find_ignore_case(s, old) {
                    s.replace_range(range, new);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Rename and rewrite string fields that mention the old name.
    /// Returns how many fields changed.
    pub fn rename(&mut self, new_name: &str) -> usize {
        let old = std::mem::replace(&mut self.name, new_name.to_owned());
        self.replace_name_in_strings(&old, new_name)
    }

    /// Deep copy under a new name, string fields rewritten.
    pub fn duplicate_as(&self, new_name: &str) -> ParEntry {
        let mut copy = self.clone();
        copy.rename(new_name);
        copy
    }
}

impl ParList {
    /// Index of the first entry with this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Insert a copy of entry `index` right after it.  Returns the copy's
    /// index, or `None` if `index` is out of range.
    pub fn duplicate_entry(&mut self, index: usize, new_name: &str) -> Option<usize> {
        let copy = self.entries.get(index)?.duplicate_as(new_name);
        debug!("duplicating {:?} as {new_name:?}", self.entries[index].name);
        self.entries.insert(index + 1, copy);
        Some(index + 1)
    }

    pub fn remove_entry(&mut self, index: usize) -> Option<ParEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Append a new entry shaped like the list's first entry: same flag,
    /// tags and field types, every value blank.  In an empty list the new
    /// entry has no fields.  Returns the new index.
    pub fn add_entry(&mut self, name: &str) -> usize {
        let entry = match self.entries.first() {
            Some(template) => ParEntry {
                name:   name.to_owned(),
                flag:   template.flag,
                tag_a:  template.tag_a,
                tag_b:  template.tag_b,
                fields: template.fields.iter().map(Field::blank).collect(),
            },
            None => ParEntry::new(name, Vec::new()),
        };
        self.entries.push(entry);
        self.entries.len() - 1
    }
}

impl ParFile {
    /// Whether any list holds an entry of this name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.lists.iter().any(|l| l.contains_name(name))
    }
}

/// Byte range of the first case-insensitive match of `needle` in `haystack`.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<std::ops::Range<usize>> {
    let same = |a: char, b: char| a == b || a.to_lowercase().eq(b.to_lowercase());
    for (start, _) in haystack.char_indices() {
        let mut rest = haystack[start..].char_indices();
        let mut end = start;
        let mut matched = true;
        for n in needle.chars() {
            match rest.next() {
                Some((off, h)) if same(h, n) => end = start + off + h.len_utf8(),
                _ => {
                    matched = false;
                    break;
                }
            }
        }
        if matched {
            return Some(start..end);
        }
    }
    None
}
