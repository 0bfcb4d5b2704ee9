use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::Serialize;

use super::error::{DataError, Result};

// ---------------------------------------------------------------------------
// Split – train / validation / test partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    /// Directory name under `images/`, also the value written to the CSV.
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Split::Train => "Train",
            Split::Validation => "Validation",
            Split::Test => "Test",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "validation" | "val" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// ImageRecord – one metadata row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub filename: String,
    pub split: Split,
    pub label: Option<String>,
    /// Extra CSV columns. Blank cells are not stored.
    pub attributes: BTreeMap<String, String>,
}

impl ImageRecord {
    pub fn new(filename: impl Into<String>, split: Split, label: Option<String>) -> Self {
        ImageRecord {
            filename: filename.into(),
            split,
            label,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// `(width, height)` as recorded when the image was registered.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let w = self.attribute("width")?.parse().ok()?;
        let h = self.attribute("height")?.parse().ok()?;
        Some((w, h))
    }
}

/// Record filenames name a single file directly inside a split directory:
/// no separators, no `.`/`..`, no root or drive prefix.
pub fn is_plain_filename(name: &str) -> bool {
    if name.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// User-editable part of a record, as filled in by the record form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub split: Split,
    pub label: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl RecordDraft {
    pub fn from_record(record: &ImageRecord) -> Self {
        RecordDraft {
            split: record.split,
            label: record.label.clone(),
            attributes: record.attributes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – ordered records plus the extra column layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<ImageRecord>,
    /// Attribute columns in header order (excludes filename/split/label).
    attribute_columns: Vec<String>,
}

impl Dataset {
    pub fn new(attribute_columns: Vec<String>) -> Self {
        Dataset {
            records: Vec::new(),
            attribute_columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn attribute_columns(&self) -> &[String] {
        &self.attribute_columns
    }

    pub fn get(&self, filename: &str) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.filename == filename)
    }

    pub fn position(&self, filename: &str) -> Option<usize> {
        self.records.iter().position(|r| r.filename == filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.position(filename).is_some()
    }

    /// Records of one split, in file order.
    pub fn by_split(&self, split: Split) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter().filter(move |r| r.split == split)
    }

    /// Sorted unique labels.
    pub fn labels(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.label.clone())
            .collect()
    }

    /// Count of records per (split, label). Unlabelled records count under `None`.
    pub fn label_counts(&self) -> BTreeMap<(Split, Option<String>), usize> {
        let mut counts = BTreeMap::new();
        for r in &self.records {
            *counts.entry((r.split, r.label.clone())).or_insert(0) += 1;
        }
        counts
    }

    pub fn insert(&mut self, record: ImageRecord) -> Result<()> {
        if !is_plain_filename(&record.filename) {
            return Err(DataError::InvalidFilename(record.filename));
        }
        if self.contains(&record.filename) {
            return Err(DataError::DuplicateRecord(record.filename));
        }
        self.register_columns(&record);
        self.records.push(record);
        Ok(())
    }

    /// Replace label, split and attributes of an existing record.
    pub fn update(&mut self, filename: &str, draft: RecordDraft) -> Result<()> {
        let idx = self
            .position(filename)
            .ok_or_else(|| DataError::UnknownRecord(filename.to_string()))?;
        let record = &mut self.records[idx];
        record.split = draft.split;
        record.label = draft.label;
        record.attributes = draft
            .attributes
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let record = record.clone();
        self.register_columns(&record);
        Ok(())
    }

    pub fn remove(&mut self, filename: &str) -> Result<ImageRecord> {
        let idx = self
            .position(filename)
            .ok_or_else(|| DataError::UnknownRecord(filename.to_string()))?;
        Ok(self.records.remove(idx))
    }

    fn register_columns(&mut self, record: &ImageRecord) {
        for key in record.attributes.keys() {
            if !self.attribute_columns.contains(key) {
                self.attribute_columns.push(key.clone());
            }
        }
    }
}
