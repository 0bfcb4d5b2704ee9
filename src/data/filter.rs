use std::collections::BTreeSet;

use super::model::{Dataset, ImageRecord, Split};

// ---------------------------------------------------------------------------
// Record filter: which rows the table shows
// ---------------------------------------------------------------------------

/// Table filter state.
///
/// * `split` – `None` shows every split.
/// * `labels` – selected label values; `None` stands for unlabelled records.
///   `all_labels == true` disables label filtering entirely.
/// * `query` – case-insensitive filename substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub split: Option<Split>,
    pub all_labels: bool,
    pub labels: BTreeSet<Option<String>>,
    pub query: String,
}

impl Default for RecordFilter {
    fn default() -> Self {
        RecordFilter {
            split: None,
            all_labels: true,
            labels: BTreeSet::new(),
            query: String::new(),
        }
    }
}

impl RecordFilter {
    pub fn matches(&self, record: &ImageRecord) -> bool {
        if let Some(split) = self.split {
            if record.split != split {
                return false;
            }
        }
        if !self.all_labels && !self.labels.contains(&record.label) {
            return false;
        }
        let query = self.query.trim();
        query.is_empty()
            || record
                .filename
                .to_lowercase()
                .contains(&query.to_lowercase())
    }

    /// Toggle a single label in the selection, leaving "all labels" mode.
    /// `present` is every label value in the dataset (see [`label_values`]).
    pub fn toggle_label(&mut self, present: &BTreeSet<Option<String>>, label: Option<String>) {
        if self.all_labels {
            self.all_labels = false;
            self.labels = present.clone();
        }
        if !self.labels.remove(&label) {
            self.labels.insert(label);
        }
    }

    pub fn label_selected(&self, label: &Option<String>) -> bool {
        self.all_labels || self.labels.contains(label)
    }

    pub fn select_all_labels(&mut self) {
        self.all_labels = true;
        self.labels.clear();
    }

    pub fn select_no_labels(&mut self) {
        self.all_labels = false;
        self.labels.clear();
    }
}

/// Every label value present in the dataset, including `None` when some record
/// is unlabelled.
pub fn label_values(dataset: &Dataset) -> BTreeSet<Option<String>> {
    dataset.records().iter().map(|r| r.label.clone()).collect()
}

/// Return indices of records that pass the filter, in dataset order.
pub fn filtered_indices(dataset: &Dataset, filter: &RecordFilter) -> Vec<usize> {
    dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| filter.matches(r))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let mut ds = Dataset::default();
        for (name, split, label) in [
            ("OD_001.png", Split::Train, Some("glaucoma")),
            ("od_002.png", Split::Test, Some("normal")),
            ("os_003.png", Split::Train, None),
            ("os_004.png", Split::Validation, Some("normal")),
        ] {
            ds.insert(ImageRecord::new(name, split, label.map(str::to_string)))
                .unwrap();
        }
        ds
    }

    #[test]
    fn default_filter_shows_everything() {
        let ds = dataset();
        assert_eq!(filtered_indices(&ds, &RecordFilter::default()), [0, 1, 2, 3]);
    }

    #[test]
    fn split_and_query_combine() {
        let ds = dataset();
        let filter = RecordFilter {
            split: Some(Split::Train),
            query: "od_".into(),
            ..RecordFilter::default()
        };
        assert_eq!(filtered_indices(&ds, &filter), [0]);
    }

    #[test]
    fn toggling_labels_starts_from_all_selected() {
        let ds = dataset();
        let present = label_values(&ds);
        let mut filter = RecordFilter::default();
        filter.toggle_label(&present, Some("normal".into()));
        assert!(!filter.label_selected(&Some("normal".into())));
        assert!(filter.label_selected(&None));
        assert_eq!(filtered_indices(&ds, &filter), [0, 2]);

        filter.select_no_labels();
        assert!(filtered_indices(&ds, &filter).is_empty());
        filter.toggle_label(&present, None);
        assert_eq!(filtered_indices(&ds, &filter), [2]);

        filter.select_all_labels();
        assert_eq!(filtered_indices(&ds, &filter).len(), 4);
    }
}
