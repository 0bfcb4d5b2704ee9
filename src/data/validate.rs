use std::collections::BTreeSet;

use serde::Serialize;

use super::error::Result;
use super::model::{Dataset, Split};
use super::repository::{is_supported_image, ImageRepository};

/// A `(split, filename)` pair that failed the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Orphan {
    pub split: Split,
    pub filename: String,
}

/// Mismatches between `metadata.csv` and the split directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Rows whose file is missing from their split directory.
    pub orphaned_records: Vec<Orphan>,
    /// Image files with no row for that filename and split.
    pub orphaned_files: Vec<Orphan>,
    /// Rows whose file exists but is not in a format the browser can open.
    pub unsupported_records: Vec<Orphan>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned_records.is_empty()
            && self.orphaned_files.is_empty()
            && self.unsupported_records.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_clean() {
            "Dataset is consistent".to_string()
        } else {
            let mut summary = format!(
                "{} record(s) without file, {} file(s) without record",
                self.orphaned_records.len(),
                self.orphaned_files.len()
            );
            if !self.unsupported_records.is_empty() {
                summary.push_str(&format!(
                    ", {} unsupported file(s)",
                    self.unsupported_records.len()
                ));
            }
            summary
        }
    }
}

/// Cross-check every record against the files on disk, and vice versa.
pub fn validate(dataset: &Dataset, repo: &ImageRepository) -> Result<ValidationReport> {
    let mut on_disk: BTreeSet<Orphan> = BTreeSet::new();
    for split in Split::ALL {
        for filename in repo.list(split)? {
            on_disk.insert(Orphan { split, filename });
        }
    }

    let in_metadata: BTreeSet<Orphan> = dataset
        .records()
        .iter()
        .map(|r| Orphan {
            split: r.split,
            filename: r.filename.clone(),
        })
        .collect();

    // `list` only yields image files, so a present file in another format
    // would otherwise look missing.
    let (unsupported_records, orphaned_records): (Vec<Orphan>, Vec<Orphan>) = in_metadata
        .difference(&on_disk)
        .cloned()
        .partition(|o| {
            let path = repo.path_of(o.split, &o.filename);
            path.is_file() && !is_supported_image(&path)
        });

    let report = ValidationReport {
        orphaned_records,
        orphaned_files: on_disk.difference(&in_metadata).cloned().collect(),
        unsupported_records,
    };

    if report.is_clean() {
        log::info!("Validation passed for {} records", dataset.len());
    } else {
        log::warn!("Validation: {}", report.summary());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ImageRecord;
    use crate::data::repository::tests::write_png;
    use tempfile::TempDir;

    #[test]
    fn reports_orphans_on_both_sides() {
        let dir = TempDir::new().expect("tempdir");
        let repo = ImageRepository::new(dir.path().join("images"));
        write_png(&repo, Split::Train, "ok.png", 2, 2);
        write_png(&repo, Split::Test, "stray.png", 2, 2);
        // Listed under the wrong split: orphan in both directions.
        write_png(&repo, Split::Validation, "moved.png", 2, 2);

        let mut ds = Dataset::default();
        for (name, split) in [
            ("ok.png", Split::Train),
            ("missing.png", Split::Train),
            ("moved.png", Split::Test),
        ] {
            ds.insert(ImageRecord::new(name, split, None)).unwrap();
        }

        let report = validate(&ds, &repo).unwrap();
        let orphan = |split, name: &str| Orphan {
            split,
            filename: name.to_string(),
        };
        assert_eq!(
            report.orphaned_records,
            [orphan(Split::Train, "missing.png"), orphan(Split::Test, "moved.png")]
        );
        assert_eq!(
            report.orphaned_files,
            [orphan(Split::Validation, "moved.png"), orphan(Split::Test, "stray.png")]
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn present_file_in_unknown_format_is_not_an_orphan() {
        let dir = TempDir::new().expect("tempdir");
        let repo = ImageRepository::new(dir.path().join("images"));
        std::fs::create_dir_all(repo.split_dir(Split::Train)).unwrap();
        std::fs::write(repo.path_of(Split::Train, "scan.dcm"), b"DICM").unwrap();

        let mut ds = Dataset::default();
        ds.insert(ImageRecord::new("scan.dcm", Split::Train, None)).unwrap();
        ds.insert(ImageRecord::new("gone.dcm", Split::Train, None)).unwrap();

        let report = validate(&ds, &repo).unwrap();
        let orphan = |name: &str| Orphan {
            split: Split::Train,
            filename: name.to_string(),
        };
        assert_eq!(report.unsupported_records, [orphan("scan.dcm")]);
        assert_eq!(report.orphaned_records, [orphan("gone.dcm")]);
        assert!(report.summary().contains("1 unsupported file(s)"));
    }

    #[test]
    fn consistent_dataset_is_clean() {
        let dir = TempDir::new().expect("tempdir");
        let repo = ImageRepository::new(dir.path().join("images"));
        write_png(&repo, Split::Validation, "a.png", 2, 2);
        let mut ds = Dataset::default();
        ds.insert(ImageRecord::new("a.png", Split::Validation, Some("normal".into())))
            .unwrap();

        let report = validate(&ds, &repo).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.summary(), "Dataset is consistent");
    }
}
