use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;

use tempfile::NamedTempFile;

use super::error::{DataError, Result};
use super::model::{is_plain_filename, Dataset, ImageRecord, Split};

pub const FILENAME_COLUMN: &str = "filename";
pub const SPLIT_COLUMN: &str = "split";
pub const LABEL_COLUMN: &str = "label";

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse `metadata.csv` into a [`Dataset`].
///
/// Required columns: `filename`, `label`. `split` is optional and defaults to
/// `train` when absent or blank. Every other column is kept as a per-record
/// attribute, in header order.
pub fn load(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(row_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = |name: &str| headers.iter().position(|h| h == name);
    let filename_idx = column(FILENAME_COLUMN)
        .ok_or_else(|| DataError::parse(1, format!("missing required column '{FILENAME_COLUMN}'")))?;
    let label_idx = column(LABEL_COLUMN)
        .ok_or_else(|| DataError::parse(1, format!("missing required column '{LABEL_COLUMN}'")))?;
    let split_idx = column(SPLIT_COLUMN);

    let attribute_idx: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != filename_idx && *i != label_idx && Some(*i) != split_idx)
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let mut dataset = Dataset::new(attribute_idx.iter().map(|(_, h)| h.clone()).collect());
    let mut seen = HashSet::new();

    for result in reader.records() {
        let row = result.map_err(row_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cell = |i: usize| row.get(i).unwrap_or("").trim();

        let filename = cell(filename_idx);
        if filename.is_empty() {
            return Err(DataError::parse(line, "empty filename"));
        }
        if !is_plain_filename(filename) {
            return Err(DataError::parse(
                line,
                format!("filename '{filename}' must not contain a path"),
            ));
        }
        if !seen.insert(filename.to_string()) {
            return Err(DataError::parse(
                line,
                format!("duplicate filename '{filename}'"),
            ));
        }

        let split = match split_idx.map(cell) {
            None | Some("") => Split::Train,
            Some(raw) => raw.parse().map_err(|msg: String| DataError::parse(line, msg))?,
        };

        let label = Some(cell(label_idx))
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        let attributes: BTreeMap<String, String> = attribute_idx
            .iter()
            .filter_map(|(i, name)| {
                let value = cell(*i);
                (!value.is_empty()).then(|| (name.clone(), value.to_string()))
            })
            .collect();

        dataset.insert(ImageRecord {
            filename: filename.to_string(),
            split,
            label,
            attributes,
        })?;
    }

    Ok(dataset)
}

/// Row-level CSV errors become [`DataError::Parse`] with their line number.
fn row_error(err: csv::Error) -> DataError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => DataError::parse(line, format!("expected {expected_len} fields, found {len}")),
        csv::ErrorKind::Utf8 { .. } => DataError::parse(line, "invalid UTF-8"),
        _ => DataError::Csv(err),
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Write `dataset` to `path`, replacing the file atomically.
///
/// Rows go to a temporary file in the same directory, which is synced and then
/// renamed over the target. A failure at any step leaves the old file intact.
pub fn save(dataset: &Dataset, path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir).map_err(|e| DataError::io(dir, e))?;

    {
        let mut writer = csv::Writer::from_writer(tmp.as_file());
        let mut header = vec![FILENAME_COLUMN, SPLIT_COLUMN, LABEL_COLUMN];
        header.extend(dataset.attribute_columns().iter().map(String::as_str));
        writer.write_record(&header)?;

        for record in dataset.records() {
            let mut row = vec![
                record.filename.as_str(),
                record.split.dir_name(),
                record.label.as_deref().unwrap_or(""),
            ];
            row.extend(
                dataset
                    .attribute_columns()
                    .iter()
                    .map(|col| record.attribute(col).unwrap_or("")),
            );
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|e| DataError::io(tmp.path(), e))?;
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| DataError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DataError::io(path, e.error))?;

    log::info!("Saved {} records to {}", dataset.len(), path.display());
    Ok(())
}

/// Create a header-only metadata file if none exists yet.
pub fn create_empty(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save(&Dataset::default(), path)?;
    Ok(true)
}
