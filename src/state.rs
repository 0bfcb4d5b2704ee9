use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use anyhow::Context;

use crate::config::AppConfig;
use crate::data::filter::{filtered_indices, RecordFilter};
use crate::data::metadata;
use crate::data::model::{Dataset, ImageRecord, RecordDraft};
use crate::data::repository::{ImageRepository, PixelBuffer};
use crate::data::validate::{validate, ValidationReport};
use crate::data::DataError;

// ---------------------------------------------------------------------------
// View state and model notifications
// ---------------------------------------------------------------------------

/// What the viewer currently shows. The pixel buffer is dropped whenever the
/// selection changes.
#[derive(Debug, Default)]
pub struct ViewState {
    pub selected: Option<String>,
    pub image: Option<PixelBuffer>,
}

/// Notifications for the controller, drained once per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// Selection moved (or was cleared); `ViewState::image` holds the new buffer.
    SelectionChanged(Option<String>),
    ImageFailed { filename: String, message: String },
    /// Records were loaded, added, edited or removed.
    DatasetChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The application model, independent of rendering.
pub struct AppState {
    pub config: AppConfig,
    repo: ImageRepository,
    dataset: Dataset,
    view: ViewState,

    /// Table filter; call [`AppState::refilter`] after changing it.
    pub filter: RecordFilter,

    /// Indices of records passing the current filter (cached).
    visible: Vec<usize>,

    /// False while `metadata.csv` failed to load; mutations are refused.
    writable: bool,

    /// Result of the last validation pass.
    pub report: Option<ValidationReport>,

    /// Status / error message shown in the UI.
    pub status: Option<StatusMessage>,

    events: Vec<ModelEvent>,
}

impl AppState {
    /// Prepare the directory layout and load `metadata.csv`.
    ///
    /// A malformed metadata file does not fail this call: the state starts empty
    /// and read-only with the parse error as its status.
    pub fn open(config: AppConfig) -> anyhow::Result<Self> {
        config
            .ensure_layout()
            .with_context(|| format!("preparing dataset at {}", config.root.display()))?;

        let mut state = AppState {
            repo: ImageRepository::new(&config.images_dir),
            config,
            dataset: Dataset::default(),
            view: ViewState::default(),
            filter: RecordFilter::default(),
            visible: Vec::new(),
            writable: false,
            report: None,
            status: None,
            events: Vec::new(),
        };
        // Failure is already recorded in `status`.
        let _ = state.reload();
        Ok(state)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn repo(&self) -> &ImageRepository {
        &self.repo
    }

    pub fn visible_indices(&self) -> &[usize] {
        &self.visible
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn selected_record(&self) -> Option<&ImageRecord> {
        self.view
            .selected
            .as_deref()
            .and_then(|name| self.dataset.get(name))
    }

    pub fn take_events(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.events)
    }

    /// Recompute `visible` after a filter change.
    pub fn refilter(&mut self) {
        self.visible = filtered_indices(&self.dataset, &self.filter);
    }

    /// Surface the outcome of a user action in the status line and the log.
    pub fn report_result<T, E: Display>(&mut self, action: &str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{action} failed: {e:#}");
                self.status = Some(StatusMessage::Error(format!("{action} failed: {e:#}")));
                None
            }
        }
    }

    pub fn set_info(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.status = Some(StatusMessage::Info(message));
    }

    // -- loading --

    /// Re-read `metadata.csv` from disk and clear the selection.
    pub fn reload(&mut self) -> Result<(), DataError> {
        self.clear_selection();
        self.report = None;
        let result = metadata::load(&self.config.metadata_path);
        let outcome = match result {
            Ok(dataset) => {
                self.dataset = dataset;
                self.writable = true;
                self.set_info(format!(
                    "Loaded {} records from {}",
                    self.dataset.len(),
                    self.config.metadata_path.display()
                ));
                Ok(())
            }
            Err(e) => {
                self.dataset = Dataset::default();
                self.writable = false;
                log::error!("Failed to load metadata: {e}");
                self.status = Some(StatusMessage::Error(format!(
                    "Metadata not loaded (read-only): {e}"
                )));
                Err(e)
            }
        };
        self.refilter();
        self.events.push(ModelEvent::DatasetChanged);
        outcome
    }

    // -- selection --

    /// Select a record and load its image.
    ///
    /// An unknown filename fails with [`DataError::UnknownRecord`] and leaves the
    /// view untouched. An image that cannot be read still moves the selection so
    /// the record's metadata stays visible; the error is returned.
    pub fn select(&mut self, filename: &str) -> Result<(), DataError> {
        let split = self
            .dataset
            .get(filename)
            .map(|r| r.split)
            .ok_or_else(|| DataError::UnknownRecord(filename.to_string()))?;

        self.view.image = None;
        self.view.selected = Some(filename.to_string());
        log::debug!("Selected {filename} ({split})");

        let loaded = match self.repo.open_in(split, filename) {
            Err(DataError::NotFound(path)) => self
                .repo
                .open(filename)
                .inspect(|_| log::warn!("{filename} is listed under {split} but lives in another split"))
                .map_err(|e| match e {
                    DataError::NotFound(_) => DataError::NotFound(path),
                    other => other,
                }),
            other => other,
        };
        self.events
            .push(ModelEvent::SelectionChanged(Some(filename.to_string())));
        match loaded {
            Ok(buffer) => {
                self.view.image = Some(buffer);
                Ok(())
            }
            Err(e) => {
                self.events.push(ModelEvent::ImageFailed {
                    filename: filename.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn clear_selection(&mut self) {
        if self.view.selected.is_some() || self.view.image.is_some() {
            self.view = ViewState::default();
            self.events.push(ModelEvent::SelectionChanged(None));
        }
    }

    pub fn select_next(&mut self) -> Result<(), DataError> {
        self.step_selection(true)
    }

    pub fn select_previous(&mut self) -> Result<(), DataError> {
        self.step_selection(false)
    }

    /// Move through the visible rows, wrapping at both ends.
    fn step_selection(&mut self, forward: bool) -> Result<(), DataError> {
        let n = self.visible.len();
        if n == 0 {
            return Ok(());
        }
        let current = self
            .view
            .selected
            .as_deref()
            .and_then(|name| self.dataset.position(name))
            .and_then(|idx| self.visible.iter().position(|&v| v == idx));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % n,
            (Some(i), false) => (i + n - 1) % n,
            (None, true) => 0,
            (None, false) => n - 1,
        };
        let filename = self.dataset.records()[self.visible[next]].filename.clone();
        self.select(&filename)
    }

    // -- mutations --

    /// Copy `source` into the draft's split and add a record for it.
    /// The copied file is removed again if the record cannot be saved.
    pub fn register_image(&mut self, source: &Path, draft: RecordDraft) -> Result<String, DataError> {
        self.ensure_writable()?;
        if let Some(name) = source.file_name().and_then(|n| n.to_str()) {
            if self.dataset.contains(name) {
                return Err(DataError::DuplicateRecord(name.to_string()));
            }
        }

        let split = draft.split;
        let filename = self.repo.import(source, split)?;
        if let Err(e) = self.insert_imported(&filename, draft) {
            if let Err(cleanup) = self.repo.delete(split, &filename) {
                log::warn!("Could not remove {filename} after failed registration: {cleanup}");
            }
            return Err(e);
        }
        self.set_info(format!("Registered {filename} in {split}"));
        Ok(filename)
    }

    fn insert_imported(&mut self, filename: &str, draft: RecordDraft) -> Result<(), DataError> {
        let (width, height) = self.repo.dimensions(draft.split, filename)?;
        let mut attributes: BTreeMap<String, String> = draft
            .attributes
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        attributes.insert("width".to_string(), width.to_string());
        attributes.insert("height".to_string(), height.to_string());

        let mut record = ImageRecord::new(filename, draft.split, draft.label);
        record.attributes = attributes;

        let mut next = self.dataset.clone();
        next.insert(record)?;
        self.commit(next)
    }

    /// Apply label, split and attribute changes. A split change moves the file.
    pub fn update_record(&mut self, filename: &str, draft: RecordDraft) -> Result<(), DataError> {
        self.ensure_writable()?;
        let old_split = self
            .dataset
            .get(filename)
            .map(|r| r.split)
            .ok_or_else(|| DataError::UnknownRecord(filename.to_string()))?;
        let new_split = draft.split;

        let mut next = self.dataset.clone();
        next.update(filename, draft)?;

        self.repo.relocate(filename, old_split, new_split)?;
        if let Err(e) = self.commit(next) {
            if let Err(undo) = self.repo.relocate(filename, new_split, old_split) {
                log::warn!("Could not move {filename} back to {old_split}: {undo}");
            }
            return Err(e);
        }

        if self.view.selected.as_deref() == Some(filename) {
            if let Err(e) = self.select(filename) {
                log::warn!("Reloading {filename} after edit: {e}");
            }
        }
        self.set_info(format!("Updated {filename}"));
        Ok(())
    }

    /// Remove the record, then delete its image file. The file is only touched
    /// once the metadata is saved; a file that cannot be deleted is logged and
    /// left behind.
    pub fn remove_record(&mut self, filename: &str) -> Result<(), DataError> {
        self.ensure_writable()?;
        let split = self
            .dataset
            .get(filename)
            .map(|r| r.split)
            .ok_or_else(|| DataError::UnknownRecord(filename.to_string()))?;

        let mut next = self.dataset.clone();
        next.remove(filename)?;
        self.commit(next)?;

        if let Err(e) = self.repo.delete(split, filename) {
            log::warn!("Could not delete file for {filename}: {e}");
        }

        if self.view.selected.as_deref() == Some(filename) {
            self.clear_selection();
        }
        self.set_info(format!("Removed {filename}"));
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), DataError> {
        if self.writable {
            Ok(())
        } else {
            Err(DataError::ReadOnly)
        }
    }

    /// Persist `next`, then adopt it. Memory only changes once the file is written.
    fn commit(&mut self, next: Dataset) -> Result<(), DataError> {
        metadata::save(&next, &self.config.metadata_path)?;
        self.dataset = next;
        self.refilter();
        self.events.push(ModelEvent::DatasetChanged);
        Ok(())
    }

    // -- validation --

    pub fn validate(&mut self) -> Result<&ValidationReport, DataError> {
        let report = validate(&self.dataset, &self.repo)?;
        Ok(self.report.insert(report))
    }

    pub fn export_report(&self, path: &Path) -> anyhow::Result<()> {
        let report = self
            .report
            .as_ref()
            .context("no validation report yet; run Validate first")?;
        let json = serde_json::to_string_pretty(report).context("serialising report")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Exported validation report to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Split;
    use crate::data::repository::tests::write_png;
    use tempfile::TempDir;

    fn draft(split: Split, label: &str) -> RecordDraft {
        RecordDraft {
            split,
            label: Some(label.to_string()),
            attributes: BTreeMap::new(),
        }
    }

    /// Dataset root with `img001.png,glaucoma` and `img002.png,normal` in train.
    fn example() -> (TempDir, AppState) {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::from_root(dir.path());
        config.ensure_layout().unwrap();
        std::fs::write(
            &config.metadata_path,
            "filename,label\nimg001.png,glaucoma\nimg002.png,normal\n",
        )
        .unwrap();
        let repo = ImageRepository::new(&config.images_dir);
        write_png(&repo, Split::Train, "img001.png", 8, 6);
        write_png(&repo, Split::Train, "img002.png", 4, 4);

        let mut state = AppState::open(config).expect("open");
        state.take_events();
        (dir, state)
    }

    #[test]
    fn example_loads_and_selects() {
        let (_dir, mut state) = example();
        assert!(state.is_writable());
        assert_eq!(state.dataset().len(), 2);
        assert_eq!(state.dataset().records()[0].filename, "img001.png");
        assert_eq!(state.dataset().records()[1].filename, "img002.png");

        state.select("img001.png").expect("select");
        assert_eq!(state.view().selected.as_deref(), Some("img001.png"));
        assert_eq!(state.selected_record().unwrap().label.as_deref(), Some("glaucoma"));
        let image = state.view().image.as_ref().expect("pixels loaded");
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(
            state.take_events(),
            [ModelEvent::SelectionChanged(Some("img001.png".into()))]
        );
    }

    #[test]
    fn unknown_selection_fails_and_keeps_view() {
        let (_dir, mut state) = example();
        state.select("img002.png").unwrap();
        state.take_events();

        let err = state.select("img999.png").unwrap_err();
        assert!(matches!(err, DataError::UnknownRecord(name) if name == "img999.png"));
        assert_eq!(state.view().selected.as_deref(), Some("img002.png"));
        assert_eq!(state.view().image.as_ref().unwrap().filename, "img002.png");
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn missing_image_keeps_selection_without_pixels() {
        let (_dir, mut state) = example();
        std::fs::remove_file(state.repo().path_of(Split::Train, "img002.png")).unwrap();

        let err = state.select("img002.png").unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
        assert_eq!(state.view().selected.as_deref(), Some("img002.png"));
        assert!(state.view().image.is_none());
        let events = state.take_events();
        assert!(matches!(events.last(), Some(ModelEvent::ImageFailed { .. })));
    }

    #[test]
    fn next_and_previous_wrap_around() {
        let (_dir, mut state) = example();
        state.select_next().unwrap();
        assert_eq!(state.view().selected.as_deref(), Some("img001.png"));
        state.select_next().unwrap();
        state.select_next().unwrap();
        assert_eq!(state.view().selected.as_deref(), Some("img001.png"));
        state.select_previous().unwrap();
        assert_eq!(state.view().selected.as_deref(), Some("img002.png"));
    }

    #[test]
    fn register_copies_file_and_records_dimensions() {
        let (dir, mut state) = example();
        let outside = dir.path().join("new_eye.png");
        image::RgbImage::new(12, 9).save(&outside).unwrap();

        let name = state
            .register_image(&outside, draft(Split::Test, "glaucoma"))
            .expect("register");
        assert_eq!(name, "new_eye.png");
        assert!(state.repo().path_of(Split::Test, &name).is_file());

        let record = state.dataset().get(&name).unwrap();
        assert_eq!(record.dimensions(), Some((12, 9)));

        let on_disk = metadata::load(&state.config.metadata_path).unwrap();
        assert_eq!(&on_disk, state.dataset());

        assert!(matches!(
            state.register_image(&outside, draft(Split::Train, "normal")),
            Err(DataError::DuplicateRecord(_))
        ));
    }

    #[test]
    fn register_rolls_back_copy_when_file_is_not_an_image() {
        let (dir, mut state) = example();
        let outside = dir.path().join("notes.png");
        std::fs::write(&outside, "not pixels").unwrap();

        assert!(matches!(
            state.register_image(&outside, draft(Split::Train, "normal")),
            Err(DataError::Decode { .. })
        ));
        assert!(!state.repo().path_of(Split::Train, "notes.png").exists());
        assert_eq!(state.dataset().len(), 2);
    }

    #[test]
    fn update_moves_file_between_splits_and_reloads_selection() {
        let (_dir, mut state) = example();
        state.select("img001.png").unwrap();

        let mut edit = draft(Split::Validation, "normal");
        edit.attributes.insert("patient".into(), "p42".into());
        state.update_record("img001.png", edit).expect("update");

        let record = state.dataset().get("img001.png").unwrap();
        assert_eq!(record.split, Split::Validation);
        assert_eq!(record.attribute("patient"), Some("p42"));
        assert!(state.repo().path_of(Split::Validation, "img001.png").is_file());
        assert!(!state.repo().path_of(Split::Train, "img001.png").exists());
        assert!(state.view().image.is_some());
        assert!(state.validate().unwrap().is_clean());
    }

    #[test]
    fn remove_deletes_file_record_and_selection() {
        let (_dir, mut state) = example();
        state.select("img002.png").unwrap();
        state.remove_record("img002.png").expect("remove");

        assert_eq!(state.dataset().len(), 1);
        assert!(state.view().selected.is_none());
        assert!(!state.repo().path_of(Split::Train, "img002.png").exists());
        assert_eq!(metadata::load(&state.config.metadata_path).unwrap().len(), 1);
        assert!(matches!(
            state.remove_record("img002.png"),
            Err(DataError::UnknownRecord(_))
        ));
    }

    /// Put a non-empty directory where `metadata.csv` lives so saves fail.
    fn block_metadata(state: &AppState) {
        let path = &state.config.metadata_path;
        std::fs::remove_file(path).unwrap();
        std::fs::create_dir(path).unwrap();
        std::fs::write(path.join("blocker"), "").unwrap();
    }

    #[test]
    fn failed_save_on_remove_keeps_file_and_record() {
        let (_dir, mut state) = example();
        block_metadata(&state);

        assert!(state.remove_record("img001.png").is_err());
        assert!(state.dataset().contains("img001.png"));
        assert!(state.repo().path_of(Split::Train, "img001.png").is_file());
    }

    #[test]
    fn failed_save_on_update_moves_file_back() {
        let (_dir, mut state) = example();
        block_metadata(&state);

        assert!(state
            .update_record("img001.png", draft(Split::Test, "glaucoma"))
            .is_err());
        assert_eq!(state.dataset().get("img001.png").unwrap().split, Split::Train);
        assert_eq!(state.repo().locate("img001.png"), Some(Split::Train));
        assert!(!state.repo().path_of(Split::Test, "img001.png").exists());
    }

    #[test]
    fn corrupt_file_in_other_split_reports_decode_error() {
        let (_dir, mut state) = example();
        std::fs::remove_file(state.repo().path_of(Split::Train, "img001.png")).unwrap();
        let elsewhere = state.repo().path_of(Split::Validation, "img001.png");
        std::fs::write(&elsewhere, b"not an image").unwrap();

        assert!(matches!(
            state.select("img001.png"),
            Err(DataError::Decode { .. })
        ));
        std::fs::remove_file(&elsewhere).unwrap();
        assert!(matches!(
            state.select("img001.png"),
            Err(DataError::NotFound(path)) if path.ends_with("train/img001.png")
        ));
    }

    #[test]
    fn malformed_metadata_opens_read_only() {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::from_root(dir.path());
        config.ensure_layout().unwrap();
        std::fs::write(&config.metadata_path, "name,diagnosis\nx.png,normal\n").unwrap();

        let mut state = AppState::open(config).expect("open is not fatal");
        assert!(!state.is_writable());
        assert!(state.dataset().is_empty());
        assert!(matches!(state.status, Some(StatusMessage::Error(_))));

        let outside = dir.path().join("a.png");
        image::RgbImage::new(2, 2).save(&outside).unwrap();
        assert!(matches!(
            state.register_image(&outside, draft(Split::Train, "normal")),
            Err(DataError::ReadOnly)
        ));
        // The broken file is left for the user to fix.
        assert_eq!(
            std::fs::read_to_string(&state.config.metadata_path).unwrap(),
            "name,diagnosis\nx.png,normal\n"
        );
    }

    #[test]
    fn validation_report_exports_as_json() {
        let (dir, mut state) = example();
        let out = dir.path().join("report.json");
        assert!(state.export_report(&out).is_err());

        write_png(state.repo(), Split::Test, "stray.png", 2, 2);
        let report = state.validate().unwrap();
        assert_eq!(report.orphaned_files.len(), 1);

        state.export_report(&out).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["orphaned_files"][0]["split"], "test");
        assert_eq!(json["orphaned_files"][0]["filename"], "stray.png");
    }

    #[test]
    fn filter_limits_navigation() {
        let (_dir, mut state) = example();
        state.filter.query = "002".into();
        state.refilter();
        assert_eq!(state.visible_indices(), [1]);
        state.select_next().unwrap();
        state.select_next().unwrap();
        assert_eq!(state.view().selected.as_deref(), Some("img002.png"));
    }
}
