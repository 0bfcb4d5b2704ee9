use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::data::model::{ImageRecord, RecordDraft, Split};
use crate::data::repository::IMAGE_EXTENSIONS;
use crate::state::AppState;

/// Attribute holding the acquisition date (ISO `YYYY-MM-DD`).
pub const ACQUIRED_ATTRIBUTE: &str = "acquired";

// ---------------------------------------------------------------------------
// Record form state
// ---------------------------------------------------------------------------

/// Left-panel form used both to register a new image and to edit the
/// selected record.
#[derive(Debug, Clone)]
pub struct RecordForm {
    /// `Some(filename)` while editing an existing record.
    pub editing: Option<String>,
    /// File picked for registration.
    pub source: Option<PathBuf>,
    pub source_dims: Option<(u32, u32)>,
    pub split: Split,
    pub label: String,
    pub has_acquired: bool,
    pub acquired: NaiveDate,
    pub attributes: Vec<(String, String)>,
    confirm_delete: bool,
}

impl Default for RecordForm {
    fn default() -> Self {
        RecordForm {
            editing: None,
            source: None,
            source_dims: None,
            split: Split::Train,
            label: String::new(),
            has_acquired: true,
            acquired: chrono::Local::now().date_naive(),
            attributes: Vec::new(),
            confirm_delete: false,
        }
    }
}

impl RecordForm {
    pub fn reset(&mut self) {
        *self = RecordForm::default();
    }

    /// Fill the form from an existing record and switch to edit mode.
    pub fn load_from(&mut self, record: &ImageRecord) {
        let draft = RecordDraft::from_record(record);
        let acquired = draft
            .attributes
            .get(ACQUIRED_ATTRIBUTE)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        *self = RecordForm {
            editing: Some(record.filename.clone()),
            split: draft.split,
            label: draft.label.unwrap_or_default(),
            has_acquired: acquired.is_some(),
            acquired: acquired.unwrap_or(self.acquired),
            attributes: draft
                .attributes
                .into_iter()
                .filter(|(k, _)| k != ACQUIRED_ATTRIBUTE)
                .collect(),
            source_dims: record.dimensions(),
            ..RecordForm::default()
        };
    }

    /// Collect the form into a draft. Rows with a blank key are ignored.
    pub fn to_draft(&self) -> RecordDraft {
        let mut attributes: BTreeMap<String, String> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        if self.has_acquired {
            attributes.insert(
                ACQUIRED_ATTRIBUTE.to_string(),
                self.acquired.format("%Y-%m-%d").to_string(),
            );
        } else {
            attributes.remove(ACQUIRED_ATTRIBUTE);
        }

        let label = self.label.trim();
        RecordDraft {
            split: self.split,
            label: (!label.is_empty()).then(|| label.to_string()),
            attributes,
        }
    }
}

// ---------------------------------------------------------------------------
// Left side panel – register / edit form
// ---------------------------------------------------------------------------

pub fn side_panel(ui: &mut Ui, state: &mut AppState, form: &mut RecordForm) {
    ui.horizontal(|ui: &mut Ui| {
        match &form.editing {
            Some(name) => ui.heading(format!("Edit {name}")),
            None => ui.heading("Register image"),
        };
    });
    if form.editing.is_some() && ui.small_button("New record").clicked() {
        state.clear_selection();
        form.reset();
    }
    ui.separator();

    if !state.is_writable() {
        ui.label(RichText::new("Metadata failed to load; editing is disabled.").color(Color32::RED));
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if form.editing.is_none() {
                source_picker(ui, form);
            }
            if let Some((w, h)) = form.source_dims {
                ui.label(format!("Dimensions: {w} × {h} px"));
            }
            ui.add_space(6.0);

            fields(ui, state, form);
            ui.add_space(6.0);
            attribute_rows(ui, form);
            ui.separator();

            ui.add_enabled_ui(state.is_writable(), |ui: &mut Ui| {
                actions(ui, state, form);
            });
        });
}

fn source_picker(ui: &mut Ui, form: &mut RecordForm) {
    ui.strong("Image file");
    let shown = form
        .source
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    ui.label(shown);
    if ui.button("Choose image…").clicked() {
        let picked = rfd::FileDialog::new()
            .set_title("Select image")
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file();
        if let Some(path) = picked {
            form.source_dims = image::image_dimensions(&path)
                .map_err(|e| log::warn!("Cannot read dimensions of {}: {e}", path.display()))
                .ok();
            form.source = Some(path);
        }
    }
}

fn fields(ui: &mut Ui, state: &AppState, form: &mut RecordForm) {
    egui::Grid::new("record_fields")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui: &mut Ui| {
            ui.label("Split");
            ui.horizontal(|ui: &mut Ui| {
                for split in Split::ALL {
                    ui.selectable_value(&mut form.split, split, split.to_string());
                }
            });
            ui.end_row();

            ui.label("Label");
            ui.vertical(|ui: &mut Ui| {
                ui.text_edit_singleline(&mut form.label);
                ui.horizontal_wrapped(|ui: &mut Ui| {
                    for known in state.dataset().labels() {
                        if ui.small_button(&known).clicked() {
                            form.label = known;
                        }
                    }
                });
            });
            ui.end_row();

            ui.label("Acquired");
            ui.horizontal(|ui: &mut Ui| {
                ui.checkbox(&mut form.has_acquired, "");
                ui.add_enabled_ui(form.has_acquired, |ui: &mut Ui| {
                    ui.add(DatePickerButton::new(&mut form.acquired).id_salt("acquired_date"));
                });
            });
            ui.end_row();
        });
}

fn attribute_rows(ui: &mut Ui, form: &mut RecordForm) {
    ui.strong("Attributes");
    let mut remove = None;
    egui::Grid::new("record_attributes")
        .num_columns(3)
        .show(ui, |ui: &mut Ui| {
            for (i, (key, value)) in form.attributes.iter_mut().enumerate() {
                ui.add(egui::TextEdit::singleline(key).desired_width(90.0).hint_text("name"));
                ui.add(egui::TextEdit::singleline(value).desired_width(120.0).hint_text("value"));
                if ui.small_button("✖").clicked() {
                    remove = Some(i);
                }
                ui.end_row();
            }
        });
    if let Some(i) = remove {
        form.attributes.remove(i);
    }
    if ui.small_button("+ Attribute").clicked() {
        form.attributes.push((String::new(), String::new()));
    }
}

fn actions(ui: &mut Ui, state: &mut AppState, form: &mut RecordForm) {
    match form.editing.clone() {
        None => {
            let ready = form.source.is_some();
            if ui.add_enabled(ready, egui::Button::new("Register")).clicked() {
                if let Some(source) = form.source.clone() {
                    let result = state.register_image(&source, form.to_draft());
                    if let Some(name) = state.report_result("Register", result) {
                        form.reset();
                        let selected = state.select(&name);
                        state.report_result("Select", selected);
                    }
                }
            }
        }
        Some(filename) => {
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Save changes").clicked() {
                    let result = state.update_record(&filename, form.to_draft());
                    state.report_result("Update", result);
                }
                if !form.confirm_delete {
                    if ui.button("Delete…").clicked() {
                        form.confirm_delete = true;
                    }
                } else {
                    if ui
                        .button(RichText::new("Confirm delete").color(Color32::RED))
                        .clicked()
                    {
                        let result = state.remove_record(&filename);
                        if state.report_result("Delete", result).is_some() {
                            form.reset();
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        form.confirm_delete = false;
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_round_trips_through_the_form() {
        let mut record = ImageRecord::new("eye.png", Split::Validation, Some("glaucoma".into()));
        record.attributes.insert("patient".into(), "p9".into());
        record.attributes.insert(ACQUIRED_ATTRIBUTE.into(), "2024-05-17".into());

        let mut form = RecordForm::default();
        form.load_from(&record);
        assert_eq!(form.editing.as_deref(), Some("eye.png"));
        assert!(form.has_acquired);
        assert_eq!(form.attributes, [("patient".to_string(), "p9".to_string())]);
        assert_eq!(form.to_draft(), RecordDraft::from_record(&record));
    }

    #[test]
    fn blank_label_and_keys_are_dropped() {
        let mut form = RecordForm {
            label: "   ".into(),
            has_acquired: false,
            attributes: vec![
                ("".into(), "orphan value".into()),
                (" eye ".into(), " OD ".into()),
            ],
            ..RecordForm::default()
        };
        let draft = form.to_draft();
        assert_eq!(draft.label, None);
        assert_eq!(draft.attributes.len(), 1);
        assert_eq!(draft.attributes["eye"], "OD");

        form.has_acquired = true;
        form.acquired = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        assert_eq!(form.to_draft().attributes[ACQUIRED_ATTRIBUTE], "2023-01-02");
    }
}
