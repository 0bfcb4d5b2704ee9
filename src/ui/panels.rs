use eframe::egui::{self, Color32, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::color::LabelColors;
use crate::config::AppConfig;
use crate::data::filter::label_values;
use crate::data::model::Split;
use crate::state::{AppState, StatusMessage};

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open dataset folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload metadata").clicked() {
                // Errors are already in the status line.
                let _ = state.reload();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Validate").clicked() {
                let result = state.validate().map(|r| r.summary());
                if let Some(summary) = state.report_result("Validate", result) {
                    state.set_info(summary);
                }
                ui.close_menu();
            }
            if ui
                .add_enabled(state.report.is_some(), egui::Button::new("Export report…"))
                .clicked()
            {
                export_report_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        let ds = state.dataset();
        ui.label(format!(
            "{} records, {} visible",
            ds.len(),
            state.visible_indices().len()
        ));
        let per_split: Vec<String> = Split::ALL
            .iter()
            .map(|&split| format!("{split} {}", ds.by_split(split).count()))
            .collect();
        ui.label(per_split.join(" · "));
        ui.label(
            RichText::new(state.config.root.display().to_string())
                .small()
                .weak(),
        );

        ui.separator();

        match &state.status {
            Some(StatusMessage::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            Some(StatusMessage::Info(msg)) => {
                ui.label(msg);
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// Right side panel – filters and records table
// ---------------------------------------------------------------------------

pub fn records_panel(ui: &mut Ui, state: &mut AppState, colors: &LabelColors) {
    ui.heading("Records");
    ui.separator();
    filter_widgets(ui, state, colors);
    ui.separator();
    records_table(ui, state, colors);
}

fn filter_widgets(ui: &mut Ui, state: &mut AppState, colors: &LabelColors) {
    let mut changed = false;

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Split");
        let current = state
            .filter
            .split
            .map(|s| s.to_string())
            .unwrap_or_else(|| "All".to_string());
        egui::ComboBox::from_id_salt("split_filter")
            .selected_text(current)
            .show_ui(ui, |ui: &mut Ui| {
                changed |= ui
                    .selectable_value(&mut state.filter.split, None, "All")
                    .changed();
                for split in Split::ALL {
                    changed |= ui
                        .selectable_value(&mut state.filter.split, Some(split), split.to_string())
                        .changed();
                }
            });
    });

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Search");
        changed |= ui.text_edit_singleline(&mut state.filter.query).changed();
    });

    ui.horizontal_wrapped(|ui: &mut Ui| {
        ui.label("Labels");
        if ui.small_button("All").clicked() {
            state.filter.select_all_labels();
            changed = true;
        }
        if ui.small_button("None").clicked() {
            state.filter.select_no_labels();
            changed = true;
        }
        let present = label_values(state.dataset());
        for label in present.iter().cloned() {
            let mut checked = state.filter.label_selected(&label);
            let text = RichText::new(label.as_deref().unwrap_or("(unlabelled)"))
                .color(colors.color_for(label.as_deref()));
            if ui.checkbox(&mut checked, text).changed() {
                state.filter.toggle_label(&present, label);
                changed = true;
            }
        }
    });

    if changed {
        state.refilter();
    }
}

fn records_table(ui: &mut Ui, state: &mut AppState, colors: &LabelColors) {
    let visible: Vec<usize> = state.visible_indices().to_vec();
    let selected = state.view().selected.clone();
    let mut clicked: Option<String> = None;

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::remainder().at_least(140.0))
        .column(Column::auto().at_least(70.0))
        .column(Column::auto().at_least(80.0))
        .column(Column::auto())
        .header(20.0, |mut header| {
            header.col(|ui: &mut Ui| {
                ui.strong("Filename");
            });
            header.col(|ui: &mut Ui| {
                ui.strong("Split");
            });
            header.col(|ui: &mut Ui| {
                ui.strong("Label");
            });
            header.col(|ui: &mut Ui| {
                ui.strong("Size");
            });
        })
        .body(|body| {
            body.rows(18.0, visible.len(), |mut row| {
                let Some(record) = state.dataset().records().get(visible[row.index()]) else {
                    return;
                };
                let is_selected = selected.as_deref() == Some(record.filename.as_str());
                row.set_selected(is_selected);

                row.col(|ui: &mut Ui| {
                    if ui.selectable_label(is_selected, &record.filename).clicked() {
                        clicked = Some(record.filename.clone());
                    }
                });
                row.col(|ui: &mut Ui| {
                    ui.label(record.split.to_string());
                });
                row.col(|ui: &mut Ui| {
                    let label = record.label.as_deref();
                    ui.label(
                        RichText::new(label.unwrap_or("–")).color(colors.color_for(label)),
                    );
                });
                row.col(|ui: &mut Ui| {
                    if let Some((w, h)) = record.dimensions() {
                        ui.label(format!("{w}×{h}"));
                    }
                });
            });
        });

    if let Some(filename) = clicked {
        let result = state.select(&filename);
        state.report_result("Select", result);
    }
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open dataset folder")
        .set_directory(&state.config.root)
        .pick_folder();

    if let Some(root) = folder {
        match AppState::open(AppConfig::from_root(&root)) {
            Ok(opened) => {
                log::info!("Opened dataset at {}", root.display());
                *state = opened;
            }
            Err(e) => {
                log::error!("Failed to open dataset: {e:#}");
                state.status = Some(StatusMessage::Error(format!("Error: {e:#}")));
            }
        }
    }
}

fn export_report_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export validation report")
        .add_filter("JSON", &["json"])
        .set_file_name("validation_report.json")
        .save_file();

    if let Some(path) = file {
        let result = state.export_report(&path);
        if state.report_result("Export", result).is_some() {
            state.set_info(format!("Report written to {}", path.display()));
        }
    }
}
