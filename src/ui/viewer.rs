use eframe::egui::{self, Color32, RichText, ScrollArea, TextureHandle, Ui};

use crate::color::LabelColors;
use crate::data::validate::ValidationReport;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Image viewer (central panel)
// ---------------------------------------------------------------------------

/// Render the selected record and its image in the central panel.
pub fn image_view(ui: &mut Ui, state: &AppState, texture: Option<&TextureHandle>, colors: &LabelColors) {
    if let Some(report) = &state.report {
        report_section(ui, report);
        ui.separator();
    }

    let Some(record) = state.selected_record() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Select a record to view its image  (↑/↓ to browse)");
        });
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.heading(&record.filename);
        ui.label(record.split.to_string());
        let label = record.label.as_deref();
        ui.label(
            RichText::new(label.unwrap_or("unlabelled"))
                .strong()
                .color(colors.color_for(label)),
        );
    });

    ui.label(
        RichText::new(state.repo().path_of(record.split, &record.filename).display().to_string())
            .small()
            .weak(),
    );

    match (texture, &state.view().image) {
        (Some(texture), Some(buffer)) => {
            ui.label(
                RichText::new(format!("{} × {} px", buffer.width, buffer.height))
                    .small()
                    .weak(),
            );
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.add(egui::Image::new(texture).shrink_to_fit());
            });
        }
        _ => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.label(RichText::new("Image unavailable").color(Color32::RED));
            });
        }
    }
}

fn report_section(ui: &mut Ui, report: &ValidationReport) {
    let color = if report.is_clean() {
        Color32::DARK_GREEN
    } else {
        Color32::from_rgb(200, 120, 0)
    };
    egui::CollapsingHeader::new(RichText::new(report.summary()).color(color))
        .id_salt("validation_report")
        .default_open(!report.is_clean())
        .show(ui, |ui: &mut Ui| {
            ScrollArea::vertical()
                .max_height(160.0)
                .show(ui, |ui: &mut Ui| {
                    for orphan in &report.orphaned_records {
                        ui.label(format!("missing file: {}/{}", orphan.split.dir_name(), orphan.filename));
                    }
                    for orphan in &report.orphaned_files {
                        ui.label(format!("no record: {}/{}", orphan.split.dir_name(), orphan.filename));
                    }
                    for orphan in &report.unsupported_records {
                        ui.label(format!("unsupported format: {}/{}", orphan.split.dir_name(), orphan.filename));
                    }
                });
        });
}
