use eframe::egui::{self, ColorImage, TextureOptions};

use crate::color::LabelColors;
use crate::state::{AppState, ModelEvent};
use crate::ui::form::{self, RecordForm};
use crate::ui::{panels, plot, viewer};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct FundusBrowserApp {
    pub state: AppState,
    form: RecordForm,
    /// GPU copy of `state.view().image`; replaced on every selection change.
    texture: Option<egui::TextureHandle>,
    colors: LabelColors,
}

impl FundusBrowserApp {
    pub fn new(state: AppState) -> Self {
        let colors = LabelColors::new(&state.dataset().labels());
        Self {
            state,
            form: RecordForm::default(),
            texture: None,
            colors,
        }
    }

    /// Apply model notifications to the view-side caches.
    fn sync(&mut self, ctx: &egui::Context) {
        let events = self.state.take_events();
        if events.is_empty() {
            return;
        }

        let mut refresh_texture = false;
        for event in events {
            match event {
                ModelEvent::SelectionChanged(selected) => {
                    refresh_texture = true;
                    match selected.as_deref().and_then(|name| self.state.dataset().get(name)) {
                        Some(record) => self.form.load_from(record),
                        None => self.form.reset(),
                    }
                }
                ModelEvent::ImageFailed { filename, message } => {
                    log::debug!("No pixels for {filename}: {message}");
                    refresh_texture = true;
                }
                ModelEvent::DatasetChanged => {
                    self.colors = LabelColors::new(&self.state.dataset().labels());
                    if self.state.view().image.is_none() {
                        refresh_texture = true;
                    }
                    let stale = self
                        .form
                        .editing
                        .as_deref()
                        .is_some_and(|name| self.state.view().selected.as_deref() != Some(name));
                    if stale {
                        self.form.reset();
                    }
                }
            }
        }

        if refresh_texture {
            // Dropping the old handle frees the previous texture.
            self.texture = self.state.view().image.as_ref().map(|buffer| {
                let image = ColorImage::from_rgba_unmultiplied(buffer.size(), buffer.rgba.as_raw());
                ctx.load_texture(&buffer.filename, image, TextureOptions::LINEAR)
            });
        }
        ctx.request_repaint();
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (down, up) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::ArrowDown),
                i.key_pressed(egui::Key::ArrowUp),
            )
        });
        if down {
            let result = self.state.select_next();
            self.state.report_result("Select", result);
        } else if up {
            let result = self.state.select_previous();
            self.state.report_result("Select", result);
        }
    }
}

impl eframe::App for FundusBrowserApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync(ctx);
        self.handle_keys(ctx);

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Bottom panel: label distribution ----
        egui::TopBottomPanel::bottom("label_chart")
            .resizable(true)
            .default_height(160.0)
            .show(ctx, |ui| {
                plot::label_chart(ui, &self.state, &self.colors);
            });

        // ---- Left side panel: register / edit form ----
        egui::SidePanel::left("record_form")
            .default_width(300.0)
            .resizable(true)
            .show(ctx, |ui| {
                form::side_panel(ui, &mut self.state, &mut self.form);
            });

        // ---- Right side panel: filters and records ----
        egui::SidePanel::right("records")
            .default_width(420.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::records_panel(ui, &mut self.state, &self.colors);
            });

        // ---- Central panel: image ----
        egui::CentralPanel::default().show(ctx, |ui| {
            viewer::image_view(ui, &self.state, self.texture.as_ref(), &self.colors);
        });

        self.sync(ctx);
    }
}
