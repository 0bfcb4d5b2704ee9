use eframe::egui::Ui;
use egui_plot::{Bar, BarChart, Legend, Plot};

use crate::color::LabelColors;
use crate::data::model::Split;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Label distribution (bottom panel)
// ---------------------------------------------------------------------------

const GROUP_WIDTH: f64 = 0.8;

/// Grouped bar chart: one group per split, one bar per label.
pub fn label_chart(ui: &mut Ui, state: &AppState, colors: &LabelColors) {
    let dataset = state.dataset();
    if dataset.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("No records yet.");
        });
        return;
    }

    let counts = dataset.label_counts();
    let mut labels: Vec<Option<String>> = dataset.labels().into_iter().map(Some).collect();
    if counts.keys().any(|(_, label)| label.is_none()) {
        labels.push(None);
    }
    let bar_width = GROUP_WIDTH / labels.len() as f64;

    let charts: Vec<BarChart> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let name = label.clone().unwrap_or_else(|| "(unlabelled)".to_string());
            let offset = -GROUP_WIDTH / 2.0 + bar_width * (i as f64 + 0.5);
            let bars = Split::ALL
                .iter()
                .enumerate()
                .map(|(group, split)| {
                    let n = counts.get(&(*split, label.clone())).copied().unwrap_or(0);
                    Bar::new(group as f64 + offset, n as f64)
                        .width(bar_width * 0.9)
                        .name(format!("{split} / {name}"))
                })
                .collect();
            BarChart::new(bars)
                .name(&name)
                .color(colors.color_for(label.as_deref()))
        })
        .collect();

    Plot::new("label_chart")
        .legend(Legend::default())
        .x_axis_label("0 = Train   1 = Validation   2 = Test")
        .y_axis_label("Images")
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .allow_boxed_zoom(false)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}
