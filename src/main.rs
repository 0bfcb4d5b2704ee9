mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use std::path::PathBuf;

use app::FundusBrowserApp;
use clap::Parser;
use config::AppConfig;
use eframe::egui;
use state::AppState;

/// Browse, validate and curate a glaucoma fundus image dataset.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Dataset root holding `images/` and `metadata/` (defaults to the current directory).
    dataset_root: Option<PathBuf>,
}

fn main() -> eframe::Result {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli
        .dataset_root
        .map(AppConfig::from_root)
        .unwrap_or_default();
    log::info!("Dataset root: {}", config.root.display());

    let state = match AppState::open(config) {
        Ok(state) => state,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("fundus-browser: {e:#}");
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 860.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Fundus Browser – Glaucoma Dataset",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(FundusBrowserApp::new(state)))
        }),
    )
}
