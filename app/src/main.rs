mod app;
mod canvas;
mod ui;

use app::RecognizerApp;
use eframe::egui;

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> eframe::Result<()> {
    init_tracing();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([820.0, 460.0])
            .with_min_inner_size([800.0, 420.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Handwritten Digit Recognizer",
        native_options,
        Box::new(|_cc| Ok(Box::new(RecognizerApp::default()))),
    )
}
