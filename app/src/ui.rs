use crate::app::RecognizerApp;

use eframe::egui::{self, Color32, ProgressBar, RichText, Ui};
use reco::PredictionSource;

/// Draws the left-side panel with the controls and the results view.
pub fn draw_side_panel(app: &mut RecognizerApp, ctx: &egui::Context) {
    egui::SidePanel::left("controls_panel")
        .min_width(320.0)
        .show(ctx, |ui| {
            ui.heading("Digit Recognizer");
            ui.separator();

            if let Some(warning) = &app.model_warning {
                ui.colored_label(Color32::from_rgb(200, 90, 0), warning);
                ui.separator();
            }

            ui.horizontal(|ui| {
                if ui.button("Recognize").clicked() {
                    app.recognize();
                }
                if ui.button("Clear").clicked() {
                    app.clear();
                }
            });
            ui.separator();

            draw_results(app, ui);
        });
}

/// Draws the central panel containing the drawing canvas.
pub fn draw_central_panel(app: &mut RecognizerApp, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.label("Drawing canvas:");
            ui.add_space(4.0);
            app.canvas.ui(ui);
        });
    });
}

/// One probability bar per digit class, with the arg-max row highlighted.
fn draw_results(app: &RecognizerApp, ui: &mut Ui) {
    ui.heading("Recognition results");

    let Some(result) = &app.last_result else {
        ui.label("Draw a digit and press Recognize.");
        return;
    };

    if result.digit >= 0 {
        ui.label(
            RichText::new(format!(
                "Result: {} (probability: {:.1}%)",
                result.digit,
                result.confidence * 100.0
            ))
            .strong(),
        );
    } else {
        ui.label(RichText::new("No prediction available").strong());
    }
    if result.source == PredictionSource::Fallback {
        ui.small("Model unavailable: showing a neutral distribution.");
    }
    ui.add_space(4.0);

    for (digit, &probability) in result.probabilities.iter().enumerate() {
        let percentage = probability * 100.0;
        let mut bar =
            ProgressBar::new(probability).text(format!("{}%", percentage.round() as i32));
        if digit as i32 == result.digit {
            bar = bar.fill(Color32::from_rgb(70, 140, 240));
        }
        ui.horizontal(|ui| {
            ui.label(format!("{digit}:"));
            ui.add(bar);
        });
    }
}
