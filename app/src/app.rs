use crate::canvas::Canvas;
use crate::ui;

use eframe::egui;
use eframe::{App, Frame};
use reco::{AppConfig, ModelHandler, PredictionPipeline, PredictionResult};

/// The main application struct.
/// It holds the high-level state and delegates drawing to the `ui` module.
pub struct RecognizerApp {
    /// The recognition pipeline with the loaded (or degraded) model.
    pub pipeline: PredictionPipeline,
    /// The drawing canvas state.
    pub canvas: Canvas,
    /// The result of the last recognition request, if any.
    pub last_result: Option<PredictionResult>,
    /// Warning shown when the model failed to load at startup.
    pub model_warning: Option<String>,
}

impl Default for RecognizerApp {
    fn default() -> Self {
        let config = AppConfig::default();
        let handler = ModelHandler::load(&config.model_path);
        let model_warning = (!handler.is_loaded()).then(|| {
            format!(
                "Model not loaded from '{}'. Recognition will return neutral probabilities.",
                config.model_path.display()
            )
        });
        let pipeline = PredictionPipeline::new(Box::new(handler), config.model_input_size);
        let canvas = Canvas::new(&config);

        Self {
            pipeline,
            canvas,
            last_result: None,
            model_warning,
        }
    }
}

impl App for RecognizerApp {
    /// The main update loop, called by eframe on every frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        ui::draw_side_panel(self, ctx);
        ui::draw_central_panel(self, ctx);
    }
}

impl RecognizerApp {
    /// Runs one recognition pass over the current canvas contents.
    pub fn recognize(&mut self) {
        let bitmap = self.canvas.to_bitmap();
        let result = self.pipeline.recognize(&bitmap);
        tracing::debug!(
            "recognized digit {} with confidence {:.3}",
            result.digit,
            result.confidence
        );
        self.last_result = Some(result);
    }

    /// Clears the canvas and resets the results view.
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.last_result = None;
    }
}
