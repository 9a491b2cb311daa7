use std::path::PathBuf;

/// Static startup configuration for the application.
///
/// Everything here is fixed for the lifetime of the process; there is no
/// runtime reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Width of the drawing canvas in pixels.
    pub canvas_width: u32,
    /// Height of the drawing canvas in pixels.
    pub canvas_height: u32,
    /// Side length of the square model input, in pixels.
    pub model_input_size: u32,
    /// Directory containing the pre-trained model artifact.
    pub model_path: PathBuf,
    /// Canvas background color as RGBA.
    pub background_color: [u8; 4],
    /// Ink color as RGBA.
    pub ink_color: [u8; 4],
    /// Brush stroke width in canvas pixels.
    pub brush_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            canvas_width: 280,
            canvas_height: 280,
            model_input_size: 28,
            model_path: PathBuf::from("mnist_model"),
            background_color: [255, 255, 255, 255],
            ink_color: [0, 0, 0, 255],
            brush_size: 20,
        }
    }
}
