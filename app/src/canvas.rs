use eframe::egui::{
    self, Color32, ColorImage, Pos2, Rect, Sense, TextureHandle, TextureOptions, Ui, Vec2,
};
use reco::{AppConfig, RawBitmap};

/// A rasterized drawing surface.
///
/// Mouse drags paint round-cap strokes directly into an RGBA pixel buffer,
/// which is uploaded as a texture for display and exported as a
/// [`RawBitmap`] for recognition.
pub struct Canvas {
    width: u32,
    height: u32,
    background: Color32,
    ink: Color32,
    brush_radius: f32,
    image: ColorImage,
    texture: Option<TextureHandle>,
    dirty: bool,
    last_point: Option<Pos2>,
}

impl Canvas {
    pub fn new(config: &AppConfig) -> Self {
        let background = color_from_rgba(config.background_color);
        let size = [config.canvas_width as usize, config.canvas_height as usize];
        let pixels = vec![background; size[0] * size[1]];
        Self {
            width: config.canvas_width,
            height: config.canvas_height,
            background,
            ink: color_from_rgba(config.ink_color),
            brush_radius: config.brush_size as f32 / 2.0,
            image: ColorImage { size, pixels },
            texture: None,
            dirty: true,
            last_point: None,
        }
    }

    /// Refills the whole surface with the background color.
    pub fn clear(&mut self) {
        for pixel in &mut self.image.pixels {
            *pixel = self.background;
        }
        self.dirty = true;
    }

    /// Exports the current surface as raw RGBA pixels.
    pub fn to_bitmap(&self) -> RawBitmap {
        let mut rgba = Vec::with_capacity(self.image.pixels.len() * 4);
        for pixel in &self.image.pixels {
            rgba.extend_from_slice(&pixel.to_array());
        }
        RawBitmap::new(self.width, self.height, rgba)
    }

    /// Draws the canvas and handles pointer painting.
    pub fn ui(&mut self, ui: &mut Ui) {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let (response, painter) = ui.allocate_painter(size, Sense::drag());

        if response.dragged() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let offset = pointer - response.rect.min;
                let current = Pos2::new(offset.x, offset.y);
                let start = if response.drag_started() {
                    current
                } else {
                    self.last_point.unwrap_or(current)
                };
                self.stroke(start, current);
                self.last_point = Some(current);
            }
        }
        if response.drag_stopped() {
            self.last_point = None;
        }

        if self.dirty {
            match &mut self.texture {
                Some(texture) => texture.set(self.image.clone(), TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ui.ctx().load_texture(
                        "drawing-canvas",
                        self.image.clone(),
                        TextureOptions::LINEAR,
                    ));
                }
            }
            self.dirty = false;
        }

        if let Some(texture) = &self.texture {
            painter.image(
                texture.id(),
                response.rect,
                Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        painter.rect_stroke(
            response.rect,
            egui::CornerRadius::ZERO,
            egui::Stroke::new(1.0, Color32::GRAY),
            egui::StrokeKind::Outside,
        );
    }

    /// Paints a line segment by stamping the brush at pixel intervals, which
    /// gives the stroke round caps and joins.
    fn stroke(&mut self, from: Pos2, to: Pos2) {
        let steps = from.distance(to).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(from.lerp(to, t));
        }
        self.dirty = true;
    }

    fn stamp(&mut self, center: Pos2) {
        let radius = self.brush_radius;
        let min_x = (center.x - radius).floor().max(0.0) as u32;
        let max_x = ((center.x + radius).ceil() as u32).min(self.width.saturating_sub(1));
        let min_y = (center.y - radius).floor().max(0.0) as u32;
        let max_y = ((center.y + radius).ceil() as u32).min(self.height.saturating_sub(1));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= radius * radius {
                    self.image.pixels[(y * self.width + x) as usize] = self.ink;
                }
            }
        }
    }
}

fn color_from_rgba([r, g, b, a]: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, a)
}
