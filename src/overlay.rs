//! Status text drawn into previewed frames.

use crate::frame::VideoFrame;
use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use fontdb::{Database, Family, Query};
use tracing::{debug, warn};

/// Renders the frame-rate and effect status lines.
pub struct Overlay {
    font: FontVec,
}

impl Overlay {
    /// Loads a sans-serif system font, or `None` with a warning if there is none.
    pub fn from_system_fonts() -> Option<Self> {
        let mut db = Database::new();
        db.load_system_fonts();
        let query = Query {
            families: &[Family::SansSerif, Family::Monospace],
            ..Query::default()
        };
        let Some(id) = db.query(&query).or_else(|| db.faces().next().map(|f| f.id)) else {
            warn!("No system fonts found, frame rate overlay disabled");
            return None;
        };
        let font = db
            .with_face_data(id, |data, index| FontVec::try_from_vec_and_index(data.to_vec(), index).ok())
            .flatten();
        match font {
            Some(font) => {
                debug!("Overlay font loaded");
                Some(Self::from_font(font))
            }
            None => {
                warn!("Failed to parse overlay font, frame rate overlay disabled");
                None
            }
        }
    }

    pub fn from_font(font: FontVec) -> Self {
        Self { font }
    }

    /// Draws the status lines bottom-left, the frame rate lowest.
    pub fn draw_status(&self, frame: &mut VideoFrame, fps: Option<f32>, effect: Option<bool>) {
        let size = (frame.height as f32 / 24.0).max(12.0);
        let margin = size / 2.0;
        let mut baseline = frame.height as f32 - margin;
        for line in status_lines(fps, effect).iter().rev() {
            self.draw_text(frame, margin, baseline, size, line);
            baseline -= size * 1.2;
        }
    }

    fn draw_text(&self, frame: &mut VideoFrame, x: f32, baseline: f32, size: f32, text: &str) {
        let scale = PxScale::from(size);
        let scaled = self.font.as_scaled(scale);
        let bpp = frame.format.bytes_per_pixel();
        let (width, height) = (frame.width as i32, frame.height as i32);
        let mut cursor = x;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(scale, point(cursor, baseline));
            cursor += scaled.h_advance(id);
            let Some(outlined) = scaled.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i32 + gx as i32;
                let py = bounds.min.y as i32 + gy as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let at = (py as usize * width as usize + px as usize) * bpp;
                for v in &mut frame.data[at..at + 3] {
                    *v = (*v as f32 + (255.0 - *v as f32) * coverage).round() as u8;
                }
            });
        }
    }
}

/// Text of the status lines, top to bottom.
fn status_lines(fps: Option<f32>, effect: Option<bool>) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(enabled) = effect {
        lines.push(format!("Effect: {}", if enabled { "on" } else { "off" }));
    }
    if let Some(fps) = fps {
        lines.push(format!("{:.1}", fps));
    }
    lines
}
