use crate::error::LoadError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ratatui::{buffer::Buffer, layout::Rect, style::Color};
use std::sync::Arc;

/// Upper half block: the foreground paints the top pixel, the background the
/// bottom one, so each cell shows two square-ish pixels.
const HALF_BLOCK: &str = "▀";

/// A decoded image ready to be drawn into the content slot.
#[derive(Debug, Clone)]
pub struct PopupImage {
    href: String,
    image: Arc<DynamicImage>,
}

impl PopupImage {
    pub fn decode(href: &str, bytes: &[u8]) -> Result<Self, LoadError> {
        let image = image::load_from_memory(bytes).map_err(|source| LoadError::Decode {
            href: href.to_string(),
            source,
        })?;
        Ok(Self {
            href: href.to_string(),
            image: Arc::new(image),
        })
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Size in cells that fits within `max_width` x `max_height`, keeping the
    /// aspect ratio and never enlarging the image.
    pub fn cell_size(&self, max_width: u16, max_height: u16) -> (u16, u16) {
        let (width, height) = self.pixel_size();
        if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
            return (0, 0);
        }
        let scale = 1f64
            .min(f64::from(max_width) / f64::from(width))
            .min(f64::from(max_height) * 2.0 / f64::from(height));
        let cols = (f64::from(width) * scale).round().max(1.0);
        let rows = (f64::from(height) * scale / 2.0).ceil().max(1.0);
        (
            (cols as u16).min(max_width),
            (rows as u16).min(max_height),
        )
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let area = area.intersection(buf.area);
        if area.is_empty() {
            return;
        }
        let scaled = self
            .image
            .resize_exact(
                u32::from(area.width),
                u32::from(area.height) * 2,
                FilterType::Triangle,
            )
            .to_rgba8();

        for row in 0..area.height {
            for col in 0..area.width {
                let top = scaled.get_pixel(u32::from(col), u32::from(row) * 2);
                let bottom = scaled.get_pixel(u32::from(col), u32::from(row) * 2 + 1);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(HALF_BLOCK)
                        .set_fg(Color::Rgb(top[0], top[1], top[2]))
                        .set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
                }
            }
        }
    }
}
