use crate::settings::Config;
use log::debug;
use ratatui::{buffer::Buffer, layout::Rect, style::Color};

/// The dimmed layer drawn under the popup.
#[derive(Debug, Clone, PartialEq)]
pub struct Backdrop {
    pub opacity: f32,
    /// Whether a click on the backdrop closes the popup.
    pub closes_on_click: bool,
}

/// Owns the page-wide backdrop. At most one exists at a time.
#[derive(Debug, Default)]
pub struct Overlay {
    backdrop: Option<Backdrop>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, config: &Config) {
        let Some(opacity) = visible_opacity(config) else {
            return;
        };

        if self.backdrop.is_none() {
            debug!("Creating backdrop");
        }
        let backdrop = self.backdrop.get_or_insert(Backdrop {
            opacity,
            closes_on_click: false,
        });
        backdrop.opacity = opacity;
        if !config.modal() {
            backdrop.closes_on_click = true;
        }
    }

    pub fn hide(&mut self, config: &Config) {
        if visible_opacity(config).is_none() {
            return;
        }
        if self.backdrop.take().is_some() {
            debug!("Removed backdrop");
        }
    }

    pub fn backdrop(&self) -> Option<&Backdrop> {
        self.backdrop.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.backdrop.is_some()
    }

    /// Dims everything already drawn in `area`.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let Some(backdrop) = &self.backdrop else {
            return;
        };
        let keep = 1.0 - backdrop.opacity.clamp(0.0, 1.0);
        let area = area.intersection(buf.area);
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    let fg = dim(cell.fg, keep, Color::Gray);
                    let bg = dim(cell.bg, keep, Color::Black);
                    cell.set_fg(fg).set_bg(bg);
                }
            }
        }
    }
}

fn visible_opacity(config: &Config) -> Option<f32> {
    if !config.overlay() {
        return None;
    }
    config.opacity()
}

/// Scales an RGB colour towards black. Named colours have no channels to
/// scale, so they are replaced with a scaled `fallback`.
fn dim(color: Color, keep: f32, fallback: Color) -> Color {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        _ => match fallback {
            Color::Gray => (0xC0, 0xC0, 0xC0),
            _ => (0x20, 0x20, 0x20),
        },
    };
    let scale = |channel: u8| (f32::from(channel) * keep).round() as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn config(settings: Settings) -> Config {
        Config::new(settings)
    }

    #[test]
    fn test_show_creates_single_backdrop() {
        let config = Config::default();
        let mut overlay = Overlay::new();
        overlay.show(&config);
        overlay.show(&config);
        assert_eq!(
            overlay.backdrop(),
            Some(&Backdrop {
                opacity: 0.3,
                closes_on_click: true
            })
        );
        overlay.hide(&config);
        assert!(!overlay.is_visible());
    }

    #[test]
    fn test_modal_backdrop_ignores_clicks() {
        let config = config(Settings {
            modal: true,
            ..Settings::default()
        });
        let mut overlay = Overlay::new();
        overlay.show(&config);
        assert!(!overlay.backdrop().unwrap().closes_on_click);
    }

    #[test]
    fn test_disabled_overlay_is_skipped() {
        for settings in [
            Settings {
                overlay: false,
                ..Settings::default()
            },
            Settings {
                opacity: None,
                ..Settings::default()
            },
        ] {
            let mut overlay = Overlay::new();
            overlay.show(&config(settings));
            assert!(!overlay.is_visible());
        }
    }

    #[test]
    fn test_hide_is_skipped_when_disabled() {
        let mut overlay = Overlay::new();
        overlay.show(&Config::default());
        overlay.hide(&config(Settings {
            overlay: false,
            ..Settings::default()
        }));
        assert!(overlay.is_visible());
    }

    #[test]
    fn test_render_dims_cells() {
        let mut overlay = Overlay::new();
        overlay.show(&config(Settings {
            opacity: Some(0.5),
            ..Settings::default()
        }));
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        buf[(0, 0)].set_bg(Color::Rgb(200, 100, 50));
        overlay.render(area, &mut buf);
        assert_eq!(buf[(0, 0)].bg, Color::Rgb(100, 50, 25));
        assert_eq!(buf[(1, 0)].bg, Color::Rgb(16, 16, 16));
    }
}
