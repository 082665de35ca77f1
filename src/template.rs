use crate::settings::Config;
use ratatui::symbols::border;

/// Static skeleton of the popup chrome: a border around the body, the close
/// control, and the loading and gallery labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTemplate {
    pub border: border::Set,
    pub close_label: &'static str,
    pub loading_label: &'static str,
    pub prev_label: &'static str,
    pub next_label: &'static str,
}

/// The chrome does not depend on configuration yet; `config` is accepted so
/// callers need not change when it does.
pub fn build(_config: &Config) -> FrameTemplate {
    FrameTemplate {
        border: border::ROUNDED,
        close_label: "[×]",
        loading_label: "Loading…",
        prev_label: "◀ prev",
        next_label: "next ▶",
    }
}
