use log::{debug, error, info, warn};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILENAME: &str = ".facybox_settings.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Backdrop opacity in `0.0..=1.0`; `None` (YAML `~`) disables the backdrop.
    #[serde(default = "default_opacity")]
    pub opacity: Option<f32>,

    #[serde(default = "default_true")]
    pub overlay: bool,

    /// Suppresses ESC-to-close and backdrop-click-to-close.
    #[serde(default)]
    pub modal: bool,

    #[serde(default = "default_image_types")]
    pub image_types: Vec<String>,

    /// Deprecated spelling of `imageTypes`. Wins over it when present.
    #[serde(
        default,
        rename = "image_types",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_image_types: Option<Vec<String>>,

    /// Defer building the popup chrome until the first time it is needed.
    #[serde(default)]
    pub no_autoload: bool,

    /// Seconds before a fetch or image load is given up on.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: f64,

    /// Border colour (hex) per content class tag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
}

fn default_opacity() -> Option<f32> {
    Some(0.3)
}

fn default_true() -> bool {
    true
}

fn default_image_types() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_load_timeout() -> f64 {
    30.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opacity: default_opacity(),
            overlay: true,
            modal: false,
            image_types: default_image_types(),
            legacy_image_types: None,
            no_autoload: false,
            load_timeout_secs: default_load_timeout(),
            styles: BTreeMap::new(),
        }
    }
}

/// Partial settings supplied when binding links; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverride {
    pub opacity: Option<Option<f32>>,
    pub overlay: Option<bool>,
    pub modal: Option<bool>,
    pub image_types: Option<Vec<String>>,
    pub no_autoload: Option<bool>,
    pub load_timeout_secs: Option<f64>,
}

impl Settings {
    pub fn merge(&mut self, overrides: SettingsOverride) {
        if let Some(opacity) = overrides.opacity {
            self.opacity = opacity;
        }
        if let Some(overlay) = overrides.overlay {
            self.overlay = overlay;
        }
        if let Some(modal) = overrides.modal {
            self.modal = modal;
        }
        if let Some(image_types) = overrides.image_types {
            self.image_types = image_types;
        }
        if let Some(no_autoload) = overrides.no_autoload {
            self.no_autoload = no_autoload;
        }
        if let Some(timeout) = overrides.load_timeout_secs {
            self.load_timeout_secs = timeout;
        }
    }

    /// Moves deprecated keys into their canonical fields.
    fn make_backwards_compatible(&mut self) {
        if let Some(legacy) = self.legacy_image_types.take() {
            debug!("Using deprecated image_types setting: {legacy:?}");
            self.image_types = legacy;
        }
    }
}

/// Settings frozen for the lifetime of a lightbox, with the image matcher
/// compiled from the configured extensions.
#[derive(Debug, Clone)]
pub struct Config {
    settings: Settings,
    image_matcher: Option<Regex>,
}

impl Config {
    pub fn new(mut settings: Settings) -> Self {
        settings.make_backwards_compatible();
        let image_matcher = build_image_matcher(&settings.image_types);
        Self {
            settings,
            image_matcher,
        }
    }

    pub fn opacity(&self) -> Option<f32> {
        self.settings.opacity
    }

    pub fn overlay(&self) -> bool {
        self.settings.overlay
    }

    pub fn modal(&self) -> bool {
        self.settings.modal
    }

    pub fn no_autoload(&self) -> bool {
        self.settings.no_autoload
    }

    pub fn image_types(&self) -> &[String] {
        &self.settings.image_types
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.settings.load_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_load_timeout()))
    }

    pub fn style_for(&self, class_tag: &str) -> Option<&str> {
        self.settings.styles.get(class_tag).map(String::as_str)
    }

    /// True when `href` names one of the configured image types. The match is
    /// unanchored, so `photo.jpg?size=large` counts as an image.
    pub fn is_image_href(&self, href: &str) -> bool {
        self.image_matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(href))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn build_image_matcher(image_types: &[String]) -> Option<Regex> {
    if image_types.is_empty() {
        return None;
    }
    let alternatives = image_types
        .iter()
        .map(|ext| regex::escape(ext))
        .collect::<Vec<_>>()
        .join("|");
    match RegexBuilder::new(&format!(r"\.({alternatives})"))
        .case_insensitive(true)
        .build()
    {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            warn!("Could not build image matcher from {image_types:?}: {e}");
            None
        }
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(SETTINGS_FILENAME))
}

/// Reads settings from `path`, writing a default file if none exists.
/// Unreadable or malformed files fall back to defaults.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        info!(
            "Settings file not found at {:?}, creating with defaults",
            path
        );
        let settings = Settings::default();
        save_settings_to_file(&settings, path);
        return settings;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {:?}", path),
        Err(e) => error!("Failed to save settings to {:?}: {}", path, e),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    match settings.opacity {
        Some(opacity) => content.push_str(&format!("opacity: {opacity}\n")),
        None => content.push_str("opacity: ~\n"),
    }
    content.push_str(&format!("overlay: {}\n", settings.overlay));
    content.push_str(&format!("modal: {}\n", settings.modal));
    content.push_str(&format!(
        "imageTypes: [{}]\n",
        settings.image_types.join(", ")
    ));
    content.push_str(&format!("noAutoload: {}\n", settings.no_autoload));
    content.push_str(&format!(
        "loadTimeoutSecs: {}\n",
        settings.load_timeout_secs
    ));
    content.push('\n');
    content.push_str(STYLES_TEMPLATE);

    if settings.styles.is_empty() {
        content.push_str("styles: {}\n");
    } else {
        content.push_str("styles:\n");
        for (tag, colour) in &settings.styles {
            content.push_str(&format!("  {tag}: \"{colour}\"\n"));
        }
    }

    content
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# facybox settings
# ============================================================================
# opacity: backdrop opacity between 0 and 1, or ~ to disable the backdrop
# modal:   when true, ESC and clicks on the backdrop do not close the popup

"#;

const STYLES_TEMPLATE: &str = r#"# Border colours per content class tag. A link with rel="facybox.terms"
# opens with the "terms" tag.
#
# Example:
#   terms: "7FB4CA"
#   warning: "C34043"

"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.opacity(), Some(0.3));
        assert!(config.overlay());
        assert!(!config.modal());
        assert_eq!(config.image_types(), ["png", "jpg", "jpeg", "gif"]);
    }

    #[test]
    fn test_image_matcher_is_case_insensitive_and_unanchored() {
        let config = Config::default();
        assert!(config.is_image_href("photo.jpg"));
        assert!(config.is_image_href("PHOTO.JPEG"));
        assert!(config.is_image_href("/img/a.png?size=large"));
        assert!(!config.is_image_href("page.html"));
    }

    #[test]
    fn test_empty_image_types_never_match() {
        let config = Config::new(Settings {
            image_types: Vec::new(),
            ..Settings::default()
        });
        assert!(!config.is_image_href("photo.jpg"));
    }

    #[test]
    fn test_extensions_are_escaped() {
        let config = Config::new(Settings {
            image_types: vec!["c++".to_string()],
            ..Settings::default()
        });
        assert!(config.is_image_href("diagram.c++"));
        assert!(!config.is_image_href("diagram.cc"));
    }

    #[test]
    fn test_merge_only_touches_given_fields() {
        let mut settings = Settings::default();
        settings.merge(SettingsOverride {
            modal: Some(true),
            opacity: Some(None),
            ..SettingsOverride::default()
        });
        assert!(settings.modal);
        assert_eq!(settings.opacity, None);
        assert!(settings.overlay);
        assert_eq!(settings.image_types.len(), 4);
    }

    #[test]
    fn test_legacy_image_types_take_precedence() {
        let yaml = "imageTypes: [png]\nimage_types: [webp, bmp]\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        let config = Config::new(settings);
        assert_eq!(config.image_types(), ["webp", "bmp"]);
        assert!(config.is_image_href("a.webp"));
        assert!(!config.is_image_href("a.png"));
    }

    #[test]
    fn test_null_opacity_from_yaml() {
        let settings: Settings = serde_yaml::from_str("opacity: ~\n").unwrap();
        assert_eq!(settings.opacity, None);
        assert!(settings.overlay);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        let settings = load_settings(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());

        let reloaded = load_settings(&path);
        assert_eq!(reloaded, Settings::default());
    }

    #[test]
    fn test_generated_yaml_round_trips_styles_and_null_opacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        let mut settings = Settings {
            opacity: None,
            modal: true,
            ..Settings::default()
        };
        settings
            .styles
            .insert("terms".to_string(), "7FB4CA".to_string());
        save_settings_to_file(&settings, &path);

        assert_eq!(load_settings(&path), settings);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "opacity: [not, a, number]\n").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
    }
}
