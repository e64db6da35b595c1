//! Configuration types and defaults
//!
//! `Configuration` is the value applied to the engine. `StoredSettings` is the
//! record the settings UI persists; it converts into a `Configuration`.

use serde::{Deserialize, Serialize};

/// Highlight color used when none is configured
pub const DEFAULT_COLOR: &str = "#ffeb3b";

/// Default number of text units processed per chunk before yielding
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Default window (ms) in which mutation notifications are coalesced
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Separator accepted inside keyword entries
pub const KEYWORD_SEPARATOR: char = ',';

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Highlight,
    Hide,
}

/// Immutable-per-apply engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub auto_update: bool,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            case_sensitive: false,
            mode: Mode::Highlight,
            color: default_color(),
            auto_update: false,
        }
    }
}

impl Configuration {
    /// Convenience constructor for a highlight configuration
    pub fn highlight(keywords: &[&str], color: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            color: color.to_string(),
            ..Self::default()
        }
    }

    /// Convenience constructor for a hide configuration
    pub fn hide(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            mode: Mode::Hide,
            ..Self::default()
        }
    }

    /// True when the pattern must be rebuilt going from `self` to `other`
    pub fn pattern_differs(&self, other: &Configuration) -> bool {
        self.keywords != other.keywords || self.case_sensitive != other.case_sensitive
    }

    /// True when annotations created under `self` are stale under `other`.
    /// Only `auto_update` may change without invalidating them.
    pub fn invalidates(&self, other: &Configuration) -> bool {
        self.pattern_differs(other) || self.mode != other.mode || self.color != other.color
    }
}

// =============================================================================
// Persisted settings record
// =============================================================================

/// Settings record as persisted by the settings UI.
///
/// The older popup stored only `filterWords` and `highlightColor` and always
/// highlighted, so a record without `highlightMode` means highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    /// Comma separated keyword list
    #[serde(default, alias = "filterWords")]
    pub keywords: String,
    #[serde(default = "default_color", alias = "highlightColor")]
    pub selected_color: String,
    /// true = highlight matches, false = hide them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_mode: Option<bool>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub auto_highlight: bool,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            selected_color: default_color(),
            highlight_mode: None,
            case_sensitive: false,
            auto_highlight: false,
        }
    }
}

impl From<StoredSettings> for Configuration {
    fn from(settings: StoredSettings) -> Self {
        let keywords = settings
            .keywords
            .split(KEYWORD_SEPARATOR)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        Configuration {
            keywords,
            case_sensitive: settings.case_sensitive,
            mode: match settings.highlight_mode {
                Some(false) => Mode::Hide,
                Some(true) | None => Mode::Highlight,
            },
            color: settings.selected_color,
            auto_update: settings.auto_highlight,
        }
    }
}

/// Read side of the settings store
pub trait SettingsSource {
    /// Stored configuration, or None when nothing has been saved yet
    fn load(&self) -> Option<Configuration>;
}

impl SettingsSource for Configuration {
    fn load(&self) -> Option<Configuration> {
        Some(self.clone())
    }
}

// =============================================================================
// Engine options
// =============================================================================

/// Scheduler tuning, fixed for the lifetime of an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Prefix for generated annotation ids
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_id_prefix() -> String {
    "kittmark".to_string()
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            id_prefix: default_id_prefix(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Configuration::default();
        assert!(config.keywords.is_empty());
        assert!(!config.case_sensitive);
        assert_eq!(config.mode, Mode::Highlight);
        assert_eq!(config.color, DEFAULT_COLOR);
        assert!(!config.auto_update);
    }

    #[test]
    fn test_config_parsing_with_defaults() {
        let json = r#"{"keywords": ["cat", "dog"], "mode": "hide"}"#;
        let config: Configuration = serde_json::from_str(json).unwrap();

        assert_eq!(config.keywords, vec!["cat", "dog"]);
        assert_eq!(config.mode, Mode::Hide);
        assert_eq!(config.color, DEFAULT_COLOR);
        assert!(!config.case_sensitive);
    }

    #[test]
    fn test_config_camel_case_fields() {
        let json = r##"{"keywords": ["x"], "caseSensitive": true, "autoUpdate": true, "color": "#4caf50"}"##;
        let config: Configuration = serde_json::from_str(json).unwrap();

        assert!(config.case_sensitive);
        assert!(config.auto_update);
        assert_eq!(config.color, "#4caf50");
    }

    #[test]
    fn test_invalidation_rules() {
        let base = Configuration::highlight(&["cat"], "#ffeb3b");

        let mut auto = base.clone();
        auto.auto_update = true;
        assert!(!base.invalidates(&auto), "autoUpdate alone keeps annotations");

        let mut recolored = base.clone();
        recolored.color = "#f44336".to_string();
        assert!(base.invalidates(&recolored));
        assert!(!base.pattern_differs(&recolored));

        let mut hidden = base.clone();
        hidden.mode = Mode::Hide;
        assert!(base.invalidates(&hidden));

        let mut cased = base.clone();
        cased.case_sensitive = true;
        assert!(base.pattern_differs(&cased));
    }

    #[test]
    fn test_stored_settings_conversion() {
        let json = r##"{
            "keywords": "cat, dog,, ",
            "selectedColor": "#e91e63",
            "highlightMode": true,
            "caseSensitive": false,
            "autoHighlight": true
        }"##;
        let settings: StoredSettings = serde_json::from_str(json).unwrap();
        let config = Configuration::from(settings);

        assert_eq!(config.keywords, vec!["cat", "dog"]);
        assert_eq!(config.mode, Mode::Highlight);
        assert_eq!(config.color, "#e91e63");
        assert!(config.auto_update);
    }

    #[test]
    fn test_stored_settings_legacy_aliases() {
        let json = r##"{"filterWords": "spoiler", "highlightColor": "#00bcd4"}"##;
        let settings: StoredSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.keywords, "spoiler");
        assert_eq!(settings.selected_color, "#00bcd4");

        // The older popup never stored a mode and always highlighted
        let config = Configuration::from(settings);
        assert_eq!(config.mode, Mode::Highlight);
        assert_eq!(config.color, "#00bcd4");
        assert_eq!(config.keywords, vec!["spoiler"]);
    }

    #[test]
    fn test_stored_settings_explicit_hide() {
        let json = r#"{"keywords": "spoiler", "highlightMode": false}"#;
        let settings: StoredSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.highlight_mode, Some(false));
        assert_eq!(Configuration::from(settings).mode, Mode::Hide);
    }

    #[test]
    fn test_engine_options_defaults() {
        let options: EngineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(options.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(options, EngineOptions::default());
    }
}
