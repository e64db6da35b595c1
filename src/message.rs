//! Messaging format between the settings UI and the engine

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, StoredSettings};
use crate::scheduler::ScanReport;

/// Commands accepted from the messaging channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Settings record as saved by the popup
    UpdateSettings(SettingsUpdate),
    ApplyConfiguration { config: Configuration },
    ClearHighlights,
}

/// Body of an `updateSettings` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingsUpdate {
    /// `{"action": "updateSettings", "settings": {...}}`
    Nested { settings: StoredSettings },
    /// Older popup: `{"action": "updateSettings", "filterWords": ..., "highlightColor": ...}`
    Flat(StoredSettings),
}

impl SettingsUpdate {
    pub fn settings(&self) -> &StoredSettings {
        match self {
            SettingsUpdate::Nested { settings } | SettingsUpdate::Flat(settings) => settings,
        }
    }
}

impl Command {
    pub fn update_settings(settings: StoredSettings) -> Self {
        Command::UpdateSettings(SettingsUpdate::Nested { settings })
    }

    pub fn configuration(&self) -> Option<Configuration> {
        match self {
            Command::UpdateSettings(update) => Some(update.settings().clone().into()),
            Command::ApplyConfiguration { config } => Some(config.clone()),
            Command::ClearHighlights => None,
        }
    }
}

/// Summary returned to the messaging channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub ok: bool,
    /// The command arrived during a pass and was ignored
    pub busy: bool,
    pub match_count: usize,
    pub process_time_millis: u64,
    /// Annotations removed by the command
    pub removed: usize,
}

impl CommandResponse {
    pub fn busy() -> Self {
        Self {
            ok: false,
            busy: true,
            ..Self::default()
        }
    }

    pub fn removed(removed: usize) -> Self {
        Self {
            ok: true,
            removed,
            ..Self::default()
        }
    }

    pub fn from_report(report: &ScanReport, removed: usize) -> Self {
        Self {
            ok: true,
            busy: false,
            match_count: report.match_count,
            process_time_millis: report.process_time_millis,
            removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    #[test]
    fn test_parse_update_settings() {
        let json = r##"{
            "action": "updateSettings",
            "settings": {"keywords": "cat,dog", "selectedColor": "#4caf50", "highlightMode": true}
        }"##;
        let command: Command = serde_json::from_str(json).unwrap();
        let config = command.configuration().unwrap();

        assert_eq!(config.keywords, vec!["cat", "dog"]);
        assert_eq!(config.mode, Mode::Highlight);
        assert_eq!(config.color, "#4caf50");
    }

    #[test]
    fn test_parse_legacy_flat_update() {
        let json = r##"{"action": "updateSettings", "filterWords": "spoiler, leak", "highlightColor": "#ff9800"}"##;
        let command: Command = serde_json::from_str(json).unwrap();
        assert!(matches!(command, Command::UpdateSettings(SettingsUpdate::Flat(_))));

        let config = command.configuration().unwrap();
        assert_eq!(config.keywords, vec!["spoiler", "leak"]);
        assert_eq!(config.color, "#ff9800");
        assert_eq!(config.mode, Mode::Highlight);
    }

    #[test]
    fn test_nested_update_round_trips_as_nested() {
        let command = Command::update_settings(StoredSettings {
            keywords: "cat".to_string(),
            highlight_mode: Some(false),
            ..StoredSettings::default()
        });
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["action"], "updateSettings");
        assert_eq!(value["settings"]["keywords"], "cat");

        let parsed: Command = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, command);
        assert_eq!(parsed.configuration().unwrap().mode, Mode::Hide);
    }

    #[test]
    fn test_parse_clear() {
        let command: Command = serde_json::from_str(r#"{"action": "clearHighlights"}"#).unwrap();
        assert_eq!(command, Command::ClearHighlights);
        assert!(command.configuration().is_none());
    }

    #[test]
    fn test_parse_apply_configuration() {
        let json = r#"{"action": "applyConfiguration", "config": {"keywords": ["x"], "mode": "hide"}}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(command.configuration().unwrap().mode, Mode::Hide);
    }

    #[test]
    fn test_response_wire_format() {
        let value = serde_json::to_value(CommandResponse::busy()).unwrap();
        assert_eq!(value["busy"], true);
        assert_eq!(value["matchCount"], 0);
        assert_eq!(value["processTimeMillis"], 0);
    }
}
