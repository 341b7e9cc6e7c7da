//! Per-session preference toggles.
//!
//! Keys can be addressed in snake_case (`confirm_before_delete`) or in the
//! camelCase the web client used (`confirmBeforeDelete`).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Trigger indexing right after a successful upload.
    pub auto_index_documents: bool,
    /// Show the indexed/pending badge in document listings.
    pub show_document_badges: bool,
    /// Ask before deleting a document.
    pub confirm_before_delete: bool,
    /// Colored output on terminals.
    pub dark_mode: bool,
    /// Hide citation snippets.
    pub compact_view: bool,
    /// Print toast notifications.
    pub enable_notifications: bool,
    /// Informational only; retention is decided server-side.
    pub data_retention: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_index_documents: false,
            show_document_badges: true,
            confirm_before_delete: true,
            dark_mode: true,
            compact_view: false,
            enable_notifications: true,
            data_retention: true,
        }
    }
}

/// A partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub auto_index_documents: Option<bool>,
    pub show_document_badges: Option<bool>,
    pub confirm_before_delete: Option<bool>,
    pub dark_mode: Option<bool>,
    pub compact_view: Option<bool>,
    pub enable_notifications: Option<bool>,
    pub data_retention: Option<bool>,
}

/// Setting names in display order, with a one-line description each.
pub const SETTING_KEYS: [(&str, &str); 7] = [
    ("auto_index_documents", "Index documents automatically after upload"),
    ("show_document_badges", "Show indexing status badges on documents"),
    ("confirm_before_delete", "Ask for confirmation before deleting documents"),
    ("dark_mode", "Use colored terminal output"),
    ("compact_view", "Hide citation snippets in responses"),
    ("enable_notifications", "Show success and error notifications"),
    ("data_retention", "Keep conversation history on the server"),
];

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        let fields = [
            (&mut self.auto_index_documents, patch.auto_index_documents),
            (&mut self.show_document_badges, patch.show_document_badges),
            (&mut self.confirm_before_delete, patch.confirm_before_delete),
            (&mut self.dark_mode, patch.dark_mode),
            (&mut self.compact_view, patch.compact_view),
            (&mut self.enable_notifications, patch.enable_notifications),
            (&mut self.data_retention, patch.data_retention),
        ];
        for (field, update) in fields {
            if let Some(value) = update {
                *field = value;
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        let value = match canonical_key(key)? {
            "auto_index_documents" => self.auto_index_documents,
            "show_document_badges" => self.show_document_badges,
            "confirm_before_delete" => self.confirm_before_delete,
            "dark_mode" => self.dark_mode,
            "compact_view" => self.compact_view,
            "enable_notifications" => self.enable_notifications,
            "data_retention" => self.data_retention,
            _ => return None,
        };
        Some(value)
    }

    /// Iterate `(key, value, description)` in display order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, bool, &'static str)> + '_ {
        SETTING_KEYS.iter().map(move |(key, desc)| {
            (*key, self.get(key).unwrap_or_default(), *desc)
        })
    }
}

impl SettingsPatch {
    /// Build a single-field patch from a key and a textual value.
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        let Some(key) = canonical_key(key) else {
            bail!(
                "Unknown setting: '{}'. Known settings: {}",
                key,
                SETTING_KEYS
                    .iter()
                    .map(|(k, _)| *k)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };
        let value = parse_bool(value)?;
        let mut patch = SettingsPatch::default();
        match key {
            "auto_index_documents" => patch.auto_index_documents = Some(value),
            "show_document_badges" => patch.show_document_badges = Some(value),
            "confirm_before_delete" => patch.confirm_before_delete = Some(value),
            "dark_mode" => patch.dark_mode = Some(value),
            "compact_view" => patch.compact_view = Some(value),
            "enable_notifications" => patch.enable_notifications = Some(value),
            "data_retention" => patch.data_retention = Some(value),
            _ => unreachable!("canonical_key only returns known keys"),
        }
        Ok(patch)
    }
}

/// Map a snake_case or camelCase key to its snake_case form.
fn canonical_key(key: &str) -> Option<&'static str> {
    let normalized: String = key
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    SETTING_KEYS
        .iter()
        .map(|(k, _)| *k)
        .find(|k| k.replace('_', "") == normalized)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean '{}': use true/false, on/off, yes/no, 1/0", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_web_client() {
        let s = Settings::default();
        assert!(!s.auto_index_documents);
        assert!(s.show_document_badges);
        assert!(s.confirm_before_delete);
        assert!(s.dark_mode);
        assert!(!s.compact_view);
        assert!(s.enable_notifications);
        assert!(s.data_retention);
    }

    #[test]
    fn test_patch_only_touches_named_field() {
        let mut s = Settings::default();
        s.apply(SettingsPatch {
            compact_view: Some(true),
            ..Default::default()
        });
        assert!(s.compact_view);
        assert_eq!(
            Settings {
                compact_view: false,
                ..s
            },
            Settings::default()
        );
    }

    #[test]
    fn test_parse_accepts_camel_case() {
        let patch = SettingsPatch::parse("confirmBeforeDelete", "off").unwrap();
        assert_eq!(patch.confirm_before_delete, Some(false));
        let patch = SettingsPatch::parse("auto-index-documents", "YES").unwrap();
        assert_eq!(patch.auto_index_documents, Some(true));
    }

    #[test]
    fn test_parse_rejects_unknown_key_and_value() {
        let err = SettingsPatch::parse("theme", "on").unwrap_err();
        assert!(err.to_string().contains("Unknown setting"));
        assert!(SettingsPatch::parse("dark_mode", "maybe").is_err());
    }

    #[test]
    fn test_entries_in_display_order() {
        let keys: Vec<_> = Settings::default().entries().map(|(k, _, _)| k).collect();
        assert_eq!(keys.first(), Some(&"auto_index_documents"));
        assert_eq!(keys.len(), 7);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let s: Settings = toml::from_str("compact_view = true").unwrap();
        assert!(s.compact_view);
        assert!(s.confirm_before_delete);
    }
}
