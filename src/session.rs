//! Client-side session state persisted between CLI invocations.
//!
//! Holds the conversation new queries are appended to, the conversation the
//! user last opened, and the settings. The service owns the conversations
//! themselves; only their ids live here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::settings::Settings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Conversation that new queries continue.
    #[serde(default)]
    pub current_conversation_id: Option<String>,
    /// Conversation last opened for viewing.
    #[serde(default)]
    pub selected_conversation_id: Option<String>,
    #[serde(default)]
    pub settings: Settings,
}

/// A [`SessionState`] bound to the file it was loaded from.
#[derive(Debug)]
pub struct Session {
    path: Option<PathBuf>,
    pub state: SessionState,
}

/// A fresh `conv_<uuid>` conversation id.
pub fn generate_conversation_id() -> String {
    format!("conv_{}", uuid::Uuid::new_v4())
}

impl Session {
    /// Load from `path`; a missing file yields defaults seeded with `settings`.
    pub fn load(path: &Path, settings: Settings) -> Result<Self> {
        let state = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read session file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse session file: {}", path.display()))?
        } else {
            SessionState {
                settings,
                ..SessionState::default()
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            state,
        })
    }

    /// A session that is never written to disk.
    pub fn ephemeral(settings: Settings) -> Self {
        Self {
            path: None,
            state: SessionState {
                settings,
                ..SessionState::default()
            },
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }
        let content = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write session file: {}", path.display()))?;
        Ok(())
    }

    pub fn current_conversation_id(&self) -> Option<&str> {
        self.state.current_conversation_id.as_deref()
    }

    /// The conversation id to send with the next query.
    ///
    /// An explicit id is used as-is and does not change the current
    /// conversation; otherwise the current one is reused or a new one is
    /// generated and pinned.
    pub fn conversation_for_query(&mut self, explicit: Option<&str>) -> String {
        if let Some(id) = explicit.filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(id) = &self.state.current_conversation_id {
            return id.clone();
        }
        let id = generate_conversation_id();
        self.state.current_conversation_id = Some(id.clone());
        id
    }

    pub fn reset_conversation(&mut self) {
        self.state.current_conversation_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = generate_conversation_id();
        let b = generate_conversation_id();
        assert!(a.starts_with("conv_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_conversation_is_pinned_until_reset() {
        let mut s = Session::ephemeral(Settings::default());
        let first = s.conversation_for_query(None);
        assert_eq!(s.conversation_for_query(None), first);

        assert_eq!(s.conversation_for_query(Some("conv_x")), "conv_x");
        assert_eq!(s.current_conversation_id(), Some(first.as_str()));

        s.reset_conversation();
        assert_ne!(s.conversation_for_query(None), first);
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("session.json");

        let mut s = Session::load(&path, Settings::default()).unwrap();
        s.state.current_conversation_id = Some("conv_1".to_string());
        s.state.settings.compact_view = true;
        s.save().unwrap();

        let reloaded = Session::load(&path, Settings::default()).unwrap();
        assert_eq!(reloaded.state, s.state);
    }

    #[test]
    fn test_missing_file_uses_given_settings() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings {
            auto_index_documents: true,
            ..Settings::default()
        };
        let s = Session::load(&tmp.path().join("none.json"), settings).unwrap();
        assert!(s.state.settings.auto_index_documents);
        assert!(s.current_conversation_id().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Session::load(&path, Settings::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse session file"));
    }
}
