//! Data models and structures used throughout the extension

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn, as the completion API names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Represents a single message sent to the completion API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Synced user preferences. Every field may be absent in a partial read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_dropdown: Option<bool>,
    #[serde(default)]
    pub no_markdown: bool,
}

impl Preferences {
    /// The API key, if one is configured and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// The configured model, falling back to the default model
    pub fn model_or_default(&self) -> &str {
        self.model_name
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(crate::prompts::DEFAULT_MODEL)
    }
}

/// Persisted widget position and size, as CSS length strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredGeometry {
    #[serde(default)]
    pub left: String,
    #[serde(default)]
    pub top: String,
    #[serde(default)]
    pub width: String,
    #[serde(default)]
    pub height: String,
}

/// One entry in the bundled model listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
}

/// The model listing document, same shape as the API's `/models` response
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    pub data: Vec<CatalogEntry>,
}

/// Messages the background process sends to a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RuntimeMessage {
    Toggle,
}

/// A browser tab as the background process sees it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tab {
    pub id: i32,
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preferences_read_partial_records() {
        let prefs: Preferences = serde_json::from_value(json!({ "apiKey": "sk-abc" })).unwrap();
        assert_eq!(prefs.api_key(), Some("sk-abc"));
        assert_eq!(prefs.model_name, None);
        assert!(!prefs.no_markdown);
        assert_eq!(prefs.model_or_default(), "gpt-3.5-turbo");
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let prefs = Preferences {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(prefs.api_key(), None);
    }

    #[test]
    fn preferences_serialize_with_storage_key_names() {
        let prefs = Preferences {
            api_key: Some("sk-1".to_string()),
            model_name: Some("gpt-4".to_string()),
            use_dropdown: Some(true),
            no_markdown: true,
        };
        assert_eq!(
            serde_json::to_value(&prefs).unwrap(),
            json!({
                "apiKey": "sk-1",
                "modelName": "gpt-4",
                "useDropdown": true,
                "noMarkdown": true
            })
        );
    }

    #[test]
    fn toggle_message_matches_wire_shape() {
        assert_eq!(
            serde_json::to_value(RuntimeMessage::Toggle).unwrap(),
            json!({ "action": "toggle" })
        );
        assert!(serde_json::from_value::<RuntimeMessage>(json!({ "action": "reload" })).is_err());
    }

    #[test]
    fn turn_roles_are_lowercase() {
        assert_eq!(
            serde_json::to_value(Turn::assistant("hello")).unwrap(),
            json!({ "role": "assistant", "content": "hello" })
        );
    }
}
