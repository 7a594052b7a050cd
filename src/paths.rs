//! Storage keys, bundled resource paths and browser URLs

use std::time::Duration;

/// Synced storage keys (Preference Record)
pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_MODEL_NAME: &str = "modelName";
pub const KEY_USE_DROPDOWN: &str = "useDropdown";
pub const KEY_NO_MARKDOWN: &str = "noMarkdown";

/// All synced preference keys, in the order the options form reads them
pub const PREFERENCE_KEYS: [&str; 4] = [
    KEY_API_KEY,
    KEY_MODEL_NAME,
    KEY_USE_DROPDOWN,
    KEY_NO_MARKDOWN,
];

/// Local-only storage keys (Geometry Record and Zoom Value)
pub const KEY_WINDOW_POSITION: &str = "chatWindowPosition";
pub const KEY_WINDOW_ZOOM: &str = "chatWindowZoom";

/// Chat completion endpoint
pub const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Script injected into tabs that do not have the widget yet
pub const CONTENT_SCRIPT: &str = "content.js";

/// Bundled model listing, read through the extension's resource URL
pub const MODEL_CATALOG: &str = "models.json";

/// Only catalog entries with this prefix are offered in the model list
pub const CATALOG_MODEL_PREFIX: &str = "gpt-";

/// Browser page where the user rebinds extension shortcuts
pub const SHORTCUTS_URL: &str = "chrome://extensions/shortcuts";

/// Command name declared in the manifest for the toggle hotkey
pub const TOGGLE_COMMAND: &str = "toggle-chat";

/// URL prefixes where the browser refuses script injection
pub const PROTECTED_SCHEMES: [&str; 3] = ["chrome://", "chrome-extension://", "edge://"];

/// Pause between injecting the content script and retrying the toggle
pub const INJECTION_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Pause between showing the widget and focusing its input
pub const FOCUS_DELAY: Duration = Duration::from_millis(100);

/// How long an options page status message stays visible
pub const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(3);

/// Default widget dimensions, in unscaled pixels
pub const DEFAULT_WIDGET_WIDTH: f64 = 380.0;
pub const DEFAULT_WIDGET_HEIGHT: f64 = 520.0;

/// Smallest size a resize may produce, in unscaled pixels
pub const MIN_WIDGET_WIDTH: f64 = 260.0;
pub const MIN_WIDGET_HEIGHT: f64 = 200.0;

/// Distance from the viewport's bottom-right corner while anchored
pub const WIDGET_ANCHOR_MARGIN: f64 = 20.0;

/// Whether the browser forbids injecting scripts into this URL
pub fn is_protected_url(url: &str) -> bool {
    PROTECTED_SCHEMES
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_internal_pages_are_protected() {
        assert!(is_protected_url("chrome://settings"));
        assert!(is_protected_url("chrome-extension://abc/options.html"));
        assert!(is_protected_url("edge://newtab"));
    }

    #[test]
    fn regular_pages_are_not_protected() {
        assert!(!is_protected_url("https://example.com/chrome://"));
        assert!(!is_protected_url("http://localhost:8080"));
        assert!(!is_protected_url("file:///tmp/index.html"));
    }
}
