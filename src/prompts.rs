//! Default prompt texts and user-facing strings for the chat widget

/// Model used when the user has not chosen one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// System turn prepended when the user asked for plain-text replies
pub const NO_MARKDOWN_PROMPT: &str = "Do not use markdown formatting in your responses. Write in plain text only, using line breaks and spacing for readability instead of markdown syntax like **bold**, *italic*, # headers, code blocks, lists with - or *, etc.";

/// Shown in place of a reply when no API key is configured
pub const MISSING_API_KEY_NOTICE: &str =
    "Please set your API key in extension options (right-click extension icon > Options)";

/// Placeholder text of an assistant reply that is still in flight
pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// Widget title shown in the header
pub const WIDGET_TITLE: &str = "WinGPT";

/// Placeholder of the message box
pub const INPUT_PLACEHOLDER: &str = "Type your message...";

/// Options page help text for list mode
pub const DROPDOWN_HELP: &str = "Select a model from the dropdown";

/// Options page help text for free-text mode
pub const CUSTOM_MODEL_HELP: &str =
    "Enter the model name (e.g., gpt-3.5-turbo, gpt-4, gpt-4-turbo-preview)";

/// Options page confirmation after a successful save
pub const SAVE_SUCCESS: &str = "Settings saved successfully!";
