//! Options page: loads the settings form, reconciles the model picker
//! against the catalog, validates and saves.

use std::cell::{Cell, RefCell};

use log::{error, info, warn};

use crate::catalog::Catalog;
use crate::error::ValidationError;
use crate::models::Preferences;
use crate::paths::SHORTCUTS_URL;
use crate::platform::{CatalogSource, TabOpener};
use crate::prompts::{CUSTOM_MODEL_HELP, DEFAULT_MODEL, DROPDOWN_HELP, SAVE_SUCCESS};
use crate::store::{SettingsStore, StorageArea};

/// Which model input is active. The two are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    Dropdown,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogState {
    Loaded(Catalog),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsForm {
    pub api_key: String,
    pub mode: ModelMode,
    /// Value of the model list; empty means "Select a model..."
    pub selected_model: String,
    pub custom_model: String,
    pub no_markdown: bool,
    pub catalog: CatalogState,
}

impl OptionsForm {
    /// Builds the form from saved preferences and the catalog load result
    pub fn reconcile(prefs: &Preferences, catalog: CatalogState) -> Self {
        let mut form = Self {
            api_key: prefs.api_key.clone().unwrap_or_default(),
            mode: ModelMode::Dropdown,
            selected_model: String::new(),
            custom_model: String::new(),
            no_markdown: prefs.no_markdown,
            catalog,
        };
        let saved = prefs.model_name.as_deref().filter(|model| !model.is_empty());

        match (&form.catalog, saved) {
            (CatalogState::Loaded(catalog), Some(model)) => {
                if prefs.use_dropdown != Some(false) && catalog.contains(model) {
                    form.selected_model = model.to_string();
                } else {
                    form.mode = ModelMode::Custom;
                    form.custom_model = model.to_string();
                }
            }
            (CatalogState::Loaded(catalog), None) => {
                if catalog.contains(DEFAULT_MODEL) {
                    form.selected_model = DEFAULT_MODEL.to_string();
                }
            }
            (CatalogState::Failed(_), saved) => {
                form.mode = ModelMode::Custom;
                form.custom_model = saved.unwrap_or(DEFAULT_MODEL).to_string();
            }
        }
        form
    }

    pub fn set_mode(&mut self, mode: ModelMode) {
        self.mode = mode;
    }

    pub fn help_text(&self) -> &'static str {
        match self.mode {
            ModelMode::Dropdown => DROPDOWN_HELP,
            ModelMode::Custom => CUSTOM_MODEL_HELP,
        }
    }

    /// Model name from whichever input is active
    pub fn resolved_model(&self) -> &str {
        match self.mode {
            ModelMode::Dropdown => self.selected_model.trim(),
            ModelMode::Custom => self.custom_model.trim(),
        }
    }

    /// Checks the fields in display order and builds the record to save
    pub fn validate(&self) -> Result<Preferences, ValidationError> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(ValidationError::MissingApiKey);
        }
        if !api_key.starts_with("sk-") {
            return Err(ValidationError::MalformedApiKey);
        }
        let model = self.resolved_model();
        if model.is_empty() {
            return Err(ValidationError::MissingModel);
        }
        Ok(Preferences {
            api_key: Some(api_key.to_string()),
            model_name: Some(model.to_string()),
            use_dropdown: Some(self.mode == ModelMode::Dropdown),
            no_markdown: self.no_markdown,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

impl StatusKind {
    pub fn css_class(self) -> &'static str {
        match self {
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

/// Transient feedback under the save button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
    /// Identifies this status to its auto-clear timer
    pub generation: u64,
}

pub struct OptionsController<S, K> {
    store: SettingsStore<S>,
    catalog_source: K,
    status: RefCell<Option<Status>>,
    generation: Cell<u64>,
}

impl<S: StorageArea, K: CatalogSource> OptionsController<S, K> {
    pub fn new(store: SettingsStore<S>, catalog_source: K) -> Self {
        Self {
            store,
            catalog_source,
            status: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Reads saved preferences and the catalog; neither failure blocks the form
    pub async fn load(&self) -> OptionsForm {
        let prefs = match self.store.load_preferences().await {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("[options] failed to load saved settings: {}", e);
                Preferences::default()
            }
        };

        let catalog = match Catalog::load(&self.catalog_source).await {
            Ok(catalog) => {
                info!("[options] loaded {} models", catalog.ids().len());
                CatalogState::Loaded(catalog)
            }
            Err(e) => {
                error!("[options] error loading models: {}", e);
                CatalogState::Failed(e.to_string())
            }
        };

        OptionsForm::reconcile(&prefs, catalog)
    }

    /// Validates and persists the form, returning the status to display
    pub async fn save(&self, form: &OptionsForm) -> Status {
        let prefs = match form.validate() {
            Ok(prefs) => prefs,
            Err(e) => {
                info!("[options] rejected save: {}", e);
                return self.set_status(StatusKind::Error, e.to_string());
            }
        };

        match self.store.save_preferences(&prefs).await {
            Ok(()) => {
                info!("[options] settings saved");
                self.set_status(StatusKind::Success, SAVE_SUCCESS.to_string())
            }
            Err(e) => {
                warn!("[options] failed to save settings: {}", e);
                self.set_status(StatusKind::Error, format!("Error saving settings: {}", e))
            }
        }
    }

    fn set_status(&self, kind: StatusKind, message: String) -> Status {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let status = Status {
            kind,
            message,
            generation,
        };
        *self.status.borrow_mut() = Some(status.clone());
        status
    }

    pub fn status(&self) -> Option<Status> {
        self.status.borrow().clone()
    }

    /// Clears the status if it is still the one `generation` refers to
    pub fn clear_status(&self, generation: u64) -> bool {
        let mut status = self.status.borrow_mut();
        if status.as_ref().is_some_and(|s| s.generation == generation) {
            *status = None;
            return true;
        }
        false
    }

    pub async fn open_shortcut_settings(&self, opener: &impl TabOpener) {
        if let Err(e) = opener.open(SHORTCUTS_URL).await {
            warn!("[options] failed to open shortcut settings: {}", e);
        }
    }
}
