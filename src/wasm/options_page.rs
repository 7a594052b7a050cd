//! Options page shell: binds the settings form in `options.html`

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, HtmlElement, HtmlInputElement, HtmlOptionElement, HtmlSelectElement};

use super::chrome::{BundledCatalog, ChromeStorageArea, ChromeTabs};
use crate::options::{CatalogState, ModelMode, OptionsController, OptionsForm, Status};
use crate::paths::STATUS_CLEAR_DELAY;
use crate::store::SettingsStore;

type Controller = OptionsController<ChromeStorageArea, BundledCatalog>;

thread_local! {
    static CONTROLLER: RefCell<Option<Rc<Controller>>> = const { RefCell::new(None) };
    /// Last loaded form; keeps the catalog state between edits
    static FORM: RefCell<Option<OptionsForm>> = const { RefCell::new(None) };
    static HANDLERS: RefCell<Vec<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(Vec::new()) };
}

#[derive(Clone)]
struct FormDom {
    api_key: HtmlInputElement,
    dropdown: HtmlSelectElement,
    custom_model: HtmlInputElement,
    custom_toggle: HtmlInputElement,
    dropdown_container: HtmlElement,
    input_container: HtmlElement,
    help_text: HtmlElement,
    no_markdown: HtmlInputElement,
    save: HtmlElement,
    shortcut: HtmlElement,
    status: HtmlElement,
}

fn by_id<T: JsCast>(document: &Document, id: &str) -> Result<T, String> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| format!("missing #{}", id))?
        .dyn_into::<T>()
        .map_err(|_| format!("#{} has an unexpected element type", id))
}

impl FormDom {
    fn bind(document: &Document) -> Result<Self, String> {
        Ok(Self {
            api_key: by_id(document, "apiKey")?,
            dropdown: by_id(document, "modelDropdown")?,
            custom_model: by_id(document, "modelName")?,
            custom_toggle: by_id(document, "useDropdownToggle")?,
            dropdown_container: by_id(document, "modelDropdownContainer")?,
            input_container: by_id(document, "modelInputContainer")?,
            help_text: by_id(document, "modelHelpText")?,
            no_markdown: by_id(document, "noMarkdownToggle")?,
            save: by_id(document, "saveBtn")?,
            shortcut: by_id(document, "hotkeyBtn")?,
            status: by_id(document, "status")?,
        })
    }

    fn show_mode(&self, form: &OptionsForm) {
        let custom = form.mode == ModelMode::Custom;
        self.custom_toggle.set_checked(custom);
        let _ = self.dropdown_container.class_list().toggle_with_force("active", !custom);
        let _ = self.input_container.class_list().toggle_with_force("active", custom);
        self.help_text.set_text_content(Some(form.help_text()));
    }

    fn fill_catalog(&self, catalog: &CatalogState) -> Result<(), String> {
        self.dropdown.set_text_content(None);
        let options: Vec<(String, String)> = match catalog {
            CatalogState::Loaded(catalog) => std::iter::once(("Select a model...".to_string(), String::new()))
                .chain(catalog.ids().iter().map(|id| (id.clone(), id.clone())))
                .collect(),
            CatalogState::Failed(_) => vec![("Error loading models".to_string(), String::new())],
        };
        for (text, value) in options {
            let option = HtmlOptionElement::new_with_text_and_value(&text, &value)
                .map_err(|_| "failed to create model option".to_string())?;
            self.dropdown
                .append_child(&option)
                .map_err(|_| "failed to add model option".to_string())?;
        }
        Ok(())
    }

    fn show(&self, form: &OptionsForm) -> Result<(), String> {
        self.fill_catalog(&form.catalog)?;
        self.api_key.set_value(&form.api_key);
        self.dropdown.set_value(&form.selected_model);
        self.custom_model.set_value(&form.custom_model);
        self.no_markdown.set_checked(form.no_markdown);
        self.show_mode(form);
        Ok(())
    }

    /// Current field values on top of the loaded form
    fn read(&self) -> OptionsForm {
        let catalog = FORM
            .with(|slot| slot.borrow().as_ref().map(|form| form.catalog.clone()))
            .unwrap_or(CatalogState::Failed(String::new()));
        OptionsForm {
            api_key: self.api_key.value(),
            mode: if self.custom_toggle.checked() {
                ModelMode::Custom
            } else {
                ModelMode::Dropdown
            },
            selected_model: self.dropdown.value(),
            custom_model: self.custom_model.value(),
            no_markdown: self.no_markdown.checked(),
            catalog,
        }
    }

    fn show_status(&self, status: &Status) {
        self.status.set_text_content(Some(&status.message));
        self.status
            .set_class_name(&format!("status {}", status.kind.css_class()));
    }
}

fn on_event(
    target: &HtmlElement,
    kind: &str,
    handler: impl FnMut(web_sys::Event) + 'static,
) -> Result<(), String> {
    let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(handler));
    target
        .add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())
        .map_err(|_| format!("failed to listen for {}", kind))?;
    HANDLERS.with(|slot| slot.borrow_mut().push(callback));
    Ok(())
}

pub(crate) fn start() -> Result<(), String> {
    if CONTROLLER.with(|slot| slot.borrow().is_some()) {
        return Ok(());
    }
    let document = web_sys::window()
        .ok_or_else(|| "window is unavailable".to_string())?
        .document()
        .ok_or_else(|| "document is unavailable".to_string())?;
    let dom = FormDom::bind(&document)?;

    let store = SettingsStore::new(ChromeStorageArea::Sync, ChromeStorageArea::Local);
    let controller = Rc::new(OptionsController::new(store, BundledCatalog::default()));
    CONTROLLER.with(|slot| *slot.borrow_mut() = Some(controller.clone()));

    wire_events(&dom, controller.clone())?;

    spawn_local(async move {
        let form = controller.load().await;
        if let Err(e) = dom.show(&form) {
            warn!("[options] failed to show settings: {}", e);
        }
        FORM.with(|slot| *slot.borrow_mut() = Some(form));
    });
    Ok(())
}

fn wire_events(dom: &FormDom, controller: Rc<Controller>) -> Result<(), String> {
    let toggle_dom = dom.clone();
    on_event(&dom.custom_toggle, "change", move |_event| {
        let form = toggle_dom.read();
        toggle_dom.show_mode(&form);
    })?;

    let shortcut_controller = controller.clone();
    on_event(&dom.shortcut, "click", move |_event| {
        let controller = shortcut_controller.clone();
        spawn_local(async move {
            controller.open_shortcut_settings(&ChromeTabs).await;
        });
    })?;

    let save_dom = dom.clone();
    on_event(&dom.save, "click", move |_event| {
        let dom = save_dom.clone();
        let controller = controller.clone();
        spawn_local(async move {
            let status = controller.save(&dom.read()).await;
            dom.show_status(&status);

            let generation = status.generation;
            let millis = u32::try_from(STATUS_CLEAR_DELAY.as_millis()).unwrap_or(u32::MAX);
            Timeout::new(millis, move || {
                if controller.clear_status(generation) {
                    dom.status.set_class_name("status");
                }
            })
            .forget();
        });
    })?;

    Ok(())
}
