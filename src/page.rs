//! Content-side controller: owns the one widget of a page and routes
//! toggle requests from the background process to it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, info};
use serde_json::Value;

use crate::completion::Completer;
use crate::models::RuntimeMessage;
use crate::store::{SettingsStore, StorageArea};
use crate::widget::{ToggleOutcome, WidgetController, WidgetView};

type ViewFactory = Box<dyn Fn() -> Box<dyn WidgetView>>;

pub struct PageController<S, C> {
    store: Rc<SettingsStore<S>>,
    completer: Rc<C>,
    make_view: ViewFactory,
    widget: RefCell<Option<Rc<WidgetController<S, C>>>>,
    constructions: Cell<usize>,
    restored: Cell<bool>,
}

impl<S: StorageArea, C: Completer> PageController<S, C> {
    pub fn new(
        store: Rc<SettingsStore<S>>,
        completer: Rc<C>,
        make_view: impl Fn() -> Box<dyn WidgetView> + 'static,
    ) -> Self {
        Self {
            store,
            completer,
            make_view: Box::new(make_view),
            widget: RefCell::new(None),
            constructions: Cell::new(0),
            restored: Cell::new(false),
        }
    }

    /// Returns the page's widget, building it on first use. The flag is true
    /// only for the call that built it.
    pub fn ensure_widget(&self) -> (Rc<WidgetController<S, C>>, bool) {
        if let Some(widget) = self.widget.borrow().as_ref() {
            return (widget.clone(), false);
        }

        let widget = Rc::new(WidgetController::new(
            self.store.clone(),
            self.completer.clone(),
            (self.make_view)(),
        ));
        *self.widget.borrow_mut() = Some(widget.clone());
        self.constructions.set(self.constructions.get() + 1);
        info!("[page] chat widget constructed");
        (widget, true)
    }

    pub fn widget(&self) -> Option<Rc<WidgetController<S, C>>> {
        self.widget.borrow().clone()
    }

    /// How many times a widget was built on this page (0 or 1)
    pub fn constructions(&self) -> usize {
        self.constructions.get()
    }

    /// Page-load path: build the widget hidden and restore its layout.
    /// The layout is restored once, even if a toggle built the widget first.
    pub async fn boot(&self) -> Rc<WidgetController<S, C>> {
        let (widget, _) = self.ensure_widget();
        if !self.restored.replace(true) {
            widget.restore().await;
        }
        widget
    }

    pub fn toggle(&self) -> ToggleOutcome {
        let (widget, _) = self.ensure_widget();
        widget.toggle()
    }

    /// Handles one raw runtime message; anything but a toggle is ignored
    pub fn handle_message(&self, message: &Value) -> Option<ToggleOutcome> {
        match serde_json::from_value::<RuntimeMessage>(message.clone()) {
            Ok(RuntimeMessage::Toggle) => Some(self.toggle()),
            Err(_) => {
                debug!("[page] ignoring runtime message {}", message);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::CompletionError;
    use crate::models::{Preferences, Turn};
    use crate::store::MemoryStorage;
    use crate::widget::{ChatWidget, Visibility};

    struct EchoCompleter;

    #[async_trait(?Send)]
    impl Completer for EchoCompleter {
        async fn complete(&self, messages: Vec<Turn>, _: &Preferences) -> Result<String, CompletionError> {
            Ok(messages.last().map(|turn| turn.content.clone()).unwrap_or_default())
        }
    }

    struct NullView;

    impl WidgetView for NullView {
        fn render(&self, _widget: &ChatWidget) {}
    }

    fn page() -> PageController<Rc<MemoryStorage>, EchoCompleter> {
        let store = SettingsStore::new(Rc::new(MemoryStorage::new()), Rc::new(MemoryStorage::new()));
        PageController::new(Rc::new(store), Rc::new(EchoCompleter), || {
            Box::new(NullView) as Box<dyn WidgetView>
        })
    }

    #[tokio::test]
    async fn boot_builds_a_hidden_widget() {
        let page = page();
        let widget = page.boot().await;
        assert_eq!(widget.state().visibility(), Visibility::Hidden);
        assert_eq!(page.constructions(), 1);
    }

    #[tokio::test]
    async fn toggling_twice_returns_to_hidden_without_rebuilding() {
        let page = page();
        page.boot().await;

        let first = page.handle_message(&json!({ "action": "toggle" })).unwrap();
        let second = page.handle_message(&json!({ "action": "toggle" })).unwrap();

        assert_eq!(first.visibility, Visibility::Visible);
        assert_eq!(second.visibility, Visibility::Hidden);
        assert_eq!(page.constructions(), 1);
    }

    #[test]
    fn first_toggle_builds_lazily() {
        let page = page();
        assert!(page.widget().is_none());

        let outcome = page.toggle();
        assert_eq!(outcome.visibility, Visibility::Visible);
        assert_eq!(page.constructions(), 1);

        let (_, created) = page.ensure_widget();
        assert!(!created);
    }

    #[tokio::test]
    async fn boot_restores_layout_once_even_after_an_early_toggle() {
        let local = Rc::new(MemoryStorage::new());
        local.insert("chatWindowZoom", json!(1.5));
        let store = SettingsStore::new(Rc::new(MemoryStorage::new()), local.clone());
        let page = PageController::new(Rc::new(store), Rc::new(EchoCompleter), || {
            Box::new(NullView) as Box<dyn WidgetView>
        });

        page.toggle();
        let widget = page.boot().await;
        assert_eq!(widget.state().zoom().level(), 1.5);

        local.insert("chatWindowZoom", json!(0.5));
        page.boot().await;
        assert_eq!(widget.state().zoom().level(), 1.5);
        assert_eq!(page.constructions(), 1);
    }

    #[test]
    fn unknown_messages_are_ignored() {
        let page = page();
        assert_eq!(page.handle_message(&json!({ "action": "close" })), None);
        assert_eq!(page.handle_message(&json!("toggle")), None);
        assert!(page.widget().is_none());
    }
}
