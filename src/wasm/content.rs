//! Content-script shell: builds the widget DOM, draws [`ChatWidget`] state
//! into it and turns DOM events into controller calls.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use log::{debug, error, warn};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, HtmlElement, HtmlTextAreaElement, KeyboardEvent, MouseEvent};

use super::chrome::{add_runtime_message_listener, from_js, ChromeStorageArea};
use crate::completion::CompletionClient;
use crate::page::PageController;
use crate::paths::WIDGET_ANCHOR_MARGIN;
use crate::prompts::{INPUT_PLACEHOLDER, WIDGET_TITLE};
use crate::store::SettingsStore;
use crate::widget::layout::{px, Point, Position, Size};
use crate::widget::transcript::EntryStatus;
use crate::widget::{ChatWidget, ToggleOutcome, Visibility, WidgetController, WidgetView};

const ROOT_ID: &str = "chatgpt-helper-window";

type Page = PageController<ChromeStorageArea, CompletionClient>;
type Widget = WidgetController<ChromeStorageArea, CompletionClient>;
type MouseHandler = Closure<dyn FnMut(MouseEvent)>;

thread_local! {
    static PAGE: RefCell<Option<Rc<Page>>> = const { RefCell::new(None) };
    static FOCUS_TIMEOUT: RefCell<Option<Timeout>> = const { RefCell::new(None) };
    static RUNTIME_MESSAGE_HANDLER: RefCell<Option<Closure<dyn FnMut(JsValue, JsValue, JsValue)>>> = const { RefCell::new(None) };
    static DOM_READY_HANDLER: RefCell<Option<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(None) };
    static POINTER_MOVE_HANDLER: RefCell<Option<MouseHandler>> = const { RefCell::new(None) };
    static POINTER_UP_HANDLER: RefCell<Option<MouseHandler>> = const { RefCell::new(None) };
    static WIDGET_HANDLERS: RefCell<Vec<Closure<dyn FnMut(web_sys::Event)>>> = const { RefCell::new(Vec::new()) };
}

/// Content-script entry. Runs again on every re-injection, so it must not
/// build a second widget or listener.
pub(crate) fn start() -> Result<(), String> {
    if PAGE.with(|slot| slot.borrow().is_some()) {
        debug!("[page] content script already running");
        return Ok(());
    }

    let document = document()?;
    if document.body().is_none() {
        return defer_until_dom_ready(&document);
    }

    let dom = WidgetDom::build(&document)?;
    let body = document
        .body()
        .ok_or_else(|| "document body is unavailable".to_string())?;

    let store = SettingsStore::new(ChromeStorageArea::Sync, ChromeStorageArea::Local);
    let view_dom = dom.clone();
    let page = Rc::new(PageController::new(
        Rc::new(store),
        Rc::new(CompletionClient::new()),
        move || {
            if body.append_child(&view_dom.root).is_err() {
                warn!("[page] failed to attach the chat widget to the page");
            }
            Box::new(DomWidgetView::new(view_dom.clone())) as Box<dyn WidgetView>
        },
    ));
    PAGE.with(|slot| *slot.borrow_mut() = Some(page.clone()));

    wire_widget_events(&dom)?;
    listen_for_runtime_messages(&dom);

    spawn_local(async move {
        page.boot().await;
    });
    Ok(())
}

fn document() -> Result<Document, String> {
    web_sys::window()
        .ok_or_else(|| "window is unavailable".to_string())?
        .document()
        .ok_or_else(|| "document is unavailable".to_string())
}

fn defer_until_dom_ready(document: &Document) -> Result<(), String> {
    DOM_READY_HANDLER.with(|slot| {
        if slot.borrow().is_some() {
            return Ok(());
        }
        let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_event| {
            if let Err(e) = start() {
                error!("[page] failed to start widget: {}", e);
            }
        }));
        document
            .add_event_listener_with_callback("DOMContentLoaded", callback.as_ref().unchecked_ref())
            .map_err(|_| "failed to wait for DOMContentLoaded".to_string())?;
        *slot.borrow_mut() = Some(callback);
        Ok(())
    })
}

fn current_page() -> Option<Rc<Page>> {
    PAGE.with(|slot| slot.borrow().clone())
}

fn current_widget() -> Option<Rc<Widget>> {
    current_page().and_then(|page| page.widget())
}

/// Handles the focus request that comes with a toggle
fn apply_toggle(outcome: ToggleOutcome, input: &HtmlTextAreaElement) {
    let timeout = outcome.focus_after.map(|delay| {
        let input = input.clone();
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Timeout::new(millis, move || {
            let _ = input.focus();
        })
    });
    // Replacing the slot drops (and so cancels) any pending focus
    FOCUS_TIMEOUT.with(|slot| *slot.borrow_mut() = timeout);
}

fn toggle_page(input: &HtmlTextAreaElement) {
    if let Some(page) = current_page() {
        apply_toggle(page.toggle(), input);
    }
}

fn listen_for_runtime_messages(dom: &WidgetDom) {
    RUNTIME_MESSAGE_HANDLER.with(|slot| {
        if slot.borrow().is_some() {
            return;
        }
        let input = dom.input.clone();
        let callback = Closure::<dyn FnMut(JsValue, JsValue, JsValue)>::wrap(Box::new(
            move |message: JsValue, _sender: JsValue, _respond: JsValue| {
                let message = match from_js::<Value>(message) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("[page] unreadable runtime message: {}", e);
                        return;
                    }
                };
                let Some(page) = current_page() else {
                    return;
                };
                if let Some(outcome) = page.handle_message(&message) {
                    apply_toggle(outcome, &input);
                }
            },
        ));
        add_runtime_message_listener(&callback);
        *slot.borrow_mut() = Some(callback);
    });
}

/// Element handles of one widget instance
#[derive(Clone)]
struct WidgetDom {
    root: HtmlElement,
    header: HtmlElement,
    zoom_out: HtmlElement,
    zoom_in: HtmlElement,
    close: HtmlElement,
    messages: HtmlElement,
    input: HtmlTextAreaElement,
    send: HtmlElement,
    resize_handle: HtmlElement,
}

fn create(document: &Document, tag: &str, class: &str) -> Result<HtmlElement, String> {
    let element = document
        .create_element(tag)
        .map_err(|_| format!("failed to create {}", tag))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| format!("{} is not HtmlElement", tag))?;
    if !class.is_empty() {
        element.set_class_name(class);
    }
    Ok(element)
}

fn append(parent: &Element, child: &Element) -> Result<(), String> {
    parent
        .append_child(child)
        .map(|_| ())
        .map_err(|_| "failed to append widget element".to_string())
}

impl WidgetDom {
    fn build(document: &Document) -> Result<Self, String> {
        let root = create(document, "div", "")?;
        root.set_id(ROOT_ID);

        let header = create(document, "div", "chat-header")?;
        let title = create(document, "span", "chat-title")?;
        title.set_text_content(Some(WIDGET_TITLE));
        let controls = create(document, "div", "chat-controls")?;
        let zoom_out = control_button(document, "zoom-out-btn", "Zoom Out", "\u{2212}")?;
        let zoom_in = control_button(document, "zoom-in-btn", "Zoom In", "+")?;
        let close = control_button(document, "close-btn", "Close", "\u{00d7}")?;
        append(&controls, &zoom_out)?;
        append(&controls, &zoom_in)?;
        append(&controls, &close)?;
        append(&header, &title)?;
        append(&header, &controls)?;

        let body = create(document, "div", "chat-body")?;
        let messages = create(document, "div", "chat-messages")?;
        let input_row = create(document, "div", "chat-input-container")?;
        let input = create(document, "textarea", "")?
            .dyn_into::<HtmlTextAreaElement>()
            .map_err(|_| "textarea is not HtmlTextAreaElement".to_string())?;
        input.set_placeholder(INPUT_PLACEHOLDER);
        input.set_rows(1);
        let send = create(document, "button", "send-btn")?;
        send.set_text_content(Some("Send"));
        append(&input_row, &input)?;
        append(&input_row, &send)?;
        append(&body, &messages)?;
        append(&body, &input_row)?;

        let resize_handle = create(document, "div", "resize-handle")?;

        append(&root, &header)?;
        append(&root, &body)?;
        append(&root, &resize_handle)?;

        Ok(Self {
            root,
            header,
            zoom_out,
            zoom_in,
            close,
            messages,
            input,
            send,
            resize_handle,
        })
    }
}

fn control_button(document: &Document, class: &str, title: &str, label: &str) -> Result<HtmlElement, String> {
    let button = create(document, "button", class)?;
    button.set_title(title);
    button.set_text_content(Some(label));
    Ok(button)
}

struct DomWidgetView {
    dom: WidgetDom,
    drawn_revision: Cell<Option<u64>>,
}

impl DomWidgetView {
    fn new(dom: WidgetDom) -> Self {
        Self {
            dom,
            drawn_revision: Cell::new(None),
        }
    }

    fn set_style(&self, property: &str, value: &str) {
        if self.dom.root.style().set_property(property, value).is_err() {
            warn!("[widget] failed to set {}", property);
        }
    }

    fn draw_messages(&self, widget: &ChatWidget) {
        let transcript = widget.transcript();
        if self.drawn_revision.get() == Some(transcript.revision()) {
            return;
        }
        self.drawn_revision.set(Some(transcript.revision()));

        let Ok(document) = document() else {
            return;
        };
        self.dom.messages.set_text_content(None);
        for entry in transcript.entries() {
            let class = match entry.status {
                EntryStatus::Done => format!("message {}", entry.speaker.css_class()),
                EntryStatus::Loading => format!("message {} loading", entry.speaker.css_class()),
                EntryStatus::Failed => format!("message {} error", entry.speaker.css_class()),
            };
            let Ok(node) = create(&document, "div", &class) else {
                continue;
            };
            node.set_text_content(Some(&entry.content));
            let _ = self.dom.messages.append_child(&node);
        }
        self.dom
            .messages
            .set_scroll_top(self.dom.messages.scroll_height());
    }
}

impl WidgetView for DomWidgetView {
    fn render(&self, widget: &ChatWidget) {
        match widget.visibility() {
            Visibility::Visible => {
                self.set_style("display", "flex");
                self.set_style("visibility", "visible");
            }
            Visibility::Hidden => {
                self.set_style("display", "none");
                self.set_style("visibility", "hidden");
            }
        }

        self.set_style("transform", &format!("scale({})", widget.zoom().level()));
        self.set_style("transform-origin", "top left");

        let frame = widget.frame();
        match frame.position {
            Position::Anchored => {
                self.set_style("left", "auto");
                self.set_style("top", "auto");
                self.set_style("right", &px(WIDGET_ANCHOR_MARGIN));
                self.set_style("bottom", &px(WIDGET_ANCHOR_MARGIN));
            }
            Position::Explicit { left, top } => {
                self.set_style("left", &px(left));
                self.set_style("top", &px(top));
                self.set_style("right", "auto");
                self.set_style("bottom", "auto");
            }
        }
        self.set_style("width", &px(frame.size.width));
        self.set_style("height", &px(frame.size.height));

        self.draw_messages(widget);
    }
}

fn pointer(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.client_x()), f64::from(event.client_y()))
}

fn viewport() -> Size {
    let Some(window) = web_sys::window() else {
        return Size::new(0.0, 0.0);
    };
    let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    Size::new(width, height)
}

fn on_event(target: &HtmlElement, kind: &str, handler: impl FnMut(web_sys::Event) + 'static) -> Result<(), String> {
    let callback = Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(handler));
    target
        .add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())
        .map_err(|_| format!("failed to listen for {}", kind))?;
    WIDGET_HANDLERS.with(|slot| slot.borrow_mut().push(callback));
    Ok(())
}

fn wire_widget_events(dom: &WidgetDom) -> Result<(), String> {
    let input = dom.input.clone();
    on_event(&dom.close, "click", move |_event| toggle_page(&input))?;

    on_event(&dom.zoom_in, "click", |event| {
        event.stop_propagation();
        if let Some(widget) = current_widget() {
            spawn_local(async move {
                widget.zoom_in().await;
            });
        }
    })?;

    on_event(&dom.zoom_out, "click", |event| {
        event.stop_propagation();
        if let Some(widget) = current_widget() {
            spawn_local(async move {
                widget.zoom_out().await;
            });
        }
    })?;

    let root = dom.root.clone();
    on_event(&dom.header, "mousedown", move |event| {
        let Some(event) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let on_control = event
            .target()
            .and_then(|target| target.dyn_into::<Element>().ok())
            .and_then(|target| target.closest("button").ok().flatten())
            .is_some();
        if on_control {
            return;
        }
        let Some(widget) = current_widget() else {
            return;
        };
        let rect = root.get_bounding_client_rect();
        widget.begin_drag(pointer(event), Point::new(rect.left(), rect.top()));
        track_pointer();
        event.prevent_default();
    })?;

    on_event(&dom.resize_handle, "mousedown", |event| {
        let Some(event) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let Some(widget) = current_widget() else {
            return;
        };
        widget.begin_resize(pointer(event));
        track_pointer();
        event.prevent_default();
        event.stop_propagation();
    })?;

    let textarea = dom.input.clone();
    on_event(&dom.input, "input", move |_event| grow_input(&textarea))?;

    let textarea = dom.input.clone();
    on_event(&dom.input, "keydown", move |event| {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        if event.key() == "Enter" && !event.shift_key() {
            event.prevent_default();
            submit(&textarea);
        }
    })?;

    let textarea = dom.input.clone();
    on_event(&dom.send, "click", move |_event| submit(&textarea))?;

    Ok(())
}

fn grow_input(input: &HtmlTextAreaElement) {
    let style = input.style();
    let _ = style.set_property("height", "auto");
    let _ = style.set_property("height", &format!("{}px", input.scroll_height()));
}

fn submit(input: &HtmlTextAreaElement) {
    let text = input.value();
    if text.trim().is_empty() {
        return;
    }
    input.set_value("");
    let _ = input.style().set_property("height", "auto");

    let Some(widget) = current_widget() else {
        return;
    };
    spawn_local(async move {
        widget.send(&text).await;
    });
}

/// Attaches the document-level move/release listeners for a drag or resize
fn track_pointer() {
    let Ok(document) = document() else {
        return;
    };

    POINTER_MOVE_HANDLER.with(|slot| {
        let mut slot = slot.borrow_mut();
        let callback = slot.get_or_insert_with(|| {
            Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(|event: MouseEvent| {
                let Some(widget) = current_widget() else {
                    return;
                };
                let at = pointer(&event);
                let (dragging, resizing) = {
                    let state = widget.state();
                    (state.is_dragging(), state.is_resizing())
                };
                if dragging {
                    let viewport = viewport();
                    spawn_local(async move { widget.drag_to(at, viewport).await });
                } else if resizing {
                    spawn_local(async move { widget.resize_to(at).await });
                }
            }))
        });
        let _ = document
            .add_event_listener_with_callback("mousemove", callback.as_ref().unchecked_ref());
    });

    POINTER_UP_HANDLER.with(|slot| {
        let mut slot = slot.borrow_mut();
        let callback = slot.get_or_insert_with(|| {
            Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(|_event: MouseEvent| {
                if let Some(widget) = current_widget() {
                    widget.end_interaction();
                }
                release_pointer();
            }))
        });
        let _ = document
            .add_event_listener_with_callback("mouseup", callback.as_ref().unchecked_ref());
    });
}

fn release_pointer() {
    let Ok(document) = document() else {
        return;
    };
    POINTER_MOVE_HANDLER.with(|slot| {
        if let Some(callback) = slot.borrow().as_ref() {
            let _ = document
                .remove_event_listener_with_callback("mousemove", callback.as_ref().unchecked_ref());
        }
    });
    POINTER_UP_HANDLER.with(|slot| {
        if let Some(callback) = slot.borrow().as_ref() {
            let _ = document
                .remove_event_listener_with_callback("mouseup", callback.as_ref().unchecked_ref());
        }
    });
}
