//! The floating chat widget: visibility, layout interactions and sending.
//!
//! [`ChatWidget`] is plain state. [`WidgetController`] owns it, persists
//! layout changes through the [`SettingsStore`], talks to the
//! [`Completer`] and asks its [`WidgetView`] to redraw after every change.
//! Borrows of the state never span an `.await`, so overlapping sends and
//! pointer events interleave safely on the single browser thread.

pub mod layout;
pub mod transcript;

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::completion::Completer;
use crate::error::StoreError;
use crate::models::Turn;
use crate::paths::FOCUS_DELAY;
use crate::prompts::{MISSING_API_KEY_NOTICE, THINKING_PLACEHOLDER};
use crate::store::{SettingsStore, StorageArea};

use layout::{DragSession, Frame, Point, ResizeSession, Size, Zoom};
use transcript::{EntryId, EntryStatus, Speaker, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interaction {
    Idle,
    Dragging(DragSession),
    Resizing(ResizeSession),
}

/// Everything the view needs to draw the widget
#[derive(Debug, Clone)]
pub struct ChatWidget {
    visibility: Visibility,
    zoom: Zoom,
    frame: Frame,
    transcript: Transcript,
    interaction: Interaction,
    layout_save_failed: bool,
}

impl Default for ChatWidget {
    fn default() -> Self {
        Self {
            visibility: Visibility::Hidden,
            zoom: Zoom::default(),
            frame: Frame::default(),
            transcript: Transcript::default(),
            interaction: Interaction::Idle,
            layout_save_failed: false,
        }
    }
}

impl ChatWidget {
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.interaction, Interaction::Dragging(_))
    }

    pub fn is_resizing(&self) -> bool {
        matches!(self.interaction, Interaction::Resizing(_))
    }
}

/// Result of a show/hide request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub visibility: Visibility,
    /// Focus the message box after this delay (only when shown)
    pub focus_after: Option<Duration>,
}

/// What a send did to the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing changed
    Ignored,
    /// No API key; a notice replaced the reply
    NeedsConfiguration,
    /// Preferences could not be read; a notice replaced the reply
    SettingsUnavailable,
    Replied(EntryId),
    Failed(EntryId),
}

/// Draws the widget. Implementations must not call back into the controller.
pub trait WidgetView {
    fn render(&self, widget: &ChatWidget);
}

pub struct WidgetController<S, C> {
    state: RefCell<ChatWidget>,
    store: Rc<SettingsStore<S>>,
    completer: Rc<C>,
    view: Box<dyn WidgetView>,
}

impl<S: StorageArea, C: Completer> WidgetController<S, C> {
    /// Builds a hidden widget and draws it once
    pub fn new(store: Rc<SettingsStore<S>>, completer: Rc<C>, view: Box<dyn WidgetView>) -> Self {
        let controller = Self {
            state: RefCell::new(ChatWidget::default()),
            store,
            completer,
            view,
        };
        controller.view.render(&controller.state.borrow());
        controller
    }

    pub fn state(&self) -> Ref<'_, ChatWidget> {
        self.state.borrow()
    }

    fn update<R>(&self, f: impl FnOnce(&mut ChatWidget) -> R) -> R {
        let result = f(&mut self.state.borrow_mut());
        self.view.render(&self.state.borrow());
        result
    }

    /// Applies the stored geometry and zoom, if any
    pub async fn restore(&self) {
        match self.store.load_geometry().await {
            Ok(Some(stored)) => {
                let frame = Frame::restore(&stored);
                self.update(|widget| widget.frame = frame);
            }
            Ok(None) => {}
            Err(e) => warn!("[widget] failed to load saved position: {}", e),
        }
        match self.store.load_zoom().await {
            Ok(Some(level)) => {
                let zoom = Zoom::new(level);
                self.update(|widget| widget.zoom = zoom);
            }
            Ok(None) => {}
            Err(e) => warn!("[widget] failed to load saved zoom: {}", e),
        }
    }

    pub fn toggle(&self) -> ToggleOutcome {
        let visibility = self.update(|widget| {
            widget.visibility = match widget.visibility {
                Visibility::Hidden => Visibility::Visible,
                Visibility::Visible => Visibility::Hidden,
            };
            widget.interaction = Interaction::Idle;
            widget.visibility
        });
        debug!("[widget] toggled to {:?}", visibility);
        ToggleOutcome {
            visibility,
            focus_after: (visibility == Visibility::Visible).then_some(FOCUS_DELAY),
        }
    }

    pub async fn zoom_in(&self) -> Zoom {
        self.zoom_by(1).await
    }

    pub async fn zoom_out(&self) -> Zoom {
        self.zoom_by(-1).await
    }

    async fn zoom_by(&self, steps: i32) -> Zoom {
        let zoom = self.update(|widget| {
            widget.zoom = widget.zoom.stepped(steps);
            widget.zoom
        });
        let result = self.store.save_zoom(zoom.level()).await;
        self.record_layout_save(result);
        zoom
    }

    /// Header pressed; `origin` is the widget's current on-screen top-left
    pub fn begin_drag(&self, pointer: Point, origin: Point) {
        self.update(|widget| {
            widget.interaction = Interaction::Dragging(DragSession::new(pointer, origin));
        });
    }

    /// Moves the widget while a drag is active; does nothing otherwise
    pub async fn drag_to(&self, pointer: Point, viewport: Size) {
        let frame = self.update(|widget| {
            let Interaction::Dragging(drag) = widget.interaction else {
                return None;
            };
            widget.frame.position =
                drag.position_at(pointer, widget.frame.size, widget.zoom, viewport);
            Some(widget.frame)
        });
        if let Some(frame) = frame {
            self.save_frame(frame).await;
        }
    }

    /// Resize handle pressed
    pub fn begin_resize(&self, pointer: Point) {
        self.update(|widget| {
            let size = widget.frame.size;
            widget.interaction = Interaction::Resizing(ResizeSession::new(pointer, size));
        });
    }

    /// Resizes the widget while a resize is active; does nothing otherwise
    pub async fn resize_to(&self, pointer: Point) {
        let frame = self.update(|widget| {
            let Interaction::Resizing(resize) = widget.interaction else {
                return None;
            };
            widget.frame.size = resize.size_at(pointer, widget.zoom);
            Some(widget.frame)
        });
        if let Some(frame) = frame {
            self.save_frame(frame).await;
        }
    }

    /// Pointer released; ends any drag or resize
    pub fn end_interaction(&self) {
        self.update(|widget| widget.interaction = Interaction::Idle);
    }

    async fn save_frame(&self, frame: Frame) {
        let result = self.store.save_geometry(&frame.to_stored()).await;
        self.record_layout_save(result);
    }

    /// Reports the first of a run of layout write failures in the transcript
    fn record_layout_save(&self, result: Result<(), StoreError>) {
        match result {
            Ok(()) => {
                if self.state.borrow().layout_save_failed {
                    self.state.borrow_mut().layout_save_failed = false;
                }
            }
            Err(e) => {
                warn!("[widget] failed to save layout: {}", e);
                if !self.state.borrow().layout_save_failed {
                    self.update(|widget| {
                        widget.layout_save_failed = true;
                        widget.transcript.push(
                            Speaker::Notice,
                            format!("Could not save window layout: {}", e),
                            EntryStatus::Done,
                        );
                    });
                }
            }
        }
    }

    /// Sends one user message and resolves its reply in place
    pub async fn send(&self, input: &str) -> SendOutcome {
        let message = input.trim();
        if message.is_empty() {
            return SendOutcome::Ignored;
        }

        let mut messages: Vec<Turn> = self.state.borrow().transcript.history();
        messages.push(Turn::user(message));
        self.update(|widget| {
            widget
                .transcript
                .push(Speaker::User, message, EntryStatus::Done)
        });

        let prefs = match self.store.load_preferences().await {
            Ok(prefs) => prefs,
            Err(e) => {
                error!("[send] failed to read preferences: {}", e);
                self.push_notice(format!("Could not read settings: {}", e));
                return SendOutcome::SettingsUnavailable;
            }
        };

        if prefs.api_key().is_none() {
            info!("[send] no API key configured");
            self.push_notice(MISSING_API_KEY_NOTICE.to_string());
            return SendOutcome::NeedsConfiguration;
        }

        let placeholder = self.update(|widget| {
            widget
                .transcript
                .push(Speaker::Assistant, THINKING_PLACEHOLDER, EntryStatus::Loading)
        });
        info!(
            "[send] requesting reply {} with {} messages",
            placeholder.value(),
            messages.len()
        );

        match self.completer.complete(messages, &prefs).await {
            Ok(reply) => {
                self.update(|widget| {
                    widget
                        .transcript
                        .resolve(placeholder, reply, EntryStatus::Done)
                });
                SendOutcome::Replied(placeholder)
            }
            Err(e) => {
                warn!("[send] reply {} failed: {}", placeholder.value(), e);
                self.update(|widget| {
                    widget.transcript.resolve(
                        placeholder,
                        format!("Error: {}", e),
                        EntryStatus::Failed,
                    )
                });
                SendOutcome::Failed(placeholder)
            }
        }
    }

    fn push_notice(&self, text: String) {
        self.update(|widget| {
            widget
                .transcript
                .push(Speaker::Notice, text, EntryStatus::Done)
        });
    }
}
