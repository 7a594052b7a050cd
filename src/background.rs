//! Background dispatcher: turns icon clicks and the hotkey into a toggle
//! message for the active tab, injecting the widget script when needed.

use log::{debug, info};

use crate::models::{RuntimeMessage, Tab};
use crate::paths::{is_protected_url, CONTENT_SCRIPT, INJECTION_RETRY_DELAY, TOGGLE_COMMAND};
use crate::platform::{Delay, ScriptInjector, TabMessenger, TabQuery};

/// What happened to one toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Browser-internal page, or no tab to act on
    Skipped,
    Delivered,
    /// The script was missing; injected, then the retry got through
    DeliveredAfterInjection,
    /// Injection or the single retry failed; dropped silently
    Dropped,
}

pub struct Dispatcher<M, I, D> {
    messenger: M,
    injector: I,
    delay: D,
}

impl<M, I, D> Dispatcher<M, I, D>
where
    M: TabMessenger,
    I: ScriptInjector,
    D: Delay,
{
    pub fn new(messenger: M, injector: I, delay: D) -> Self {
        Self {
            messenger,
            injector,
            delay,
        }
    }

    /// Toolbar icon clicked on `tab`
    pub async fn on_action_clicked(&self, tab: &Tab) -> DispatchOutcome {
        self.toggle_tab(tab).await
    }

    /// Keyboard command fired; only the toggle command is handled
    pub async fn on_command(&self, command: &str, tabs: &impl TabQuery) -> DispatchOutcome {
        if command != TOGGLE_COMMAND {
            debug!("[dispatch] ignoring command {}", command);
            return DispatchOutcome::Skipped;
        }
        match tabs.active_tab().await {
            Some(tab) => self.toggle_tab(&tab).await,
            None => DispatchOutcome::Skipped,
        }
    }

    pub async fn toggle_tab(&self, tab: &Tab) -> DispatchOutcome {
        if tab.url.as_deref().is_some_and(is_protected_url) {
            debug!("[dispatch] tab {} is a protected page", tab.id);
            return DispatchOutcome::Skipped;
        }

        if self.messenger.send(tab.id, RuntimeMessage::Toggle).await.is_ok() {
            return DispatchOutcome::Delivered;
        }

        info!("[dispatch] no widget in tab {}, injecting {}", tab.id, CONTENT_SCRIPT);
        if let Err(e) = self.injector.inject(tab.id, CONTENT_SCRIPT).await {
            debug!("[dispatch] {}", e);
            return DispatchOutcome::Dropped;
        }

        self.delay.sleep(INJECTION_RETRY_DELAY).await;

        match self.messenger.send(tab.id, RuntimeMessage::Toggle).await {
            Ok(()) => DispatchOutcome::DeliveredAfterInjection,
            Err(e) => {
                debug!("[dispatch] retry failed: {}", e);
                DispatchOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::DeliveryError;

    /// Delivery succeeds once `listening` is set; injecting may set it
    #[derive(Default)]
    struct FakeTab {
        listening: Cell<bool>,
        injection_starts_listener: bool,
        injection_fails: bool,
        sends: Cell<usize>,
        injections: RefCell<Vec<(i32, String)>>,
    }

    #[async_trait(?Send)]
    impl<'a> TabMessenger for &'a FakeTab {
        async fn send(&self, tab_id: i32, message: RuntimeMessage) -> Result<(), DeliveryError> {
            assert_eq!(message, RuntimeMessage::Toggle);
            self.sends.set(self.sends.get() + 1);
            if self.listening.get() {
                Ok(())
            } else {
                Err(DeliveryError::NoReceiver(tab_id))
            }
        }
    }

    #[async_trait(?Send)]
    impl<'a> ScriptInjector for &'a FakeTab {
        async fn inject(&self, tab_id: i32, file: &str) -> Result<(), DeliveryError> {
            self.injections.borrow_mut().push((tab_id, file.to_string()));
            if self.injection_fails {
                return Err(DeliveryError::InjectionFailed {
                    tab_id,
                    reason: "Cannot access contents of the page".to_string(),
                });
            }
            if self.injection_starts_listener {
                self.listening.set(true);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        sleeps: RefCell<Vec<Duration>>,
    }

    #[async_trait(?Send)]
    impl<'a> Delay for &'a RecordingDelay {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    struct ActiveTab(Option<Tab>);

    #[async_trait(?Send)]
    impl TabQuery for ActiveTab {
        async fn active_tab(&self) -> Option<Tab> {
            self.0.clone()
        }
    }

    fn tab(url: &str) -> Tab {
        Tab {
            id: 7,
            url: Some(url.to_string()),
        }
    }

    #[tokio::test]
    async fn delivers_directly_when_widget_is_listening() {
        let fake = FakeTab {
            listening: Cell::new(true),
            ..Default::default()
        };
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let outcome = dispatcher.on_action_clicked(&tab("https://example.com")).await;
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert!(fake.injections.borrow().is_empty());
        assert!(delay.sleeps.borrow().is_empty());
    }

    #[tokio::test]
    async fn protected_pages_are_skipped_without_any_call() {
        let fake = FakeTab::default();
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        for url in ["chrome://settings", "chrome-extension://id/options.html", "edge://newtab"] {
            assert_eq!(dispatcher.toggle_tab(&tab(url)).await, DispatchOutcome::Skipped);
        }
        assert_eq!(fake.sends.get(), 0);
    }

    #[tokio::test]
    async fn injects_then_retries_once_after_delay() {
        let fake = FakeTab {
            injection_starts_listener: true,
            ..Default::default()
        };
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let outcome = dispatcher.toggle_tab(&tab("https://example.com")).await;
        assert_eq!(outcome, DispatchOutcome::DeliveredAfterInjection);
        assert_eq!(*fake.injections.borrow(), vec![(7, "content.js".to_string())]);
        assert_eq!(*delay.sleeps.borrow(), vec![Duration::from_millis(100)]);
        assert_eq!(fake.sends.get(), 2);
    }

    #[tokio::test]
    async fn second_failure_is_dropped_silently() {
        let fake = FakeTab::default();
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let outcome = dispatcher.toggle_tab(&tab("https://example.com")).await;
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert_eq!(fake.sends.get(), 2);
    }

    #[tokio::test]
    async fn failed_injection_skips_the_retry() {
        let fake = FakeTab {
            injection_fails: true,
            ..Default::default()
        };
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let outcome = dispatcher.toggle_tab(&tab("https://example.com")).await;
        assert_eq!(outcome, DispatchOutcome::Dropped);
        assert_eq!(fake.sends.get(), 1);
        assert!(delay.sleeps.borrow().is_empty());
    }

    #[tokio::test]
    async fn hotkey_targets_the_active_tab() {
        let fake = FakeTab {
            listening: Cell::new(true),
            ..Default::default()
        };
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let active = ActiveTab(Some(tab("https://example.com")));
        assert_eq!(
            dispatcher.on_command("toggle-chat", &active).await,
            DispatchOutcome::Delivered
        );
        assert_eq!(
            dispatcher.on_command("other-command", &active).await,
            DispatchOutcome::Skipped
        );
        assert_eq!(
            dispatcher.on_command("toggle-chat", &ActiveTab(None)).await,
            DispatchOutcome::Skipped
        );
        assert_eq!(fake.sends.get(), 1);
    }

    #[tokio::test]
    async fn tabs_without_url_are_still_toggled() {
        let fake = FakeTab {
            listening: Cell::new(true),
            ..Default::default()
        };
        let delay = RecordingDelay::default();
        let dispatcher = Dispatcher::new(&fake, &fake, &delay);

        let outcome = dispatcher.toggle_tab(&Tab { id: 3, url: None }).await;
        assert_eq!(outcome, DispatchOutcome::Delivered);
    }
}
