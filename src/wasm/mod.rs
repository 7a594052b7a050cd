//! Browser bindings. Each extension context calls its own entry point
//! from a small JS loader in `extension/`.

mod chrome;
mod content;
mod logging;
mod options_page;

use log::{error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::background::{DispatchOutcome, Dispatcher};
use crate::models::Tab;

use chrome::{from_js, ChromeTabs, TimerDelay};

fn dispatcher() -> Dispatcher<ChromeTabs, ChromeTabs, TimerDelay> {
    Dispatcher::new(ChromeTabs, ChromeTabs, TimerDelay)
}

fn log_outcome(outcome: DispatchOutcome) {
    log::debug!("[dispatch] {:?}", outcome);
}

/// `chrome.action.onClicked` forwarded by the service worker loader
#[wasm_bindgen]
pub fn on_action_clicked(tab: JsValue) {
    logging::init();
    let tab = match from_js::<Tab>(tab) {
        Ok(tab) => tab,
        Err(e) => {
            warn!("[dispatch] clicked tab is unreadable: {}", e);
            return;
        }
    };
    spawn_local(async move {
        log_outcome(dispatcher().on_action_clicked(&tab).await);
    });
}

/// `chrome.commands.onCommand` forwarded by the service worker loader
#[wasm_bindgen]
pub fn on_command(command: String) {
    logging::init();
    spawn_local(async move {
        log_outcome(dispatcher().on_command(&command, &ChromeTabs).await);
    });
}

/// Content-script entry; safe to call again after re-injection
#[wasm_bindgen]
pub fn start_content() {
    logging::init();
    if let Err(e) = content::start() {
        error!("[page] failed to start widget: {}", e);
    }
}

#[wasm_bindgen]
pub fn start_options() {
    logging::init();
    if let Err(e) = options_page::start() {
        error!("[options] failed to bind settings form: {}", e);
    }
}
