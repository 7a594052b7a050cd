//! Browser capabilities the core depends on.
//!
//! The browser build implements these over the `chrome.*` extension APIs;
//! tests implement them with in-memory fakes. Browser futures are not
//! `Send`, so every async trait here is `?Send`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CatalogError, DeliveryError};
use crate::models::{RuntimeMessage, Tab};

/// Delivers runtime messages to the script running in a tab.
#[async_trait(?Send)]
pub trait TabMessenger {
    async fn send(&self, tab_id: i32, message: RuntimeMessage) -> Result<(), DeliveryError>;
}

/// Injects extension scripts into a tab.
#[async_trait(?Send)]
pub trait ScriptInjector {
    async fn inject(&self, tab_id: i32, file: &str) -> Result<(), DeliveryError>;
}

/// Looks up the tab the user is looking at.
#[async_trait(?Send)]
pub trait TabQuery {
    async fn active_tab(&self) -> Option<Tab>;
}

/// Opens a new tab.
#[async_trait(?Send)]
pub trait TabOpener {
    async fn open(&self, url: &str) -> Result<(), String>;
}

/// Suspends the current task.
#[async_trait(?Send)]
pub trait Delay {
    async fn sleep(&self, duration: Duration);
}

/// Reads the raw model catalog document.
#[async_trait(?Send)]
pub trait CatalogSource {
    async fn fetch(&self) -> Result<String, CatalogError>;
}
