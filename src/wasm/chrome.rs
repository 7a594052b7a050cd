//! `chrome.*` bindings and the capability implementations built on them

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{CatalogError, DeliveryError, StoreError};
use crate::models::{RuntimeMessage, Tab};
use crate::paths::MODEL_CATALOG;
use crate::platform::{CatalogSource, Delay, ScriptInjector, TabMessenger, TabOpener, TabQuery};
use crate::store::StorageArea;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = get)]
    async fn storage_sync_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "sync"], js_name = set)]
    async fn storage_sync_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn storage_local_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn storage_local_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    async fn tabs_send_message(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = create)]
    async fn tabs_create(properties: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "scripting"], js_name = executeScript)]
    async fn scripting_execute_script(injection: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime"], js_name = getURL)]
    pub(crate) fn runtime_get_url(path: &str) -> String;

    #[wasm_bindgen(js_namespace = ["chrome", "runtime", "onMessage"], js_name = addListener)]
    pub(crate) fn add_runtime_message_listener(
        listener: &Closure<dyn FnMut(JsValue, JsValue, JsValue)>,
    );
}

/// Converts to a plain JS object (not a `Map`), as the extension APIs expect
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| e.to_string())
}

pub(crate) fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, String> {
    serde_wasm_bindgen::from_value(value).map_err(|e| e.to_string())
}

/// Best-effort text of a rejected promise
pub(crate) fn js_error_text(error: &JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    error.as_string().unwrap_or_else(|| format!("{:?}", error))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChromeStorageArea {
    Sync,
    Local,
}

#[async_trait(?Send)]
impl StorageArea for ChromeStorageArea {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let keys = to_js(keys).map_err(StoreError::Backend)?;
        let items = match self {
            ChromeStorageArea::Sync => storage_sync_get(keys).await,
            ChromeStorageArea::Local => storage_local_get(keys).await,
        }
        .map_err(|e| StoreError::Backend(js_error_text(&e)))?;
        from_js(items).map_err(StoreError::Backend)
    }

    async fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let items = to_js(&items).map_err(StoreError::Backend)?;
        match self {
            ChromeStorageArea::Sync => storage_sync_set(items).await,
            ChromeStorageArea::Local => storage_local_set(items).await,
        }
        .map(|_| ())
        .map_err(|e| StoreError::Backend(js_error_text(&e)))
    }
}

/// The `chrome.tabs` and `chrome.scripting` APIs
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ChromeTabs;

#[async_trait(?Send)]
impl TabMessenger for ChromeTabs {
    async fn send(&self, tab_id: i32, message: RuntimeMessage) -> Result<(), DeliveryError> {
        let message = to_js(&message).map_err(|_| DeliveryError::NoReceiver(tab_id))?;
        tabs_send_message(tab_id, message)
            .await
            .map(|_| ())
            .map_err(|_| DeliveryError::NoReceiver(tab_id))
    }
}

#[async_trait(?Send)]
impl ScriptInjector for ChromeTabs {
    async fn inject(&self, tab_id: i32, file: &str) -> Result<(), DeliveryError> {
        let injection = to_js(&json!({
            "target": { "tabId": tab_id },
            "files": [file],
        }))
        .map_err(|reason| DeliveryError::InjectionFailed { tab_id, reason })?;

        scripting_execute_script(injection)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::InjectionFailed {
                tab_id,
                reason: js_error_text(&e),
            })
    }
}

#[async_trait(?Send)]
impl TabQuery for ChromeTabs {
    async fn active_tab(&self) -> Option<Tab> {
        let query = to_js(&json!({ "active": true, "currentWindow": true })).ok()?;
        let tabs = match tabs_query(query).await {
            Ok(tabs) => tabs,
            Err(e) => {
                log::warn!("[dispatch] tab query failed: {}", js_error_text(&e));
                return None;
            }
        };
        match from_js::<Vec<Tab>>(tabs) {
            Ok(tabs) => tabs.into_iter().next(),
            Err(e) => {
                log::warn!("[dispatch] unexpected tab list: {}", e);
                None
            }
        }
    }
}

#[async_trait(?Send)]
impl TabOpener for ChromeTabs {
    async fn open(&self, url: &str) -> Result<(), String> {
        let properties = to_js(&json!({ "url": url }))?;
        tabs_create(properties)
            .await
            .map(|_| ())
            .map_err(|e| js_error_text(&e))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TimerDelay;

#[async_trait(?Send)]
impl Delay for TimerDelay {
    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

/// The catalog bundled with the extension package
#[derive(Debug, Clone, Default)]
pub(crate) struct BundledCatalog {
    client: reqwest::Client,
}

#[async_trait(?Send)]
impl CatalogSource for BundledCatalog {
    async fn fetch(&self) -> Result<String, CatalogError> {
        let url = runtime_get_url(MODEL_CATALOG);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CatalogError::Fetch(format!(
                "{} returned HTTP {}",
                url,
                response.status().as_u16()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))
    }
}
