//! WinGPT: a floating, draggable chat widget injected into web pages.
//!
//! The core (widget state, dispatch, settings, completion client) is plain
//! Rust over the capability traits in [`platform`] and [`store`]. The
//! `wasm` module binds it to the browser extension runtime.

// Module declarations
pub mod background;
pub mod catalog;
pub mod completion;
pub mod error;
pub mod models;
pub mod options;
pub mod page;
pub mod paths;
pub mod platform;
pub mod prompts;
pub mod store;
pub mod widget;

#[cfg(target_arch = "wasm32")]
mod wasm;
