//! Cardharvest runtime: drives the chat application in Chromium and wires
//! the core pipeline to a live page, a terminal trigger and the CLI.
//!
//! This library crate exposes the modules for integration testing.

pub mod cli;
pub mod logging;
pub mod page_host;
pub mod page_sink;
pub mod renderer;
pub mod settings;
pub mod trigger;
