#![deny(missing_docs)]
//! Filmlink bot library.
//!
//! Telegram movie search bot that hands out short-lived download redirect links.

/// Telegram-specific bot logic.
pub mod bot;
/// OMDb catalog client.
pub mod catalog;
/// Configuration management.
pub mod config;
/// Temporary redirect links.
pub mod links;
/// Runtime entrypoint wiring the bot, the HTTP server and the sweeper.
pub mod runner;
/// Download link scraping.
pub mod scrape;
/// Utility functions.
pub mod utils;
/// Redirect HTTP endpoint.
pub mod web;
