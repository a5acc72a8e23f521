//! Background feed puller.
//!
//! Keeps a set of RSS/Atom/JSON feeds fresh: a periodic sweep decides which
//! feeds are due, fetches them with bounded concurrency, inserts new items
//! and records each feed's outcome. A failure on one feed never affects the
//! others.
//!
//! - [`pull`] - the engine ([`pull::Puller`])
//! - [`feed`] - the HTTP fetch collaborator
//! - [`storage`] - the SQLite feed and item stores
//! - [`config`] - TOML configuration
//! - [`util`] - URL validation

pub mod config;
pub mod feed;
pub mod pull;
pub mod storage;
pub mod util;
