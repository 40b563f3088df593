//! Brand intelligence pipeline library.
//!
//! Exposes the core modules for use by the binary and by tests.
//! `api` and `middleware` depend on `AppState` built in `main.rs` and are not
//! re-exported here.

pub mod cache;
pub mod config;
pub mod errors;
pub mod evidence;
pub mod helpers;
pub mod llm;
pub mod models;
pub mod observability;
pub mod phases;
pub mod pool;
pub mod run_store;
pub mod scraper;
