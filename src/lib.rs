//! pollmq – a minimal long-polling message queue.
//!
//! This crate exports
//!  * `core`    – message store, waiter registry and the broker coordinating them
//!  * `api`     – HTTP dispatch (`PUT`/`GET` on `/{queue}`)
//!  * `server`  – listener startup and graceful shutdown
//!  * `config`  – TOML + environment runtime configuration
//!
//! Embedders construct one [`Broker`] and either call it directly or serve
//! it with [`start_broker`].

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod api;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod server;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use crate::core::broker::{Broker, Routed};
pub use config::{load_config, Config};
pub use server::serve as start_broker;
