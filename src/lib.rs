//! # rustpubsync
//!
//! Google Scholar publication list sync - incremental fetch with cache reconciliation
//!
//! ## Modules
//!
//! - [`sync`] - One synchronization pass, end to end
//! - [`reconcile`] - Cache reconciliation against upstream summaries
//! - [`scholar`] - Google Scholar profile client
//! - [`proxy`] - Proxy provisioning (paid or free pool)
//! - [`retry`] - Bounded retry with exponential backoff
//! - [`normalize`] - Upstream shapes to canonical records
//! - [`sequence`] - Output ordering
//! - [`store`] - Output file persistence
//! - [`config`] - Run configuration and policy modes
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpubsync::{config::SyncConfig, sync};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::new("u9i3_ywAAAAJ", "publications.json");
//!     let (_route, report) = sync::sync_publications(&config).await?;
//!     println!("{:?}", report);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod proxy;
pub mod reconcile;
pub mod record;
pub mod retry;
pub mod scholar;
pub mod sequence;
pub mod store;
pub mod sync;

pub use error::{Result, SyncError};
