//! # kinship-core
//!
//! A Rust library for keeping bidirectional relationship properties
//! consistent across a vault of markdown documents.
//!
//! ## Overview
//!
//! kinship-core watches the parent, children, and related front-matter
//! properties of a document collection and keeps the inverse side of every
//! relationship synchronized automatically: declare `parent: Index.md` in a
//! child and the engine writes the matching `children` entry into
//! `Index.md`, and vice versa. On top of the relationship graph it derives
//! sibling `related` edges, resolves a single primary parent per document,
//! assigns stable zettel identifiers exactly once, and derives display
//! titles from filename conventions.
//!
//! ### Key Features
//!
//! - **Bidirectional sync**: Edits to either side of a relationship
//!   propagate to the other side's document
//! - **Cycle refusal**: Parent edges that would close a loop in the primary
//!   parent chain are rejected and reverted in the source document
//! - **Deterministic conflict resolution**: Multi-parent documents resolve
//!   to a single primary parent, by marker property or lexicographic order
//! - **Error tolerance**: Malformed properties and dangling references
//!   become diagnostics, never aborts
//! - **Incremental and full indexing**: Single-document reconciliation with
//!   a cancellable, batched full rescan
//! - **Store seam**: The [`store::DocumentStore`] trait isolates the engine
//!   from the filesystem; [`store::FileStore`] is the markdown-on-disk
//!   implementation
//!
//! ## Quick Start
//!
//! Reconcile a vault directory once:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kinship_core::{config::SyncConfig, indexer::VaultIndexer, store::FileStore};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileStore::new("./vault")?);
//!     let mut indexer = VaultIndexer::new(store, SyncConfig::default());
//!
//!     let report = indexer.full_rescan().await?;
//!     println!("reconciled {} document(s)", report.processed);
//!     for diagnostic in &report.diagnostics {
//!         println!("warning: {diagnostic}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Continuous Watching (requires the `service` feature)
//!
//! ```rust,no_run
//! # #[cfg(feature = "service")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use kinship_core::{config::SyncConfig, event::Event, watch::WatchService};
//! use tokio::sync::mpsc::unbounded_channel;
//!
//! let (tx, mut rx) = unbounded_channel::<Event>();
//! let service = WatchService::new("./vault", SyncConfig::default(), tx)?;
//! service.enable_watching()?;
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         Event::Vault(vault_event) => println!("{vault_event}"),
//!         Event::Ping => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod assign;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod event;
pub mod graph;
pub mod indexer;
pub mod normalize;
pub mod properties;
pub mod resolve;
pub mod store;
#[cfg(all(feature = "service", not(target_arch = "wasm32")))]
pub mod watch;

pub use error::*;
