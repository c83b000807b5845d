//! # pruner-core
//!
//! Sliding-window pruning for long, continuously growing chat transcripts.
//!
//! The host page appends message blocks forever; this crate keeps the live
//! part of the document small by archiving older blocks as markup
//! snapshots and restoring them on demand.
//!
//! This crate provides:
//! - Snapshot store: ordered, capacity-bounded buffer of archived markup
//! - Pruning engine: keeps the last `keep` blocks live, archives the rest
//! - Expansion controller: chunked and full re-expansion, and collapse
//! - Change observer: debounces bursty host mutations into single passes
//! - Session: one explicit owner for all of the above, per page
//!
//! ## Architecture
//!
//! The document is reached only through the [`HostDocument`] trait. The
//! browser binding implements it over the live DOM; [`MemoryDocument`]
//! implements it over an arena tree for tests and simulation.
//!
//! Reading the page top to bottom, the store (oldest first), the window
//! region and the live region always concatenate to the full transcript,
//! unless the store overflowed its capacity.
//!
//! ## Example
//!
//! ```rust
//! use pruner_core::{MemoryDocument, PrunerConfig, PrunerSession, Intent};
//!
//! let (doc, _thread) = MemoryDocument::with_transcript(40);
//! let mut session = PrunerSession::detached(doc, PrunerConfig::default()).unwrap();
//!
//! session.prune_now(0);
//! assert_eq!(session.store().len(), 22);
//!
//! session.handle(Intent::ExpandChunk);
//! assert_eq!(session.status().expanded, 20);
//! ```

mod config;
mod control;
mod document;
mod engine;
mod error;
mod expansion;
#[cfg(feature = "memory")]
mod memory;
mod observer;
pub mod regions;
mod selector;
mod session;
mod snapshot;

pub use config::PrunerConfig;
pub use control::{Intent, NullSink, StatusReport, StatusSink};
pub use document::{
    find_message_blocks, is_canvas_open, is_engine_owned, main_region, reserved, HostDocument,
};
pub use engine::{PruneOutcome, PruneReport, PruningEngine, Throttle};
pub use error::{ConfigError, DocumentError, PrunerError, Result};
pub use expansion::{ExpansionController, ExpansionOutcome, ExpansionReport};
#[cfg(feature = "memory")]
pub use memory::{MemoryDocument, NodeId};
pub use observer::{ChangeObserver, ObserverState, Schedule};
pub use selector::{BlockMatcher, Selector, BLOCK_MATCHERS, CANVAS_MARKERS, MAIN_REGION};
pub use session::PrunerSession;
pub use snapshot::{AppendOutcome, Snapshot, SnapshotStore};
