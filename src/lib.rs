//! # DRLVis: Training Telemetry for Reinforcement Learning
//!
//! **Version**: 0.1.0
//!
//! DRLVis records heterogeneous training signals of an RL run into an
//! append-only event log and reconstructs dashboard-ready views from it.
//!
//! ## Data Flow
//!
//! ```text
//! TelemetryRecorder ──put──▶ EventWriter (MemoryEventStore | ParquetEventLog)
//!                                   │ load_snapshot
//!                                   ▼
//! Route ──▶ QueryEngine ◀──read── EventReader (MemoryEventStore)
//! ```
//!
//! - [`taxonomy`]: how signals are named (`Category` + `Tag`)
//! - [`recorder`]: write path, one operation per signal kind
//! - [`store`]: event store interface and its two backends
//! - [`analytics`]: softmax, divergence, entropy, projection, trend fits
//! - [`query`]: read path, typed views with missing data turned into empty
//!   results
//! - [`api`]: the dashboard's routes as a parsed [`api::Route`]
//!
//! ## Example Usage
//!
//! ```rust
//! use drlvis::query::QueryEngine;
//! use drlvis::recorder::TelemetryRecorder;
//! use drlvis::store::MemoryEventStore;
//!
//! # fn main() -> drlvis::Result<()> {
//! let mut recorder = TelemetryRecorder::new(MemoryEventStore::new());
//! for episode in 0..3 {
//!     recorder.record_episode_return(10.0 * episode as f64, episode)?;
//!     recorder.record_custom_episode_scalar(0.5, episode, "loss")?;
//! }
//!
//! let engine = QueryEngine::new(recorder.into_inner());
//! assert_eq!(engine.list_global_tags()?.log_tags, vec!["loss"]);
//!
//! let response = engine.handle("/episode-rewards", None);
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body["2"][0], 20.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod event;
pub mod query;
pub mod recorder;
pub mod store;
pub mod taxonomy;
pub mod tensor;

pub use error::{Error, Result};
