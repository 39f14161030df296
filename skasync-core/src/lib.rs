//! The sync pipeline: ignore predicates, the file-tree walker, the archive
//! builder, the two change providers, the aggregation gateway, the
//! deploy-status probe and gate, the target registry, the fan-out
//! synchronizer, and the progress multiplexer.
//!
//! Grounded end to end on the `original_source/pkg/**` tree this crate
//! generalizes (see `DESIGN.md` for the per-module ledger).

pub mod archive;
pub mod artifact;
pub mod cluster;
pub mod error;
pub mod gateway;
pub mod ignore;
pub mod progress;
pub mod registry;
pub mod status;
pub mod sync;
pub mod target;
pub mod walk;
pub mod watch;

pub use artifact::Artifact;
pub use error::{Result, SyncError};
pub use ignore::IgnorePredicate;
pub use registry::{EndpointConfig, Registry, SharedRegistry};
pub use sync::{SyncConfig, Synchronizer, TargetSyncReport};
pub use target::Target;
