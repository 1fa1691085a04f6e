//! Filesystem write coordination for a shared markdown document store.
//!
//! Independent processes coordinate through files under `.docket/`:
//!
//! - [`locks`]: one exclusive-create lock file serializing all writes, with
//!   stale-holder recovery
//! - [`ids`]: gap-free counters allocated under that lock
//! - [`guard`]: content hashes for optimistic concurrency on documents
//! - [`task`]: a queue of task descriptors, claimed atomically
//! - [`runs`]: one append-only record per task run
//! - [`worker`]: the polling loop that claims and executes tasks

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod guard;
pub mod ids;
pub mod locks;
pub mod runs;
pub mod task;
pub mod worker;
