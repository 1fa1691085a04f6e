//! Human-readable ID allocation.
//!
//! IDs such as `BRIK-001` or `AGENT-TASK-0042` come from a persisted counter
//! table (`.docket/counters.json`) keyed by namespace, then category. Every
//! read-increment-write cycle runs under the repo lock and the table is
//! replaced atomically, so concurrent allocators in different processes never
//! hand out the same ID and a crash never truncates the table.

mod allocator;
mod format;

#[cfg(test)]
mod tests;

pub use allocator::{CounterTable, IdAllocator};
pub use format::{format_id, resolve_format, validate_key};
