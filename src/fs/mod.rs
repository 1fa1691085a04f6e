//! Filesystem primitives for docket.
//!
//! Two building blocks carry all of the crash- and race-safety in this crate:
//! - [`atomic_write`]: temp file + fsync + rename, so readers see either the
//!   old or the new content and never a truncated file.
//! - [`create_exclusive`]: publish a file only if nothing exists at the path,
//!   in one atomic step. This is the only true mutual-exclusion primitive the
//!   lock relies on.

pub mod atomic;
mod exclusive;

pub use atomic::{atomic_write, atomic_write_file};
pub use exclusive::create_exclusive;
