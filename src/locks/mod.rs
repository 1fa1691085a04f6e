//! Cooperative filesystem lock for docket.
//!
//! One lock file per coordination domain (`.docket/locks/repo.lock`) serializes
//! every mutation of shared state: ID allocation, task claims, and the actions
//! the worker runs against the document store. Independent processes (the
//! interactive server, the polling daemon, migration scripts) agree on nothing
//! but that path.
//!
//! # Acquisition
//!
//! The lock is taken by publishing the lock file with **exclusive create**
//! semantics; that single atomic step is the only true mutual-exclusion
//! primitive. Everything else is advisory and only decides whether it is
//! worth attempting the create again:
//!
//! - a record younger than the TTL is respected
//! - an older record is still respected while its holder process is alive
//! - an older record with a dead holder, or an unparseable record, is removed
//!   and the create is retried exactly once
//!
//! Acquisition never blocks. Contention is reported as
//! [`AcquireOutcome::Held`]; callers that want to wait use a [`RetryPolicy`].
//!
//! # Lock Record
//!
//! The lock file holds a JSON [`LockRecord`] with `holderId`, `purpose`, `pid`,
//! `timestamp` (epoch ms) and a random `token` that authorizes release.
//!
//! # Release
//!
//! Release is by token and idempotent: a token that does not match the current
//! holder is a silent no-op, and I/O failures while releasing are logged and
//! swallowed. A lock that could not be removed heals through TTL recovery.

mod backend;
mod guard;
mod liveness;
mod record;
mod repo_lock;
mod retry;


pub use backend::{LocalFsBackend, LockBackend};
pub use guard::LockGuard;
pub use liveness::is_process_alive;
pub use record::{LockRecord, default_holder_id};
pub use repo_lock::{AcquireOutcome, LockInfo, LockStatus, RepoLock};
pub use retry::RetryPolicy;
