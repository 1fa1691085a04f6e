//! Storage primitive underneath the lock.
//!
//! The stale-recovery logic in [`super::RepoLock`] only needs an atomic
//! "create if absent" plus plain reads and deletes. Deployments on storage
//! without exclusive create (some object stores) can implement
//! [`LockBackend`] over a service with conditional writes instead.

use std::fmt::Debug;
use std::io;
use std::path::Path;

/// Storage operations the lock is built on.
pub trait LockBackend: Debug + Send + Sync {
    /// Publish `content` at `path` only if nothing is there.
    ///
    /// Returns `Ok(true)` if this call created it, `Ok(false)` if the path
    /// was already taken. Must be atomic with respect to other callers.
    fn create_exclusive(&self, path: &Path, content: &[u8]) -> io::Result<bool>;

    /// Read the current content, or `None` if absent.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete the entry. Deleting an absent entry succeeds.
    fn remove(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Local or shared-volume filesystem backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFsBackend;

impl LockBackend for LocalFsBackend {
    fn create_exclusive(&self, path: &Path, content: &[u8]) -> io::Result<bool> {
        crate::fs::create_exclusive(path, content)
    }
}
