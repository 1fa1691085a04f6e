//! RAII lock guard.

use super::repo_lock::RepoLock;

/// Holds a lock until dropped.
///
/// Release goes through [`RepoLock::release`], so it is token-checked and
/// never panics; a guard whose lock was already recovered by someone else
/// leaves the new holder untouched.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a RepoLock,
    token: String,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub(super) fn new(lock: &'a RepoLock, token: String) -> Self {
        Self {
            lock,
            token,
            released: false,
        }
    }

    /// Token of this acquisition.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Release now instead of at end of scope.
    pub fn release(mut self) {
        self.released = true;
        self.lock.release(&self.token);
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.lock.release(&self.token);
        }
    }
}
