//! Reentrant async lock driven by explicit tokens.
//!
//! Acquiring returns a guard carrying a [`LockToken`]. Call chains that must
//! re-enter the lock (post-processing that triggers nested loads) pass the
//! token down explicitly; acquiring with the holder's token is a no-op.
//! Waiters without the token queue in FIFO order behind the holder.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// Proof of holding a [`ReentrantLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(u64);

const NO_HOLDER: u64 = 0;

pub struct ReentrantLock {
    name: &'static str,
    mutex: Mutex<()>,
    holder: AtomicU64,
    next_token: AtomicU64,
}

impl ReentrantLock {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            mutex: Mutex::new(()),
            holder: AtomicU64::new(NO_HOLDER),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the lock, or re-enter it if `token` belongs to the current holder.
    pub async fn lock(&self, token: Option<LockToken>) -> LockGuard<'_> {
        if let Some(token) = token {
            if self.holder.load(Ordering::Acquire) == token.0 {
                tracing::trace!(lock = self.name, "Re-entered lock");
                return LockGuard {
                    lock: self,
                    token,
                    guard: None,
                };
            }
            tracing::debug!(lock = self.name, "Stale lock token, acquiring");
        }

        let guard = self.mutex.lock().await;
        let token = LockToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.holder.store(token.0, Ordering::Release);
        LockGuard {
            lock: self,
            token,
            guard: Some(guard),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.holder.load(Ordering::Acquire) != NO_HOLDER
    }
}

/// Held for the duration of a critical section. Only the outermost guard releases.
pub struct LockGuard<'a> {
    lock: &'a ReentrantLock,
    token: LockToken,
    guard: Option<MutexGuard<'a, ()>>,
}

impl LockGuard<'_> {
    pub fn token(&self) -> LockToken {
        self.token
    }

    pub fn is_reentrant(&self) -> bool {
        self.guard.is_none()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            self.lock.holder.store(NO_HOLDER, Ordering::Release);
        }
    }
}
