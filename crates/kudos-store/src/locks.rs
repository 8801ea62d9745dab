//! Per-entity lock table.
//!
//! Every check-then-write on a shared counter runs while holding the lock
//! for the entity it touches. Locks are keyed by entity id, so operations
//! on different accounts, products, events or budgets never wait on each
//! other. A caller names all the keys it needs up front and receives them
//! together, in [`LockKey`] order; waiting is bounded by the table timeout,
//! after which the acquisition fails with [`StoreError::Conflict`] without
//! having taken anything.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use kudos_core::{AccountId, AdminId, EventId, ProductId, TicketId};

use crate::error::{Result, StoreError};

/// A lockable resource.
///
/// The derived ordering is the acquisition order: ticket, budget, event,
/// account, product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// A redemption ticket's status.
    Ticket(TicketId),
    /// An administrator's budget.
    Budget(AdminId),
    /// An event's award pool.
    Event(EventId),
    /// An account's balance.
    Account(AccountId),
    /// A product's inventory counters.
    Product(ProductId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(id) => write!(f, "ticket:{id}"),
            Self::Budget(id) => write!(f, "budget:{id}"),
            Self::Event(id) => write!(f, "event:{id}"),
            Self::Account(id) => write!(f, "account:{id}"),
            Self::Product(id) => write!(f, "product:{id}"),
        }
    }
}

/// Table of currently held entity locks.
pub struct LockTable {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
    timeout: Duration,
}

impl LockTable {
    /// Create a table whose acquisitions give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// The configured wait bound.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire every key in `keys`.
    ///
    /// Keys are sorted and deduplicated first. Either all of them are taken
    /// or, on timeout, none are.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` naming the first still-held key if the
    /// keys are not all free before the timeout.
    pub fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> Result<LockGuard<'_>> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let deadline = Instant::now() + self.timeout;
        let mut held = self.held.lock();
        loop {
            let Some(busy) = keys.iter().find(|k| held.contains(k)).copied() else {
                break;
            };
            if self.released.wait_until(&mut held, deadline).timed_out()
                && keys.iter().any(|k| held.contains(k))
            {
                tracing::debug!(resource = %busy, "Lock wait timed out");
                return Err(StoreError::Conflict {
                    resource: busy.to_string(),
                });
            }
        }
        held.extend(keys.iter().copied());
        drop(held);

        tracing::debug!(keys = ?keys, "Locks acquired");
        Ok(LockGuard { table: self, keys })
    }

    /// Check if `key` is currently held.
    #[must_use]
    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held.lock().contains(key)
    }

    fn release(&self, keys: &[LockKey]) {
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
        tracing::debug!(keys = ?keys, "Locks released");
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("held", &self.held.lock().len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Keys held by one caller. Released on drop.
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    table: &'a LockTable,
    keys: Vec<LockKey>,
}

impl LockGuard<'_> {
    /// The keys held, in acquisition order.
    #[must_use]
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.keys);
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("keys", &self.keys).finish()
    }
}
