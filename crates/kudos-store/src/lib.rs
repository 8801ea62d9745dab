//! Storage layer for kudos.
//!
//! This crate provides persistence for accounts, ledger entries, inventory,
//! award pools, budget periods and redemption tickets, plus the two
//! primitives the engine builds its atomicity on:
//!
//! - [`Txn`]: a staged unit of work. Reads see staged writes; `commit` hands
//!   every staged mutation to the store as one [`WriteSet`], which backends
//!   apply all-or-nothing. Dropping a `Txn` discards it.
//! - [`LockTable`]: per-entity mutual exclusion keyed by [`LockKey`], with a
//!   bounded wait that fails as [`StoreError::Conflict`].
//!
//! # Backends
//!
//! - [`MemoryStore`]: maps behind a single `RwLock`. Used in tests and
//!   embedded deployments.
//! - `RocksStore` (feature `rocksdb-backend`): column families with CBOR
//!   values; a `WriteSet` becomes one `WriteBatch`.
//!
//! # Example
//!
//! ```
//! use kudos_core::{Account, AccountId};
//! use kudos_store::{MemoryStore, Store, Txn};
//!
//! let store = MemoryStore::new();
//! let id = AccountId::generate();
//!
//! let mut txn = Txn::begin(&store);
//! let mut account = Account::new(id);
//! account.apply_credit(100).unwrap();
//! txn.put_account(account);
//! txn.commit().unwrap();
//!
//! assert_eq!(store.get_account(&id).unwrap().unwrap().current_balance, 100);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod locks;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;
pub mod txn;

pub use error::{Result, StoreError};
pub use locks::{LockGuard, LockKey, LockTable};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;
pub use txn::Txn;

use kudos_core::{
    Account, AccountId, AdminId, AwardPool, BudgetPeriod, EntryId, EventId, InventoryRecord,
    LedgerEntry, ParticipantAward, PeriodKey, ProductId, RedemptionTicket, TicketId,
};

/// The storage trait defining all database operations.
///
/// Reads are point lookups or paged listings. All writes go through
/// [`Store::apply`] so that a multi-record change lands atomically.
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts and ledger
    // =========================================================================

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, id: &AccountId) -> Result<Option<Account>>;

    /// Get a ledger entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>>;

    /// List an account's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Get a product's inventory counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>>;

    // =========================================================================
    // Award pools
    // =========================================================================

    /// Get an event's award pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_pool(&self, event_id: &EventId) -> Result<Option<AwardPool>>;

    /// Get a participant's award for an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_participant_award(
        &self,
        event_id: &EventId,
        user_id: &AccountId,
    ) -> Result<Option<ParticipantAward>>;

    /// List every award made from an event's pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_participant_awards(&self, event_id: &EventId) -> Result<Vec<ParticipantAward>>;

    // =========================================================================
    // Budgets
    // =========================================================================

    /// Get an administrator's budget period.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_budget_period(
        &self,
        admin_id: &AdminId,
        period: &PeriodKey,
    ) -> Result<Option<BudgetPeriod>>;

    // =========================================================================
    // Redemption tickets
    // =========================================================================

    /// Get a redemption ticket by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_ticket(&self, id: &TicketId) -> Result<Option<RedemptionTicket>>;

    /// List an account's redemption tickets, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_tickets_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionTicket>>;

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply every mutation in `batch`, or none of them.
    ///
    /// # Errors
    ///
    /// - `StoreError::Duplicate` if the batch appends a ledger entry or
    ///   participant award that already exists.
    /// - `StoreError::Database` if the write fails.
    fn apply(&self, batch: WriteSet) -> Result<()>;
}

/// One write in a [`WriteSet`].
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert or replace an account.
    PutAccount(Account),

    /// Append a ledger entry. Entries are never replaced.
    AppendEntry(LedgerEntry),

    /// Insert or replace inventory counters.
    PutInventory(InventoryRecord),

    /// Insert or replace an award pool.
    PutPool(AwardPool),

    /// Insert a participant award. Awards are never replaced.
    InsertParticipantAward(ParticipantAward),

    /// Insert or replace a budget period.
    PutBudgetPeriod(BudgetPeriod),

    /// Insert or replace a redemption ticket.
    PutTicket(RedemptionTicket),
}

/// A batch of mutations applied atomically by [`Store::apply`].
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    mutations: Vec<Mutation>,
}

impl WriteSet {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mutation.
    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Number of mutations in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Iterate over the mutations.
    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }
}

impl Extend<Mutation> for WriteSet {
    fn extend<I: IntoIterator<Item = Mutation>>(&mut self, iter: I) {
        self.mutations.extend(iter);
    }
}

impl IntoIterator for WriteSet {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}
