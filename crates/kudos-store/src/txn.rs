//! Staged units of work.
//!
//! A [`Txn`] buffers writes in memory and answers reads from that buffer
//! before falling through to the store, so a multi-step operation sees its
//! own earlier steps. Nothing reaches the store until [`Txn::commit`], which
//! applies the whole buffer as one [`WriteSet`]. Dropping a `Txn` without
//! committing is a rollback.
//!
//! A `Txn` does not lock anything by itself; callers hold the relevant
//! [`LockKey`](crate::LockKey)s for as long as the `Txn` lives.

use std::collections::HashMap;

use kudos_core::{
    Account, AccountId, AdminId, AwardPool, BudgetPeriod, EventId, InventoryRecord, LedgerEntry,
    ParticipantAward, PeriodKey, ProductId, RedemptionTicket, TicketId,
};

use crate::error::{Result, StoreError};
use crate::{Mutation, Store, WriteSet};

/// A staged unit of work over a [`Store`].
pub struct Txn<'s, S: ?Sized> {
    store: &'s S,
    accounts: HashMap<AccountId, Account>,
    inventory: HashMap<ProductId, InventoryRecord>,
    pools: HashMap<EventId, AwardPool>,
    awards: HashMap<(EventId, AccountId), ParticipantAward>,
    budgets: HashMap<(AdminId, PeriodKey), BudgetPeriod>,
    tickets: HashMap<TicketId, RedemptionTicket>,
    entries: Vec<LedgerEntry>,
}

impl<'s, S: Store + ?Sized> Txn<'s, S> {
    /// Start an empty unit of work.
    pub fn begin(store: &'s S) -> Self {
        Self {
            store,
            accounts: HashMap::new(),
            inventory: HashMap::new(),
            pools: HashMap::new(),
            awards: HashMap::new(),
            budgets: HashMap::new(),
            tickets: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Read an account, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        match self.accounts.get(id) {
            Some(account) => Ok(Some(account.clone())),
            None => self.store.get_account(id),
        }
    }

    /// Stage an account write.
    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Stage a ledger entry append.
    pub fn append_entry(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Read inventory counters, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        match self.inventory.get(product_id) {
            Some(record) => Ok(Some(record.clone())),
            None => self.store.get_inventory(product_id),
        }
    }

    /// Stage an inventory write.
    pub fn put_inventory(&mut self, record: InventoryRecord) {
        self.inventory.insert(record.product_id, record);
    }

    /// Read an award pool, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn pool(&self, event_id: &EventId) -> Result<Option<AwardPool>> {
        match self.pools.get(event_id) {
            Some(pool) => Ok(Some(pool.clone())),
            None => self.store.get_pool(event_id),
        }
    }

    /// Stage an award pool write.
    pub fn put_pool(&mut self, pool: AwardPool) {
        self.pools.insert(pool.event_id, pool);
    }

    /// Read a participant award, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn participant_award(
        &self,
        event_id: &EventId,
        user_id: &AccountId,
    ) -> Result<Option<ParticipantAward>> {
        match self.awards.get(&(*event_id, *user_id)) {
            Some(award) => Ok(Some(award.clone())),
            None => self.store.get_participant_award(event_id, user_id),
        }
    }

    /// Stage a participant award insert.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if this unit of work already staged an
    /// award for the same participant and event.
    pub fn insert_participant_award(&mut self, award: ParticipantAward) -> Result<()> {
        let key = (award.event_id, award.user_id);
        if self.awards.contains_key(&key) {
            return Err(StoreError::Duplicate {
                entity: "participant award",
                id: format!("{}/{}", award.event_id, award.user_id),
            });
        }
        self.awards.insert(key, award);
        Ok(())
    }

    /// Read a budget period, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn budget_period(
        &self,
        admin_id: &AdminId,
        period: &PeriodKey,
    ) -> Result<Option<BudgetPeriod>> {
        match self.budgets.get(&(*admin_id, *period)) {
            Some(budget) => Ok(Some(budget.clone())),
            None => self.store.get_budget_period(admin_id, period),
        }
    }

    /// Stage a budget period write.
    pub fn put_budget_period(&mut self, budget: BudgetPeriod) {
        self.budgets.insert((budget.admin_id, budget.period), budget);
    }

    /// Read a ticket, preferring the staged copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn ticket(&self, id: &TicketId) -> Result<Option<RedemptionTicket>> {
        match self.tickets.get(id) {
            Some(ticket) => Ok(Some(ticket.clone())),
            None => self.store.get_ticket(id),
        }
    }

    /// Stage a ticket write.
    pub fn put_ticket(&mut self, ticket: RedemptionTicket) {
        self.tickets.insert(ticket.id, ticket);
    }

    /// Check if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.inventory.is_empty()
            && self.pools.is_empty()
            && self.awards.is_empty()
            && self.budgets.is_empty()
            && self.tickets.is_empty()
            && self.entries.is_empty()
    }

    /// Apply every staged write atomically.
    ///
    /// # Errors
    ///
    /// Returns the store's error; in that case nothing was written.
    pub fn commit(self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut batch = WriteSet::new();
        batch.extend(self.accounts.into_values().map(Mutation::PutAccount));
        batch.extend(self.inventory.into_values().map(Mutation::PutInventory));
        batch.extend(self.pools.into_values().map(Mutation::PutPool));
        batch.extend(
            self.awards
                .into_values()
                .map(Mutation::InsertParticipantAward),
        );
        batch.extend(self.budgets.into_values().map(Mutation::PutBudgetPeriod));
        batch.extend(self.tickets.into_values().map(Mutation::PutTicket));
        batch.extend(self.entries.into_iter().map(Mutation::AppendEntry));

        tracing::trace!(mutations = batch.len(), "Committing unit of work");
        self.store.apply(batch)
    }
}
