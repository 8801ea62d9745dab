//! In-memory storage implementation.
//!
//! All maps live behind one `RwLock`, so [`Store::apply`] validates and
//! writes a whole batch under a single write guard.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use kudos_core::{
    Account, AccountId, AdminId, AwardPool, BudgetPeriod, EntryId, EventId, InventoryRecord,
    LedgerEntry, ParticipantAward, PeriodKey, ProductId, RedemptionTicket, TicketId,
};

use crate::error::{Result, StoreError};
use crate::{Mutation, Store, WriteSet};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<EntryId, LedgerEntry>,
    entries_by_account: BTreeMap<(AccountId, EntryId), ()>,
    inventory: HashMap<ProductId, InventoryRecord>,
    pools: HashMap<EventId, AwardPool>,
    awards: BTreeMap<(EventId, AccountId), ParticipantAward>,
    budgets: HashMap<(AdminId, PeriodKey), BudgetPeriod>,
    tickets: HashMap<TicketId, RedemptionTicket>,
    tickets_by_account: BTreeMap<(AccountId, TicketId), ()>,
}

/// Storage backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn page<K: Ord + Copy + MinKey, V>(
        index: &BTreeMap<(AccountId, K), ()>,
        records: impl Fn(&K) -> Option<V>,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Vec<V> {
        index
            .range((*account_id, K::min_key())..)
            .take_while(|((owner, _), ())| owner == account_id)
            .map(|((_, id), ())| *id)
            .collect::<Vec<_>>()
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(records)
            .collect()
    }
}

/// Smallest value of an index id, used as a range start.
trait MinKey {
    fn min_key() -> Self;
}

impl MinKey for EntryId {
    fn min_key() -> Self {
        EntryId::from_bytes([0; 16])
    }
}

impl MinKey for TicketId {
    fn min_key() -> Self {
        TicketId::from_bytes([0; 16])
    }
}

impl Store for MemoryStore {
    fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().accounts.get(id).cloned())
    }

    fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>> {
        Ok(self.tables.read().entries.get(id).cloned())
    }

    fn list_entries_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let tables = self.tables.read();
        Ok(Self::page(
            &tables.entries_by_account,
            |id| tables.entries.get(id).cloned(),
            account_id,
            limit,
            offset,
        ))
    }

    fn get_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        Ok(self.tables.read().inventory.get(product_id).cloned())
    }

    fn get_pool(&self, event_id: &EventId) -> Result<Option<AwardPool>> {
        Ok(self.tables.read().pools.get(event_id).cloned())
    }

    fn get_participant_award(
        &self,
        event_id: &EventId,
        user_id: &AccountId,
    ) -> Result<Option<ParticipantAward>> {
        Ok(self
            .tables
            .read()
            .awards
            .get(&(*event_id, *user_id))
            .cloned())
    }

    fn list_participant_awards(&self, event_id: &EventId) -> Result<Vec<ParticipantAward>> {
        let tables = self.tables.read();
        Ok(tables
            .awards
            .iter()
            .filter(|((event, _), _)| event == event_id)
            .map(|(_, award)| award.clone())
            .collect())
    }

    fn get_budget_period(
        &self,
        admin_id: &AdminId,
        period: &PeriodKey,
    ) -> Result<Option<BudgetPeriod>> {
        Ok(self
            .tables
            .read()
            .budgets
            .get(&(*admin_id, *period))
            .cloned())
    }

    fn get_ticket(&self, id: &TicketId) -> Result<Option<RedemptionTicket>> {
        Ok(self.tables.read().tickets.get(id).cloned())
    }

    fn list_tickets_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionTicket>> {
        let tables = self.tables.read();
        Ok(Self::page(
            &tables.tickets_by_account,
            |id| tables.tickets.get(id).cloned(),
            account_id,
            limit,
            offset,
        ))
    }

    fn apply(&self, batch: WriteSet) -> Result<()> {
        let mut tables = self.tables.write();

        // Validate write-once records before touching anything.
        for mutation in batch.iter() {
            match mutation {
                Mutation::AppendEntry(entry) if tables.entries.contains_key(&entry.id) => {
                    return Err(StoreError::Duplicate {
                        entity: "ledger entry",
                        id: entry.id.to_string(),
                    });
                }
                Mutation::InsertParticipantAward(award)
                    if tables
                        .awards
                        .contains_key(&(award.event_id, award.user_id)) =>
                {
                    return Err(StoreError::Duplicate {
                        entity: "participant award",
                        id: format!("{}/{}", award.event_id, award.user_id),
                    });
                }
                _ => {}
            }
        }

        for mutation in batch {
            match mutation {
                Mutation::PutAccount(account) => {
                    tables.accounts.insert(account.id, account);
                }
                Mutation::AppendEntry(entry) => {
                    tables
                        .entries_by_account
                        .insert((entry.account_id, entry.id), ());
                    tables.entries.insert(entry.id, entry);
                }
                Mutation::PutInventory(record) => {
                    tables.inventory.insert(record.product_id, record);
                }
                Mutation::PutPool(pool) => {
                    tables.pools.insert(pool.event_id, pool);
                }
                Mutation::InsertParticipantAward(award) => {
                    tables
                        .awards
                        .insert((award.event_id, award.user_id), award);
                }
                Mutation::PutBudgetPeriod(budget) => {
                    tables
                        .budgets
                        .insert((budget.admin_id, budget.period), budget);
                }
                Mutation::PutTicket(ticket) => {
                    tables
                        .tickets_by_account
                        .insert((ticket.account_id, ticket.id), ());
                    tables.tickets.insert(ticket.id, ticket);
                }
            }
        }

        Ok(())
    }
}
