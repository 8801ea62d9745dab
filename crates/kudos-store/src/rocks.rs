//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use kudos_core::{
    Account, AccountId, AdminId, AwardPool, BudgetPeriod, EntryId, EventId, InventoryRecord,
    LedgerEntry, ParticipantAward, PeriodKey, ProductId, RedemptionTicket, TicketId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Mutation, Store, WriteSet};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Point lookup in a column family.
    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    /// Collect every key (and value) in `cf_name` starting with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    /// Page through an `account_id || ulid` index, newest first, resolving
    /// each trailing ULID through `resolve`.
    fn page_index<T>(
        &self,
        index_cf: &str,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
        resolve: impl Fn([u8; 16]) -> Result<Option<T>>,
    ) -> Result<Vec<T>> {
        let prefix = keys::account_prefix(account_id);
        let mut all_keys = self.scan_prefix(index_cf, &prefix)?;

        // ULIDs sort by time, so reversing gives newest first.
        all_keys.reverse();

        let mut out = Vec::new();
        for (key, _) in all_keys.into_iter().skip(offset).take(limit) {
            let Some(id) = keys::trailing_ulid(&key) else {
                tracing::warn!(index = index_cf, "Skipping malformed index key");
                continue;
            };
            if let Some(record) = resolve(id)? {
                out.push(record);
            }
        }
        Ok(out)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Accounts and ledger
    // =========================================================================

    fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::account_key(id))
    }

    fn get_entry(&self, id: &EntryId) -> Result<Option<LedgerEntry>> {
        self.get(cf::LEDGER_ENTRIES, &keys::entry_key(id))
    }

    fn list_entries_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        self.page_index(cf::ENTRIES_BY_ACCOUNT, account_id, limit, offset, |id| {
            self.get_entry(&EntryId::from_bytes(id))
        })
    }

    // =========================================================================
    // Inventory, pools, budgets
    // =========================================================================

    fn get_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        self.get(cf::INVENTORY, &keys::inventory_key(product_id))
    }

    fn get_pool(&self, event_id: &EventId) -> Result<Option<AwardPool>> {
        self.get(cf::AWARD_POOLS, &keys::pool_key(event_id))
    }

    fn get_participant_award(
        &self,
        event_id: &EventId,
        user_id: &AccountId,
    ) -> Result<Option<ParticipantAward>> {
        self.get(
            cf::PARTICIPANT_AWARDS,
            &keys::participant_award_key(event_id, user_id),
        )
    }

    fn list_participant_awards(&self, event_id: &EventId) -> Result<Vec<ParticipantAward>> {
        self.scan_prefix(cf::PARTICIPANT_AWARDS, &keys::event_prefix(event_id))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn get_budget_period(
        &self,
        admin_id: &AdminId,
        period: &PeriodKey,
    ) -> Result<Option<BudgetPeriod>> {
        self.get(cf::BUDGET_PERIODS, &keys::budget_period_key(admin_id, period))
    }

    // =========================================================================
    // Redemption tickets
    // =========================================================================

    fn get_ticket(&self, id: &TicketId) -> Result<Option<RedemptionTicket>> {
        self.get(cf::TICKETS, &keys::ticket_key(id))
    }

    fn list_tickets_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RedemptionTicket>> {
        self.page_index(cf::TICKETS_BY_ACCOUNT, account_id, limit, offset, |id| {
            self.get_ticket(&TicketId::from_bytes(id))
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn apply(&self, batch: WriteSet) -> Result<()> {
        // Write-once records must not already exist. Callers hold the entity
        // locks, so nothing can slip in between this check and the write.
        for mutation in batch.iter() {
            match mutation {
                Mutation::AppendEntry(entry)
                    if self.exists(cf::LEDGER_ENTRIES, &keys::entry_key(&entry.id))? =>
                {
                    return Err(StoreError::Duplicate {
                        entity: "ledger entry",
                        id: entry.id.to_string(),
                    });
                }
                Mutation::InsertParticipantAward(award)
                    if self.exists(
                        cf::PARTICIPANT_AWARDS,
                        &keys::participant_award_key(&award.event_id, &award.user_id),
                    )? =>
                {
                    return Err(StoreError::Duplicate {
                        entity: "participant award",
                        id: format!("{}/{}", award.event_id, award.user_id),
                    });
                }
                _ => {}
            }
        }

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_entries = self.cf(cf::LEDGER_ENTRIES)?;
        let cf_entries_by_account = self.cf(cf::ENTRIES_BY_ACCOUNT)?;
        let cf_inventory = self.cf(cf::INVENTORY)?;
        let cf_pools = self.cf(cf::AWARD_POOLS)?;
        let cf_awards = self.cf(cf::PARTICIPANT_AWARDS)?;
        let cf_budgets = self.cf(cf::BUDGET_PERIODS)?;
        let cf_tickets = self.cf(cf::TICKETS)?;
        let cf_tickets_by_account = self.cf(cf::TICKETS_BY_ACCOUNT)?;

        let mut wb = WriteBatch::default();
        for mutation in batch {
            match mutation {
                Mutation::PutAccount(account) => {
                    wb.put_cf(
                        &cf_accounts,
                        keys::account_key(&account.id),
                        Self::serialize(&account)?,
                    );
                }
                Mutation::AppendEntry(entry) => {
                    wb.put_cf(
                        &cf_entries,
                        keys::entry_key(&entry.id),
                        Self::serialize(&entry)?,
                    );
                    wb.put_cf(
                        &cf_entries_by_account,
                        keys::account_entry_key(&entry.account_id, &entry.id),
                        [],
                    );
                }
                Mutation::PutInventory(record) => {
                    wb.put_cf(
                        &cf_inventory,
                        keys::inventory_key(&record.product_id),
                        Self::serialize(&record)?,
                    );
                }
                Mutation::PutPool(pool) => {
                    wb.put_cf(
                        &cf_pools,
                        keys::pool_key(&pool.event_id),
                        Self::serialize(&pool)?,
                    );
                }
                Mutation::InsertParticipantAward(award) => {
                    wb.put_cf(
                        &cf_awards,
                        keys::participant_award_key(&award.event_id, &award.user_id),
                        Self::serialize(&award)?,
                    );
                }
                Mutation::PutBudgetPeriod(budget) => {
                    wb.put_cf(
                        &cf_budgets,
                        keys::budget_period_key(&budget.admin_id, &budget.period),
                        Self::serialize(&budget)?,
                    );
                }
                Mutation::PutTicket(ticket) => {
                    wb.put_cf(
                        &cf_tickets,
                        keys::ticket_key(&ticket.id),
                        Self::serialize(&ticket)?,
                    );
                    wb.put_cf(
                        &cf_tickets_by_account,
                        keys::account_ticket_key(&ticket.account_id, &ticket.id),
                        [],
                    );
                }
            }
        }

        // Write atomically
        self.db
            .write(wb)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kudos_core::{Origin, RedemptionStatus};
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn account_and_entries_commit_together() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let mut account = Account::new(account_id);
        let balance = account.apply_credit(500).unwrap();

        let mut batch = WriteSet::new();
        batch.push(Mutation::PutAccount(account));
        batch.push(Mutation::AppendEntry(LedgerEntry::earned(
            account_id,
            500,
            balance,
            Origin::adjustment("seed"),
            "Opening grant".into(),
        )));
        store.apply(batch).unwrap();

        let stored = store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(stored.current_balance, 500);

        let entries = store.list_entries_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].balance_after, 500);
    }

    #[test]
    fn tickets_list_newest_first() {
        let (store, _dir) = create_test_store();
        let account_id = AccountId::generate();
        let product_id = ProductId::generate();

        for name in ["First", "Second"] {
            let mut batch = WriteSet::new();
            batch.push(Mutation::PutTicket(RedemptionTicket::pending(
                TicketId::generate(),
                account_id,
                product_id,
                name.into(),
                100,
                1,
            )));
            store.apply(batch).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2)); // Ensure different ULIDs
        }

        let tickets = store.list_tickets_by_account(&account_id, 10, 0).unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].product_name, "Second");
        assert_eq!(tickets[1].product_name, "First");
        assert_eq!(tickets[0].status, RedemptionStatus::Pending);
    }

    #[test]
    fn participant_award_is_write_once() {
        let (store, _dir) = create_test_store();
        let event_id = EventId::generate();
        let user_id = AccountId::generate();

        let mut batch = WriteSet::new();
        batch.push(Mutation::InsertParticipantAward(ParticipantAward::new(
            event_id, user_id, 100, 1,
        )));
        store.apply(batch).unwrap();

        let mut again = WriteSet::new();
        again.push(Mutation::InsertParticipantAward(ParticipantAward::new(
            event_id, user_id, 50, 2,
        )));
        assert!(matches!(
            store.apply(again),
            Err(StoreError::Duplicate { .. })
        ));

        let awards = store.list_participant_awards(&event_id).unwrap();
        assert_eq!(awards.len(), 1);
        assert_eq!(awards[0].awarded_points, 100);
    }

    #[test]
    fn budget_period_roundtrip() {
        let (store, _dir) = create_test_store();
        let admin_id = AdminId::generate();
        let period = PeriodKey::new(2026, 10).unwrap();

        let mut budget = BudgetPeriod::open(admin_id, period, kudos_core::BudgetPolicy::default());
        budget.record(250).unwrap();

        let mut batch = WriteSet::new();
        batch.push(Mutation::PutBudgetPeriod(budget));
        store.apply(batch).unwrap();

        let stored = store.get_budget_period(&admin_id, &period).unwrap().unwrap();
        assert_eq!(stored.consumed, 250);
        assert!(store
            .get_budget_period(&admin_id, &PeriodKey::new(2026, 11).unwrap())
            .unwrap()
            .is_none());
    }
}
