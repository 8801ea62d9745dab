//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: entries by account, keyed by `account_id || entry_id`.
    /// Value is empty (index only).
    pub const ENTRIES_BY_ACCOUNT: &str = "entries_by_account";

    /// Inventory counters, keyed by `product_id`.
    pub const INVENTORY: &str = "inventory";

    /// Award pools, keyed by `event_id`.
    pub const AWARD_POOLS: &str = "award_pools";

    /// Participant awards, keyed by `event_id || user_id`.
    pub const PARTICIPANT_AWARDS: &str = "participant_awards";

    /// Budget periods, keyed by `admin_id || period`.
    pub const BUDGET_PERIODS: &str = "budget_periods";

    /// Redemption tickets, keyed by `ticket_id` (ULID).
    pub const TICKETS: &str = "tickets";

    /// Index: tickets by account, keyed by `account_id || ticket_id`.
    /// Value is empty (index only).
    pub const TICKETS_BY_ACCOUNT: &str = "tickets_by_account";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::LEDGER_ENTRIES,
        cf::ENTRIES_BY_ACCOUNT,
        cf::INVENTORY,
        cf::AWARD_POOLS,
        cf::PARTICIPANT_AWARDS,
        cf::BUDGET_PERIODS,
        cf::TICKETS,
        cf::TICKETS_BY_ACCOUNT,
    ]
}
