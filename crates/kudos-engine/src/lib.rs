//! Transactional core of the kudos points economy.
//!
//! Participants earn points from event awards and administrator grants and
//! spend them redeeming catalog items. This crate keeps four shared counters
//! consistent under concurrent use:
//!
//! - account balances ([`PointsLedger`])
//! - product stock ([`InventoryReservation`])
//! - event award pools ([`EventAwardPool`])
//! - administrator monthly budgets ([`BudgetGuard`])
//!
//! and composes them into multi-step operations ([`RedemptionWorkflow`],
//! [`AwardOrchestrator`]) that commit all of their writes or none.
//!
//! # Concurrency
//!
//! Every check-then-write runs under per-entity locks from a shared
//! [`LockTable`](kudos_store::LockTable), so operations on different
//! accounts, products, events or administrators never wait on each other.
//! Multi-entity operations take their locks together in a fixed order. A
//! lock that stays busy past the configured timeout fails the operation with
//! `Conflict` before anything is written; it is safe to retry.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use kudos_core::{AccountId, AdminId, EventId};
//! use kudos_engine::{Catalog, Directory, Engine, EngineConfig};
//! # use kudos_core::{PriceRecord, ProductId, ProductInfo};
//! # struct NoCatalog;
//! # impl Catalog for NoCatalog {
//! #     fn product(&self, _: &ProductId) -> Option<ProductInfo> { None }
//! #     fn prices(&self, _: &ProductId) -> Vec<PriceRecord> { Vec::new() }
//! # }
//! # struct Everyone;
//! # impl Directory for Everyone {
//! #     fn account_active(&self, _: &AccountId) -> Option<bool> { Some(true) }
//! # }
//!
//! let engine =
//!     Engine::in_memory(EngineConfig::default(), Arc::new(NoCatalog), Arc::new(Everyone))
//!         .unwrap();
//!
//! let event = EventId::generate();
//! let winner = AccountId::generate();
//! engine.pools().open_pool(event, 1000).unwrap();
//! engine
//!     .awards()
//!     .award_event_winner(AdminId::generate(), event, winner, 300, 1)
//!     .unwrap();
//!
//! assert_eq!(engine.ledger().balance(&winner).unwrap(), 300);
//! assert_eq!(engine.pools().remaining_pool(&event).unwrap(), 700);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod awards;
pub mod budget;
pub mod collaborators;
pub mod config;
pub mod inventory;
pub mod ledger;
pub mod pool;
pub mod redemption;

pub use awards::{AwardOrchestrator, AwardReceipt};
pub use budget::BudgetGuard;
pub use collaborators::{Catalog, Directory};
pub use config::EngineConfig;
pub use inventory::InventoryReservation;
pub use ledger::{LedgerAudit, PointsLedger};
pub use pool::{AwardRequest, EventAward, EventAwardPool};
pub use redemption::RedemptionWorkflow;

use std::sync::Arc;

use kudos_core::{Result, RewardsError};
use kudos_store::{LockTable, MemoryStore, Store};

/// Every component wired to one store and one lock table.
pub struct Engine<S: ?Sized> {
    config: EngineConfig,
    store: Arc<S>,
    locks: Arc<LockTable>,
    ledger: PointsLedger<S>,
    inventory: InventoryReservation<S>,
    pools: EventAwardPool<S>,
    budgets: BudgetGuard<S>,
    redemptions: RedemptionWorkflow<S>,
    awards: AwardOrchestrator<S>,
}

impl<S: Store + ?Sized> Engine<S> {
    /// Wire the engine over `store`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `config` fails validation.
    pub fn new(
        store: Arc<S>,
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn Directory>,
    ) -> Result<Self> {
        config.validate()?;
        let locks = Arc::new(LockTable::new(config.lock_timeout()));
        let policy = config.budget_policy();
        let max_page = config.history_max_page;

        tracing::debug!(
            lock_timeout = ?locks.timeout(),
            budget_limit = policy.limit,
            budget_hard = policy.is_hard,
            "Engine configured"
        );

        Ok(Self {
            ledger: PointsLedger::new(Arc::clone(&store), Arc::clone(&locks), max_page),
            inventory: InventoryReservation::new(Arc::clone(&store), Arc::clone(&locks)),
            pools: EventAwardPool::new(Arc::clone(&store), Arc::clone(&locks)),
            budgets: BudgetGuard::new(Arc::clone(&store), Arc::clone(&locks), policy),
            redemptions: RedemptionWorkflow::new(
                Arc::clone(&store),
                Arc::clone(&locks),
                catalog,
                directory,
                max_page,
            ),
            awards: AwardOrchestrator::new(Arc::clone(&store), Arc::clone(&locks), policy),
            store,
            locks,
            config,
        })
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The lock table shared by every component.
    #[must_use]
    pub fn locks(&self) -> &Arc<LockTable> {
        &self.locks
    }

    /// Account balances and history.
    #[must_use]
    pub fn ledger(&self) -> &PointsLedger<S> {
        &self.ledger
    }

    /// Product stock.
    #[must_use]
    pub fn inventory(&self) -> &InventoryReservation<S> {
        &self.inventory
    }

    /// Event award pools.
    #[must_use]
    pub fn pools(&self) -> &EventAwardPool<S> {
        &self.pools
    }

    /// Administrator budgets.
    #[must_use]
    pub fn budgets(&self) -> &BudgetGuard<S> {
        &self.budgets
    }

    /// Redemption tickets.
    #[must_use]
    pub fn redemptions(&self) -> &RedemptionWorkflow<S> {
        &self.redemptions
    }

    /// Budget-gated awards.
    #[must_use]
    pub fn awards(&self) -> &AwardOrchestrator<S> {
        &self.awards
    }
}

impl Engine<MemoryStore> {
    /// Build an engine over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `config` fails validation.
    pub fn in_memory(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn Directory>,
    ) -> Result<Self> {
        Self::new(Arc::new(MemoryStore::new()), config, catalog, directory)
    }
}

#[cfg(feature = "rocksdb-backend")]
impl Engine<kudos_store::RocksStore> {
    /// Open the `RocksDB` store at `config.data_dir` and build an engine over
    /// it.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for invalid settings or a storage error if the
    /// database cannot be opened.
    pub fn open(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn Directory>,
    ) -> Result<Self> {
        config.validate()?;
        let store = kudos_store::RocksStore::open(&config.data_dir)?;
        tracing::info!(data_dir = %config.data_dir, "Opened RocksDB store");
        Self::new(Arc::new(store), config, catalog, directory)
    }
}

/// Reject zero and negative quantities.
pub(crate) fn ensure_positive(what: &str, value: i64) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(RewardsError::InvalidAmount(format!(
            "{what} must be positive, got {value}"
        )))
    }
}
