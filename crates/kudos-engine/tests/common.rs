//! Common test utilities for kudos integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::{Arc, Once, RwLock};

use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use kudos_core::{AccountId, Origin, PriceRecord, ProductId, ProductInfo};
use kudos_engine::{Catalog, Directory, Engine, EngineConfig};
use kudos_store::MemoryStore;

/// Install a test subscriber once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,kudos=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Catalog backed by in-process maps.
#[derive(Default)]
pub struct TestCatalog {
    products: RwLock<HashMap<ProductId, ProductInfo>>,
    prices: RwLock<HashMap<ProductId, Vec<PriceRecord>>>,
}

impl TestCatalog {
    /// Register a product.
    pub fn add_product(&self, id: ProductId, name: &str, active: bool) {
        self.products.write().unwrap().insert(
            id,
            ProductInfo {
                id,
                name: name.into(),
                active,
            },
        );
    }

    /// Add a price taking effect `offset` from now (negative = in the past).
    pub fn add_price(&self, product_id: ProductId, points: i64, offset: Duration) {
        self.prices
            .write()
            .unwrap()
            .entry(product_id)
            .or_default()
            .push(PriceRecord {
                product_id,
                points_price: points,
                effective_from: Utc::now() + offset,
            });
    }
}

impl Catalog for TestCatalog {
    fn product(&self, product_id: &ProductId) -> Option<ProductInfo> {
        self.products.read().unwrap().get(product_id).cloned()
    }

    fn prices(&self, product_id: &ProductId) -> Vec<PriceRecord> {
        self.prices
            .read()
            .unwrap()
            .get(product_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Directory backed by an in-process map.
#[derive(Default)]
pub struct TestDirectory {
    holders: RwLock<HashMap<AccountId, bool>>,
}

impl TestDirectory {
    /// Mark an account holder active or inactive.
    pub fn set_active(&self, id: AccountId, active: bool) {
        self.holders.write().unwrap().insert(id, active);
    }
}

impl Directory for TestDirectory {
    fn account_active(&self, account_id: &AccountId) -> Option<bool> {
        self.holders.read().unwrap().get(account_id).copied()
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The engine under test.
    pub engine: Arc<Engine<MemoryStore>>,
    /// Catalog the engine prices against.
    pub catalog: Arc<TestCatalog>,
    /// Directory the engine checks holders against.
    pub directory: Arc<TestDirectory>,
}

impl TestHarness {
    /// Create a harness with a fresh store and default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a harness with a fresh store.
    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let catalog = Arc::new(TestCatalog::default());
        let directory = Arc::new(TestDirectory::default());
        let engine = Engine::in_memory(
            config,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::clone(&directory) as Arc<dyn Directory>,
        )
        .unwrap();
        Self {
            engine: Arc::new(engine),
            catalog,
            directory,
        }
    }

    /// Create an active account holding `balance` points.
    pub fn funded_account(&self, balance: i64) -> AccountId {
        let id = AccountId::generate();
        self.directory.set_active(id, true);
        self.engine.ledger().open_account(id).unwrap();
        if balance > 0 {
            self.engine
                .ledger()
                .credit(id, balance, Origin::adjustment("test-funding"), "Test funding")
                .unwrap();
        }
        id
    }

    /// Create an active product priced at `price` with `stock` units.
    pub fn stocked_product(&self, price: i64, stock: i64) -> ProductId {
        let id = ProductId::generate();
        self.catalog.add_product(id, "Company hoodie", true);
        self.catalog.add_price(id, price, Duration::days(-1));
        self.engine.inventory().stock(id, stock, 1).unwrap();
        id
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
