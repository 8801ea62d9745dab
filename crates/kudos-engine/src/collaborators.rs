//! Services the engine consults but does not own.
//!
//! Catalog administration and identity live outside the points core. The
//! engine reads them through these traits and trusts what they return.

use kudos_core::{AccountId, PriceRecord, ProductId, ProductInfo};

/// Product metadata and effective-dated prices.
pub trait Catalog: Send + Sync {
    /// Look up a product's display metadata.
    fn product(&self, product_id: &ProductId) -> Option<ProductInfo>;

    /// Every price record for a product, in any order.
    fn prices(&self, product_id: &ProductId) -> Vec<PriceRecord>;
}

/// Account-holder standing.
pub trait Directory: Send + Sync {
    /// `Some(true)` for an active holder, `Some(false)` for a deactivated
    /// one, `None` if the directory has never heard of the account.
    fn account_active(&self, account_id: &AccountId) -> Option<bool>;
}
