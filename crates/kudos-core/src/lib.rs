//! Core types and utilities for kudos.
//!
//! This crate provides the foundational types of the points economy:
//!
//! - **Identifiers**: `AccountId`, `ProductId`, `EventId`, `AdminId`, `TicketId`, `EntryId`
//! - **Accounts**: `Account`
//! - **Ledger**: `LedgerEntry`, `EntryKind`, `Origin`, `OriginKind`
//! - **Inventory**: `InventoryRecord`
//! - **Redemptions**: `RedemptionTicket`, `RedemptionStatus`
//! - **Awards**: `AwardPool`, `ParticipantAward`
//! - **Budgets**: `BudgetPeriod`, `BudgetPolicy`, `PeriodKey`
//! - **Pricing**: `PriceRecord`, `ProductInfo`
//!
//! # Points
//!
//! Points are whole numbers stored as `i64`. Balances, stock counters, pool
//! allocations and budget consumption never go negative; the types here
//! refuse any transition that would break that, leaving the value untouched.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod award;
pub mod budget;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod ledger;
pub mod pricing;
pub mod redemption;

pub use account::Account;
pub use award::{AwardPool, ParticipantAward};
pub use budget::{BudgetCheck, BudgetPeriod, BudgetPolicy, PeriodKey};
pub use error::{OutcomeKind, Result, RewardsError};
pub use ids::{AccountId, AdminId, EntryId, EventId, IdError, ProductId, TicketId};
pub use inventory::InventoryRecord;
pub use ledger::{EntryKind, LedgerEntry, Origin, OriginKind};
pub use pricing::{effective_price, PriceRecord, ProductInfo};
pub use redemption::{RedemptionStatus, RedemptionTicket};
