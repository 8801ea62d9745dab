//! Redemption tickets and their lifecycle.
//!
//! ```text
//! Pending ──approve──▶ Approved ──deliver──▶ Delivered
//!    │                    │
//!    └──────cancel────────┴──────▶ Cancelled
//! ```
//!
//! Delivered and Cancelled are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};
use crate::{AccountId, AdminId, ProductId, TicketId};

/// A participant's request to exchange points for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionTicket {
    /// Ticket id (ULID).
    pub id: TicketId,

    /// The redeeming participant.
    pub account_id: AccountId,

    /// The product being redeemed.
    pub product_id: ProductId,

    /// Product display name at the time of the request.
    pub product_name: String,

    /// Points price per unit at the time of the request.
    pub unit_cost: i64,

    /// Units requested.
    pub quantity: i64,

    /// `unit_cost * quantity`, debited at creation.
    pub total_cost: i64,

    /// Lifecycle status.
    pub status: RedemptionStatus,

    /// When the ticket was created.
    pub requested_at: DateTime<Utc>,

    /// When the ticket was approved.
    pub decided_at: Option<DateTime<Utc>>,

    /// Who approved the ticket.
    pub decided_by: Option<AdminId>,

    /// When the product was handed over.
    pub delivered_at: Option<DateTime<Utc>>,

    /// Who handed the product over.
    pub delivered_by: Option<AdminId>,

    /// When the ticket was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Why the ticket was cancelled.
    pub cancel_reason: Option<String>,
}

impl RedemptionTicket {
    /// Create a pending ticket.
    #[must_use]
    pub fn pending(
        id: TicketId,
        account_id: AccountId,
        product_id: ProductId,
        product_name: String,
        unit_cost: i64,
        quantity: i64,
    ) -> Self {
        Self {
            id,
            account_id,
            product_id,
            product_name,
            unit_cost,
            quantity,
            total_cost: unit_cost * quantity,
            status: RedemptionStatus::Pending,
            requested_at: Utc::now(),
            decided_at: None,
            decided_by: None,
            delivered_at: None,
            delivered_by: None,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    /// Move Pending → Approved.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidState` from any other status.
    pub fn approve(&mut self, approver: AdminId) -> Result<()> {
        self.ensure(RedemptionStatus::Approved, "approve")?;
        self.status = RedemptionStatus::Approved;
        self.decided_at = Some(Utc::now());
        self.decided_by = Some(approver);
        Ok(())
    }

    /// Move Approved → Delivered.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidState` from any other status.
    pub fn deliver(&mut self, processor: AdminId) -> Result<()> {
        self.ensure(RedemptionStatus::Delivered, "deliver")?;
        self.status = RedemptionStatus::Delivered;
        self.delivered_at = Some(Utc::now());
        self.delivered_by = Some(processor);
        Ok(())
    }

    /// Move Pending or Approved → Cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::InvalidState` from a terminal status.
    pub fn cancel(&mut self, reason: String) -> Result<()> {
        self.ensure(RedemptionStatus::Cancelled, "cancel")?;
        self.status = RedemptionStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        self.cancel_reason = Some(reason);
        Ok(())
    }

    fn ensure(&self, next: RedemptionStatus, action: &'static str) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(RewardsError::InvalidState {
                ticket_id: self.id.to_string(),
                status: self.status.to_string(),
                action,
            })
        }
    }
}

/// Lifecycle status of a redemption ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// Points debited and stock reserved, awaiting approval.
    Pending,

    /// Approved, awaiting delivery.
    Approved,

    /// Handed over. Terminal.
    Delivered,

    /// Reversed. Terminal.
    Cancelled,
}

impl RedemptionStatus {
    /// Check whether `next` is reachable in one step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Cancelled)
                | (Self::Approved, Self::Delivered | Self::Cancelled)
        )
    }

    /// Check whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
