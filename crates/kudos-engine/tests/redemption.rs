//! Redemption workflow integration tests.

mod common;

use chrono::Duration;

use common::TestHarness;
use kudos_core::{
    AccountId, AdminId, EntryKind, OriginKind, OutcomeKind, ProductId, RedemptionStatus,
    RewardsError, TicketId,
};

// ============================================================================
// Create
// ============================================================================

#[test]
fn create_debits_reserves_and_writes_ticket() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(300, 5);

    let ticket = harness
        .engine
        .redemptions()
        .create(user, product, 2)
        .unwrap();

    assert_eq!(ticket.status, RedemptionStatus::Pending);
    assert_eq!(ticket.unit_cost, 300);
    assert_eq!(ticket.total_cost, 600);
    assert_eq!(ticket.product_name, "Company hoodie");

    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 400);
    let stock = harness.engine.inventory().get(&product).unwrap();
    assert_eq!(stock.available, 3);
    assert_eq!(stock.reserved, 2);

    let history = harness.engine.ledger().history(&user, 1, 0).unwrap();
    let debit = &history[0];
    assert_eq!(debit.kind, EntryKind::Redeemed);
    assert_eq!(debit.amount, -600);
    assert_eq!(debit.balance_after, 400);
    assert_eq!(debit.origin.kind, OriginKind::Redemption);
    assert_eq!(debit.origin.id, ticket.id.to_string());

    assert_eq!(harness.engine.redemptions().get(&ticket.id).unwrap(), ticket);
}

#[test]
fn out_of_stock_fails_before_debit() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(100, 1);

    let err = harness
        .engine
        .redemptions()
        .create(user, product, 2)
        .unwrap_err();
    assert_eq!(err.kind(), OutcomeKind::OutOfStock);
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 1000);
    assert!(harness
        .engine
        .redemptions()
        .list_for_account(&user, 10, 0)
        .unwrap()
        .is_empty());
}

#[test]
fn insufficient_balance_leaves_stock_untouched() {
    let harness = TestHarness::new();
    let user = harness.funded_account(250);
    let product = harness.stocked_product(300, 5);

    let err = harness
        .engine
        .redemptions()
        .create(user, product, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        RewardsError::InsufficientBalance {
            balance: 250,
            required: 300
        }
    ));

    let stock = harness.engine.inventory().get(&product).unwrap();
    assert_eq!(stock.available, 5);
    assert_eq!(stock.reserved, 0);
    assert_eq!(harness.engine.ledger().history(&user, 10, 0).unwrap().len(), 1);
}

#[test]
fn latest_effective_price_applies() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(300, 5);
    harness.catalog.add_price(product, 200, Duration::hours(-1));
    harness.catalog.add_price(product, 50, Duration::days(7));

    let ticket = harness
        .engine
        .redemptions()
        .create(user, product, 1)
        .unwrap();
    assert_eq!(ticket.unit_cost, 200);
}

#[test]
fn product_without_current_price_rejected() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = ProductId::generate();
    harness.catalog.add_product(product, "Launch tee", true);
    harness.catalog.add_price(product, 100, Duration::days(1));
    harness.engine.inventory().stock(product, 5, 1).unwrap();

    let err = harness
        .engine
        .redemptions()
        .create(user, product, 1)
        .unwrap_err();
    assert!(matches!(err, RewardsError::PriceUnavailable(_)));
}

#[test]
fn unknown_or_inactive_holders_rejected() {
    let harness = TestHarness::new();
    let product = harness.stocked_product(100, 5);

    let stranger = AccountId::generate();
    assert!(matches!(
        harness.engine.redemptions().create(stranger, product, 1),
        Err(RewardsError::NotFound { entity: "account", .. })
    ));

    let user = harness.funded_account(500);
    harness.directory.set_active(user, false);
    assert!(matches!(
        harness.engine.redemptions().create(user, product, 1),
        Err(RewardsError::AccountInactive(_))
    ));
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 500);
}

#[test]
fn inactive_product_rejected() {
    let harness = TestHarness::new();
    let user = harness.funded_account(500);
    let product = harness.stocked_product(100, 5);
    harness.catalog.add_product(product, "Retired mug", false);

    assert!(matches!(
        harness.engine.redemptions().create(user, product, 1),
        Err(RewardsError::NotFound { entity: "product", .. })
    ));
}

#[test]
fn zero_quantity_rejected() {
    let harness = TestHarness::new();
    let user = harness.funded_account(500);
    let product = harness.stocked_product(100, 5);

    let err = harness
        .engine
        .redemptions()
        .create(user, product, 0)
        .unwrap_err();
    assert_eq!(err.kind(), OutcomeKind::Invalid);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn approve_then_deliver_consumes_reservation() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(300, 5);
    let approver = AdminId::generate();
    let processor = AdminId::generate();

    let ticket = harness
        .engine
        .redemptions()
        .create(user, product, 1)
        .unwrap();
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 700);
    assert_eq!(harness.engine.inventory().get(&product).unwrap().available, 4);

    let approved = harness
        .engine
        .redemptions()
        .approve(ticket.id, approver)
        .unwrap();
    assert_eq!(approved.status, RedemptionStatus::Approved);
    assert_eq!(approved.decided_by, Some(approver));
    assert!(approved.decided_at.is_some());

    let delivered = harness
        .engine
        .redemptions()
        .deliver(ticket.id, processor)
        .unwrap();
    assert_eq!(delivered.status, RedemptionStatus::Delivered);
    assert_eq!(delivered.delivered_by, Some(processor));

    let stock = harness.engine.inventory().get(&product).unwrap();
    assert_eq!(stock.reserved, 0);
    assert_eq!(stock.available, 4);
    assert_eq!(stock.fulfilled, 1);

    let second = harness
        .engine
        .redemptions()
        .create(user, product, 1)
        .unwrap();
    assert_eq!(second.status, RedemptionStatus::Pending);
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 400);
}

#[test]
fn cancel_reverses_exactly() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(300, 5);

    let ticket = harness
        .engine
        .redemptions()
        .create(user, product, 2)
        .unwrap();
    harness
        .engine
        .redemptions()
        .approve(ticket.id, AdminId::generate())
        .unwrap();

    let cancelled = harness
        .engine
        .redemptions()
        .cancel(ticket.id, "Out of sizes")
        .unwrap();
    assert_eq!(cancelled.status, RedemptionStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Out of sizes"));

    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 1000);
    let stock = harness.engine.inventory().get(&product).unwrap();
    assert_eq!(stock.available, 5);
    assert_eq!(stock.reserved, 0);

    let refund = &harness.engine.ledger().history(&user, 1, 0).unwrap()[0];
    assert_eq!(refund.kind, EntryKind::Refunded);
    assert_eq!(refund.amount, 600);
    assert_eq!(refund.balance_after, 1000);
    assert_eq!(refund.origin.id, ticket.id.to_string());

    let err = harness
        .engine
        .redemptions()
        .cancel(ticket.id, "Again")
        .unwrap_err();
    assert!(matches!(
        err,
        RewardsError::InvalidState { ref status, .. } if status == "cancelled"
    ));
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 1000);
}

#[test]
fn rejected_transitions_name_status() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(100, 5);
    let admin = AdminId::generate();
    let redemptions = harness.engine.redemptions();

    let ticket = redemptions.create(user, product, 1).unwrap();
    let err = redemptions.deliver(ticket.id, admin).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("cannot deliver ticket {} in status pending", ticket.id)
    );
    assert_eq!(harness.engine.inventory().get(&product).unwrap().reserved, 1);

    redemptions.approve(ticket.id, admin).unwrap();
    assert!(matches!(
        redemptions.approve(ticket.id, admin),
        Err(RewardsError::InvalidState { .. })
    ));

    redemptions.deliver(ticket.id, admin).unwrap();
    for result in [
        redemptions.approve(ticket.id, admin),
        redemptions.deliver(ticket.id, admin),
        redemptions.cancel(ticket.id, "Too late"),
    ] {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), OutcomeKind::InvalidState);
        assert!(err.to_string().contains("delivered"));
    }
    assert_eq!(harness.engine.ledger().balance(&user).unwrap(), 900);
}

#[test]
fn unknown_ticket_not_found() {
    let harness = TestHarness::new();
    let err = harness
        .engine
        .redemptions()
        .approve(TicketId::generate(), AdminId::generate())
        .unwrap_err();
    assert!(matches!(err, RewardsError::NotFound { entity: "ticket", .. }));
}

#[test]
fn tickets_listed_newest_first() {
    let harness = TestHarness::new();
    let user = harness.funded_account(1000);
    let product = harness.stocked_product(100, 10);

    let first = harness.engine.redemptions().create(user, product, 1).unwrap();
    let second = harness.engine.redemptions().create(user, product, 2).unwrap();

    let listed = harness
        .engine
        .redemptions()
        .list_for_account(&user, 10, 0)
        .unwrap();
    let ids: Vec<TicketId> = listed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let other = harness.funded_account(1000);
    assert!(harness
        .engine
        .redemptions()
        .list_for_account(&other, 10, 0)
        .unwrap()
        .is_empty());
}
