//! Integration tests for the checkout coordinator and cart service,
//! run against the in-memory store.

use common::{AddressId, Money, OrderId, ProductId, UserId};
use domain::{CartSnapshot, OrderStatus};
use fulfillment::{
    CartService, CheckoutRequest, FulfillmentCoordinator, FulfillmentError, PlacedOrder,
};
use storage::{FulfillmentStore, InMemoryStore};

struct TestHarness {
    store: InMemoryStore,
    coordinator: FulfillmentCoordinator<InMemoryStore>,
    cart: CartService<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            coordinator: FulfillmentCoordinator::new(store.clone()),
            cart: CartService::new(store.clone()),
            store,
        }
    }

    async fn product(&self, name: &str, price_cents: i64, stock: u32) -> ProductId {
        self.store
            .insert_product(name, Money::from_cents(price_cents), stock)
            .await
    }
}

#[tokio::test]
async fn test_checkout_worked_example() {
    let h = TestHarness::new();
    let user = UserId::new();
    // cart = [{A, $10.00, qty 2}, {B, $5.00, qty 1}], stock A=5, B=5
    let a = h.product("Product A", 1000, 5).await;
    let b = h.product("Product B", 500, 5).await;
    h.cart.add_item(user, a, 2).await.unwrap();
    h.cart.add_item(user, b, 1).await.unwrap();

    let placed = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    assert_eq!(placed.order.subtotal, Money::from_cents(2500));
    assert_eq!(placed.order.tax, Money::ZERO);
    assert_eq!(placed.order.shipping_cost, Money::ZERO);
    assert_eq!(placed.order.total, Money::from_cents(2500));
    assert_eq!(placed.order.status, OrderStatus::Pending);

    let line_sum: Money = placed.items.iter().map(|i| i.total_price).sum();
    assert_eq!(placed.order.total, line_sum + placed.order.tax + placed.order.shipping_cost);

    assert_eq!(h.store.stock_of(a).await, Some(3));
    assert_eq!(h.store.stock_of(b).await, Some(4));
    assert!(h.cart.view_cart(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_captures_snapshot_prices_and_names() {
    let h = TestHarness::new();
    let user = UserId::new();
    let widget = h.product("Widget", 999, 10).await;
    h.cart.add_item(user, widget, 3).await.unwrap();

    let placed = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    assert_eq!(placed.items.len(), 1);
    let item = &placed.items[0];
    assert_eq!(item.product_id, widget);
    assert_eq!(item.product_name, "Widget");
    assert_eq!(item.quantity, 3);
    assert_eq!(item.unit_price, Money::from_cents(999));
    assert_eq!(item.total_price, Money::from_cents(2997));
}

#[tokio::test]
async fn test_empty_cart_is_rejected_without_side_effects() {
    let h = TestHarness::new();
    let user = UserId::new();

    let err = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FulfillmentError::EmptyCart));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_insufficient_stock_names_product_and_changes_nothing() {
    let h = TestHarness::new();
    let user = UserId::new();
    // cart = [{A, qty 3}], stock A=2
    let a = h.product("Product A", 1000, 3).await;
    h.cart.add_item(user, a, 3).await.unwrap();
    // Stock shrinks after the line was added.
    h.store.adjust_stock(a, -1).await.unwrap();

    let err = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap_err();

    match err {
        FulfillmentError::InsufficientStock {
            product_id,
            available,
        } => {
            assert_eq!(product_id, a);
            assert_eq!(available, 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.store.stock_of(a).await, Some(2));
    assert_eq!(h.cart.view_cart(user).await.unwrap().len(), 1);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_address_validation() {
    let h = TestHarness::new();
    let user = UserId::new();
    let stranger = UserId::new();
    let product = h.product("Widget", 1000, 5).await;
    let own_address = h.store.insert_address(user).await;
    let strangers_address = h.store.insert_address(stranger).await;

    h.cart.add_item(user, product, 1).await.unwrap();

    // Another user's address is rejected before any write.
    let err = h
        .coordinator
        .create_order(
            user,
            CheckoutRequest {
                shipping_address_id: Some(strangers_address),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::InvalidAddress(fulfillment::AddressKind::Shipping)
    ));
    assert_eq!(h.cart.view_cart(user).await.unwrap().len(), 1);

    // An unknown billing address is rejected the same way.
    let err = h
        .coordinator
        .create_order(
            user,
            CheckoutRequest {
                billing_address_id: Some(AddressId::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::InvalidAddress(fulfillment::AddressKind::Billing)
    ));

    // The user's own addresses pass and land on the order.
    let placed = h
        .coordinator
        .create_order(
            user,
            CheckoutRequest {
                shipping_address_id: Some(own_address),
                billing_address_id: Some(own_address),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(placed.order.shipping_address_id, Some(own_address));
    assert_eq!(placed.order.billing_address_id, Some(own_address));
}

#[tokio::test]
async fn test_notes_are_trimmed_and_blank_notes_dropped() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 5).await;
    h.cart.add_item(user, product, 1).await.unwrap();

    let placed = h
        .coordinator
        .create_order(
            user,
            CheckoutRequest {
                notes: Some("  leave at the door  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(placed.order.notes.as_deref(), Some("leave at the door"));

    h.cart.add_item(user, product, 1).await.unwrap();
    let placed = h
        .coordinator
        .create_order(
            user,
            CheckoutRequest {
                notes: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(placed.order.notes, None);
}

#[tokio::test]
async fn test_concurrent_checkouts_for_last_unit() {
    let h = TestHarness::new();
    let alice = UserId::new();
    let bob = UserId::new();
    let product = h.product("Last One", 2500, 1).await;
    h.cart.add_item(alice, product, 1).await.unwrap();
    h.cart.add_item(bob, product, 1).await.unwrap();

    let (a, b) = tokio::join!(
        h.coordinator.create_order(alice, CheckoutRequest::default()),
        h.coordinator.create_order(bob, CheckoutRequest::default()),
    );

    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one checkout must win the last unit");

    let loser = outcomes
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one checkout must lose");
    assert!(matches!(
        loser,
        FulfillmentError::InsufficientStock { available: 0, .. }
    ));

    assert_eq!(h.store.stock_of(product).await, Some(0));
}

#[tokio::test]
async fn test_status_update_lifecycle() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 5).await;
    h.cart.add_item(user, product, 1).await.unwrap();

    let placed = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();
    let order_id = placed.order.id;

    let updated = h
        .coordinator
        .update_order_status(order_id, "shipped")
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Shipped);
    assert!(updated.updated_at >= placed.order.updated_at);

    // Status writes touch neither inventory nor the cart.
    assert_eq!(h.store.stock_of(product).await, Some(4));

    let err = h
        .coordinator
        .update_order_status(order_id, "refunded")
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InvalidStatus(ref s) if s.as_str() == "refunded"));

    let missing = OrderId::new();
    let err = h
        .coordinator
        .update_order_status(missing, "pending")
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::OrderNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_status_updates_are_gated_on_the_stored_status() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 5).await;
    h.cart.add_item(user, product, 1).await.unwrap();

    let placed = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    // Each update re-reads the stored status and checks the move from
    // it through the transition policy before writing.
    let mut current = placed.order.status;
    for next in ["confirmed", "processing", "shipped", "delivered"] {
        let updated = h
            .coordinator
            .update_order_status(placed.order.id, next)
            .await
            .unwrap();
        assert!(current.can_transition_to(updated.status));
        current = updated.status;
    }
    assert_eq!(current, OrderStatus::Delivered);

    // The stored status, not the caller's belief, is what the policy
    // sees: the order is now delivered, and the policy still admits a
    // move back to pending.
    assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
    let rewound = h
        .coordinator
        .update_order_status(placed.order.id, "pending")
        .await
        .unwrap();
    assert_eq!(rewound.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_order_read_paths() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 10).await;

    h.cart.add_item(user, product, 1).await.unwrap();
    let first = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    h.cart.add_item(user, product, 2).await.unwrap();
    let second = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();
    h.coordinator
        .update_order_status(second.order.id, "cancelled")
        .await
        .unwrap();

    let PlacedOrder { order, items } = h.coordinator.get_order(first.order.id).await.unwrap();
    assert_eq!(order.id, first.order.id);
    assert_eq!(items, first.items);

    let all = h.coordinator.list_orders(user, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let cancelled = h
        .coordinator
        .list_orders(user, Some(OrderStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, second.order.id);

    let err = h.coordinator.get_order(OrderId::new()).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_cart_service_merges_and_caps_quantities() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 5).await;

    let line = h.cart.add_item(user, product, 2).await.unwrap();
    assert_eq!(line.quantity, 2);

    // Repeat add merges into the same line.
    let merged = h.cart.add_item(user, product, 2).await.unwrap();
    assert_eq!(merged.id, line.id);
    assert_eq!(merged.quantity, 4);
    assert_eq!(h.cart.view_cart(user).await.unwrap().len(), 1);

    // Merging past current stock is refused.
    let err = h.cart.add_item(user, product, 2).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::InsufficientStock { available: 5, .. }
    ));

    let err = h.cart.add_item(user, product, 0).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::InvalidQuantity(0)));

    let err = h.cart.add_item(user, ProductId::new(), 1).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::ProductNotFound(_)));
}

#[tokio::test]
async fn test_cart_service_update_remove_clear() {
    let h = TestHarness::new();
    let user = UserId::new();
    let product = h.product("Widget", 1000, 5).await;
    let other = h.product("Gadget", 500, 5).await;

    let line = h.cart.add_item(user, product, 1).await.unwrap();
    h.cart.add_item(user, other, 1).await.unwrap();

    let updated = h.cart.update_quantity(user, line.id, 5).await.unwrap();
    assert_eq!(updated.quantity, 5);

    let err = h.cart.update_quantity(user, line.id, 6).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::InsufficientStock { available: 5, .. }
    ));

    h.cart.remove_item(user, line.id).await.unwrap();
    let err = h.cart.remove_item(user, line.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::CartLineNotFound(_)));

    h.cart.clear(user).await.unwrap();
    assert!(h.cart.view_cart(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_products_are_excluded_from_checkout() {
    let h = TestHarness::new();
    let user = UserId::new();
    let keeps = h.product("Widget", 1000, 5).await;
    let discontinued = h.product("Old Widget", 800, 5).await;
    h.cart.add_item(user, keeps, 1).await.unwrap();
    h.cart.add_item(user, discontinued, 1).await.unwrap();
    h.store.set_product_active(discontinued, false).await;

    let placed = h
        .coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].product_id, keeps);
    // The discontinued product's stock is untouched.
    assert_eq!(h.store.stock_of(discontinued).await, Some(5));
}

#[tokio::test]
async fn test_custom_pricing_policy_flows_through_checkout() {
    use domain::PricingPolicy;

    struct FlatTax;
    impl PricingPolicy for FlatTax {
        fn tax(&self, subtotal: Money) -> Money {
            Money::from_cents(subtotal.cents() / 10)
        }
        fn shipping(&self, _snapshot: &CartSnapshot) -> Money {
            Money::from_cents(300)
        }
    }

    let store = InMemoryStore::new();
    let coordinator = FulfillmentCoordinator::with_policy(store.clone(), FlatTax);
    let cart = CartService::new(store.clone());

    let user = UserId::new();
    let product = store
        .insert_product("Widget", Money::from_cents(1000), 5)
        .await;
    cart.add_item(user, product, 2).await.unwrap();

    let placed = coordinator
        .create_order(user, CheckoutRequest::default())
        .await
        .unwrap();

    assert_eq!(placed.order.subtotal, Money::from_cents(2000));
    assert_eq!(placed.order.tax, Money::from_cents(200));
    assert_eq!(placed.order.shipping_cost, Money::from_cents(300));
    assert_eq!(placed.order.total, Money::from_cents(2500));
}
