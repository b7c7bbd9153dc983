//! Order workflow integration tests against an in-memory database.

use market_server::auth::JwtConfig;
use market_server::db::models::{
    Category, MeasuringUnit, OrderStatus, Product, ProductCreate, Role, User,
};
use market_server::db::repository::{OrderRepository, ProductRepository, UserRepository};
use market_server::orders::{CartItem, OrderError, OrderWorkflow, PlaceOrderRequest};
use market_server::{Config, ServerState};
use rand::Rng;
use surrealdb::RecordId;

fn test_config() -> Config {
    Config {
        work_dir: std::env::temp_dir()
            .join("market-test")
            .to_string_lossy()
            .into_owned(),
        http_port: 0,
        jwt: JwtConfig {
            secret: "integration-test-secret-key-32-bytes!!".to_string(),
            expiration_minutes: 60,
            issuer: "market-server".to_string(),
            audience: "market-clients".to_string(),
        },
        environment: "test".to_string(),
        request_timeout_ms: 30000,
        db_timeout_ms: 5000,
    }
}

async fn test_state() -> ServerState {
    ServerState::initialize_in_memory(&test_config())
        .await
        .expect("in-memory state")
}

async fn create_user(state: &ServerState, email: &str, role: Role) -> RecordId {
    let repo = UserRepository::new(state.db.clone());
    let hash = User::hash_password("password-123").expect("hash");
    let user = repo
        .create(
            email.split('@').next().unwrap().to_string(),
            email.to_string(),
            hash,
            role,
            Some("9999999999".to_string()),
            Some("12 Market Road, Greenfield".to_string()),
        )
        .await
        .expect("create user");
    user.id.expect("user id")
}

async fn create_product(
    state: &ServerState,
    farmer: &RecordId,
    title: &str,
    price: f64,
    stock: i64,
    min_qty: i64,
) -> Product {
    let repo = ProductRepository::new(state.db.clone());
    repo.create(
        farmer.clone(),
        ProductCreate {
            title: title.to_string(),
            description: format!("{title} fresh from the farm"),
            category: Category::Vegetables,
            price_per_unit: price,
            measuring_unit: MeasuringUnit::Kg,
            min_order_qty: min_qty,
            shelf_life_days: 7,
            quantity_available: stock,
            delivery_radius_km: 25,
            location: None,
            images: vec![],
        },
    )
    .await
    .expect("create product")
}

fn workflow(state: &ServerState) -> OrderWorkflow {
    OrderWorkflow::new(
        ProductRepository::new(state.db.clone()),
        OrderRepository::new(state.db.clone()),
    )
}

fn cart(items: &[(&Product, i64)]) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: items
            .iter()
            .map(|(p, qty)| CartItem {
                product_id: p.id.as_ref().expect("product id").to_string(),
                qty: *qty,
            })
            .collect(),
        delivery_address: "45 Lakeview Street, Rivertown".to_string(),
        phone: "8888888888".to_string(),
        special_instructions: None,
    }
}

async fn stock_of(state: &ServerState, product: &Product) -> i64 {
    let repo = ProductRepository::new(state.db.clone());
    repo.find_by_id(&product.id.as_ref().unwrap().to_string())
        .await
        .expect("find product")
        .expect("product exists")
        .quantity_available
}

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
async fn place_order_snapshots_items_and_decrements_stock() {
    let state = test_state().await;
    let farmer = create_user(&state, "asha@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "ravi@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Basmati Rice", 80.0, 50, 1).await;
    let spinach = create_product(&state, &farmer, "Spinach", 60.0, 30, 1).await;

    let order = workflow(&state)
        .place_order(consumer.clone(), cart(&[(&rice, 2), (&spinach, 1)]))
        .await
        .expect("place order");

    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.subtotal, 220.0);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.consumer, consumer);
    assert_eq!(order.farmer, farmer);
    // Snapshot fields, not live references
    assert_eq!(order.items[0].title, "Basmati Rice");
    assert_eq!(order.items[0].unit_price, 80.0);

    assert_eq!(stock_of(&state, &rice).await, 48);
    assert_eq!(stock_of(&state, &spinach).await, 29);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let state = test_state().await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;

    let req = PlaceOrderRequest {
        items: vec![],
        delivery_address: "45 Lakeview Street, Rivertown".to_string(),
        phone: "8888888888".to_string(),
        special_instructions: None,
    };
    let err = workflow(&state)
        .place_order(consumer, req)
        .await
        .expect_err("empty cart");
    assert!(matches!(err, OrderError::EmptyCart));
}

#[tokio::test]
async fn short_delivery_address_is_rejected() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 10, 1).await;

    let mut req = cart(&[(&rice, 1)]);
    req.delivery_address = "short".to_string();
    let err = workflow(&state)
        .place_order(consumer, req)
        .await
        .expect_err("short address");
    assert!(matches!(err, OrderError::Validation(_)));
    assert_eq!(stock_of(&state, &rice).await, 10);
}

#[tokio::test]
async fn mixed_farmer_cart_is_rejected_with_no_stock_effect() {
    let state = test_state().await;
    let farmer_a = create_user(&state, "a@farm.test", Role::Farmer).await;
    let farmer_b = create_user(&state, "b@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer_a, "Rice", 80.0, 50, 1).await;
    let milk = create_product(&state, &farmer_b, "Milk", 30.0, 20, 1).await;

    let err = workflow(&state)
        .place_order(consumer.clone(), cart(&[(&rice, 1), (&milk, 1)]))
        .await
        .expect_err("mixed cart");
    assert!(matches!(err, OrderError::MixedFarmerCart));

    assert_eq!(stock_of(&state, &rice).await, 50);
    assert_eq!(stock_of(&state, &milk).await, 20);
    let orders = OrderRepository::new(state.db.clone())
        .find_by_consumer(&consumer)
        .await
        .expect("orders");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn missing_product_rejects_whole_cart() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let mut req = cart(&[(&rice, 1)]);
    req.items.push(CartItem {
        product_id: "product:does_not_exist".to_string(),
        qty: 1,
    });
    let err = workflow(&state)
        .place_order(consumer, req)
        .await
        .expect_err("missing product");
    assert!(matches!(err, OrderError::ProductNotFound(_)));
    assert_eq!(stock_of(&state, &rice).await, 50);
}

#[tokio::test]
async fn quantity_above_stock_is_rejected_without_reservation() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 3, 1).await;

    let err = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 5)]))
        .await
        .expect_err("over stock");
    assert!(matches!(err, OrderError::InvalidQuantity { .. }));
    assert_eq!(stock_of(&state, &rice).await, 3);
}

#[tokio::test]
async fn quantity_below_minimum_is_rejected() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 5).await;

    let err = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 2)]))
        .await
        .expect_err("below minimum");
    assert!(matches!(err, OrderError::InvalidQuantity { .. }));
    assert_eq!(stock_of(&state, &rice).await, 50);
}

#[tokio::test]
async fn repeated_product_lines_are_checked_against_combined_demand() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 5, 1).await;

    // 3 + 3 exceeds the 5 in stock even though each line alone fits
    let err = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 3), (&rice, 3)]))
        .await
        .expect_err("combined demand");
    assert!(matches!(
        err,
        OrderError::InvalidQuantity { .. } | OrderError::InsufficientStock(_)
    ));
    assert_eq!(stock_of(&state, &rice).await, 5);
}

// =============================================================================
// Status transitions
// =============================================================================

#[tokio::test]
async fn farmer_advances_order_through_full_chain() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 1)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();

    let wf = workflow(&state);
    for next in [
        OrderStatus::Accepted,
        OrderStatus::Packed,
        OrderStatus::Dispatched,
        OrderStatus::Delivered,
    ] {
        let updated = wf
            .update_status(&farmer, Role::Farmer, &order_id, next)
            .await
            .expect("advance status");
        assert_eq!(updated.status, next);
    }
}

#[tokio::test]
async fn skipping_and_backward_transitions_are_rejected() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 1)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();
    let wf = workflow(&state);

    // placed -> packed skips accepted
    let err = wf
        .update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Packed)
        .await
        .expect_err("skip");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    wf.update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Accepted)
        .await
        .expect("accept");

    // accepted -> placed goes backward
    let err = wf
        .update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Placed)
        .await
        .expect_err("backward");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancelling_an_accepted_order_restores_stock() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 4)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();
    assert_eq!(stock_of(&state, &rice).await, 46);

    let wf = workflow(&state);
    wf.update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Accepted)
        .await
        .expect("accept");
    let cancelled = wf
        .update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Cancelled)
        .await
        .expect("cancel");

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, &rice).await, 50);
}

#[tokio::test]
async fn dispatched_order_cannot_be_cancelled() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 1)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();
    let wf = workflow(&state);

    for next in [
        OrderStatus::Accepted,
        OrderStatus::Packed,
        OrderStatus::Dispatched,
    ] {
        wf.update_status(&farmer, Role::Farmer, &order_id, next)
            .await
            .expect("advance");
    }
    let err = wf
        .update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Cancelled)
        .await
        .expect_err("late cancel");
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
    // Stock stays reserved
    assert_eq!(stock_of(&state, &rice).await, 49);
}

#[tokio::test]
async fn other_farmer_and_consumer_cannot_update_status() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let other_farmer = create_user(&state, "other@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer.clone(), cart(&[(&rice, 1)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();
    let wf = workflow(&state);

    let err = wf
        .update_status(&other_farmer, Role::Farmer, &order_id, OrderStatus::Accepted)
        .await
        .expect_err("foreign farmer");
    assert!(matches!(err, OrderError::Forbidden(_)));

    let err = wf
        .update_status(&consumer, Role::Consumer, &order_id, OrderStatus::Cancelled)
        .await
        .expect_err("consumer mutation");
    assert!(matches!(err, OrderError::Forbidden(_)));
}

// =============================================================================
// Concurrency
// =============================================================================

/// Place one unit until a definitive business outcome; transient transaction
/// conflicts from the storage engine are retried like a client would.
async fn place_one_unit(
    state: ServerState,
    consumer: RecordId,
    product: Product,
) -> Result<(), OrderError> {
    let wf = workflow(&state);
    for _ in 0..100 {
        match wf
            .place_order(consumer.clone(), cart(&[(&product, 1)]))
            .await
        {
            Ok(_) => return Ok(()),
            Err(OrderError::Database(_)) => {
                // Jittered backoff so retrying writers do not collide in lockstep
                let pause = rand::thread_rng().gen_range(1..8);
                tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(OrderError::Database("retries exhausted".to_string()))
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    const STOCK: i64 = 10;
    const BUYERS: usize = 20;

    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, STOCK, 1).await;

    let mut consumers = Vec::new();
    for i in 0..BUYERS {
        consumers.push(create_user(&state, &format!("c{i}@home.test"), Role::Consumer).await);
    }

    let mut handles = Vec::new();
    for consumer in consumers {
        handles.push(tokio::spawn(place_one_unit(
            state.clone(),
            consumer,
            rice.clone(),
        )));
    }

    let mut placed = 0usize;
    let mut refused = 0usize;
    for handle in handles {
        match handle.await.expect("task") {
            Ok(()) => placed += 1,
            Err(OrderError::InsufficientStock(_)) | Err(OrderError::InvalidQuantity { .. }) => {
                refused += 1
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed, STOCK as usize);
    assert_eq!(refused, BUYERS - STOCK as usize);
    let remaining = stock_of(&state, &rice).await;
    assert_eq!(remaining, 0);
}

async fn accept_once(
    state: ServerState,
    farmer: RecordId,
    order_id: String,
) -> Result<(), OrderError> {
    let wf = workflow(&state);
    for _ in 0..100 {
        match wf
            .update_status(&farmer, Role::Farmer, &order_id, OrderStatus::Accepted)
            .await
        {
            Ok(_) => return Ok(()),
            Err(OrderError::Database(_)) => {
                let pause = rand::thread_rng().gen_range(1..8);
                tokio::time::sleep(std::time::Duration::from_millis(pause)).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(OrderError::Database("retries exhausted".to_string()))
}

#[tokio::test]
async fn concurrent_status_updates_let_exactly_one_writer_win() {
    let state = test_state().await;
    let farmer = create_user(&state, "f@farm.test", Role::Farmer).await;
    let consumer = create_user(&state, "c@home.test", Role::Consumer).await;
    let rice = create_product(&state, &farmer, "Rice", 80.0, 50, 1).await;

    let order = workflow(&state)
        .place_order(consumer, cart(&[(&rice, 1)]))
        .await
        .expect("place order");
    let order_id = order.id.as_ref().unwrap().to_string();

    let a = tokio::spawn(accept_once(state.clone(), farmer.clone(), order_id.clone()));
    let b = tokio::spawn(accept_once(state.clone(), farmer.clone(), order_id.clone()));
    let outcomes = [a.await.expect("task"), b.await.expect("task")];

    // The compare-and-swap admits exactly one writer; the loser sees the
    // transition judged against the status the winner already wrote.
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let lost = outcomes
        .into_iter()
        .find(|r| r.is_err())
        .expect("one writer loses")
        .unwrap_err();
    assert!(matches!(
        lost,
        OrderError::InvalidTransition {
            from: OrderStatus::Accepted,
            to: OrderStatus::Accepted,
        }
    ));

    let current = OrderRepository::new(state.db.clone())
        .find_by_id(&order_id)
        .await
        .expect("re-read")
        .expect("order exists")
        .status;
    assert_eq!(current, OrderStatus::Accepted);
}
