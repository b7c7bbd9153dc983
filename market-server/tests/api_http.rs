//! HTTP API tests driving the full middleware stack in-process.

use axum::body::Body;
use http::{Request, StatusCode, header};
use serde_json::{Value, json};

use market_server::api::{self, OneshotRouter};
use market_server::auth::JwtConfig;
use market_server::{Config, ServerState};

fn test_config() -> Config {
    Config {
        work_dir: std::env::temp_dir()
            .join("market-http-test")
            .to_string_lossy()
            .into_owned(),
        http_port: 0,
        jwt: JwtConfig {
            secret: "http-test-secret-key-with-32-bytes!!!!".to_string(),
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

async fn call(
    state: &ServerState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut app = api::build_app(state);
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.oneshot(state, request).await.expect("oneshot");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register a user and return their token.
async fn register(state: &ServerState, email: &str, role: &str) -> String {
    let (status, body) = call(
        state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": email.split('@').next().unwrap(),
            "email": email,
            "password": "password-123",
            "role": role,
            "phone": "9999999999",
            "address": "12 Market Road, Greenfield",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

async fn create_product(state: &ServerState, farmer_token: &str, title: &str, stock: i64) -> String {
    let (status, body) = call(
        state,
        "POST",
        "/api/products",
        Some(farmer_token),
        Some(json!({
            "title": title,
            "description": format!("{title} fresh from the farm"),
            "category": "Vegetables",
            "price_per_unit": 80.0,
            "measuring_unit": "kg",
            "min_order_qty": 1,
            "shelf_life_days": 7,
            "quantity_available": stock,
            "delivery_radius_km": 25,
            "location": null,
            "images": [],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create product failed: {body}");
    body["id"].as_str().expect("product id").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let state = test_state().await;
    let (status, body) = call(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_me_round_trip() {
    let state = test_state().await;
    let _ = register(&state, "ravi@home.test", "consumer").await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "ravi@home.test", "password": "password-123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ravi@home.test");
    // Credentials never leave the server
    assert!(body["user"].get("password_hash").is_none());

    let token = body["token"].as_str().expect("token");
    let (status, body) = call(&state, "GET", "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "consumer");
}

#[tokio::test]
async fn duplicate_email_registration_conflicts() {
    let state = test_state().await;
    let _ = register(&state, "dup@home.test", "consumer").await;
    let (status, _) = call(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "dup",
            "email": "dup@home.test",
            "password": "password-123",
            "role": "consumer",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_unauthorized_uniformly() {
    let state = test_state().await;
    let _ = register(&state, "ravi@home.test", "consumer").await;
    let (status, body) = call(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "ravi@home.test", "password": "wrong"})),
    )
    .await;
    let (status2, body2) = call(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "nobody@home.test", "password": "wrong"})),
    )
    .await;
    // Same status and message whether the account exists or not
    assert_eq!(status, status2);
    assert_eq!(body["message"], body2["message"]);
}

#[tokio::test]
async fn catalog_is_public_but_listing_requires_farmer() {
    let state = test_state().await;
    let farmer_token = register(&state, "asha@farm.test", "farmer").await;
    let consumer_token = register(&state, "ravi@home.test", "consumer").await;
    let _ = create_product(&state, &farmer_token, "Spinach", 30).await;

    // Anonymous browse works
    let (status, body) = call(&state, "GET", "/api/products?search=spin", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Spinach");

    // Consumers cannot list products
    let (status, _) = call(
        &state,
        "POST",
        "/api/products",
        Some(&consumer_token),
        Some(json!({
            "title": "Rogue",
            "description": "should not exist in the catalog",
            "category": "Other",
            "price_per_unit": 1.0,
            "measuring_unit": "kg",
            "min_order_qty": 1,
            "shelf_life_days": 1,
            "quantity_available": 1,
            "delivery_radius_km": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Anonymous mutation is unauthorized
    let (status, _) = call(&state, "DELETE", "/api/products/product:x", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn farmer_cannot_touch_another_farmers_product() {
    let state = test_state().await;
    let owner = register(&state, "asha@farm.test", "farmer").await;
    let intruder = register(&state, "rival@farm.test", "farmer").await;
    let product_id = create_product(&state, &owner, "Spinach", 30).await;

    let (status, _) = call(
        &state,
        "PUT",
        &format!("/api/products/{product_id}"),
        Some(&intruder),
        Some(json!({"price_per_unit": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &state,
        "DELETE",
        &format!("/api/products/{product_id}"),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn checkout_and_status_flow_over_http() {
    let state = test_state().await;
    let farmer_token = register(&state, "asha@farm.test", "farmer").await;
    let consumer_token = register(&state, "ravi@home.test", "consumer").await;
    let product_id = create_product(&state, &farmer_token, "Spinach", 30).await;

    // Consumer checks out
    let (status, order) = call(
        &state,
        "POST",
        "/api/orders",
        Some(&consumer_token),
        Some(json!({
            "items": [{"product_id": product_id, "qty": 2}],
            "delivery_address": "45 Lakeview Street, Rivertown",
            "phone": "8888888888",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {order}");
    assert_eq!(order["status"], "placed");
    assert_eq!(order["subtotal"], 160.0);
    let order_id = order["id"].as_str().expect("order id").to_string();

    // Farmer sees it with consumer contact attached
    let (status, body) = call(&state, "GET", "/api/orders/farmer", Some(&farmer_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["consumer_contact"]["email"], "ravi@home.test");

    // Farmer advances the status
    let (status, body) = call(
        &state,
        "PUT",
        &format!("/api/orders/{order_id}/status"),
        Some(&farmer_token),
        Some(json!({"status": "accepted"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    // Consumer cannot
    let (status, _) = call(
        &state,
        "PUT",
        &format!("/api/orders/{order_id}/status"),
        Some(&consumer_token),
        Some(json!({"status": "packed"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // An unknown status name is a validation error
    let (status, _) = call(
        &state,
        "PUT",
        &format!("/api/orders/{order_id}/status"),
        Some(&farmer_token),
        Some(json!({"status": "shipped"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Both parties can read the order; strangers cannot
    let (status, _) = call(
        &state,
        "GET",
        &format!("/api/orders/{order_id}"),
        Some(&consumer_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let stranger = register(&state, "stranger@home.test", "consumer").await;
    let (status, _) = call(
        &state,
        "GET",
        &format!("/api/orders/{order_id}"),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mixed_farmer_cart_is_conflict_over_http() {
    let state = test_state().await;
    let farmer_a = register(&state, "a@farm.test", "farmer").await;
    let farmer_b = register(&state, "b@farm.test", "farmer").await;
    let consumer = register(&state, "c@home.test", "consumer").await;
    let rice = create_product(&state, &farmer_a, "Rice", 50).await;
    let milk = create_product(&state, &farmer_b, "Milk", 20).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/orders",
        Some(&consumer),
        Some(json!({
            "items": [
                {"product_id": rice, "qty": 1},
                {"product_id": milk, "qty": 1},
            ],
            "delivery_address": "45 Lakeview Street, Rivertown",
            "phone": "8888888888",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "E4003");
}

#[tokio::test]
async fn admin_self_registration_is_refused() {
    let state = test_state().await;
    let (status, _) = call(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "name": "root",
            "email": "root@market.test",
            "password": "password-123",
            "role": "admin",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
