mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use jewelry_store::{
    api::public::paypal::{apply_webhook_event, WebhookOutcome},
    entities::{order, product},
};
use sea_orm::EntityTrait;
use serde_json::json;
use tower::ServiceExt;

use common::{customer_info, spawn_app, TestApp};

async fn stock_of(app: &TestApp, id: i32) -> i32 {
    product::Entity::find_by_id(id)
        .one(&*app.state.db)
        .await
        .expect("query")
        .expect("product")
        .stock
}

#[tokio::test]
async fn guest_checkout_snapshots_prices_and_takes_stock() {
    let app = spawn_app().await;
    let ring = app.create_product("Marquise Ring", 150.0, 5).await;
    let chain = app.create_product("Box Chain", 99.99, 5).await;

    let (status, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("Guest@Example.com"),
                "items": [
                    { "product_id": ring.id, "quantity": 2, "size": "6" },
                    { "product_id": chain.id, "quantity": 1, "price": 0.01 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["order"];
    assert_eq!(order["subtotal"], 399.99);
    assert_eq!(order["shipping_cost"], 25.0);
    assert_eq!(order["total"], 424.99);
    assert_eq!(order["customer_email"], "guest@example.com");
    assert_eq!(order["order_status"], "pending");
    assert_eq!(order["fulfillment_status"], "unfulfilled");
    assert_eq!(order["payment_status"], "pending");
    assert!(order["user_id"].is_null());
    assert!(order["order_number"].as_str().expect("number").starts_with("ORD-"));
    assert_eq!(order["items"][0]["product_name"], "Marquise Ring");
    assert_eq!(order["items"][0]["price"], 150.0);
    assert_eq!(order["items"][0]["size"], "6");

    assert_eq!(stock_of(&app, ring.id).await, 3);
    assert_eq!(stock_of(&app, chain.id).await, 4);
}

#[tokio::test]
async fn free_shipping_above_the_threshold() {
    let app = spawn_app().await;
    let bangle = app.create_product("Gold Bangle", 500.0, 2).await;

    let (status, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [{ "product_id": bangle.id, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["shipping_cost"], 0.0);
    assert_eq!(body["order"]["total"], 500.0);
}

#[tokio::test]
async fn over_stock_checkout_changes_nothing() {
    let app = spawn_app().await;
    let plentiful = app.create_product("Hoop Earrings", 200.0, 10).await;
    let scarce = app.create_product("Opal Ring", 900.0, 1).await;

    let (status, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [
                    { "product_id": plentiful.id, "quantity": 3 },
                    { "product_id": scarce.id, "quantity": 1, "size": "5" },
                    { "product_id": scarce.id, "quantity": 1, "size": "6" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert_eq!(stock_of(&app, plentiful.id).await, 10);
    assert_eq!(stock_of(&app, scarce.id).await, 1);
    let orders = order::Entity::find().all(&*app.state.db).await.expect("query");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn checkout_rejects_bad_input() {
    let app = spawn_app().await;
    let ring = app.create_product("Trilogy Ring", 1800.0, 2).await;

    let (status, _) = app
        .post(
            "/api/orders",
            None,
            json!({ "customer": customer_info("guest@example.com"), "items": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("not-an-email"),
                "items": [{ "product_id": ring.id, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [{ "product_id": ring.id, "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [{ "product_id": 4242, "quantity": 1 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signed_in_checkout_uses_and_clears_the_cart() {
    let app = spawn_app().await;
    let (customer, token) = app.customer().await;
    let ring = app.create_product("Cushion Ring", 1100.0, 4).await;

    app.post(
        "/api/cart",
        Some(&token),
        json!({ "product_id": ring.id, "quantity": 2, "size": "7" }),
    )
    .await;

    let (status, body) = app
        .post(
            "/api/orders",
            Some(&token),
            json!({ "customer": customer_info("customer@example.com") }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["user_id"], customer.id);
    assert_eq!(body["order"]["items"][0]["quantity"], 2);
    assert_eq!(body["order"]["items"][0]["size"], "7");
    let number = body["order"]["order_number"].as_str().expect("number").to_owned();

    let (_, cart) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(cart["item_count"], 0);
    assert_eq!(stock_of(&app, ring.id).await, 2);

    let (status, body) = app.get("/api/user/orders", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["orders"][0]["items"].as_array().map(Vec::len), Some(1));

    let (status, body) = app
        .get(&format!("/api/user/orders/{number}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_number"], number.as_str());
}

#[tokio::test]
async fn large_cart_quantities_check_out_against_stock() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let studs = app.create_product("Pearl Studs", 120.0, 500).await;

    for quantity in [100, 50] {
        let (status, _) = app
            .post(
                "/api/cart",
                Some(&token),
                json!({ "product_id": studs.id, "quantity": quantity }),
            )
            .await;
        assert!(status.is_success());
    }
    let (_, cart) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(cart["item_count"], 150);

    let (status, body) = app
        .post(
            "/api/orders",
            Some(&token),
            json!({ "customer": customer_info("customer@example.com") }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["order"]["items"][0]["quantity"], 150);
    assert_eq!(stock_of(&app, studs.id).await, 350);
}

#[tokio::test]
async fn tracking_requires_the_matching_email() {
    let app = spawn_app().await;
    let ring = app.create_product("Bezel Ring", 600.0, 2).await;

    let (_, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("tracker@example.com"),
                "items": [{ "product_id": ring.id, "quantity": 1 }]
            }),
        )
        .await;
    let number = body["order"]["order_number"].as_str().expect("number").to_owned();

    let (status, body) = app
        .get(
            &format!("/api/orders/track?order_number={number}&email=TRACKER@example.com"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_number"], number.as_str());

    let (status, _) = app
        .get(
            &format!("/api/orders/track?order_number={number}&email=someone@example.com"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .get("/api/orders/track?order_number=ORD-0-XXXXXX&email=tracker@example.com", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customers_cancel_their_own_orders_and_stock_returns() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let (_, other_token) = app
        .create_user("other@example.com", jewelry_store::entities::user::Role::Customer)
        .await;
    let ring = app.create_product("Pave Ring", 1300.0, 3).await;

    let (_, body) = app
        .post(
            "/api/orders",
            Some(&token),
            json!({
                "customer": customer_info("customer@example.com"),
                "items": [{ "product_id": ring.id, "quantity": 2 }]
            }),
        )
        .await;
    let number = body["order"]["order_number"].as_str().expect("number").to_owned();
    assert_eq!(stock_of(&app, ring.id).await, 1);

    let (status, _) = app
        .post(&format!("/api/user/orders/{number}/cancel"), Some(&other_token), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(&format!("/api/user/orders/{number}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_status"], "cancelled");
    assert_eq!(stock_of(&app, ring.id).await, 3);

    let (status, _) = app
        .post(&format!("/api/user/orders/{number}/cancel"), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&app, ring.id).await, 3);
}

#[tokio::test]
async fn paypal_endpoints_need_configuration() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/api/paypal/create-order",
            None,
            json!({ "order_number": "ORD-1-ABCDEF" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn webhook_without_id_is_unavailable() {
    let app = spawn_app().await.with_paypal();

    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/paypal/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in [
        ("paypal-auth-algo", "SHA256withRSA"),
        ("paypal-cert-url", "https://api.paypal.com/cert"),
        ("paypal-transmission-id", "abc"),
        ("paypal-transmission-sig", "sig"),
        ("paypal-transmission-time", "2024-01-01T00:00:00Z"),
    ] {
        request = request.header(name, value);
    }
    let request = request
        .body(Body::from(json!({ "event_type": "PAYMENT.CAPTURE.COMPLETED" }).to_string()))
        .expect("build request");

    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn cancelled_orders_cannot_be_paid() {
    let app = spawn_app().await.with_paypal();
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Marquise Ring", 1800.0, 3).await;

    let (_, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [{ "product_id": ring.id, "quantity": 1 }]
            }),
        )
        .await;
    let number = body["order"]["order_number"].as_str().expect("number").to_owned();
    let uri = format!("/api/admin/orders/{}", body["order"]["id"]);

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "order_status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "payment_status": "paid" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/paypal/capture-order",
            None,
            json!({ "order_number": number }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let completed = json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": { "id": "CAPTURE-9", "custom_id": number }
    });
    let db = &*app.state.db;
    assert_eq!(
        apply_webhook_event(db, &completed).await.expect("apply"),
        WebhookOutcome::Rejected
    );

    let stored = order::Entity::find()
        .all(db)
        .await
        .expect("query")
        .pop()
        .expect("order");
    assert_eq!(stored.order_status, order::OrderStatus::Cancelled);
    assert_eq!(stored.payment_status, order::PaymentStatus::Pending);
    assert_eq!(stock_of(&app, ring.id).await, 3);
}

#[tokio::test]
async fn webhook_events_apply_once() {
    let app = spawn_app().await;
    let ring = app.create_product("Cluster Ring", 750.0, 2).await;

    let (_, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("guest@example.com"),
                "items": [{ "product_id": ring.id, "quantity": 1 }]
            }),
        )
        .await;
    let number = body["order"]["order_number"].as_str().expect("number").to_owned();

    let completed = json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": { "id": "CAPTURE-1", "custom_id": number }
    });

    let db = &*app.state.db;
    let first = apply_webhook_event(db, &completed).await.expect("apply");
    assert_eq!(first, WebhookOutcome::Applied);
    let second = apply_webhook_event(db, &completed).await.expect("apply");
    assert_eq!(second, WebhookOutcome::Applied);

    let stored = order::Entity::find()
        .all(db)
        .await
        .expect("query")
        .pop()
        .expect("order");
    assert_eq!(stored.payment_status, order::PaymentStatus::Paid);
    assert_eq!(stored.order_status, order::OrderStatus::Confirmed);
    assert_eq!(stored.paypal_capture_id.as_deref(), Some("CAPTURE-1"));

    // A denial arriving after the capture does not fit the order any more.
    let denied = json!({
        "event_type": "PAYMENT.CAPTURE.DENIED",
        "resource": { "invoice_id": number }
    });
    assert_eq!(
        apply_webhook_event(db, &denied).await.expect("apply"),
        WebhookOutcome::Rejected
    );

    let unknown = json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": { "custom_id": "ORD-0-NOPE00" }
    });
    assert_eq!(
        apply_webhook_event(db, &unknown).await.expect("apply"),
        WebhookOutcome::UnknownOrder
    );

    let other = json!({ "event_type": "CHECKOUT.ORDER.APPROVED", "resource": {} });
    assert_eq!(
        apply_webhook_event(db, &other).await.expect("apply"),
        WebhookOutcome::Ignored
    );
}
