mod common;

use axum::http::StatusCode;
use jewelry_store::entities::user::Role;
use serde_json::{json, Value};

use common::{customer_info, spawn_app, TestApp};

async fn place_guest_order(app: &TestApp, product_id: i32, quantity: i32) -> Value {
    let (status, body) = app
        .post(
            "/api/orders",
            None,
            json!({
                "customer": customer_info("buyer@example.com"),
                "items": [{ "product_id": product_id, "quantity": quantity }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["order"].clone()
}

#[tokio::test]
async fn fulfillment_moves_forward_and_stamps_timestamps() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Princess Ring", 2500.0, 3).await;
    let order = place_guest_order(&app, ring.id, 1).await;
    let uri = format!("/api/admin/orders/{}", order["id"]);

    let (status, body) = app
        .patch(&uri, Some(&admin), json!({ "payment_status": "paid" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_status"], "confirmed");

    let (status, body) = app
        .patch(
            &uri,
            Some(&admin),
            json!({ "fulfillment_status": "shipped", "tracking_number": "1Z999" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["fulfillment_status"], "shipped");
    assert_eq!(body["order"]["tracking_number"], "1Z999");
    assert!(body["order"]["shipped_at"].is_string());
    assert!(body["order"]["delivered_at"].is_null());

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "fulfillment_status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "order_status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .patch(&uri, Some(&admin), json!({ "fulfillment_status": "delivered" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["fulfillment_status"], "delivered");
    assert_eq!(body["order"]["order_status"], "completed");
    assert!(body["order"]["delivered_at"].is_string());
}

#[tokio::test]
async fn delivering_directly_stamps_both_timestamps() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Baguette Ring", 1900.0, 3).await;
    let order = place_guest_order(&app, ring.id, 1).await;
    let uri = format!("/api/admin/orders/{}", order["id"]);

    let (status, body) = app
        .patch(
            &uri,
            Some(&admin),
            json!({ "order_status": "confirmed", "fulfillment_status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["order"]["shipped_at"].is_string());
    assert!(body["order"]["delivered_at"].is_string());
    assert_eq!(body["order"]["order_status"], "completed");
}

#[tokio::test]
async fn admin_cancel_restores_stock_and_blocks_fulfillment() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Three Stone Ring", 3100.0, 4).await;
    let order = place_guest_order(&app, ring.id, 3).await;
    let uri = format!("/api/admin/orders/{}", order["id"]);

    let (status, body) = app
        .patch(&uri, Some(&admin), json!({ "order_status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["order_status"], "cancelled");

    let (_, product) = app
        .get(&format!("/api/admin/products/{}", ring.id), Some(&admin))
        .await;
    assert_eq!(product["product"]["stock"], 4);

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "fulfillment_status": "processing" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .patch(&uri, Some(&admin), json!({ "order_status": "confirmed" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_status_values_are_rejected() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Bypass Ring", 990.0, 2).await;
    let order = place_guest_order(&app, ring.id, 1).await;

    let (status, _) = app
        .patch(
            &format!("/api/admin/orders/{}", order["id"]),
            Some(&admin),
            json!({ "fulfillment_status": "teleported" }),
        )
        .await;
    assert!(status.is_client_error());

    let (status, _) = app
        .patch("/api/admin/orders/9999", Some(&admin), json!({ "order_status": "confirmed" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_list_filters_and_search() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    let ring = app.create_product("Toi et Moi Ring", 1600.0, 10).await;
    let first = place_guest_order(&app, ring.id, 1).await;
    place_guest_order(&app, ring.id, 1).await;

    app.patch(
        &format!("/api/admin/orders/{}", first["id"]),
        Some(&admin),
        json!({ "payment_status": "paid" }),
    )
    .await;

    let (status, body) = app.get("/api/admin/orders", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = app
        .get("/api/admin/orders?payment_status=paid", Some(&admin))
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["orders"][0]["id"], first["id"]);

    let number = first["order_number"].as_str().expect("number");
    let (_, body) = app
        .get(&format!("/api/admin/orders?search={number}"), Some(&admin))
        .await;
    assert_eq!(body["total"], 1);

    let (_, body) = app
        .get(&format!("/api/admin/orders/{}", first["id"]), Some(&admin))
        .await;
    assert_eq!(body["order"]["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn stats_summarise_the_store() {
    let app = spawn_app().await;
    let (_, admin) = app.admin().await;
    app.customer().await;
    let ring = app.create_product("Solitaire", 1000.0, 6).await;
    app.create_product("Low Stock Locket", 200.0, 2).await;

    let paid = place_guest_order(&app, ring.id, 1).await;
    place_guest_order(&app, ring.id, 1).await;
    app.patch(
        &format!("/api/admin/orders/{}", paid["id"]),
        Some(&admin),
        json!({ "payment_status": "paid" }),
    )
    .await;

    let (status, body) = app.get("/api/admin/stats", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["stats"];
    assert_eq!(stats["products"], 2);
    assert_eq!(stats["orders"], 2);
    assert_eq!(stats["customers"], 1);
    assert_eq!(stats["revenue"], 1000.0);
    assert_eq!(stats["pending_fulfillment"], 2);
    // Solitaire is at 4 after two orders; both are at or below the threshold of 5.
    assert_eq!(stats["low_stock"].as_array().map(Vec::len), Some(2));
    assert_eq!(stats["low_stock"][0]["name"], "Low Stock Locket");
}

#[tokio::test]
async fn user_management() {
    let app = spawn_app().await;
    let (admin_user, admin) = app.admin().await;
    let (customer, _) = app.customer().await;
    app.create_user("jeweller@example.com", Role::Customer).await;

    let (status, body) = app.get("/api/admin/users?role=customer", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (_, body) = app.get("/api/admin/users?search=jeweller", Some(&admin)).await;
    assert_eq!(body["total"], 1);
    assert!(body["users"][0].get("password").is_none());

    let (status, body) = app
        .patch(
            &format!("/api/admin/users/{}", customer.id),
            Some(&admin),
            json!({ "role": "admin", "last_name": "Promoted" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["last_name"], "Promoted");

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", admin_user.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", customer.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", customer.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
