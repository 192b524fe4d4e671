mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn wishlist_upserts_without_a_stock_bound() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let tiara = app.create_product("Sapphire Tiara", 9800.0, 1).await;

    let (status, body) = app
        .post(
            "/api/wishlist",
            Some(&token),
            json!({ "product_id": tiara.id, "quantity": 2, "color": "blue" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item"]["quantity"], 2);

    let (status, body) = app
        .post(
            "/api/wishlist",
            Some(&token),
            json!({ "product_id": tiara.id, "quantity": 3, "color": "blue" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["quantity"], 5);

    let (status, body) = app.get("/api/wishlist", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["product"]["name"], "Sapphire Tiara");
}

#[tokio::test]
async fn move_to_cart_merges_into_an_existing_line() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let ring = app.create_product("Emerald Ring", 2400.0, 10).await;

    app.post(
        "/api/cart",
        Some(&token),
        json!({ "product_id": ring.id, "quantity": 1, "size": "7" }),
    )
    .await;
    let (_, body) = app
        .post(
            "/api/wishlist",
            Some(&token),
            json!({ "product_id": ring.id, "quantity": 2, "size": "7" }),
        )
        .await;
    let wish_id = body["item"]["id"].as_i64().expect("wishlist id");

    let (status, body) = app
        .post(&format!("/api/wishlist/{wish_id}/move-to-cart"), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["quantity"], 3);

    let (_, cart) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["item_count"], 3);

    let (_, wishlist) = app.get("/api/wishlist", Some(&token)).await;
    assert_eq!(wishlist["count"], 0);
}

#[tokio::test]
async fn failed_move_keeps_the_wishlist_line() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let brooch = app.create_product("Vintage Brooch", 800.0, 1).await;

    let (_, body) = app
        .post(
            "/api/wishlist",
            Some(&token),
            json!({ "product_id": brooch.id, "quantity": 2 }),
        )
        .await;
    let wish_id = body["item"]["id"].as_i64().expect("wishlist id");

    let (status, _) = app
        .post(&format!("/api/wishlist/{wish_id}/move-to-cart"), Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, wishlist) = app.get("/api/wishlist", Some(&token)).await;
    assert_eq!(wishlist["count"], 1);
    let (_, cart) = app.get("/api/cart", Some(&token)).await;
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn removing_a_wishlist_line() {
    let app = spawn_app().await;
    let (_, token) = app.customer().await;
    let cuff = app.create_product("Silver Cuff", 350.0, 3).await;

    let (_, body) = app
        .post("/api/wishlist", Some(&token), json!({ "product_id": cuff.id }))
        .await;
    let wish_id = body["item"]["id"].as_i64().expect("wishlist id");

    let (status, _) = app
        .delete(&format!("/api/wishlist/{wish_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .delete(&format!("/api/wishlist/{wish_id}"), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
