#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::{json, Value};
use tower::ServiceExt;

use jewelry_store::{
    build_app,
    config::{Config, PayPalConfig},
    entities::{
        product, setup_schema,
        user::{self, hash_password, Role},
    },
    middleware::auth::generate_token,
    services::paypal::PayPalClient,
    state::AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Fresh in-memory database per test. A single pooled connection keeps every query on the
/// same SQLite memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config::for_database("sqlite::memory:", JWT_SECRET);
    configure(&mut config);

    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect sqlite");
    setup_schema(&db).await.expect("create schema");

    let state = AppState::new(db, config);
    TestApp {
        router: build_app(state.clone()),
        state,
    }
}

impl TestApp {
    /// Same database with a PayPal client that has no webhook id. Nothing here reaches
    /// the network unless a test calls past the local checks.
    pub fn with_paypal(self) -> TestApp {
        let state = self.state.with_paypal(PayPalClient::new(PayPalConfig {
            client_id: "test-client".to_owned(),
            client_secret: "test-secret".to_owned(),
            api_base: "http://127.0.0.1:9".to_owned(),
            webhook_id: None,
            currency: "USD".to_owned(),
        }));
        TestApp {
            router: build_app(state.clone()),
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Inserts an account directly and returns it with a bearer token.
    pub async fn create_user(&self, email: &str, role: Role) -> (user::Model, String) {
        let user = user::ActiveModel {
            email: Set(email.to_owned()),
            password: Set(hash_password(PASSWORD).expect("hash")),
            first_name: Set(Some("Test".to_owned())),
            last_name: Set(Some("User".to_owned())),
            role: Set(role),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("insert user");

        let token = generate_token(user.id, role, JWT_SECRET, 1).expect("token");
        (user, token)
    }

    pub async fn customer(&self) -> (user::Model, String) {
        self.create_user("customer@example.com", Role::Customer).await
    }

    pub async fn admin(&self) -> (user::Model, String) {
        self.create_user("admin@example.com", Role::Admin).await
    }

    pub async fn create_product(&self, name: &str, price: f64, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            name: Set(name.to_owned()),
            description: Set(format!("{name} in 18k gold")),
            price: Set(price),
            images: Set(json!([format!("/uploads/{}.jpg", name.to_lowercase().replace(' ', "-"))])),
            category: Set("rings".to_owned()),
            stock: Set(stock),
            specifications: Set(json!({ "metal": "gold" })),
            is_featured: Set(false),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("insert product")
    }
}

pub fn customer_info(email: &str) -> Value {
    json!({
        "email": email,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "phone": "+1 555 0100",
        "address": {
            "line1": "1 Jewel Street",
            "city": "New York",
            "state": "NY",
            "postal_code": "10001",
            "country": "US"
        }
    })
}
