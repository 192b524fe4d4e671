use axum::{
    extract::Extension,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::entities::order::{self, PaymentStatus};
use crate::error::{ApiError, ApiResult};
use crate::services::{
    orders::{self, StatusChange},
    paypal::{PayPalClient, WebhookHeaders},
};
use crate::state::AppState;

pub fn paypal_router() -> Router {
    Router::new()
        .route("/paypal/create-order", post(create_paypal_order))
        .route("/paypal/capture-order", post(capture_paypal_order))
        .route("/paypal/webhook", post(webhook))
}

fn client(state: &AppState) -> ApiResult<&PayPalClient> {
    state
        .paypal
        .as_ref()
        .ok_or(ApiError::ServiceUnavailable("PayPal"))
}

async fn find_order<C: ConnectionTrait>(db: &C, order_number: &str) -> ApiResult<order::Model> {
    order::Entity::find()
        .filter(order::Column::OrderNumber.eq(order_number))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_number} not found")))
}

async fn create_paypal_order(
    Extension(state): Extension<AppState>,
    Json(payload): Json<OrderReference>,
) -> ApiResult<Json<Value>> {
    let paypal = client(&state)?;

    let current = find_order(&*state.db, &payload.order_number).await?;
    if current.payment_status == PaymentStatus::Paid {
        return Err(ApiError::BadRequest("Order is already paid".into()));
    }
    if current.order_status == order::OrderStatus::Cancelled {
        return Err(ApiError::BadRequest("Order has been cancelled".into()));
    }

    let created = paypal
        .create_order(&current.order_number, current.total)
        .await?;

    let txn = state.db.begin().await?;
    let mut active: order::ActiveModel = current.into();
    active.paypal_order_id = Set(Some(created.id.clone()));
    active.updated_at = Set(Utc::now());
    active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "id": created.id,
        "status": created.status,
    })))
}

async fn capture_paypal_order(
    Extension(state): Extension<AppState>,
    Json(payload): Json<OrderReference>,
) -> ApiResult<Json<Value>> {
    let paypal = client(&state)?;

    let current = find_order(&*state.db, &payload.order_number).await?;
    if current.order_status == order::OrderStatus::Cancelled {
        return Err(ApiError::BadRequest("Order has been cancelled".into()));
    }
    if current.payment_status == PaymentStatus::Paid {
        return Ok(Json(json!({
            "success": true,
            "order": orders::with_items(&*state.db, current).await?,
        })));
    }
    let paypal_order_id = current
        .paypal_order_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("No PayPal order has been created yet".into()))?;

    let captured = paypal.capture_order(&paypal_order_id).await?;
    let capture_status = captured.capture_status().to_owned();
    let Some(payment) = payment_for_capture(&capture_status) else {
        info!(
            order_number = %current.order_number,
            capture_status = %capture_status,
            "PayPal capture not settled yet, waiting for webhook"
        );
        return Ok(Json(json!({
            "success": true,
            "capture_status": capture_status,
            "order": orders::with_items(&*state.db, current).await?,
        })));
    };

    let txn = state.db.begin().await?;
    let current = find_order(&txn, &payload.order_number).await?;
    let updated = record_payment(&txn, current, payment, captured.capture_id()).await?;
    let order = orders::with_items(&txn, updated).await?;
    txn.commit().await?;

    if payment != PaymentStatus::Paid {
        return Err(ApiError::BadRequest(format!(
            "Payment was not completed (PayPal status {capture_status})"
        )));
    }

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

/// `None` while PayPal is still settling the capture.
fn payment_for_capture(status: &str) -> Option<PaymentStatus> {
    match status {
        "COMPLETED" => Some(PaymentStatus::Paid),
        "DECLINED" | "FAILED" => Some(PaymentStatus::Failed),
        _ => None,
    }
}

/// Moves the order's payment status, storing the capture id when there is one.
pub async fn record_payment<C: ConnectionTrait>(
    db: &C,
    current: order::Model,
    payment: PaymentStatus,
    capture_id: Option<&str>,
) -> ApiResult<order::Model> {
    let change = StatusChange {
        payment_status: Some(payment),
        ..Default::default()
    };
    let transition = orders::plan_transition(&current, change, Utc::now())?;
    let capture_known =
        capture_id.map_or(true, |id| current.paypal_capture_id.as_deref() == Some(id));
    if transition.is_noop(&current) && capture_known {
        return Ok(current);
    }

    let updated = orders::apply_transition(db, current, &transition, None).await?;
    match capture_id {
        Some(capture_id) if updated.paypal_capture_id.as_deref() != Some(capture_id) => {
            let mut active: order::ActiveModel = updated.into();
            active.paypal_capture_id = Set(Some(capture_id.to_owned()));
            Ok(active.update(db).await?)
        }
        _ => Ok(updated),
    }
}

fn webhook_headers(headers: &HeaderMap) -> Option<WebhookHeaders> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    Some(WebhookHeaders {
        auth_algo: get("paypal-auth-algo")?,
        cert_url: get("paypal-cert-url")?,
        transmission_id: get("paypal-transmission-id")?,
        transmission_sig: get("paypal-transmission-sig")?,
        transmission_time: get("paypal-transmission-time")?,
    })
}

async fn webhook(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(event): Json<Value>,
) -> ApiResult<Json<Value>> {
    let paypal = client(&state)?;

    let transmission = webhook_headers(&headers)
        .ok_or_else(|| ApiError::BadRequest("Missing PayPal transmission headers".into()))?;
    if !paypal.verify_webhook(&transmission, &event).await? {
        warn!(transmission_id = %transmission.transmission_id, "Rejected PayPal webhook with bad signature");
        return Err(ApiError::Unauthorized);
    }

    let txn = state.db.begin().await?;
    let outcome = apply_webhook_event(&txn, &event).await?;
    txn.commit().await?;

    Ok(Json(json!({
        "success": true,
        "outcome": outcome,
    })))
}

/// What a webhook delivery did, echoed back for PayPal's delivery log.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    Ignored,
    UnknownOrder,
    Rejected,
}

/// Applies a verified PayPal event. Redelivery of an already-applied event is harmless, and
/// an event that does not fit the order's state is acknowledged without change so PayPal
/// stops retrying.
pub async fn apply_webhook_event<C: ConnectionTrait>(
    db: &C,
    event: &Value,
) -> ApiResult<WebhookOutcome> {
    let event_type = event
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let payment = match event_type {
        "PAYMENT.CAPTURE.COMPLETED" => PaymentStatus::Paid,
        "PAYMENT.CAPTURE.DENIED" => PaymentStatus::Failed,
        "PAYMENT.CAPTURE.REFUNDED" => PaymentStatus::Refunded,
        _ => {
            info!(event_type, "Ignoring PayPal webhook event");
            return Ok(WebhookOutcome::Ignored);
        }
    };

    let resource = event.get("resource").cloned().unwrap_or(Value::Null);
    let Some(current) = locate_order(db, &resource).await? else {
        warn!(event_type, "PayPal webhook for unknown order");
        return Ok(WebhookOutcome::UnknownOrder);
    };

    let capture_id = match payment {
        PaymentStatus::Paid => resource.get("id").and_then(Value::as_str),
        _ => None,
    };

    let order_number = current.order_number.clone();
    match record_payment(db, current, payment, capture_id).await {
        Ok(_) => {
            info!(event_type, order_number = %order_number, "Applied PayPal webhook event");
            Ok(WebhookOutcome::Applied)
        }
        Err(ApiError::BadRequest(reason)) => {
            warn!(event_type, order_number = %order_number, reason = %reason, "PayPal webhook does not fit order state");
            Ok(WebhookOutcome::Rejected)
        }
        Err(err) => Err(err),
    }
}

/// Tries `custom_id`, then `invoice_id`, then the PayPal order id the capture belongs to.
async fn locate_order<C: ConnectionTrait>(
    db: &C,
    resource: &Value,
) -> ApiResult<Option<order::Model>> {
    for key in ["custom_id", "invoice_id"] {
        if let Some(number) = resource.get(key).and_then(Value::as_str) {
            if let Some(found) = order::Entity::find()
                .filter(order::Column::OrderNumber.eq(number))
                .one(db)
                .await?
            {
                return Ok(Some(found));
            }
        }
    }

    let paypal_order_id = resource
        .pointer("/supplementary_data/related_ids/order_id")
        .and_then(Value::as_str);
    match paypal_order_id {
        Some(id) => Ok(order::Entity::find()
            .filter(order::Column::PaypalOrderId.eq(id))
            .one(db)
            .await?),
        None => Ok(None),
    }
}

#[derive(Deserialize, Debug)]
struct OrderReference {
    order_number: String,
}
