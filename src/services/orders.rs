//! Checkout and order lifecycle rules.
//!
//! Handlers own the transaction; everything here runs on the connection they pass in so a
//! checkout (stock decrement, order row, item rows, cart clear) commits or fails as a unit.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::entities::{
    order::{self, FulfillmentStatus, OrderStatus, PaymentStatus},
    order_item, product,
};
use crate::error::{ApiError, ApiResult};

static PHONE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{6,20}$").expect("valid phone regex"));

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(min = 2, max = 12))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerInfo {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(regex(path = *PHONE_REGEX))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Address,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LineRequest {
    pub product_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<i32>,
    pub customer: CustomerInfo,
    pub lines: Vec<LineRequest>,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ShippingRates {
    pub free_threshold: f64,
    pub flat_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// `ORD-<unix millis>-<6 upper-case alphanumerics>`.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn shipping_cost(subtotal: f64, rates: ShippingRates) -> f64 {
    if subtotal >= rates.free_threshold {
        0.0
    } else {
        rates.flat_rate
    }
}

/// Normalises an optional variant attribute: blank means "not chosen".
pub fn normalize_variant(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Validates stock, decrements it, snapshots prices and writes the order with its items.
pub async fn place_order<C: ConnectionTrait>(
    db: &C,
    new_order: NewOrder,
    rates: ShippingRates,
) -> ApiResult<OrderWithItems> {
    if new_order.lines.is_empty() {
        return Err(ApiError::BadRequest("Order must contain at least one item".into()));
    }
    new_order.customer.validate()?;
    for line in &new_order.lines {
        line.validate()?;
    }

    let mut requested: BTreeMap<i32, i32> = BTreeMap::new();
    for line in &new_order.lines {
        *requested.entry(line.product_id).or_default() += line.quantity;
    }

    let mut products = BTreeMap::new();
    for (&product_id, &quantity) in &requested {
        let product = product::Entity::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("No product with {product_id} id was found"))
            })?;

        // Guarded decrement so two concurrent checkouts cannot oversell.
        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ApiError::BadRequest(format!(
                "Insufficient stock for {} ({} available)",
                product.name, product.stock
            )));
        }
        products.insert(product_id, product);
    }

    let subtotal = round_cents(
        new_order
            .lines
            .iter()
            .filter_map(|line| {
                products
                    .get(&line.product_id)
                    .map(|product| product.price * f64::from(line.quantity))
            })
            .sum(),
    );
    let shipping = shipping_cost(subtotal, rates);
    let now = Utc::now();

    let customer_email = new_order.customer.email.trim().to_lowercase();
    let customer_info = serde_json::to_value(&new_order.customer)
        .map_err(|err| ApiError::General(err.to_string()))?;

    let order = order::ActiveModel {
        order_number: Set(generate_order_number()),
        user_id: Set(new_order.user_id),
        customer_email: Set(customer_email),
        customer_info: Set(customer_info),
        subtotal: Set(subtotal),
        shipping_cost: Set(shipping),
        total: Set(round_cents(subtotal + shipping)),
        order_status: Set(OrderStatus::Pending),
        fulfillment_status: Set(FulfillmentStatus::Unfulfilled),
        payment_status: Set(PaymentStatus::Pending),
        payment_method: Set(new_order.payment_method),
        paypal_order_id: Set(None),
        paypal_capture_id: Set(None),
        tracking_number: Set(None),
        notes: Set(new_order.notes),
        created_at: Set(now),
        updated_at: Set(now),
        shipped_at: Set(None),
        delivered_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut items = Vec::with_capacity(new_order.lines.len());
    for line in new_order.lines {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        let item = order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(Some(product.id)),
            product_name: Set(product.name.clone()),
            product_image: Set(product.cover_image()),
            price: Set(product.price),
            quantity: Set(line.quantity),
            size: Set(normalize_variant(line.size)),
            color: Set(normalize_variant(line.color)),
            ..Default::default()
        }
        .insert(db)
        .await?;
        items.push(item);
    }

    Ok(OrderWithItems { order, items })
}

pub async fn load_items<C: ConnectionTrait>(
    db: &C,
    order_id: i32,
) -> ApiResult<Vec<order_item::Model>> {
    Ok(order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?)
}

pub async fn with_items<C: ConnectionTrait>(
    db: &C,
    order: order::Model,
) -> ApiResult<OrderWithItems> {
    let items = load_items(db, order.id).await?;
    Ok(OrderWithItems { order, items })
}

/// Puts the quantities of a cancelled order back on the shelf.
pub async fn restock<C: ConnectionTrait>(db: &C, items: &[order_item::Model]) -> ApiResult<()> {
    for item in items {
        let Some(product_id) = item.product_id else {
            continue;
        };
        product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).add(item.quantity),
            )
            .filter(product::Column::Id.eq(product_id))
            .exec(db)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusChange {
    pub order_status: Option<OrderStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// The outcome of applying a [`StatusChange`] to an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub order_status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_status: PaymentStatus,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// The order was cancelled by this change and its stock must be returned.
    pub restock: bool,
    pub shipped_now: bool,
    pub delivered_now: bool,
}

impl Transition {
    pub fn is_noop(&self, current: &order::Model) -> bool {
        self.order_status == current.order_status
            && self.fulfillment_status == current.fulfillment_status
            && self.payment_status == current.payment_status
    }
}

impl OrderStatus {
    pub fn can_become(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Confirmed)
                    | (Pending, Cancelled)
                    | (Confirmed, Completed)
                    | (Confirmed, Cancelled)
            )
    }
}

impl FulfillmentStatus {
    fn rank(self) -> u8 {
        match self {
            FulfillmentStatus::Unfulfilled => 0,
            FulfillmentStatus::Processing => 1,
            FulfillmentStatus::Shipped => 2,
            FulfillmentStatus::Delivered => 3,
        }
    }

    /// Forward-only; skipping steps is fine.
    pub fn can_become(self, next: FulfillmentStatus) -> bool {
        next.rank() >= self.rank()
    }

    pub fn has_shipped(self) -> bool {
        self.rank() >= FulfillmentStatus::Shipped.rank()
    }
}

impl PaymentStatus {
    pub fn can_become(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        self == next
            || matches!(
                (self, next),
                (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Paid, Refunded)
            )
    }
}

/// Works out the new statuses and timestamps, or why the change is not allowed.
pub fn plan_transition(
    current: &order::Model,
    change: StatusChange,
    now: DateTime<Utc>,
) -> ApiResult<Transition> {
    let mut next = Transition {
        order_status: current.order_status,
        fulfillment_status: current.fulfillment_status,
        payment_status: current.payment_status,
        shipped_at: current.shipped_at,
        delivered_at: current.delivered_at,
        restock: false,
        shipped_now: false,
        delivered_now: false,
    };

    if let Some(payment) = change.payment_status {
        if !next.payment_status.can_become(payment) {
            return Err(invalid("payment status", next.payment_status, payment));
        }
        // A cancelled order has given its stock back.
        if payment == PaymentStatus::Paid
            && payment != next.payment_status
            && next.order_status == OrderStatus::Cancelled
        {
            return Err(ApiError::BadRequest("Cancelled orders cannot be paid".into()));
        }
        if payment == PaymentStatus::Paid && next.order_status == OrderStatus::Pending {
            next.order_status = OrderStatus::Confirmed;
        }
        next.payment_status = payment;
    }

    if let Some(status) = change.order_status {
        if status != next.order_status {
            if !next.order_status.can_become(status) {
                return Err(invalid("order status", next.order_status, status));
            }
            if status == OrderStatus::Cancelled {
                if next.fulfillment_status.has_shipped() {
                    return Err(ApiError::BadRequest(
                        "Order has already shipped and can no longer be cancelled".into(),
                    ));
                }
                next.restock = true;
            }
            next.order_status = status;
        }
    }

    if let Some(fulfillment) = change.fulfillment_status {
        if fulfillment != next.fulfillment_status {
            if next.order_status == OrderStatus::Cancelled {
                return Err(ApiError::BadRequest(
                    "Cancelled orders cannot be fulfilled".into(),
                ));
            }
            if !next.fulfillment_status.can_become(fulfillment) {
                return Err(invalid("fulfillment status", next.fulfillment_status, fulfillment));
            }
            if fulfillment.has_shipped() && next.shipped_at.is_none() {
                next.shipped_at = Some(now);
                next.shipped_now = fulfillment == FulfillmentStatus::Shipped;
            }
            if fulfillment == FulfillmentStatus::Delivered {
                next.delivered_at = Some(now);
                next.delivered_now = true;
                if next.order_status == OrderStatus::Confirmed {
                    next.order_status = OrderStatus::Completed;
                }
            }
            next.fulfillment_status = fulfillment;
        }
    }

    Ok(next)
}

fn invalid(what: &str, from: impl std::fmt::Display, to: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("Cannot change {what} from {from} to {to}"))
}

/// Writes a planned transition and returns the stored order. Stock is returned when the
/// transition cancels the order.
pub async fn apply_transition<C: ConnectionTrait>(
    db: &C,
    current: order::Model,
    transition: &Transition,
    tracking_number: Option<String>,
) -> ApiResult<order::Model> {
    if transition.restock {
        let items = load_items(db, current.id).await?;
        restock(db, &items).await?;
    }

    let mut active: order::ActiveModel = current.into();
    active.order_status = Set(transition.order_status);
    active.fulfillment_status = Set(transition.fulfillment_status);
    active.payment_status = Set(transition.payment_status);
    active.shipped_at = Set(transition.shipped_at);
    active.delivered_at = Set(transition.delivered_at);
    if let Some(tracking_number) = tracking_number {
        active.tracking_number = Set(Some(tracking_number));
    }
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}
