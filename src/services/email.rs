//! Transactional email over SMTP.
//!
//! Messages are plain text with an HTML alternative. Sending never blocks a request:
//! handlers call [`spawn_send`] after their transaction has committed.

use lettre::{
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SmtpConfig;
use crate::entities::{order, order_item};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// A rendered message, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    pub async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html.clone()),
                    ),
            )?;

        self.mailer.send(message).await?;

        info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Sends in the background. Without a configured mailer the message is only logged.
pub fn spawn_send(mailer: Option<&EmailService>, email: Email) {
    match mailer {
        Some(mailer) => {
            let mailer = mailer.clone();
            tokio::spawn(async move {
                if let Err(err) = mailer.send(&email).await {
                    warn!(to = %email.to, subject = %email.subject, error = %err, "Failed to send email");
                }
            });
        }
        None => info!(to = %email.to, subject = %email.subject, "SMTP not configured, skipping email"),
    }
}

fn item_lines(items: &[order_item::Model]) -> String {
    let mut lines = String::new();
    for item in items {
        let mut variant = Vec::new();
        if let Some(size) = &item.size {
            variant.push(format!("size {size}"));
        }
        if let Some(color) = &item.color {
            variant.push(color.clone());
        }
        let variant = if variant.is_empty() {
            String::new()
        } else {
            format!(" ({})", variant.join(", "))
        };
        let _ = writeln!(
            lines,
            "  {} x {}{} @ ${:.2}",
            item.quantity, item.product_name, variant, item.price
        );
    }
    lines
}

fn customer_name(order: &order::Model) -> String {
    order
        .customer_info
        .get("first_name")
        .and_then(|name| name.as_str())
        .unwrap_or("there")
        .to_owned()
}

fn html_from_text(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<html><body><pre style=\"font-family: Georgia, serif\">{escaped}</pre></body></html>")
}

pub fn order_confirmation(order: &order::Model, items: &[order_item::Model]) -> Email {
    let text = format!(
        "Dear {name},\n\n\
         Thank you for your order. We have received order {number} and will let you know \
         as soon as it ships.\n\n\
         {items}\n\
         Subtotal: ${subtotal:.2}\n\
         Shipping: ${shipping:.2}\n\
         Total:    ${total:.2}\n\n\
         You can follow your order any time with your order number and this email address.\n",
        name = customer_name(order),
        number = order.order_number,
        items = item_lines(items),
        subtotal = order.subtotal,
        shipping = order.shipping_cost,
        total = order.total,
    );

    Email {
        to: order.customer_email.clone(),
        subject: format!("Order confirmation {}", order.order_number),
        html: html_from_text(&text),
        text,
    }
}

pub fn admin_new_order(
    admin_email: &str,
    order: &order::Model,
    items: &[order_item::Model],
) -> Email {
    let text = format!(
        "New order {number} from {email}.\n\n{items}\nTotal: ${total:.2}\nPayment method: {method}\n",
        number = order.order_number,
        email = order.customer_email,
        items = item_lines(items),
        total = order.total,
        method = order.payment_method,
    );

    Email {
        to: admin_email.to_owned(),
        subject: format!("New order {}", order.order_number),
        html: html_from_text(&text),
        text,
    }
}

pub fn shipping_update(order: &order::Model) -> Email {
    let tracking = order
        .tracking_number
        .as_deref()
        .map(|number| format!("Tracking number: {number}\n"))
        .unwrap_or_default();
    let text = format!(
        "Dear {name},\n\nYour order {number} is on its way.\n{tracking}",
        name = customer_name(order),
        number = order.order_number,
    );

    Email {
        to: order.customer_email.clone(),
        subject: format!("Your order {} has shipped", order.order_number),
        html: html_from_text(&text),
        text,
    }
}

pub fn delivery_update(order: &order::Model) -> Email {
    let text = format!(
        "Dear {name},\n\nYour order {number} has been delivered. We hope you love it.\n",
        name = customer_name(order),
        number = order.order_number,
    );

    Email {
        to: order.customer_email.clone(),
        subject: format!("Your order {} has been delivered", order.order_number),
        html: html_from_text(&text),
        text,
    }
}
