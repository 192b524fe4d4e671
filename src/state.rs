use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::services::{email::EmailService, paypal::PayPalClient};

/// Shared handles every router gets through an `Extension` layer.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    pub mailer: Option<EmailService>,
    pub paypal: Option<PayPalClient>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            mailer: None,
            paypal: None,
        }
    }

    pub fn with_mailer(mut self, mailer: EmailService) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_paypal(mut self, paypal: PayPalClient) -> Self {
        self.paypal = Some(paypal);
        self
    }
}
