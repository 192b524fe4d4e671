use std::{env, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub cookie_secure: bool,
    pub frontend_url: Option<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub free_shipping_threshold: f64,
    pub flat_shipping_rate: f64,
    pub low_stock_threshold: i32,
    pub admin_email: Option<String>,
    pub smtp: Option<SmtpConfig>,
    pub paypal: Option<PayPalConfig>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Clone, Debug)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
    pub webhook_id: Option<String>,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Config {
    /// Reads the configuration from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let smtp = match optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from_address: required("EMAIL_FROM")?,
            }),
            None => None,
        };

        let paypal = match (optional("PAYPAL_CLIENT_ID"), optional("PAYPAL_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(PayPalConfig {
                client_id,
                client_secret,
                api_base: optional("PAYPAL_API_BASE")
                    .unwrap_or_else(|| "https://api-m.sandbox.paypal.com".to_owned()),
                webhook_id: optional("PAYPAL_WEBHOOK_ID"),
                currency: optional("PAYPAL_CURRENCY").unwrap_or_else(|| "USD".to_owned()),
            }),
            _ => None,
        };

        let bootstrap_admin = match (
            optional("ADMIN_BOOTSTRAP_EMAIL"),
            optional("ADMIN_BOOTSTRAP_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_owned()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_hours: parse_or("JWT_EXPIRATION_HOURS", 24)?,
            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            frontend_url: optional("FRONTEND_URL"),
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            free_shipping_threshold: parse_or("FREE_SHIPPING_THRESHOLD", 500.0)?,
            flat_shipping_rate: parse_or("FLAT_SHIPPING_RATE", 25.0)?,
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 5)?,
            admin_email: optional("ADMIN_EMAIL"),
            smtp,
            paypal,
            bootstrap_admin,
        })
    }

    /// Configuration for running against a throwaway database, with every integration off.
    pub fn for_database(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: "127.0.0.1:0".to_owned(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration_hours: 24,
            cookie_secure: false,
            frontend_url: None,
            upload_dir: env::temp_dir().join("jewelry-store-uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
            free_shipping_threshold: 500.0,
            flat_shipping_rate: 25.0,
            low_stock_threshold: 5,
            admin_email: None,
            smtp: None,
            paypal: None,
            bootstrap_admin: None,
        }
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
