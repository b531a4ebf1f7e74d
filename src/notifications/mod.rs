//! Best-effort email notifications. Nothing in here may fail an order: callers
//! go through [`notify_best_effort`], which logs and counts failures.

use crate::{config::NotificationConfig, errors::ServiceError};
use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// A plain-text email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Line summary used in order confirmation emails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummaryLine {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmappedSkuAlert {
    pub sku: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i32,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError>;
}

/// Sends through the SendGrid v3 mail API
pub struct SendGridNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from_email: String,
}

impl SendGridNotifier {
    pub fn new(config: &NotificationConfig, api_key: String) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v3/mail/send",
                config.sendgrid_base_url.trim_end_matches('/')
            ),
            api_key,
            from_email: config.from_email.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        let to: Vec<_> = message.to.iter().map(|email| json!({ "email": email })).collect();
        let body = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.from_email },
            "subject": message.subject,
            "content": [{ "type": "text/plain", "value": message.body }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("sendgrid: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::ExternalServiceError(format!(
                "sendgrid returned {}",
                response.status()
            )))
        }
    }
}

/// Used when no email provider is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        info!(to = ?message.to, subject = %message.subject, "email notification (delivery disabled)");
        Ok(())
    }
}

/// Picks SendGrid when a key is configured.
pub fn notifier_from_config(
    config: &NotificationConfig,
) -> Result<std::sync::Arc<dyn Notifier>, ServiceError> {
    match config.sendgrid_api_key.as_ref().filter(|key| !key.is_empty()) {
        Some(key) => Ok(std::sync::Arc::new(SendGridNotifier::new(config, key.clone())?)),
        None => Ok(std::sync::Arc::new(LogNotifier)),
    }
}

/// Sends and swallows the error. Returns whether delivery succeeded.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: EmailMessage) -> bool {
    if message.to.is_empty() {
        return false;
    }
    let subject = message.subject.clone();
    match notifier.send(message).await {
        Ok(()) => true,
        Err(e) => {
            counter!("threepl_notifications_failed_total", 1);
            warn!(error = %e, subject = %subject, "notification failed");
            false
        }
    }
}

fn recipients(primary: Option<&str>, copy: Option<&str>) -> Vec<String> {
    let mut to: Vec<String> = Vec::new();
    for address in [primary, copy].into_iter().flatten() {
        if address.contains('@') && !to.iter().any(|existing| existing == address) {
            to.push(address.to_string());
        }
    }
    to
}

pub fn new_order_message(
    brand_email: Option<&str>,
    ops_email: Option<&str>,
    order_number: &str,
    recipient: Option<&str>,
    lines: &[OrderSummaryLine],
) -> EmailMessage {
    let mut body = format!(
        "Order {} has been received and queued for fulfillment.\n",
        order_number
    );
    if let Some(name) = recipient {
        body.push_str(&format!("Ship to: {}\n", name));
    }
    body.push('\n');
    for line in lines {
        body.push_str(&format!(
            "- {} x{} ({}) @ {}\n",
            line.name.as_deref().unwrap_or("item"),
            line.quantity,
            line.sku.as_deref().unwrap_or("no sku"),
            line.unit_price
        ));
    }

    EmailMessage {
        to: recipients(brand_email, ops_email),
        subject: format!("New order {}", order_number),
        body,
    }
}

pub fn tracking_message(
    brand_email: Option<&str>,
    order_number: &str,
    carrier: Option<&str>,
    tracking_number: Option<&str>,
) -> EmailMessage {
    EmailMessage {
        to: recipients(brand_email, None),
        subject: format!("Order {} has shipped", order_number),
        body: format!(
            "Order {} shipped via {}.\nTracking number: {}\n",
            order_number,
            carrier.unwrap_or("carrier pending"),
            tracking_number.unwrap_or("not yet available")
        ),
    }
}

pub fn unmapped_sku_message(
    ops_email: Option<&str>,
    order_number: &str,
    brand_name: Option<&str>,
    skus: &[UnmappedSkuAlert],
) -> EmailMessage {
    let mut body = format!(
        "Order {} ({}) contains SKUs without a product mapping. Inventory was not adjusted for:\n\n",
        order_number,
        brand_name.unwrap_or("no brand")
    );
    for sku in skus {
        body.push_str(&format!(
            "- {} \"{}\" x{}\n",
            sku.sku.as_deref().unwrap_or("<blank sku>"),
            sku.product_name.as_deref().unwrap_or(""),
            sku.quantity
        ));
    }

    EmailMessage {
        to: recipients(ops_email, None),
        subject: format!("Unmapped SKUs on order {}", order_number),
        body,
    }
}
