use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::stripe::StripeClient;
use crate::db::models::{Plan, SubscriptionStatus};
use crate::db::DbOperations;
use crate::error::{AppError, BillingError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Checks a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=...]`) against
/// the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), BillingError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature".into()));
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(BillingError::InvalidSignature("timestamp outside tolerance".into()));
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| BillingError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(BillingError::InvalidSignature("no matching signature".into()))
}

/// Builds a valid header for `payload`; used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, BillingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    client_reference_id: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    items: Option<SubscriptionItems>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Price,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    customer: Option<String>,
}

/// What a webhook did, for logging and the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied(&'static str),
    Ignored,
}

fn parse_object<T: for<'de> Deserialize<'de>>(event: &StripeEvent) -> Result<T, BillingError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| BillingError::InvalidPayload(format!("{}: {}", event.event_type, e)))
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

pub async fn apply_event(
    db: &DbOperations,
    stripe: &StripeClient,
    event: &StripeEvent,
) -> Result<WebhookOutcome, AppError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = parse_object(event)?;
            let restaurant_id = session
                .client_reference_id
                .as_deref()
                .or_else(|| session.metadata.get("restaurant_id").map(String::as_str))
                .and_then(|id| Uuid::parse_str(id).ok())
                .ok_or_else(|| BillingError::InvalidPayload("checkout without restaurant reference".into()))?;
            let subscription_id = session
                .subscription
                .as_deref()
                .ok_or_else(|| BillingError::InvalidPayload("checkout without subscription".into()))?;
            let plan = session
                .metadata
                .get("plan")
                .and_then(|p| Plan::parse(p))
                .unwrap_or(Plan::Pro);

            db.activate_subscription(restaurant_id, plan, session.customer.as_deref(), subscription_id)
                .await?;
            info!(%restaurant_id, plan = plan.as_str(), "Checkout completed");
            Ok(WebhookOutcome::Applied("checkout_completed"))
        }
        "customer.subscription.updated" | "customer.subscription.created" => {
            let sub: SubscriptionObject = parse_object(event)?;
            let plan = sub
                .items
                .as_ref()
                .and_then(|items| items.data.first())
                .and_then(|item| stripe.plan_for_price(&item.price.id));
            let status = SubscriptionStatus::from_stripe(&sub.status);

            let updated = db
                .update_subscription_from_stripe(&sub.id, status, plan, timestamp(sub.current_period_end))
                .await?;
            if updated.is_none() {
                // Not linked yet; checkout.session.completed carries the link
                warn!(subscription_id = %sub.id, "Subscription update for unknown subscription");
                return Ok(WebhookOutcome::Ignored);
            }
            Ok(WebhookOutcome::Applied("subscription_updated"))
        }
        "customer.subscription.deleted" => {
            let sub: SubscriptionObject = parse_object(event)?;
            db.cancel_subscription(&sub.id).await?;
            info!(subscription_id = %sub.id, "Subscription canceled");
            Ok(WebhookOutcome::Applied("subscription_deleted"))
        }
        "invoice.payment_failed" => {
            let invoice: InvoiceObject = parse_object(event)?;
            if let Some(customer) = invoice.customer.as_deref() {
                let rows = db.mark_past_due_by_customer(customer).await?;
                warn!(%customer, rows, "Invoice payment failed");
            }
            Ok(WebhookOutcome::Applied("payment_failed"))
        }
        _ => Ok(WebhookOutcome::Ignored),
    }
}
