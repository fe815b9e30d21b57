//! Visitor telemetry: event classification, IP hashing and the
//! fire-and-forget write path into `analytics_events` and the daily rollup.

pub mod device;
pub mod handlers;

use actix_web::HttpRequest;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::models::AnalyticsEvent;
use crate::db::{DbOperations, StatCounter};

pub use device::{classify, DeviceClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    PhoneClick,
    WebsiteClick,
    DirectionsClick,
    ReservationClick,
    MenuClick,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PageView => "page_view",
            EventType::PhoneClick => "phone_click",
            EventType::WebsiteClick => "website_click",
            EventType::DirectionsClick => "directions_click",
            EventType::ReservationClick => "reservation_click",
            EventType::MenuClick => "menu_click",
        }
    }

    pub fn counter(&self) -> StatCounter {
        match self {
            EventType::PageView => StatCounter::PageViews,
            EventType::PhoneClick => StatCounter::PhoneClicks,
            EventType::WebsiteClick => StatCounter::WebsiteClicks,
            EventType::DirectionsClick => StatCounter::DirectionsClicks,
            EventType::ReservationClick => StatCounter::ReservationClicks,
            EventType::MenuClick => StatCounter::MenuClicks,
        }
    }
}

/// Length of the stored IP hash, in hex characters.
const IP_HASH_LEN: usize = 32;

/// Salted, day-scoped SHA-256 of the client IP. The day in the input keeps
/// hashes from linking one visitor across days.
pub fn hash_ip(salt: &str, ip: &str, day: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(day.format("%Y-%m-%d").to_string().as_bytes());
    hasher.update(b":");
    hasher.update(ip.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(IP_HASH_LEN);
    digest
}

/// Best guess at the client address: forwarded headers first, then the peer.
pub fn client_ip(req: &HttpRequest) -> String {
    let info = req.connection_info();
    let raw = info.realip_remote_addr().unwrap_or("unknown");

    // X-Forwarded-For may carry a chain; the first hop is the client
    let first = raw.split(',').next().unwrap_or(raw).trim();
    if let Ok(addr) = first.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if let Ok(ip) = first.parse::<IpAddr>() {
        return ip.to_string();
    }
    first.to_string()
}

/// Hashed client identity for today, used both as the stored `ip_hash` and
/// as the rate limiter key.
pub fn client_fingerprint(req: &HttpRequest, salt: &str) -> String {
    hash_ip(salt, &client_ip(req), Utc::now().date_naive())
}

pub fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

/// Everything needed to persist one tracked event.
#[derive(Debug, Clone)]
pub struct TrackedEvent {
    pub restaurant_id: Uuid,
    pub event_type: EventType,
    pub campaign_code: Option<String>,
    pub ip_hash: String,
    pub device: DeviceClass,
    pub referrer: Option<String>,
    pub path: Option<String>,
}

/// Writes the event and bumps the daily counter. Errors are returned to the
/// caller, which decides whether anyone is waiting for them.
pub async fn record_event(db: &DbOperations, tracked: TrackedEvent) -> crate::Result<()> {
    let campaign_id = match tracked.campaign_code.as_deref() {
        Some(code) => db
            .get_campaign_link_by_code(code)
            .await?
            .filter(|c| c.restaurant_id == tracked.restaurant_id)
            .map(|c| c.id),
        None => None,
    };

    let now = Utc::now();
    let event = AnalyticsEvent {
        id: Uuid::new_v4(),
        restaurant_id: tracked.restaurant_id,
        campaign_id,
        event_type: tracked.event_type.as_str().to_string(),
        ip_hash: tracked.ip_hash,
        device: tracked.device.as_str().to_string(),
        referrer: tracked.referrer,
        path: tracked.path,
        created_at: now,
    };

    db.insert_event(&event).await?;
    db.increment_daily_stat(event.restaurant_id, now.date_naive(), tracked.event_type.counter())
        .await?;
    debug!(restaurant_id = %event.restaurant_id, event_type = %event.event_type, "Event recorded");
    Ok(())
}

/// Fire-and-forget wrapper around [`record_event`]; bot traffic is dropped.
pub fn spawn_record(db: DbOperations, tracked: TrackedEvent) {
    if tracked.device == DeviceClass::Bot {
        return;
    }
    tokio::spawn(async move {
        let restaurant_id = tracked.restaurant_id;
        if let Err(e) = record_event(&db, tracked).await {
            warn!(%restaurant_id, error = %e, "Failed to record analytics event");
        }
    });
}

/// Trims optional free-text fields and caps their length.
pub fn clean_field(value: Option<String>, max_len: usize) -> Option<String> {
    value
        .map(|v| v.trim().chars().take(max_len).collect::<String>())
        .filter(|v| !v.is_empty())
}
