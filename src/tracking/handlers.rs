use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::TRACKING_BUCKET;
use crate::error::{AppError, AuthError};
use crate::tracking::{
    classify, clean_field, client_fingerprint, spawn_record, user_agent, DeviceClass, EventType,
    TrackedEvent,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub restaurant_id: Uuid,
    pub event_type: EventType,
    pub campaign: Option<String>,
    pub referrer: Option<String>,
    pub path: Option<String>,
}

/// Accepts a visitor event and returns before it is stored.
pub async fn track(
    req: HttpRequest,
    body: web::Json<TrackRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let ip_hash = client_fingerprint(&req, &state.config.tracking.ip_hash_salt);
    if !state.rate_limiter.check_rate_limit(TRACKING_BUCKET, &ip_hash).await {
        warn!(%ip_hash, "Tracking rate limit exceeded");
        return Err(AuthError::RateLimited.into());
    }

    let body = body.into_inner();
    let device = classify(user_agent(&req).as_deref());

    spawn_record(
        state.db.clone(),
        TrackedEvent {
            restaurant_id: body.restaurant_id,
            event_type: body.event_type,
            campaign_code: clean_field(body.campaign, 64),
            ip_hash,
            device,
            referrer: clean_field(body.referrer, 512),
            path: clean_field(body.path, 512),
        },
    );

    Ok(HttpResponse::Accepted().json(serde_json::json!({ "accepted": true })))
}

/// Campaign link entry point: counts the click and sends the visitor to
/// the restaurant's public page.
pub async fn campaign_redirect(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let code = path.into_inner().to_lowercase();
    let link = state
        .db
        .get_campaign_link_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("campaign link {}", code)))?;
    let restaurant = state
        .db
        .get_restaurant(link.restaurant_id)
        .await?
        .ok_or_else(|| AppError::NotFound("restaurant".into()))?;

    // The landing page reports the attributed page view itself via `ref`
    if classify(user_agent(&req).as_deref()) != DeviceClass::Bot {
        let db = state.db.clone();
        let link_id = link.id;
        tokio::spawn(async move {
            if let Err(e) = db.increment_campaign_clicks(link_id).await {
                warn!(%link_id, error = %e, "Failed to count campaign click");
            }
        });
    }

    let target = format!(
        "{}/r/{}?ref={}",
        state.config.server.public_base_url.trim_end_matches('/'),
        restaurant.slug,
        link.code
    );
    info!(code = %link.code, %target, "Campaign redirect");

    Ok(HttpResponse::Found()
        .insert_header(("Location", target))
        .finish())
}
