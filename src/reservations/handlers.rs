use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, RESERVATION_BUCKET};
use crate::db::models::{ReservationStatus, Restaurant};
use crate::db::StatCounter;
use crate::email::{send_best_effort, templates};
use crate::error::{AppError, AuthError};
use crate::reservations::{resolution, ReservationForm};
use crate::restaurants::load_managed;
use crate::tracking::client_fingerprint;
use crate::AppState;

/// Notification recipients: the configured addresses, else the owner's login.
async fn recipients(state: &AppState, restaurant: &Restaurant) -> Vec<String> {
    match state.db.list_restaurant_emails(restaurant.id).await {
        Ok(emails) if !emails.is_empty() => return emails.into_iter().map(|e| e.email).collect(),
        Ok(_) => {}
        Err(e) => warn!(restaurant_id = %restaurant.id, error = %e, "Could not load notification emails"),
    }

    let Some(owner_id) = restaurant.user_id else {
        return Vec::new();
    };
    match state.db.get_user_by_id(owner_id).await {
        Ok(Some(owner)) => vec![owner.email],
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(%owner_id, error = %e, "Could not load restaurant owner");
            Vec::new()
        }
    }
}

pub async fn create(
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<ReservationForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let fingerprint = client_fingerprint(&req, &state.config.tracking.ip_hash_salt);
    if !state.rate_limiter.check_rate_limit(RESERVATION_BUCKET, &fingerprint).await {
        warn!(restaurant_id = %id, "Reservation rate limit exceeded");
        return Err(AuthError::RateLimited.into());
    }

    let now = Utc::now();
    let new = body.into_inner().validate(id, now)?;
    let restaurant = state
        .db
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))?;

    let reservation = state.db.create_reservation(&new).await?;
    info!(restaurant_id = %id, reservation_id = %reservation.id, party_size = reservation.party_size, "Reservation requested");

    if let Err(e) = state
        .db
        .increment_daily_stat(id, now.date_naive(), StatCounter::ReservationRequests)
        .await
    {
        warn!(restaurant_id = %id, error = %e, "Failed to count reservation request");
    }

    let to = recipients(&state, &restaurant).await;
    send_best_effort(
        state.mailer.as_ref(),
        templates::new_reservation(to, &restaurant, &reservation),
    )
    .await;

    Ok(HttpResponse::Created().json(reservation))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ReservationStatus>,
}

pub async fn list(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<ListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;
    Ok(HttpResponse::Ok().json(state.db.list_reservations(id, query.status).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ReservationStatus,
}

pub async fn update_status(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateStatusRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let status = resolution(body.status)?;

    let current = state
        .db
        .get_reservation(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("reservation {}", id)))?;
    let restaurant = load_managed(&state.db, current.restaurant_id, &auth.user).await?;

    let updated = state
        .db
        .resolve_reservation(id, status)
        .await?
        .ok_or_else(|| AppError::Conflict("reservation has already been resolved".into()))?;

    info!(reservation_id = %id, status = ?updated.status, user_id = %auth.user.id, "Reservation resolved");

    send_best_effort(
        state.mailer.as_ref(),
        templates::reservation_resolved(&restaurant, &updated),
    )
    .await;

    Ok(HttpResponse::Ok().json(updated))
}
