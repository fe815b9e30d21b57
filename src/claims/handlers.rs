use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::claims::{claim_conflict, clean_message};
use crate::db::models::{Plan, Subscription};
use crate::email::{send_best_effort, templates};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    pub message: Option<String>,
}

pub async fn request_claim(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: Option<web::Json<ClaimRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let user = auth.user;
    let message = clean_message(body.map(|b| b.into_inner()).unwrap_or_default().message);

    let current = state
        .db
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))?;
    if let Some(reason) = claim_conflict(&current) {
        return Err(AppError::Conflict(reason.into()));
    }

    // Another claim may have landed since the read above
    let restaurant = state
        .db
        .request_claim(id, user.id, message.as_deref())
        .await?
        .ok_or_else(|| AppError::Conflict("a claim for this restaurant is already pending".into()))?;

    info!(restaurant_id = %id, user_id = %user.id, "Claim requested");

    let admin = &state.config.email.admin_address;
    send_best_effort(
        state.mailer.as_ref(),
        templates::claim_received(admin, &restaurant, &user.email),
    )
    .await;

    Ok(HttpResponse::Accepted().json(serde_json::json!({
        "restaurant_id": restaurant.id,
        "claim_status": restaurant.claim_status,
    })))
}

async fn ensure_exists(state: &AppState, id: Uuid) -> Result<(), AppError> {
    state
        .db
        .get_restaurant(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))
}

pub async fn list_pending(
    _admin: AdminUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_pending_claims().await?))
}

pub async fn approve(
    admin: AdminUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    ensure_exists(&state, id).await?;
    let trial_days = state.config.stripe.trial_days;
    let trial = Subscription::new_trial(id, Plan::Pro, trial_days);

    let (restaurant, trial_started) = state
        .db
        .approve_claim(id, &trial)
        .await?
        .ok_or_else(|| AppError::Conflict("no pending claim for this restaurant".into()))?;

    info!(restaurant_id = %id, admin_id = %admin.0.id, owner_id = ?restaurant.user_id, trial_started, "Claim approved");

    match restaurant.user_id {
        Some(owner_id) => match state.db.get_user_by_id(owner_id).await {
            Ok(Some(owner)) => {
                let dashboard = format!(
                    "{}/dashboard",
                    state.config.server.public_base_url.trim_end_matches('/')
                );
                send_best_effort(
                    state.mailer.as_ref(),
                    templates::claim_approved(
                        &owner.email,
                        &restaurant,
                        &dashboard,
                        trial_started.then_some(trial_days),
                    ),
                )
                .await;
            }
            Ok(None) => warn!(%owner_id, "Approved claimant no longer exists"),
            Err(e) => warn!(%owner_id, error = %e, "Could not load claimant for notification"),
        },
        None => warn!(restaurant_id = %id, "Approved claim has no owner"),
    }

    Ok(HttpResponse::Ok().json(restaurant))
}

pub async fn reject(
    admin: AdminUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    ensure_exists(&state, id).await?;
    let (restaurant, claimant) = state
        .db
        .reject_claim(id)
        .await?
        .ok_or_else(|| AppError::Conflict("no pending claim for this restaurant".into()))?;

    info!(restaurant_id = %id, admin_id = %admin.0.id, "Claim rejected");

    if let Some(claimant_id) = claimant {
        match state.db.get_user_by_id(claimant_id).await {
            Ok(Some(user)) => {
                send_best_effort(
                    state.mailer.as_ref(),
                    templates::claim_rejected(&user.email, &restaurant),
                )
                .await
            }
            Ok(None) => {}
            Err(e) => warn!(%claimant_id, error = %e, "Could not load claimant for notification"),
        }
    }

    Ok(HttpResponse::Ok().json(restaurant))
}
