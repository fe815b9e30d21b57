use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::billing::stripe::CheckoutRequest;
use crate::billing::{apply_event, verify_signature, StripeEvent, WebhookOutcome};
use crate::db::models::{Plan, Restaurant, User};
use crate::error::{AppError, AuthError, BillingError};
use crate::AppState;

/// Billing is managed by the owner only, not by admins acting for them.
async fn load_owned(state: &AppState, id: Uuid, user: &User) -> Result<Restaurant, AppError> {
    let restaurant = state
        .db
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))?;
    if !restaurant.is_owned_by(user) {
        return Err(AuthError::Forbidden.into());
    }
    Ok(restaurant)
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub restaurant_id: Uuid,
    pub plan: Plan,
}

pub async fn checkout(
    auth: AuthenticatedUser,
    body: web::Json<CheckoutBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let CheckoutBody { restaurant_id, plan } = body.into_inner();
    if plan == Plan::Free {
        return Err(AppError::ValidationError("the free plan cannot be purchased".into()));
    }
    let restaurant = load_owned(&state, restaurant_id, &auth.user).await?;

    let existing = state
        .db
        .get_subscription(restaurant_id)
        .await?
        .and_then(|s| s.stripe_customer_id);
    let customer_id = match existing {
        Some(id) => id,
        None => {
            let id = state
                .stripe
                .create_customer(&auth.user.email, restaurant_id, &restaurant.name)
                .await?;
            state.db.set_stripe_customer(restaurant_id, &id).await?;
            id
        }
    };

    let session = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            customer_id: &customer_id,
            restaurant_id,
            plan,
        })
        .await?;
    let url = session
        .url
        .ok_or_else(|| BillingError::ApiError(format!("checkout session {} has no url", session.id)))?;

    info!(%restaurant_id, plan = plan.as_str(), session_id = %session.id, "Checkout session created");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct PortalBody {
    pub restaurant_id: Uuid,
}

pub async fn portal(
    auth: AuthenticatedUser,
    body: web::Json<PortalBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let restaurant_id = body.restaurant_id;
    load_owned(&state, restaurant_id, &auth.user).await?;

    let customer_id = state
        .db
        .get_subscription(restaurant_id)
        .await?
        .and_then(|s| s.stripe_customer_id)
        .ok_or_else(|| AppError::NotFound("billing account".into()))?;

    let return_url = format!(
        "{}/dashboard/billing",
        state.config.server.public_base_url.trim_end_matches('/')
    );
    let session = state.stripe.create_portal_session(&customer_id, &return_url).await?;

    info!(%restaurant_id, "Billing portal session created");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "url": session.url })))
}

/// Receives Stripe events. The body is taken raw because the signature
/// covers the exact bytes sent.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let header = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| BillingError::InvalidSignature("missing Stripe-Signature header".into()))?;

    if let Err(e) = verify_signature(&body, header, &state.config.stripe.webhook_secret, Utc::now().timestamp()) {
        warn!(error = %e, "Rejected Stripe webhook");
        return Err(e.into());
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| BillingError::InvalidPayload(e.to_string()))?;

    let outcome = match apply_event(&state.db, &state.stripe, &event).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(event_id = %event.id, event_type = %event.event_type, error = %e, "Failed to apply Stripe event");
            return Err(e);
        }
    };

    let outcome = match outcome {
        WebhookOutcome::Applied(what) => {
            info!(event_id = %event.id, event_type = %event.event_type, what, "Stripe event applied");
            what
        }
        WebhookOutcome::Ignored => "ignored",
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "received": true,
        "outcome": outcome,
    })))
}
