use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::{AuthenticatedUser, LOGIN_BUCKET};
use crate::billing::{resolve_plan, PlanSummary};
use crate::db::models::{Restaurant, User};
use crate::error::{AppError, AuthError};
use crate::tracking::client_fingerprint;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

pub async fn login(
    http: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let fingerprint = client_fingerprint(&http, &state.config.tracking.ip_hash_salt);
    if !state.rate_limiter.check_rate_limit(LOGIN_BUCKET, &fingerprint).await {
        warn!("Login rate limit exceeded");
        return Err(AuthError::RateLimited.into());
    }

    info!(email = %req.email, "Received login request");
    match state.auth_service.authenticate(&req.email, &req.password).await {
        Ok(token) => {
            info!(email = %req.email, "Login successful");
            Ok(HttpResponse::Ok().json(AuthResponse { token }))
        }
        Err(e) => {
            warn!(email = %req.email, error = %e, "Login failed");
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!(email = %req.email, "Received registration request");

    let user = match state
        .auth_service
        .register(&req.email, &req.password, req.display_name.as_deref())
        .await
    {
        Ok(user) => {
            info!(user_id = %user.id, "Registration successful");
            user
        }
        Err(e) => {
            warn!(email = %req.email, error = %e, "Registration failed");
            return Err(e);
        }
    };

    match state.auth_service.authenticate(&user.email, &req.password).await {
        Ok(token) => Ok(HttpResponse::Created().json(AuthResponse { token })),
        Err(e) => {
            error!(user_id = %user.id, error = %e, "Post-registration login failed");
            Err(e)
        }
    }
}

pub async fn logout(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.invalidate_token(&auth.token).await?;
    info!(user_id = %auth.user.id, "Logged out");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

#[derive(Debug, Serialize)]
pub struct OwnedRestaurant {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub subscription: PlanSummary,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub restaurants: Vec<OwnedRestaurant>,
}

pub async fn me(
    auth: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let restaurants = state.db.list_restaurants_for_user(auth.user.id).await?;

    let mut owned = Vec::with_capacity(restaurants.len());
    for restaurant in restaurants {
        let subscription = resolve_plan(&state.db, restaurant.id).await?;
        owned.push(OwnedRestaurant { restaurant, subscription });
    }

    Ok(HttpResponse::Ok().json(MeResponse {
        user: auth.user,
        restaurants: owned,
    }))
}
