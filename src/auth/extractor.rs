use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::AppState;

/// Bearer token from the `Authorization` header, if present.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// A request made with a valid session token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req).map(str::to_string);

        Box::pin(async move {
            let state = state
                .ok_or_else(|| AppError::InternalError("application state not configured".into()))?;
            let token = token.ok_or(AuthError::MissingToken)?;
            let user = state.auth_service.validate_token(&token).await?;
            Ok(AuthenticatedUser { user, token })
        })
    }
}

/// An authenticated user with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let authenticated = AuthenticatedUser::from_request(req, payload);

        Box::pin(async move {
            let AuthenticatedUser { user, .. } = authenticated.await?;
            if user.is_admin() {
                Ok(AdminUser(user))
            } else {
                Err(AuthError::Forbidden.into())
            }
        })
    }
}
