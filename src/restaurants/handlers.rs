use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{normalize_email, AdminUser, AuthenticatedUser};
use crate::db::models::PublicRestaurant;
use crate::db::{RestaurantFilter, RestaurantUpdate};
use crate::error::{AppError, DatabaseError};
use crate::restaurants::{self, load_managed, validate_link, RestaurantDraft, MAX_NOTIFICATION_EMAILS};
use crate::AppState;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 50;

pub async fn create(
    admin: AdminUser,
    body: web::Json<RestaurantDraft>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let draft = body.into_inner();
    info!(admin_id = %admin.0.id, name = %draft.name, "Creating restaurant");

    let restaurant = match restaurants::create_restaurant(&state.db, draft.clone()).await {
        Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
            warn!(name = %draft.name, "Slug taken concurrently, retrying");
            restaurants::create_restaurant(&state.db, draft).await?
        }
        other => other?,
    };

    Ok(HttpResponse::Created().json(restaurant))
}

pub async fn get_by_slug(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = path.into_inner();
    let restaurant = state
        .db
        .get_restaurant_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", slug)))?;
    Ok(HttpResponse::Ok().json(PublicRestaurant::from(restaurant)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Limit and offset for a 1-based page, with `per_page` clamped to 1..=50.
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let offset = i64::from(page - 1) * i64::from(per_page);
    (page, per_page, i64::from(per_page), offset)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn search(
    query: web::Query<SearchQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let (page, per_page, limit, offset) = page_window(query.page, query.per_page);
    let filter = RestaurantFilter {
        q: non_blank(query.q),
        city: non_blank(query.city),
        country_code: non_blank(query.country_code).map(|c| c.to_ascii_uppercase()),
    };

    let results: Vec<PublicRestaurant> = state
        .db
        .search_restaurants(&filter, limit, offset)
        .await?
        .into_iter()
        .map(PublicRestaurant::from)
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "page": page,
        "per_page": per_page,
        "results": results,
    })))
}

pub async fn update(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<RestaurantUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;

    let update = body.into_inner();
    if update.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
        return Err(AppError::ValidationError("name cannot be empty".into()));
    }
    validate_link("website", update.website.as_deref())?;
    validate_link("reservation_url", update.reservation_url.as_deref())?;

    let restaurant = state.db.update_restaurant(id, &update).await?;
    info!(restaurant_id = %id, user_id = %auth.user.id, "Restaurant profile updated");
    Ok(HttpResponse::Ok().json(restaurant))
}

pub async fn list_emails(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;
    Ok(HttpResponse::Ok().json(state.db.list_restaurant_emails(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddEmailRequest {
    pub email: String,
}

pub async fn add_email(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<AddEmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;
    let email = normalize_email(&body.email)?;

    let existing = state.db.list_restaurant_emails(id).await?;
    if existing.iter().any(|e| e.email == email) {
        return Err(AppError::Conflict(format!("{} is already registered", email)));
    }
    if existing.len() >= MAX_NOTIFICATION_EMAILS {
        return Err(AppError::ValidationError(format!(
            "at most {} notification emails per restaurant",
            MAX_NOTIFICATION_EMAILS
        )));
    }

    let added = state.db.add_restaurant_email(id, &email).await?;
    info!(restaurant_id = %id, email_id = %added.id, "Notification email added");
    Ok(HttpResponse::Created().json(added))
}

pub async fn delete_email(
    auth: AuthenticatedUser,
    path: web::Path<(Uuid, Uuid)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (id, email_id) = path.into_inner();
    load_managed(&state.db, id, &auth.user).await?;

    if !state.db.delete_restaurant_email(id, email_id).await? {
        return Err(AppError::NotFound(format!("notification email {}", email_id)));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (1, 20, 20, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 10, 20));
        assert_eq!(page_window(Some(0), Some(500)), (1, 50, 50, 0));
        assert_eq!(page_window(Some(2), Some(0)), (2, 1, 1, 1));
    }

    #[test]
    fn blank_filters_are_dropped() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" Paris ".into())), Some("Paris".into()));
    }
}
