//! Restaurant directory: slugs, numbering, country inference and the
//! profile/notification-email endpoints.

pub mod country;
pub mod handlers;
pub mod slug;

use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::db::models::{Restaurant, User};
use crate::db::{DbOperations, NewRestaurant};
use crate::error::{AppError, AuthError};

pub use country::infer_country_code;
pub use slug::{restaurant_slug, slugify, unique_slug};

/// Placeholder country segment for restaurants with no known country.
pub const UNKNOWN_COUNTRY: &str = "XX";

/// Maximum notification addresses per restaurant.
pub const MAX_NOTIFICATION_EMAILS: usize = 5;

/// Public restaurant number, e.g. `BR-FR-000042`.
pub fn restaurant_number(country_code: Option<&str>, seq: i64) -> String {
    format!("BR-{}-{:06}", country_code.unwrap_or(UNKNOWN_COUNTRY), seq)
}

/// Input for creating a restaurant, before slug and number are assigned.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RestaurantDraft {
    pub name: String,
    pub description: Option<String>,
    pub cuisine: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub reservation_url: Option<String>,
}

impl RestaurantDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError("name is required".into()));
        }
        if name.chars().count() > 200 {
            return Err(AppError::ValidationError("name is too long".into()));
        }
        validate_link("website", self.website.as_deref())?;
        validate_link("reservation_url", self.reservation_url.as_deref())
    }
}

/// Profile links must be absolute http(s) URLs.
pub fn validate_link(field: &str, value: Option<&str>) -> Result<(), AppError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(AppError::ValidationError(format!("{} must be an http(s) URL", field))),
    }
}

/// Assigns slug and number, then inserts. A slug taken between lookup and
/// insert surfaces as a duplicate error; the caller retries once.
pub async fn create_restaurant(db: &DbOperations, draft: RestaurantDraft) -> Result<Restaurant, AppError> {
    draft.validate()?;

    let country_code = infer_country_code(
        draft.country_code.as_deref(),
        draft.country.as_deref(),
        draft.address.as_deref(),
    );
    let base = restaurant_slug(draft.name.trim(), draft.city.as_deref());
    let taken = db.slugs_like(&base).await?;
    let slug = unique_slug(&base, &taken);
    let seq = db.next_restaurant_sequence().await?;

    let new = NewRestaurant {
        number: restaurant_number(country_code.as_deref(), seq),
        slug,
        name: draft.name.trim().to_string(),
        description: draft.description,
        cuisine: draft.cuisine,
        address: draft.address,
        city: draft.city,
        country: draft.country,
        country_code,
        phone: draft.phone,
        website: draft.website,
        reservation_url: draft.reservation_url,
    };

    let restaurant = db.create_restaurant(&new).await?;
    info!(restaurant_id = %restaurant.id, slug = %restaurant.slug, number = %restaurant.number, "Restaurant created");
    Ok(restaurant)
}

/// Loads a restaurant the user owns or, for admins, any restaurant.
pub async fn load_managed(db: &DbOperations, id: Uuid, user: &User) -> Result<Restaurant, AppError> {
    let restaurant = db
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {}", id)))?;
    if !restaurant.can_be_managed_by(user) {
        return Err(AuthError::Forbidden.into());
    }
    Ok(restaurant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_format() {
        assert_eq!(restaurant_number(Some("FR"), 42), "BR-FR-000042");
        assert_eq!(restaurant_number(None, 7), "BR-XX-000007");
        assert_eq!(restaurant_number(Some("US"), 1_234_567), "BR-US-1234567");
    }

    #[test]
    fn links_must_be_web_urls() {
        assert!(validate_link("website", None).is_ok());
        assert!(validate_link("website", Some("  ")).is_ok());
        assert!(validate_link("website", Some("https://chezleon.fr/menu")).is_ok());
        assert!(validate_link("website", Some("chezleon.fr")).is_err());
        assert!(validate_link("website", Some("javascript:alert(1)")).is_err());
        assert!(validate_link("website", Some("ftp://chezleon.fr")).is_err());
    }

    #[test]
    fn draft_requires_a_name() {
        let draft: RestaurantDraft = serde_json::from_value(serde_json::json!({ "name": "   " })).unwrap();
        assert!(matches!(draft.validate(), Err(AppError::ValidationError(_))));

        let draft: RestaurantDraft =
            serde_json::from_value(serde_json::json!({ "name": "Chez Léon", "city": "Paris" })).unwrap();
        assert!(draft.validate().is_ok());
    }
}
