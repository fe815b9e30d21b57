//! Ownership claims: an owner asks to manage a listed restaurant and an
//! admin approves or rejects the request.

pub mod handlers;

use crate::db::models::{ClaimStatus, Restaurant};

/// Why a new claim on `restaurant` cannot be opened, if it cannot.
pub fn claim_conflict(restaurant: &Restaurant) -> Option<&'static str> {
    if restaurant.is_claimed {
        Some("restaurant is already claimed")
    } else if restaurant.claim_status == Some(ClaimStatus::Pending) {
        Some("a claim for this restaurant is already pending")
    } else {
        None
    }
}

/// Trims the optional claim message and caps it at 2000 characters.
pub fn clean_message(message: Option<String>) -> Option<String> {
    crate::tracking::clean_field(message, 2000)
}
