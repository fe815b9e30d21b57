//! Reservation requests submitted from a restaurant's public page.

pub mod handlers;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::normalize_email;
use crate::db::models::ReservationStatus;
use crate::db::NewReservation;
use crate::error::AppError;
use crate::tracking::clean_field;

pub const MIN_PARTY_SIZE: i32 = 1;
pub const MAX_PARTY_SIZE: i32 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationForm {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub party_size: i32,
    pub requested_for: DateTime<Utc>,
    pub notes: Option<String>,
}

impl ReservationForm {
    /// Checks the form against `now` and normalises it into an insertable row.
    pub fn validate(self, restaurant_id: Uuid, now: DateTime<Utc>) -> Result<NewReservation, AppError> {
        let guest_name = clean_field(Some(self.guest_name), 120)
            .ok_or_else(|| AppError::ValidationError("guest name is required".into()))?;
        let guest_email = normalize_email(&self.guest_email)?;

        if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&self.party_size) {
            return Err(AppError::ValidationError(format!(
                "party size must be between {} and {}",
                MIN_PARTY_SIZE, MAX_PARTY_SIZE
            )));
        }
        if self.requested_for < now {
            return Err(AppError::ValidationError("requested time is in the past".into()));
        }

        Ok(NewReservation {
            restaurant_id,
            guest_name,
            guest_email,
            guest_phone: clean_field(self.guest_phone, 40),
            party_size: self.party_size,
            requested_for: self.requested_for,
            notes: clean_field(self.notes, 1000),
        })
    }
}

/// Statuses an owner may move a pending request to.
pub fn resolution(status: ReservationStatus) -> Result<ReservationStatus, AppError> {
    match status {
        ReservationStatus::Confirmed | ReservationStatus::Declined => Ok(status),
        ReservationStatus::Pending => Err(AppError::Conflict(
            "a reservation can only move to confirmed or declined".into(),
        )),
    }
}
