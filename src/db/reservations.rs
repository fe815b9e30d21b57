use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{ReservationRequest, ReservationStatus};
use crate::db::operations::DbOperations;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub restaurant_id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub party_size: i32,
    pub requested_for: DateTime<Utc>,
    pub notes: Option<String>,
}

impl DbOperations {
    pub async fn create_reservation(&self, new: &NewReservation) -> Result<ReservationRequest, AppError> {
        let now = Utc::now();
        Ok(sqlx::query_as::<_, ReservationRequest>(
            r#"
            INSERT INTO reservation_requests (id, restaurant_id, guest_name, guest_email, guest_phone,
                party_size, requested_for, notes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.restaurant_id)
        .bind(&new.guest_name)
        .bind(&new.guest_email)
        .bind(&new.guest_phone)
        .bind(new.party_size)
        .bind(new.requested_for)
        .bind(&new.notes)
        .bind(ReservationStatus::Pending)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?)
    }

    pub async fn list_reservations(
        &self,
        restaurant_id: Uuid,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationRequest>, AppError> {
        Ok(sqlx::query_as::<_, ReservationRequest>(
            r#"
            SELECT * FROM reservation_requests
            WHERE restaurant_id = $1 AND ($2::reservation_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(restaurant_id)
        .bind(status)
        .fetch_all(self.pool.as_ref())
        .await?)
    }

    pub async fn get_reservation(&self, id: Uuid) -> Result<Option<ReservationRequest>, AppError> {
        Ok(sqlx::query_as::<_, ReservationRequest>("SELECT * FROM reservation_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?)
    }

    /// Moves a pending request to `status`. Returns `None` if it was no longer pending.
    pub async fn resolve_reservation(
        &self,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<Option<ReservationRequest>, AppError> {
        Ok(sqlx::query_as::<_, ReservationRequest>(
            r#"
            UPDATE reservation_requests SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?)
    }
}
