use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{ClaimStatus, Restaurant, RestaurantEmail, Subscription};
use crate::db::operations::DbOperations;
use crate::error::AppError;

const RESTAURANT_COLUMNS: &str = "id, number, slug, name, description, cuisine, address, city, \
    country, country_code, phone, website, reservation_url, is_claimed, user_id, claim_status, \
    claim_requested_by, claim_message, claim_requested_at, created_at, updated_at";

/// Fields needed to insert a restaurant once slug and number are assigned.
#[derive(Debug, Clone)]
pub struct NewRestaurant {
    pub number: String,
    pub slug: String,
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

/// Partial profile update; `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestaurantUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cuisine: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub reservation_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestaurantFilter {
    pub q: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
}

impl DbOperations {
    pub async fn next_restaurant_sequence(&self) -> Result<i64, AppError> {
        let (seq,): (i64,) = sqlx::query_as("SELECT nextval('restaurant_number_seq')")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(seq)
    }

    /// Existing slugs equal to `base` or of the form `base-N`.
    pub async fn slugs_like(&self, base: &str) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT slug FROM restaurants WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(base)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    pub async fn create_restaurant(&self, new: &NewRestaurant) -> Result<Restaurant, AppError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO restaurants (id, number, slug, name, description, cuisine, address, city,
                country, country_code, phone, website, reservation_url, is_claimed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, FALSE, $14, $14)
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        let restaurant = sqlx::query_as::<_, Restaurant>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.number)
            .bind(&new.slug)
            .bind(&new.name)
            .bind(&new.description)
            .bind(&new.cuisine)
            .bind(&new.address)
            .bind(&new.city)
            .bind(&new.country)
            .bind(&new.country_code)
            .bind(&new.phone)
            .bind(&new.website)
            .bind(&new.reservation_url)
            .bind(now)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(restaurant)
    }

    pub async fn get_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, AppError> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1");
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?)
    }

    pub async fn get_restaurant_by_slug(&self, slug: &str) -> Result<Option<Restaurant>, AppError> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE slug = $1");
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(slug)
            .fetch_optional(self.pool.as_ref())
            .await?)
    }

    pub async fn search_restaurants(
        &self,
        filter: &RestaurantFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Restaurant>, AppError> {
        let sql = format!(
            r#"
            SELECT {RESTAURANT_COLUMNS} FROM restaurants
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%' OR cuisine ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR city ILIKE $2)
              AND ($3::text IS NULL OR country_code = $3)
            ORDER BY name ASC, id ASC
            LIMIT $4 OFFSET $5
            "#
        );
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(filter.q.as_deref())
            .bind(filter.city.as_deref())
            .bind(filter.country_code.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?)
    }

    pub async fn update_restaurant(
        &self,
        id: Uuid,
        update: &RestaurantUpdate,
    ) -> Result<Restaurant, AppError> {
        let sql = format!(
            r#"
            UPDATE restaurants SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                cuisine = COALESCE($4, cuisine),
                address = COALESCE($5, address),
                city = COALESCE($6, city),
                phone = COALESCE($7, phone),
                website = COALESCE($8, website),
                reservation_url = COALESCE($9, reservation_url),
                updated_at = $10
            WHERE id = $1
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.description)
            .bind(&update.cuisine)
            .bind(&update.address)
            .bind(&update.city)
            .bind(&update.phone)
            .bind(&update.website)
            .bind(&update.reservation_url)
            .bind(Utc::now())
            .fetch_one(self.pool.as_ref())
            .await?)
    }

    pub async fn list_restaurants_for_user(&self, user_id: Uuid) -> Result<Vec<Restaurant>, AppError> {
        let sql = format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE user_id = $1 AND is_claimed ORDER BY name"
        );
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?)
    }

    /// Keyset page of restaurant ids, ordered by id.
    pub async fn restaurant_ids_after(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM restaurants WHERE ($1::uuid IS NULL OR id > $1) ORDER BY id LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Marks an unclaimed restaurant as pending for `user_id`. Returns `None`
    /// when the restaurant is already claimed or has a pending claim.
    pub async fn request_claim(
        &self,
        id: Uuid,
        user_id: Uuid,
        message: Option<&str>,
    ) -> Result<Option<Restaurant>, AppError> {
        let sql = format!(
            r#"
            UPDATE restaurants SET
                claim_status = 'pending',
                claim_requested_by = $2,
                claim_message = $3,
                claim_requested_at = $4,
                updated_at = $4
            WHERE id = $1
              AND NOT is_claimed
              AND (claim_status IS NULL OR claim_status <> 'pending')
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(message)
            .bind(Utc::now())
            .fetch_optional(self.pool.as_ref())
            .await?)
    }

    pub async fn list_pending_claims(&self) -> Result<Vec<Restaurant>, AppError> {
        let sql = format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE claim_status = $1 ORDER BY claim_requested_at ASC"
        );
        Ok(sqlx::query_as::<_, Restaurant>(&sql)
            .bind(ClaimStatus::Pending)
            .fetch_all(self.pool.as_ref())
            .await?)
    }

    /// Links the claimant to the restaurant and opens a trial subscription if
    /// the restaurant has none. Returns `None` when no claim is pending.
    pub async fn approve_claim(
        &self,
        id: Uuid,
        trial: &Subscription,
    ) -> Result<Option<(Restaurant, bool)>, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let sql = format!(
            r#"
            UPDATE restaurants SET
                is_claimed = TRUE,
                user_id = claim_requested_by,
                claim_status = 'approved',
                updated_at = $2
            WHERE id = $1 AND claim_status = 'pending' AND claim_requested_by IS NOT NULL
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        let restaurant = sqlx::query_as::<_, Restaurant>(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&mut *transaction)
            .await?;

        let Some(restaurant) = restaurant else {
            transaction.rollback().await?;
            return Ok(None);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, restaurant_id, plan, status, trial_ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (restaurant_id) DO NOTHING
            "#,
        )
        .bind(trial.id)
        .bind(restaurant.id)
        .bind(trial.plan)
        .bind(trial.status)
        .bind(trial.trial_ends_at)
        .bind(trial.created_at)
        .execute(&mut *transaction)
        .await?
        .rows_affected();

        transaction.commit().await?;
        Ok(Some((restaurant, inserted > 0)))
    }

    /// Clears a pending claim. Returns the updated restaurant together with the
    /// rejected claimant, or `None` when no claim is pending.
    pub async fn reject_claim(&self, id: Uuid) -> Result<Option<(Restaurant, Option<Uuid>)>, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let select = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Restaurant>(&select)
            .bind(id)
            .fetch_optional(&mut *transaction)
            .await?;

        let claimant = match current {
            Some(r) if r.claim_status == Some(ClaimStatus::Pending) => r.claim_requested_by,
            _ => {
                transaction.rollback().await?;
                return Ok(None);
            }
        };

        let update = format!(
            r#"
            UPDATE restaurants SET
                claim_status = 'rejected',
                claim_requested_by = NULL,
                updated_at = $2
            WHERE id = $1
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );
        let restaurant = sqlx::query_as::<_, Restaurant>(&update)
            .bind(id)
            .bind(Utc::now())
            .fetch_one(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(Some((restaurant, claimant)))
    }

    pub async fn list_restaurant_emails(&self, restaurant_id: Uuid) -> Result<Vec<RestaurantEmail>, AppError> {
        Ok(sqlx::query_as::<_, RestaurantEmail>(
            "SELECT * FROM restaurant_emails WHERE restaurant_id = $1 ORDER BY created_at",
        )
        .bind(restaurant_id)
        .fetch_all(self.pool.as_ref())
        .await?)
    }

    pub async fn add_restaurant_email(
        &self,
        restaurant_id: Uuid,
        email: &str,
    ) -> Result<RestaurantEmail, AppError> {
        Ok(sqlx::query_as::<_, RestaurantEmail>(
            r#"
            INSERT INTO restaurant_emails (id, restaurant_id, email, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(restaurant_id)
        .bind(email)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?)
    }

    pub async fn delete_restaurant_email(&self, restaurant_id: Uuid, email_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM restaurant_emails WHERE id = $1 AND restaurant_id = $2")
            .bind(email_id)
            .bind(restaurant_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
