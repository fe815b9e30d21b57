use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Plan, Subscription, SubscriptionStatus};
use crate::db::operations::DbOperations;
use crate::error::AppError;

impl DbOperations {
    pub async fn get_subscription(&self, restaurant_id: Uuid) -> Result<Option<Subscription>, AppError> {
        Ok(sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE restaurant_id = $1",
        )
        .bind(restaurant_id)
        .fetch_optional(self.pool.as_ref())
        .await?)
    }

    /// Stores the Stripe customer for a restaurant, creating a free row if
    /// the restaurant has never had a subscription.
    pub async fn set_stripe_customer(
        &self,
        restaurant_id: Uuid,
        customer_id: &str,
    ) -> Result<Subscription, AppError> {
        let now = Utc::now();
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, restaurant_id, plan, status, stripe_customer_id, created_at, updated_at)
            VALUES ($1, $2, 'free', 'canceled', $3, $4, $4)
            ON CONFLICT (restaurant_id) DO UPDATE SET
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(restaurant_id)
        .bind(customer_id)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?)
    }

    /// Records a completed checkout: the restaurant is now on `plan` with a
    /// live Stripe subscription.
    pub async fn activate_subscription(
        &self,
        restaurant_id: Uuid,
        plan: Plan,
        customer_id: Option<&str>,
        stripe_subscription_id: &str,
    ) -> Result<Subscription, AppError> {
        let now = Utc::now();
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, restaurant_id, plan, status, stripe_customer_id,
                stripe_subscription_id, created_at, updated_at)
            VALUES ($1, $2, $3, 'active', $4, $5, $6, $6)
            ON CONFLICT (restaurant_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                status = 'active',
                stripe_customer_id = COALESCE(EXCLUDED.stripe_customer_id, subscriptions.stripe_customer_id),
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                trial_ends_at = NULL,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(restaurant_id)
        .bind(plan)
        .bind(customer_id)
        .bind(stripe_subscription_id)
        .bind(now)
        .fetch_one(self.pool.as_ref())
        .await?)
    }

    pub async fn update_subscription_from_stripe(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
        plan: Option<Plan>,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<Option<Subscription>, AppError> {
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET
                status = $2,
                plan = COALESCE($3, plan),
                current_period_end = COALESCE($4, current_period_end),
                updated_at = $5
            WHERE stripe_subscription_id = $1
            RETURNING *
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(status)
        .bind(plan)
        .bind(current_period_end)
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?)
    }

    pub async fn cancel_subscription(&self, stripe_subscription_id: &str) -> Result<Option<Subscription>, AppError> {
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET
                plan = 'free',
                status = 'canceled',
                stripe_subscription_id = NULL,
                updated_at = $2
            WHERE stripe_subscription_id = $1
            RETURNING *
            "#,
        )
        .bind(stripe_subscription_id)
        .bind(Utc::now())
        .fetch_optional(self.pool.as_ref())
        .await?)
    }

    pub async fn mark_past_due_by_customer(&self, customer_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET status = 'past_due', updated_at = $2 WHERE stripe_customer_id = $1 AND stripe_subscription_id IS NOT NULL",
        )
        .bind(customer_id)
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected())
    }

    /// Moves every trial that ended before `now` without a Stripe
    /// subscription onto the free plan.
    pub async fn downgrade_expired_trials(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET plan = 'free', status = 'canceled', updated_at = $1
            WHERE status = 'trialing'
              AND stripe_subscription_id IS NULL
              AND (trial_ends_at IS NULL OR trial_ends_at <= $1)
            "#,
        )
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn downgrade_expired_trial(
        &self,
        restaurant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, AppError> {
        Ok(sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions SET plan = 'free', status = 'canceled', updated_at = $2
            WHERE restaurant_id = $1
              AND status = 'trialing'
              AND stripe_subscription_id IS NULL
              AND (trial_ends_at IS NULL OR trial_ends_at <= $2)
            RETURNING *
            "#,
        )
        .bind(restaurant_id)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?)
    }
}
