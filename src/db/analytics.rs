use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::models::{AnalyticsEvent, CampaignClicks, DailyStat, DeviceCount};
use crate::db::operations::DbOperations;
use crate::error::AppError;

/// Counter columns of `analytics_daily_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCounter {
    PageViews,
    PhoneClicks,
    WebsiteClicks,
    DirectionsClicks,
    ReservationClicks,
    MenuClicks,
    ReservationRequests,
}

impl StatCounter {
    pub fn column(&self) -> &'static str {
        match self {
            StatCounter::PageViews => "page_views",
            StatCounter::PhoneClicks => "phone_clicks",
            StatCounter::WebsiteClicks => "website_clicks",
            StatCounter::DirectionsClicks => "directions_clicks",
            StatCounter::ReservationClicks => "reservation_clicks",
            StatCounter::MenuClicks => "menu_clicks",
            StatCounter::ReservationRequests => "reservation_requests",
        }
    }
}

impl DbOperations {
    pub async fn insert_event(&self, event: &AnalyticsEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events (id, restaurant_id, campaign_id, event_type, ip_hash,
                device, referrer, path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id)
        .bind(event.restaurant_id)
        .bind(event.campaign_id)
        .bind(&event.event_type)
        .bind(&event.ip_hash)
        .bind(&event.device)
        .bind(&event.referrer)
        .bind(&event.path)
        .bind(event.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    pub async fn increment_daily_stat(
        &self,
        restaurant_id: Uuid,
        day: NaiveDate,
        counter: StatCounter,
    ) -> Result<(), AppError> {
        let column = counter.column();
        let sql = format!(
            r#"
            INSERT INTO analytics_daily_stats (restaurant_id, day, {column})
            VALUES ($1, $2, 1)
            ON CONFLICT (restaurant_id, day) DO UPDATE SET
                {column} = analytics_daily_stats.{column} + 1
            "#
        );
        sqlx::query(&sql)
            .bind(restaurant_id)
            .bind(day)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn daily_stats_for(
        &self,
        restaurant_ids: &[Uuid],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyStat>, AppError> {
        Ok(sqlx::query_as::<_, DailyStat>(
            r#"
            SELECT * FROM analytics_daily_stats
            WHERE restaurant_id = ANY($1) AND day BETWEEN $2 AND $3
            ORDER BY day
            "#,
        )
        .bind(restaurant_ids)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.as_ref())
        .await?)
    }

    pub async fn campaign_clicks_for(
        &self,
        restaurant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<Vec<CampaignClicks>, AppError> {
        Ok(sqlx::query_as::<_, CampaignClicks>(
            r#"
            SELECT c.id AS campaign_id, c.code, c.name, COUNT(e.id) AS events
            FROM campaign_links c
            JOIN analytics_events e ON e.campaign_id = c.id AND e.created_at >= $2
            WHERE c.restaurant_id = ANY($1)
            GROUP BY c.id, c.code, c.name
            "#,
        )
        .bind(restaurant_ids)
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?)
    }

    pub async fn device_counts_for(
        &self,
        restaurant_ids: &[Uuid],
        since: DateTime<Utc>,
    ) -> Result<Vec<DeviceCount>, AppError> {
        Ok(sqlx::query_as::<_, DeviceCount>(
            r#"
            SELECT device, COUNT(*) AS events
            FROM analytics_events
            WHERE restaurant_id = ANY($1) AND created_at >= $2
            GROUP BY device
            "#,
        )
        .bind(restaurant_ids)
        .bind(since)
        .fetch_all(self.pool.as_ref())
        .await?)
    }
}
