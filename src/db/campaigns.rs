use chrono::Utc;
use uuid::Uuid;

use crate::db::models::CampaignLink;
use crate::db::operations::DbOperations;
use crate::error::AppError;

impl DbOperations {
    pub async fn list_campaign_links(&self, restaurant_id: Uuid) -> Result<Vec<CampaignLink>, AppError> {
        Ok(sqlx::query_as::<_, CampaignLink>(
            "SELECT * FROM campaign_links WHERE restaurant_id = $1 ORDER BY created_at DESC",
        )
        .bind(restaurant_id)
        .fetch_all(self.pool.as_ref())
        .await?)
    }

    pub async fn count_campaign_links(&self, restaurant_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaign_links WHERE restaurant_id = $1")
            .bind(restaurant_id)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(count)
    }

    pub async fn create_campaign_link(
        &self,
        restaurant_id: Uuid,
        code: &str,
        name: &str,
        source: Option<&str>,
        medium: Option<&str>,
    ) -> Result<CampaignLink, AppError> {
        Ok(sqlx::query_as::<_, CampaignLink>(
            r#"
            INSERT INTO campaign_links (id, restaurant_id, code, name, source, medium, clicks, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(restaurant_id)
        .bind(code)
        .bind(name)
        .bind(source)
        .bind(medium)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?)
    }

    pub async fn get_campaign_link_by_code(&self, code: &str) -> Result<Option<CampaignLink>, AppError> {
        Ok(sqlx::query_as::<_, CampaignLink>("SELECT * FROM campaign_links WHERE code = $1")
            .bind(code)
            .fetch_optional(self.pool.as_ref())
            .await?)
    }

    pub async fn increment_campaign_clicks(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE campaign_links SET clicks = clicks + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn delete_campaign_link(&self, restaurant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM campaign_links WHERE id = $1 AND restaurant_id = $2")
            .bind(id)
            .bind(restaurant_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
