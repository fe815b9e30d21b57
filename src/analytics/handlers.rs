use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{collect, window, Aggregator, AnalyticsRange, ADMIN_PAGE_SIZE};
use crate::auth::{AdminUser, AuthenticatedUser};
use crate::billing::resolve_plan;
use crate::db::models::Plan;
use crate::error::AppError;
use crate::restaurants::load_managed;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub restaurant_id: Option<Uuid>,
    pub range: Option<String>,
}

/// Owner dashboard for one restaurant, or all of the user's restaurants.
pub async fn dashboard(
    auth: AuthenticatedUser,
    query: web::Query<AnalyticsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let range = AnalyticsRange::parse(query.range.as_deref())?;

    let restaurant_ids: Vec<Uuid> = match query.restaurant_id {
        Some(id) => vec![load_managed(&state.db, id, &auth.user).await?.id],
        None => state
            .db
            .list_restaurants_for_user(auth.user.id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect(),
    };

    // Across several restaurants the most generous plan sets the history
    let mut plan = Plan::Free;
    for id in &restaurant_ids {
        let resolved = resolve_plan(&state.db, *id).await?.plan;
        if resolved.analytics_history_days() > plan.analytics_history_days() {
            plan = resolved;
        }
    }

    let days = range.capped_days(plan);
    let (start, end) = window(days, Utc::now().date_naive());
    let mut agg = Aggregator::new(start, end);
    collect(&state.db, &restaurant_ids, start, end, &mut agg).await?;

    info!(user_id = %auth.user.id, restaurants = restaurant_ids.len(), days, "Analytics dashboard served");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "range": range,
        "plan": plan,
        "days": days,
        "report": agg.finish(),
    })))
}

/// Platform-wide totals, paging through every restaurant.
pub async fn admin_dashboard(
    admin: AdminUser,
    query: web::Query<AnalyticsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let range = AnalyticsRange::parse(query.range.as_deref())?;
    let days = range.days();
    let (start, end) = window(days, Utc::now().date_naive());
    let mut agg = Aggregator::new(start, end);

    let mut after = None;
    loop {
        let page = state.db.restaurant_ids_after(after, ADMIN_PAGE_SIZE).await?;
        if page.is_empty() {
            break;
        }
        collect(&state.db, &page, start, end, &mut agg).await?;
        if (page.len() as i64) < ADMIN_PAGE_SIZE {
            break;
        }
        after = page.last().copied();
    }

    let report = agg.finish();
    info!(admin_id = %admin.0.id, restaurants = report.restaurants, days, "Admin analytics served");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "range": range,
        "days": days,
        "report": report,
    })))
}
