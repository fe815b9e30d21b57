//! Dashboard analytics built from the daily rollup table.

pub mod aggregate;
pub mod handlers;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::db::DbOperations;
use crate::error::AppError;

pub use aggregate::{
    window, AnalyticsRange, AnalyticsReport, Aggregator, Totals, ADMIN_PAGE_SIZE, AGGREGATION_CHUNK,
};

/// Feeds `restaurant_ids` into `agg`, querying at most
/// [`AGGREGATION_CHUNK`] restaurants at a time.
pub async fn collect(
    db: &DbOperations,
    restaurant_ids: &[Uuid],
    start: NaiveDate,
    end: NaiveDate,
    agg: &mut Aggregator,
) -> Result<(), AppError> {
    let since = aggregate::start_of_day(start);

    for chunk in restaurant_ids.chunks(AGGREGATION_CHUNK) {
        let (stats, campaigns, devices) = futures::try_join!(
            db.daily_stats_for(chunk, start, end),
            db.campaign_clicks_for(chunk, since),
            db.device_counts_for(chunk, since),
        )?;
        agg.add_restaurants(chunk.len());
        agg.add_stats(&stats);
        agg.add_campaigns(campaigns);
        agg.add_devices(devices);
    }
    Ok(())
}
