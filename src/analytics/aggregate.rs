use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::db::models::{CampaignClicks, DailyStat, DeviceCount, Plan};
use crate::error::AppError;

/// Restaurant ids per query when aggregating.
pub const AGGREGATION_CHUNK: usize = 100;
/// Restaurant ids fetched per page by the admin-wide aggregation.
pub const ADMIN_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
    #[serde(rename = "365d")]
    Year,
}

impl AnalyticsRange {
    pub fn parse(value: Option<&str>) -> Result<Self, AppError> {
        match value.map(str::trim) {
            None | Some("") | Some("30d") => Ok(AnalyticsRange::Month),
            Some("7d") => Ok(AnalyticsRange::Week),
            Some("90d") => Ok(AnalyticsRange::Quarter),
            Some("365d") => Ok(AnalyticsRange::Year),
            Some(other) => Err(AppError::ValidationError(format!(
                "unknown range {}, expected 7d, 30d, 90d or 365d",
                other
            ))),
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            AnalyticsRange::Week => 7,
            AnalyticsRange::Month => 30,
            AnalyticsRange::Quarter => 90,
            AnalyticsRange::Year => 365,
        }
    }

    /// Days actually reported once the plan's history limit is applied.
    pub fn capped_days(&self, plan: Plan) -> i64 {
        self.days().min(plan.analytics_history_days())
    }
}

/// Inclusive `(start, end)` covering `days` days ending on `today`.
pub fn window(days: i64, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(days.max(1) - 1), today)
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub page_views: i64,
    pub phone_clicks: i64,
    pub website_clicks: i64,
    pub directions_clicks: i64,
    pub reservation_clicks: i64,
    pub menu_clicks: i64,
    pub reservation_requests: i64,
}

impl Totals {
    fn add(&mut self, row: &DailyStat) {
        self.page_views += row.page_views;
        self.phone_clicks += row.phone_clicks;
        self.website_clicks += row.website_clicks;
        self.directions_clicks += row.directions_clicks;
        self.reservation_clicks += row.reservation_clicks;
        self.menu_clicks += row.menu_clicks;
        self.reservation_requests += row.reservation_requests;
    }

    fn merge(&mut self, other: &Totals) {
        self.page_views += other.page_views;
        self.phone_clicks += other.phone_clicks;
        self.website_clicks += other.website_clicks;
        self.directions_clicks += other.directions_clicks;
        self.reservation_clicks += other.reservation_clicks;
        self.menu_clicks += other.menu_clicks;
        self.reservation_requests += other.reservation_requests;
    }

    /// Visitor actions other than viewing the page.
    pub fn interactions(&self) -> i64 {
        self.phone_clicks
            + self.website_clicks
            + self.directions_clicks
            + self.reservation_clicks
            + self.menu_clicks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub day: NaiveDate,
    #[serde(flatten)]
    pub totals: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub restaurants: usize,
    pub totals: Totals,
    pub interactions: i64,
    pub series: Vec<SeriesPoint>,
    pub campaigns: Vec<CampaignClicks>,
    pub devices: Vec<DeviceCount>,
}

/// Merges per-chunk query results into one report.
#[derive(Debug)]
pub struct Aggregator {
    start: NaiveDate,
    end: NaiveDate,
    restaurants: usize,
    by_day: BTreeMap<NaiveDate, Totals>,
    campaigns: HashMap<Uuid, CampaignClicks>,
    devices: HashMap<String, i64>,
}

impl Aggregator {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            restaurants: 0,
            by_day: BTreeMap::new(),
            campaigns: HashMap::new(),
            devices: HashMap::new(),
        }
    }

    pub fn add_restaurants(&mut self, count: usize) {
        self.restaurants += count;
    }

    /// Rows outside the window are ignored.
    pub fn add_stats(&mut self, rows: &[DailyStat]) {
        for row in rows.iter().filter(|r| r.day >= self.start && r.day <= self.end) {
            self.by_day.entry(row.day).or_default().add(row);
        }
    }

    pub fn add_campaigns(&mut self, rows: Vec<CampaignClicks>) {
        for row in rows {
            self.campaigns
                .entry(row.campaign_id)
                .and_modify(|c| c.events += row.events)
                .or_insert(row);
        }
    }

    pub fn add_devices(&mut self, rows: Vec<DeviceCount>) {
        for row in rows {
            *self.devices.entry(row.device).or_default() += row.events;
        }
    }

    pub fn finish(self) -> AnalyticsReport {
        let mut totals = Totals::default();
        let mut series = Vec::new();
        let mut day = self.start;
        while day <= self.end {
            let point = self.by_day.get(&day).copied().unwrap_or_default();
            totals.merge(&point);
            series.push(SeriesPoint { day, totals: point });
            day += Duration::days(1);
        }

        let mut campaigns: Vec<CampaignClicks> = self.campaigns.into_values().collect();
        campaigns.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.code.cmp(&b.code)));

        let mut devices: Vec<DeviceCount> = self
            .devices
            .into_iter()
            .map(|(device, events)| DeviceCount { device, events })
            .collect();
        devices.sort_by(|a, b| b.events.cmp(&a.events).then_with(|| a.device.cmp(&b.device)));

        AnalyticsReport {
            start: self.start,
            end: self.end,
            restaurants: self.restaurants,
            interactions: totals.interactions(),
            totals,
            series,
            campaigns,
            devices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn stat(restaurant_id: Uuid, d: &str, page_views: i64, phone_clicks: i64) -> DailyStat {
        DailyStat {
            restaurant_id,
            day: day(d),
            page_views,
            phone_clicks,
            website_clicks: 0,
            directions_clicks: 0,
            reservation_clicks: 0,
            menu_clicks: 1,
            reservation_requests: 0,
        }
    }

    #[test]
    fn range_parsing() {
        assert_eq!(AnalyticsRange::parse(None).unwrap(), AnalyticsRange::Month);
        assert_eq!(AnalyticsRange::parse(Some("7d")).unwrap().days(), 7);
        assert_eq!(AnalyticsRange::parse(Some("365d")).unwrap(), AnalyticsRange::Year);
        assert!(AnalyticsRange::parse(Some("1y")).is_err());
    }

    #[test]
    fn plan_caps_history() {
        assert_eq!(AnalyticsRange::Year.capped_days(Plan::Free), 30);
        assert_eq!(AnalyticsRange::Week.capped_days(Plan::Free), 7);
        assert_eq!(AnalyticsRange::Year.capped_days(Plan::Pro), 365);
    }

    #[test]
    fn window_is_inclusive() {
        let (start, end) = window(7, day("2024-03-10"));
        assert_eq!(start, day("2024-03-04"));
        assert_eq!(end, day("2024-03-10"));
        assert_eq!(window(0, day("2024-03-10")).0, day("2024-03-10"));
    }

    #[test]
    fn series_is_zero_filled_and_merged_across_restaurants() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut agg = Aggregator::new(day("2024-03-01"), day("2024-03-05"));
        agg.add_restaurants(2);
        // Two chunks, overlapping on 03-02
        agg.add_stats(&[stat(a, "2024-03-02", 10, 1), stat(a, "2024-03-04", 5, 0)]);
        agg.add_stats(&[stat(b, "2024-03-02", 3, 2), stat(b, "2024-02-28", 99, 99)]);

        let report = agg.finish();
        assert_eq!(report.series.len(), 5);
        assert_eq!(report.series[0].totals, Totals::default());
        assert_eq!(report.series[1].totals.page_views, 13);
        assert_eq!(report.series[1].totals.phone_clicks, 3);
        assert_eq!(report.series[3].totals.page_views, 5);
        assert_eq!(report.totals.page_views, 18);
        assert_eq!(report.totals.menu_clicks, 3);
        assert_eq!(report.interactions, 6);
        assert_eq!(report.restaurants, 2);
    }

    #[test]
    fn campaigns_and_devices_are_summed_and_sorted() {
        let id = Uuid::new_v4();
        let mut agg = Aggregator::new(day("2024-03-01"), day("2024-03-01"));
        let click = |events| CampaignClicks { campaign_id: id, code: "abc12345".into(), name: "Flyer".into(), events };
        agg.add_campaigns(vec![click(2)]);
        agg.add_campaigns(vec![click(3)]);
        agg.add_devices(vec![
            DeviceCount { device: "mobile".into(), events: 4 },
            DeviceCount { device: "desktop".into(), events: 6 },
        ]);
        agg.add_devices(vec![DeviceCount { device: "mobile".into(), events: 4 }]);

        let report = agg.finish();
        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.campaigns[0].events, 5);
        assert_eq!(report.devices[0].device, "mobile");
        assert_eq!(report.devices[0].events, 8);
        assert_eq!(report.devices[1].events, 6);
    }

    #[test]
    fn report_serializes_flat_series() {
        let report = Aggregator::new(day("2024-03-01"), day("2024-03-02")).finish();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["series"][1]["day"], "2024-03-02");
        assert_eq!(json["series"][1]["page_views"], 0);
        assert_eq!(serde_json::to_value(AnalyticsRange::Quarter).unwrap(), "90d");
    }
}
