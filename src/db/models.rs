use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            role: UserRole::Owner,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: Uuid, token: String, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "claim_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: Uuid,
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
    pub is_claimed: bool,
    pub user_id: Option<Uuid>,
    pub claim_status: Option<ClaimStatus>,
    pub claim_requested_by: Option<Uuid>,
    pub claim_message: Option<String>,
    pub claim_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restaurant {
    pub fn is_owned_by(&self, user: &User) -> bool {
        self.is_claimed && self.user_id == Some(user.id)
    }

    /// Owners manage their own restaurant; admins manage every restaurant.
    pub fn can_be_managed_by(&self, user: &User) -> bool {
        user.is_admin() || self.is_owned_by(user)
    }
}

/// Public projection of a restaurant; hides claim bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct PublicRestaurant {
    pub id: Uuid,
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
    pub is_claimed: bool,
}

impl From<Restaurant> for PublicRestaurant {
    fn from(r: Restaurant) -> Self {
        Self {
            id: r.id,
            number: r.number,
            slug: r.slug,
            name: r.name,
            description: r.description,
            cuisine: r.cuisine,
            address: r.address,
            city: r.city,
            country: r.country,
            country_code: r.country_code,
            phone: r.phone,
            website: r.website,
            reservation_url: r.reservation_url,
            is_claimed: r.is_claimed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RestaurantEmail {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_plan", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "business" => Some(Plan::Business),
            _ => None,
        }
    }

    pub fn campaign_link_limit(&self) -> i64 {
        match self {
            Plan::Free => 1,
            Plan::Pro => 25,
            Plan::Business => 100,
        }
    }

    pub fn analytics_history_days(&self) -> i64 {
        match self {
            Plan::Free => 30,
            Plan::Pro | Plan::Business => 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Maps a Stripe subscription status onto the statuses tracked locally.
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "trialing" => SubscriptionStatus::Trialing,
            "active" => SubscriptionStatus::Active,
            "past_due" | "unpaid" | "incomplete" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new_trial(restaurant_id: Uuid, plan: Plan, trial_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            restaurant_id,
            plan,
            status: SubscriptionStatus::Trialing,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            trial_ends_at: Some(now + chrono::Duration::days(trial_days)),
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignLink {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub code: String,
    pub name: String,
    pub source: Option<String>,
    pub medium: Option<String>,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub event_type: String,
    pub ip_hash: String,
    pub device: String,
    pub referrer: Option<String>,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DailyStat {
    pub restaurant_id: Uuid,
    pub day: NaiveDate,
    pub page_views: i64,
    pub phone_clicks: i64,
    pub website_clicks: i64,
    pub directions_clicks: i64,
    pub reservation_clicks: i64,
    pub menu_clicks: i64,
    pub reservation_requests: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CampaignClicks {
    pub campaign_id: Uuid,
    pub code: String,
    pub name: String,
    pub events: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceCount {
    pub device: String,
    pub events: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReservationRequest {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub party_size: i32,
    pub requested_for: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
