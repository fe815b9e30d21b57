use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{Plan, Subscription, SubscriptionStatus};
use crate::db::DbOperations;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectivePlan {
    pub plan: Plan,
    /// Trial ran out without a paid subscription; the row should be downgraded.
    pub trial_expired: bool,
}

impl EffectivePlan {
    fn of(plan: Plan) -> Self {
        Self { plan, trial_expired: false }
    }
}

/// Plan a restaurant is entitled to at `now`.
pub fn effective_plan(subscription: Option<&Subscription>, now: DateTime<Utc>) -> EffectivePlan {
    let Some(sub) = subscription else {
        return EffectivePlan::of(Plan::Free);
    };

    match sub.status {
        SubscriptionStatus::Active | SubscriptionStatus::PastDue => EffectivePlan::of(sub.plan),
        SubscriptionStatus::Canceled => EffectivePlan::of(Plan::Free),
        SubscriptionStatus::Trialing => {
            let in_trial = sub.trial_ends_at.map_or(false, |end| end > now);
            if in_trial || sub.stripe_subscription_id.is_some() {
                // Stripe-managed trials are ended by webhook, not by the clock
                EffectivePlan::of(sub.plan)
            } else {
                EffectivePlan {
                    plan: Plan::Free,
                    trial_expired: true,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub plan: Plan,
    pub status: Option<SubscriptionStatus>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub has_billing_account: bool,
}

/// Loads the restaurant's plan, persisting a downgrade when its trial has lapsed.
pub async fn resolve_plan(db: &DbOperations, restaurant_id: Uuid) -> Result<PlanSummary, AppError> {
    let now = Utc::now();
    let mut subscription = db.get_subscription(restaurant_id).await?;
    let effective = effective_plan(subscription.as_ref(), now);

    if effective.trial_expired {
        info!(%restaurant_id, "Trial expired without payment, downgrading to free");
        if let Some(downgraded) = db.downgrade_expired_trial(restaurant_id, now).await? {
            subscription = Some(downgraded);
        }
    }

    Ok(PlanSummary {
        plan: effective.plan,
        status: subscription.as_ref().map(|s| s.status),
        trial_ends_at: subscription.as_ref().and_then(|s| s.trial_ends_at),
        current_period_end: subscription.as_ref().and_then(|s| s.current_period_end),
        has_billing_account: subscription
            .as_ref()
            .map_or(false, |s| s.stripe_customer_id.is_some()),
    })
}
