//! Subscription billing through Stripe: plan entitlements, Checkout and
//! billing-portal sessions, and the signed webhook that keeps the local
//! `subscriptions` table in step with Stripe.

pub mod handlers;
pub mod plans;
pub mod stripe;
pub mod webhook;

pub use plans::{effective_plan, resolve_plan, EffectivePlan, PlanSummary};
pub use stripe::StripeClient;
pub use webhook::{apply_event, verify_signature, StripeEvent, WebhookOutcome};
