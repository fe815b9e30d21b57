use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::db::models::Plan;
use crate::error::{AppError, BillingError};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub struct CheckoutRequest<'a> {
    pub customer_id: &'a str,
    pub restaurant_id: Uuid,
    pub plan: Plan,
}

/// Thin client over the Stripe REST endpoints the billing flow needs.
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    pub fn price_for(&self, plan: Plan) -> Result<&str, BillingError> {
        let price = match plan {
            Plan::Pro => self.config.pro_price_id.as_str(),
            Plan::Business => self.config.business_price_id.as_str(),
            Plan::Free => "",
        };
        if price.is_empty() {
            Err(BillingError::MissingPrice(plan.as_str().to_string()))
        } else {
            Ok(price)
        }
    }

    /// Reverse of [`price_for`](Self::price_for), used when Stripe reports a price change.
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        if !self.config.pro_price_id.is_empty() && price_id == self.config.pro_price_id {
            Some(Plan::Pro)
        } else if !self.config.business_price_id.is_empty() && price_id == self.config.business_price_id {
            Some(Plan::Business)
        } else {
            None
        }
    }

    pub async fn create_customer(
        &self,
        email: &str,
        restaurant_id: Uuid,
        restaurant_name: &str,
    ) -> Result<String, AppError> {
        let restaurant_id = restaurant_id.to_string();
        let params = [
            ("email", email),
            ("name", restaurant_name),
            ("metadata[restaurant_id]", restaurant_id.as_str()),
        ];
        let customer: Customer = self.post("/v1/customers", &params).await?;
        info!(customer_id = %customer.id, "Created Stripe customer");
        Ok(customer.id)
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, AppError> {
        let price = self.price_for(request.plan)?;
        let restaurant_id = request.restaurant_id.to_string();
        let params = [
            ("mode", "subscription"),
            ("customer", request.customer_id),
            ("client_reference_id", restaurant_id.as_str()),
            ("line_items[0][price]", price),
            ("line_items[0][quantity]", "1"),
            ("success_url", self.config.success_url.as_str()),
            ("cancel_url", self.config.cancel_url.as_str()),
            ("metadata[restaurant_id]", restaurant_id.as_str()),
            ("metadata[plan]", request.plan.as_str()),
            ("subscription_data[metadata][restaurant_id]", restaurant_id.as_str()),
            ("subscription_data[metadata][plan]", request.plan.as_str()),
        ];
        self.post("/v1/checkout/sessions", &params).await
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        let params = [("customer", customer_id), ("return_url", return_url)];
        self.post("/v1/billing_portal/sessions", &params).await
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => format!(
                "{} ({})",
                body.error.message.unwrap_or_else(|| "unknown error".into()),
                body.error.kind.unwrap_or_else(|| status.to_string())
            ),
            Err(_) => status.to_string(),
        };
        error!(%path, %message, "Stripe request failed");
        Err(BillingError::ApiError(message).into())
    }
}
