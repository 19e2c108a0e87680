//! Payment provider API client.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::events::{ProviderSubscription, USER_ID_KEY};

/// Calls the billing flows make against the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn retrieve_subscription(&self, id: &str) -> anyhow::Result<ProviderSubscription>;

    /// New customer tagged with our user id. Returns the customer id.
    async fn create_customer(&self, email: &str, name: Option<&str>, user_id: &str) -> anyhow::Result<String>;

    /// Hosted checkout for one subscription. Returns the redirect URL.
    async fn create_checkout_session(&self, checkout: &CheckoutRequest) -> anyhow::Result<String>;

    /// Self-service portal. Returns the redirect URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Form-encoded parameters, nested keys in bracket notation.
    fn form(&self) -> Vec<(String, String)> {
        vec![
            ("customer".into(), self.customer_id.clone()),
            ("mode".into(), "subscription".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("line_items[0][price]".into(), self.price_id.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
            (format!("metadata[{USER_ID_KEY}]"), self.user_id.clone()),
            (format!("subscription_data[metadata][{USER_ID_KEY}]"), self.user_id.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Redirect {
    url: Option<String>,
}

/// REST client authenticated with the secret key.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.api_base)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response, action: &str) -> anyhow::Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Payment provider {action} failed ({status}): {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("Unexpected payment provider response to {action}"))
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(String, String)], action: &str) -> anyhow::Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .with_context(|| format!("Payment provider {action} request failed"))?;
        Self::read(response, action).await
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn retrieve_subscription(&self, id: &str) -> anyhow::Result<ProviderSubscription> {
        let response = self
            .client
            .get(self.url(&format!("subscriptions/{id}")))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("Payment provider subscription request failed")?;
        Self::read(response, "subscription retrieval").await
    }

    async fn create_customer(&self, email: &str, name: Option<&str>, user_id: &str) -> anyhow::Result<String> {
        let mut form = vec![
            ("email".to_string(), email.to_string()),
            (format!("metadata[{USER_ID_KEY}]"), user_id.to_string()),
        ];
        if let Some(name) = name {
            form.push(("name".to_string(), name.to_string()));
        }
        let created: Created = self.post_form("customers", &form, "customer creation").await?;
        Ok(created.id)
    }

    async fn create_checkout_session(&self, checkout: &CheckoutRequest) -> anyhow::Result<String> {
        let session: Redirect = self
            .post_form("checkout/sessions", &checkout.form(), "checkout session creation")
            .await?;
        session.url.context("Checkout session has no URL")
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> anyhow::Result<String> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let session: Redirect = self
            .post_form("billing_portal/sessions", &form, "portal session creation")
            .await?;
        session.url.context("Portal session has no URL")
    }
}
