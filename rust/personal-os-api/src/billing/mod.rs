//! Subscription billing.
//!
//! The local `subscriptions` table mirrors the payment provider's view of a
//! user's subscription. Webhooks keep it current; checkout and portal hand
//! the user over to the provider's hosted pages.

pub mod client;
pub mod events;
pub mod signature;

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::config::BillingConfig;
use crate::database::{Database, SubscriptionRepository, SubscriptionUpsert, UserRepository};
use crate::domain::{Subscription, SubscriptionStatus};
use crate::error::{AppError, AppResult};

pub use client::{CheckoutRequest, PaymentProvider, StripeClient};
pub use events::{CheckoutSession, EventKind, ProviderSubscription, WebhookEvent};
pub use signature::{SignatureError, compute_signature, verify_signature};

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// What happened to a verified webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The mirror was written.
    Applied,
    /// Handled type, but no user to attach it to.
    Skipped,
    /// Event type we do not track.
    Ignored,
}

/// Redirect to a provider-hosted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectUrl {
    pub url: String,
}

#[derive(Clone)]
pub struct BillingService {
    db: Database,
    provider: Option<Arc<dyn PaymentProvider>>,
    config: BillingConfig,
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("provider_configured", &self.provider.is_some())
            .field("webhook_secret_configured", &self.config.webhook_secret.is_some())
            .finish()
    }
}

impl BillingService {
    #[must_use]
    pub fn new(db: Database, provider: Option<Arc<dyn PaymentProvider>>, config: BillingConfig) -> Self {
        Self { db, provider, config }
    }

    /// Build the provider client from configuration, if a secret key is set.
    pub fn from_config(db: Database, config: &BillingConfig) -> anyhow::Result<Self> {
        let provider = match config.secret_key.as_deref() {
            Some(key) => {
                let client = StripeClient::new(&config.api_base, key)?;
                Some(Arc::new(client) as Arc<dyn PaymentProvider>)
            }
            None => None,
        };
        Ok(Self::new(db, provider, config.clone()))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> AppResult<&Arc<dyn PaymentProvider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| AppError::unavailable("Billing is not configured"))
    }

    /// Verify and apply one webhook delivery. `now` is unix seconds.
    ///
    /// Verification failures are `Validation` and touch nothing. Failures
    /// after verification are `Internal` so the provider redelivers.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: i64,
    ) -> AppResult<WebhookOutcome> {
        let signature =
            signature.ok_or_else(|| AppError::validation("Missing stripe-signature header"))?;
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Webhook secret not configured")))?;

        if let Err(err) = verify_signature(payload, signature, secret, self.config.webhook_tolerance_secs, now) {
            tracing::warn!(error = %err, "Webhook signature verification failed");
            return Err(AppError::validation("Invalid signature"));
        }

        let event: WebhookEvent =
            serde_json::from_slice(payload).context("Webhook payload is not an event")?;
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook received");

        match event.kind() {
            EventKind::CheckoutCompleted => {
                let session: CheckoutSession = serde_json::from_value(event.data.object)
                    .context("Malformed checkout session")?;
                self.apply_checkout(&session).await
            }
            EventKind::SubscriptionUpdated | EventKind::SubscriptionDeleted => {
                let subscription: ProviderSubscription = serde_json::from_value(event.data.object)
                    .context("Malformed subscription")?;
                self.apply_subscription(&subscription).await
            }
            EventKind::Other => {
                tracing::debug!(event_type = %event.event_type, "Unhandled webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// The user id if it names a known account.
    async fn known_user(&self, user_id: Option<&str>, source: &str) -> AppResult<Option<String>> {
        let Some(user_id) = user_id else {
            tracing::warn!(source, "No userId in webhook metadata");
            return Ok(None);
        };
        if self.db.get_user(user_id).await?.is_none() {
            tracing::warn!(source, user_id = %user_id, "Webhook names an unknown user");
            return Ok(None);
        }
        Ok(Some(user_id.to_string()))
    }

    async fn apply_checkout(&self, session: &CheckoutSession) -> AppResult<WebhookOutcome> {
        let Some(user_id) = self.known_user(session.user_id(), "checkout").await? else {
            return Ok(WebhookOutcome::Skipped);
        };
        let customer_id = session
            .customer
            .clone()
            .context("Checkout session has no customer")?;

        let upsert = match (&self.provider, &session.subscription) {
            (Some(provider), Some(subscription_id)) => {
                let subscription = provider.retrieve_subscription(subscription_id).await?;
                SubscriptionUpsert {
                    user_id: user_id.clone(),
                    stripe_customer_id: customer_id,
                    stripe_subscription_id: Some(subscription_id.clone()),
                    stripe_price_id: subscription.price_id(),
                    stripe_current_period_end: subscription.period_end(),
                    status: parse_status(&subscription.status)?,
                }
            }
            // Without a client the completed checkout is all we know.
            _ => SubscriptionUpsert {
                user_id: user_id.clone(),
                stripe_customer_id: customer_id,
                stripe_subscription_id: session.subscription.clone(),
                stripe_price_id: self.config.price_id.clone(),
                stripe_current_period_end: None,
                status: SubscriptionStatus::Active,
            },
        };

        let saved = self.db.upsert_subscription(&upsert).await?;
        tracing::info!(user_id = %user_id, status = %saved.status, "Subscription recorded from checkout");
        Ok(WebhookOutcome::Applied)
    }

    async fn apply_subscription(&self, subscription: &ProviderSubscription) -> AppResult<WebhookOutcome> {
        let Some(user_id) = self.known_user(subscription.user_id(), "subscription").await? else {
            return Ok(WebhookOutcome::Skipped);
        };

        let upsert = SubscriptionUpsert {
            user_id: user_id.clone(),
            stripe_customer_id: subscription.customer.clone(),
            stripe_subscription_id: Some(subscription.id.clone()),
            stripe_price_id: subscription.price_id(),
            stripe_current_period_end: subscription.period_end(),
            status: parse_status(&subscription.status)?,
        };
        let saved = self.db.upsert_subscription(&upsert).await?;
        tracing::info!(user_id = %user_id, status = %saved.status, "Subscription updated");
        Ok(WebhookOutcome::Applied)
    }

    /// The caller's mirror record, if any.
    pub async fn subscription(&self, user_id: &str) -> AppResult<Option<Subscription>> {
        Ok(self.db.get_subscription(user_id).await?)
    }

    /// Start a hosted checkout for the configured price.
    pub async fn checkout(&self, user_id: &str) -> AppResult<RedirectUrl> {
        let provider = self.provider()?;
        let price_id = self
            .config
            .price_id
            .clone()
            .ok_or_else(|| AppError::unavailable("Billing price is not configured"))?;

        let existing = self.db.get_subscription(user_id).await?;
        if existing
            .as_ref()
            .is_some_and(|sub| sub.status == SubscriptionStatus::Active)
        {
            return Err(AppError::validation("You already have an active subscription"));
        }

        let customer_id = match existing {
            Some(sub) => sub.stripe_customer_id,
            None => {
                let user = self
                    .db
                    .get_user(user_id)
                    .await?
                    .ok_or(AppError::NotFound("User"))?;
                provider
                    .create_customer(&user.email, user.name.as_deref(), user_id)
                    .await
                    .map_err(provider_error)?
            }
        };

        let app_url = self.config.app_url.trim_end_matches('/');
        let request = CheckoutRequest {
            customer_id,
            price_id,
            user_id: user_id.to_string(),
            success_url: format!("{app_url}/dashboard?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{app_url}/dashboard/billing"),
        };
        let url = provider
            .create_checkout_session(&request)
            .await
            .map_err(provider_error)?;
        tracing::info!(user_id = %user_id, "Checkout session created");
        Ok(RedirectUrl { url })
    }

    /// Open the self-service portal for an existing customer.
    pub async fn portal(&self, user_id: &str) -> AppResult<RedirectUrl> {
        let provider = self.provider()?;
        let subscription = self
            .db
            .get_subscription(user_id)
            .await?
            .ok_or(AppError::NotFound("Subscription"))?;

        let return_url = format!("{}/dashboard/billing", self.config.app_url.trim_end_matches('/'));
        let url = provider
            .create_portal_session(&subscription.stripe_customer_id, &return_url)
            .await
            .map_err(provider_error)?;
        Ok(RedirectUrl { url })
    }
}

fn parse_status(raw: &str) -> AppResult<SubscriptionStatus> {
    raw.parse::<SubscriptionStatus>()
        .map_err(|msg| AppError::Internal(anyhow::anyhow!(msg)))
}

fn provider_error(err: anyhow::Error) -> AppError {
    tracing::warn!(error = %format!("{err:#}"), "Payment provider call failed");
    AppError::unavailable("Payment provider is unavailable")
}
