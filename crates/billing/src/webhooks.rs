//! Stripe webhook handling
//!
//! Verifies Stripe events and feeds subscription lifecycle events into the
//! subscription reconciler. The HTTP route that receives the payload is not
//! part of this crate.

use gatekeeper_shared::WorkspacePlanStatus;
use stripe::{Event, EventObject, EventType, Subscription, Webhook};

use crate::error::{BillingError, BillingResult};
use crate::stripe_client::subscription_data_from_stripe;
use crate::subscriptions::SubscriptionService;
use crate::types::SubscriptionData;

/// What a webhook event led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The workspace plan now has this status
    PlanStatusUpdated(WorkspacePlanStatus),
    /// Subscription event without a determinable status
    NoStatusChange,
    /// Event type this handler does not act on
    Ignored,
}

/// Subscription lifecycle events routed to the reconciler
pub fn is_subscription_event(event_type: &EventType) -> bool {
    matches!(
        event_type,
        EventType::CustomerSubscriptionCreated
            | EventType::CustomerSubscriptionUpdated
            | EventType::CustomerSubscriptionDeleted
    )
}

/// Webhook handler for Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
    subscriptions: SubscriptionService,
}

impl WebhookHandler {
    pub fn new(webhook_secret: String, subscriptions: SubscriptionService) -> Self {
        Self {
            webhook_secret,
            subscriptions,
        }
    }

    /// Verify and parse a Stripe webhook event
    pub fn verify_event(&self, payload: &str, signature: &str) -> BillingResult<Event> {
        Webhook::construct_event(payload, signature, &self.webhook_secret).map_err(|e| {
            tracing::warn!(
                payload_len = payload.len(),
                error = %e,
                "Stripe webhook signature verification failed"
            );
            BillingError::WebhookSignatureInvalid
        })
    }

    /// Handle a verified Stripe event
    pub async fn handle_event(&self, event: Event) -> BillingResult<WebhookOutcome> {
        if !is_subscription_event(&event.type_) {
            tracing::info!(
                event_type = %event.type_,
                event_id = %event.id,
                "Received unhandled Stripe event type - no handler configured"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let event_id = event.id.to_string();
        let event_type = event.type_.to_string();
        let subscription = Self::extract_subscription(event)?;

        tracing::info!(
            event_type = %event_type,
            event_id = %event_id,
            subscription_id = %subscription.id,
            "Processing Stripe subscription event"
        );

        self.handle_subscription_data(subscription_data_from_stripe(&subscription))
            .await
    }

    /// Reconcile a subscription snapshot taken from a provider event
    pub async fn handle_subscription_data(
        &self,
        subscription_data: SubscriptionData,
    ) -> BillingResult<WebhookOutcome> {
        let subscription_id = subscription_data.subscription_id.clone();
        match self
            .subscriptions
            .handle_subscription_update(subscription_data)
            .await
        {
            Ok(Some(status)) => Ok(WebhookOutcome::PlanStatusUpdated(status)),
            Ok(None) => Ok(WebhookOutcome::NoStatusChange),
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to reconcile subscription from webhook"
                );
                Err(e)
            }
        }
    }

    fn extract_subscription(event: Event) -> BillingResult<Subscription> {
        match event.data.object {
            EventObject::Subscription(subscription) => Ok(subscription),
            _ => Err(BillingError::WebhookEventNotSupported(
                "Expected Subscription".to_string(),
            )),
        }
    }
}
