use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use crates::{
    domain::{
        entities::user_profiles::UpdateSubscriptionEntity,
        repositories::user_profiles::UserProfileRepository, value_objects::plans::PlanCatalog,
    },
    payments::stripe_client::{StripeClient, StripeSubscription},
};
use tracing::{error, info, warn};

use super::{
    billing_errors::{BillingError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

/// What an authenticated webhook delivery did. Every variant is answered with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    ProfileUpdated { user_id: String },
    NoMatchingProfile,
    NotASubscription,
    StoreFailed,
}

pub struct StripeWebhookUseCase<R, S>
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    profile_repo: Arc<R>,
    stripe_client: Arc<S>,
    plan_catalog: PlanCatalog,
}

impl<R, S> StripeWebhookUseCase<R, S>
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    pub fn new(profile_repo: Arc<R>, stripe_client: Arc<S>, plan_catalog: PlanCatalog) -> Self {
        Self {
            profile_repo,
            stripe_client,
            plan_catalog,
        }
    }

    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> UseCaseResult<WebhookOutcome> {
        let Some(signature) = signature else {
            let err = BillingError::InvalidSignature;
            warn!(
                status = err.status_code().as_u16(),
                "stripe webhook: missing stripe-signature header"
            );
            return Err(err);
        };

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let verification_err = BillingError::InvalidSignature;
                warn!(
                    error = %err,
                    status = verification_err.status_code().as_u16(),
                    "stripe webhook: verification failed"
                );
                verification_err
            })?;

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            "stripe webhook: event verified"
        );

        let Some(subscription) = StripeClient::extract_subscription(&event) else {
            warn!(event_type = %event.type_, "stripe webhook: event object is not a subscription");
            return Ok(WebhookOutcome::NotASubscription);
        };

        let Some((customer_id, update)) = self.subscription_update(&subscription) else {
            warn!(
                event_type = %event.type_,
                customer_id = ?subscription.customer,
                "stripe webhook: subscription is missing customer, price, status or period end"
            );
            return Ok(WebhookOutcome::NotASubscription);
        };

        let profile = match self
            .profile_repo
            .find_by_stripe_customer_id(&customer_id)
            .await
        {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                info!(%customer_id, "stripe webhook: no profile for customer, ignoring");
                return Ok(WebhookOutcome::NoMatchingProfile);
            }
            Err(err) => {
                error!(
                    %customer_id,
                    db_error = ?err,
                    "stripe webhook: failed to look up profile by customer"
                );
                return Ok(WebhookOutcome::StoreFailed);
            }
        };

        let user_id = profile.user_id;
        if let Err(err) = self.profile_repo.update_subscription(&user_id, &update).await {
            error!(
                %user_id,
                %customer_id,
                db_error = ?err,
                "stripe webhook: failed to update subscription fields"
            );
            return Ok(WebhookOutcome::StoreFailed);
        }

        info!(
            %user_id,
            %customer_id,
            plan_id = %update.plan_id,
            plan_name = %update.plan_name,
            subscription_status = %update.subscription_status,
            subscription_end_date = %update.subscription_end_date,
            "stripe webhook: profile subscription updated"
        );

        Ok(WebhookOutcome::ProfileUpdated { user_id })
    }

    fn subscription_update(
        &self,
        subscription: &StripeSubscription,
    ) -> Option<(String, UpdateSubscriptionEntity)> {
        let customer_id = subscription.customer.clone()?;
        let plan_id = subscription.price_id()?.to_string();
        let subscription_status = subscription.status.clone()?;
        let subscription_end_date = period_end_to_datetime(subscription.period_end()?)?;

        let update = UpdateSubscriptionEntity {
            plan_name: self.plan_catalog.label_for(&plan_id).to_string(),
            plan_id,
            subscription_status,
            subscription_end_date,
        };

        Some((customer_id, update))
    }
}

/// Stripe reports epoch seconds; the profile stores a millisecond timestamp.
fn period_end_to_datetime(epoch_secs: i64) -> Option<DateTime<Utc>> {
    let millis = epoch_secs.checked_mul(1000)?;
    Utc.timestamp_millis_opt(millis).single()
}
