use std::sync::Arc;

use crates::domain::{
    repositories::user_profiles::UserProfileRepository,
    value_objects::billing_sessions::{PortalSessionDto, PortalSessionModel, non_blank},
};
use tracing::{error, info, warn};

use super::{
    billing_errors::{BillingError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

pub struct PortalSessionUseCase<R, S>
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    profile_repo: Arc<R>,
    stripe_client: Arc<S>,
}

impl<R, S> PortalSessionUseCase<R, S>
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    pub fn new(profile_repo: Arc<R>, stripe_client: Arc<S>) -> Self {
        Self {
            profile_repo,
            stripe_client,
        }
    }

    /// Opens the Stripe billing portal for a user who already has a customer.
    /// Never creates a customer.
    pub async fn create_portal_session(
        &self,
        model: PortalSessionModel,
    ) -> UseCaseResult<PortalSessionDto> {
        let user_id = non_blank(model.user_id).ok_or_else(|| {
            let err = BillingError::Unauthenticated;
            warn!(
                status = err.status_code().as_u16(),
                "portal: request without a user id"
            );
            err
        })?;

        info!(%user_id, "portal: create portal session requested");

        let customer_id = self
            .profile_repo
            .find_by_user_id(&user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "portal: failed to load user profile");
                BillingError::Internal(err)
            })?
            .and_then(|profile| profile.stripe_customer_id().map(str::to_string))
            .ok_or_else(|| {
                let err = BillingError::CustomerNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "portal: no stripe customer on profile"
                );
                err
            })?;

        let return_url =
            non_blank(model.return_url).ok_or_else(|| BillingError::missing("returnUrl"))?;

        let url = self
            .stripe_client
            .create_billing_portal_session(customer_id.clone(), return_url)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %customer_id,
                    error = ?err,
                    "portal: stripe billing portal session creation failed"
                );
                BillingError::PortalSessionFailed(err)
            })?;

        info!(%user_id, %customer_id, "portal: billing portal session created");

        Ok(PortalSessionDto { url })
    }
}
