use std::sync::Arc;

use crates::{
    domain::{
        repositories::user_profiles::UserProfileRepository,
        value_objects::{
            billing_sessions::{CheckoutSessionDto, CheckoutSessionModel, non_blank},
            customer_claims::CustomerClaim,
        },
    },
    payments::stripe_client::CreateCheckoutSession,
};
use tracing::{error, info, warn};

use super::{
    billing_errors::{BillingError, UseCaseResult},
    stripe_gateway::StripeGateway,
};

pub struct CheckoutSessionUseCase<R, S>
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    profile_repo: Arc<R>,
    stripe_client: Arc<S>,
}

impl<R, S> CheckoutSessionUseCase<R, S>
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

    pub async fn create_checkout_session(
        &self,
        model: CheckoutSessionModel,
    ) -> UseCaseResult<CheckoutSessionDto> {
        let user_id = non_blank(model.user_id).ok_or_else(|| {
            let err = BillingError::Unauthenticated;
            warn!(
                status = err.status_code().as_u16(),
                "checkout: request without a user id"
            );
            err
        })?;

        let price_id = non_blank(model.price_id).ok_or_else(|| BillingError::missing("priceId"))?;
        let success_url =
            non_blank(model.success_url).ok_or_else(|| BillingError::missing("successUrl"))?;
        let cancel_url =
            non_blank(model.cancel_url).ok_or_else(|| BillingError::missing("cancelUrl"))?;
        let user_email = non_blank(model.user_email);

        info!(%user_id, %price_id, "checkout: create checkout session requested");

        let customer_id = self.resolve_customer_id(&user_id, user_email).await?;

        let params = CreateCheckoutSession {
            customer_id: customer_id.clone(),
            price_id: price_id.clone(),
            success_url,
            cancel_url,
            allow_promotion_codes: true,
        };

        let session_id = self
            .stripe_client
            .create_checkout_session(params)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %price_id,
                    %customer_id,
                    error = ?err,
                    "checkout: stripe checkout session creation failed"
                );
                BillingError::CheckoutSessionFailed(err)
            })?;

        info!(
            %user_id,
            %customer_id,
            %session_id,
            "checkout: checkout session created"
        );

        Ok(CheckoutSessionDto { session_id })
    }

    /// Returns the profile's Stripe customer, creating and claiming one if needed.
    async fn resolve_customer_id(
        &self,
        user_id: &str,
        user_email: Option<String>,
    ) -> UseCaseResult<String> {
        let profile = self
            .profile_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to load user profile");
                BillingError::Internal(err)
            })?;

        if let Some(customer_id) = profile.as_ref().and_then(|p| p.stripe_customer_id()) {
            info!(%user_id, %customer_id, "checkout: reusing stripe customer");
            return Ok(customer_id.to_string());
        }

        let created = self
            .stripe_client
            .create_customer(user_id.to_string(), user_email)
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "checkout: stripe customer creation failed");
                BillingError::Internal(err)
            })?;
        info!(%user_id, customer_id = %created, "checkout: stripe customer created");

        match self
            .profile_repo
            .claim_stripe_customer_id(user_id, &created)
            .await
        {
            Ok(CustomerClaim::Claimed) => Ok(created),
            Ok(CustomerClaim::AlreadyClaimed(existing)) => {
                warn!(
                    %user_id,
                    customer_id = %existing,
                    orphan_customer_id = %created,
                    "checkout: profile was claimed concurrently, discarding new customer"
                );
                self.discard_customer(user_id, created).await;
                Ok(existing)
            }
            Err(err) => {
                error!(
                    %user_id,
                    customer_id = %created,
                    db_error = ?err,
                    "checkout: failed to store stripe customer id"
                );
                self.discard_customer(user_id, created).await;
                Err(BillingError::Internal(err))
            }
        }
    }

    async fn discard_customer(&self, user_id: &str, customer_id: String) {
        if let Err(err) = self.stripe_client.delete_customer(customer_id.clone()).await {
            warn!(
                %user_id,
                %customer_id,
                error = ?err,
                "checkout: failed to delete orphaned stripe customer"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{stripe_gateway::MockStripeGateway, test_support::InMemoryUserProfiles};
    use anyhow::anyhow;
    use crates::domain::{
        entities::user_profiles::UserProfileEntity,
        repositories::user_profiles::MockUserProfileRepository,
    };

    fn model() -> CheckoutSessionModel {
        CheckoutSessionModel {
            price_id: Some("price_monthly".to_string()),
            success_url: Some("https://app.example.com/success".to_string()),
            cancel_url: Some("https://app.example.com/cancel".to_string()),
            user_id: Some("uid-1".to_string()),
            user_email: Some("ada@example.com".to_string()),
        }
    }

    fn profile_with_customer(customer_id: &str) -> UserProfileEntity {
        UserProfileEntity {
            user_id: "uid-1".to_string(),
            stripe_customer_id: Some(customer_id.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_user_id_is_unauthenticated() {
        let usecase = CheckoutSessionUseCase::new(
            Arc::new(MockUserProfileRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .create_checkout_session(CheckoutSessionModel {
                user_id: Some("   ".to_string()),
                ..model()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Unauthenticated));
    }

    #[tokio::test]
    async fn missing_price_is_invalid_request() {
        let usecase = CheckoutSessionUseCase::new(
            Arc::new(MockUserProfileRepository::new()),
            Arc::new(MockStripeGateway::new()),
        );

        let err = usecase
            .create_checkout_session(CheckoutSessionModel {
                price_id: None,
                ..model()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn reuses_existing_customer() {
        let mut profile_repo = MockUserProfileRepository::new();
        let mut stripe = MockStripeGateway::new();

        profile_repo
            .expect_find_by_user_id()
            .withf(|user_id| user_id == "uid-1")
            .returning(|_| Ok(Some(profile_with_customer("cus_existing"))));

        stripe.expect_create_customer().never();
        stripe
            .expect_create_checkout_session()
            .withf(|params| {
                params.customer_id == "cus_existing"
                    && params.price_id == "price_monthly"
                    && params.success_url == "https://app.example.com/success"
                    && params.cancel_url == "https://app.example.com/cancel"
                    && params.allow_promotion_codes
            })
            .times(1)
            .returning(|_| Ok("cs_test_1".to_string()));

        let usecase = CheckoutSessionUseCase::new(Arc::new(profile_repo), Arc::new(stripe));
        let dto = usecase.create_checkout_session(model()).await.unwrap();

        assert_eq!(dto.session_id, "cs_test_1");
    }

    #[tokio::test]
    async fn creates_and_claims_customer_for_new_profile() {
        let mut profile_repo = MockUserProfileRepository::new();
        let mut stripe = MockStripeGateway::new();

        profile_repo.expect_find_by_user_id().returning(|_| Ok(None));
        profile_repo
            .expect_claim_stripe_customer_id()
            .withf(|user_id, customer_id| user_id == "uid-1" && customer_id == "cus_new")
            .times(1)
            .returning(|_, _| Ok(CustomerClaim::Claimed));

        stripe
            .expect_create_customer()
            .withf(|user_id, email| {
                user_id == "uid-1" && email.as_deref() == Some("ada@example.com")
            })
            .times(1)
            .returning(|_, _| Ok("cus_new".to_string()));
        stripe.expect_delete_customer().never();
        stripe
            .expect_create_checkout_session()
            .withf(|params| params.customer_id == "cus_new")
            .returning(|_| Ok("cs_test_2".to_string()));

        let usecase = CheckoutSessionUseCase::new(Arc::new(profile_repo), Arc::new(stripe));
        let dto = usecase.create_checkout_session(model()).await.unwrap();

        assert_eq!(dto.session_id, "cs_test_2");
    }

    #[tokio::test]
    async fn lost_claim_reuses_winner_and_deletes_orphan() {
        let mut profile_repo = MockUserProfileRepository::new();
        let mut stripe = MockStripeGateway::new();

        profile_repo.expect_find_by_user_id().returning(|_| Ok(None));
        profile_repo
            .expect_claim_stripe_customer_id()
            .returning(|_, _| Ok(CustomerClaim::AlreadyClaimed("cus_winner".to_string())));

        stripe
            .expect_create_customer()
            .returning(|_, _| Ok("cus_loser".to_string()));
        stripe
            .expect_delete_customer()
            .withf(|customer_id| customer_id == "cus_loser")
            .times(1)
            .returning(|_| Ok(()));
        stripe
            .expect_create_checkout_session()
            .withf(|params| params.customer_id == "cus_winner")
            .times(1)
            .returning(|_| Ok("cs_test_3".to_string()));

        let usecase = CheckoutSessionUseCase::new(Arc::new(profile_repo), Arc::new(stripe));
        let dto = usecase.create_checkout_session(model()).await.unwrap();

        assert_eq!(dto.session_id, "cs_test_3");
    }

    #[tokio::test]
    async fn stripe_session_failure_is_reported() {
        let mut profile_repo = MockUserProfileRepository::new();
        let mut stripe = MockStripeGateway::new();

        profile_repo
            .expect_find_by_user_id()
            .returning(|_| Ok(Some(profile_with_customer("cus_existing"))));
        stripe
            .expect_create_checkout_session()
            .returning(|_| Err(anyhow!("No such price: 'price_monthly'")));

        let usecase = CheckoutSessionUseCase::new(Arc::new(profile_repo), Arc::new(stripe));
        let err = usecase.create_checkout_session(model()).await.unwrap_err();

        assert!(matches!(err, BillingError::CheckoutSessionFailed(_)));
        assert_eq!(err.to_string(), "Could not create the checkout session.");
    }

    #[tokio::test]
    async fn store_failure_is_internal_and_skips_stripe() {
        let mut profile_repo = MockUserProfileRepository::new();
        let mut stripe = MockStripeGateway::new();

        profile_repo
            .expect_find_by_user_id()
            .returning(|_| Err(anyhow!("firestore unavailable")));
        stripe.expect_create_customer().never();
        stripe.expect_create_checkout_session().never();

        let usecase = CheckoutSessionUseCase::new(Arc::new(profile_repo), Arc::new(stripe));
        let err = usecase.create_checkout_session(model()).await.unwrap_err();

        assert!(matches!(err, BillingError::Internal(_)));
    }

    #[tokio::test]
    async fn serialized_checkouts_create_one_customer() {
        let profiles = Arc::new(InMemoryUserProfiles::default());
        let mut stripe = MockStripeGateway::new();

        stripe
            .expect_create_customer()
            .times(1)
            .returning(|_, _| Ok("cus_only".to_string()));
        stripe
            .expect_create_checkout_session()
            .withf(|params| params.customer_id == "cus_only")
            .times(2)
            .returning(|_| Ok("cs_test".to_string()));

        let usecase = CheckoutSessionUseCase::new(Arc::clone(&profiles), Arc::new(stripe));
        usecase.create_checkout_session(model()).await.unwrap();
        usecase.create_checkout_session(model()).await.unwrap();

        let stored = profiles.profile("uid-1").unwrap();
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_only"));
    }
}
