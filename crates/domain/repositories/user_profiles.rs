use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::user_profiles::{UpdateSubscriptionEntity, UserProfileEntity},
    value_objects::customer_claims::CustomerClaim,
};

#[automock]
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfileEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserProfileEntity>>;

    /// Stores `stripe_customer_id` on the profile only if it has none yet.
    /// Creates the document when it does not exist.
    async fn claim_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
    ) -> Result<CustomerClaim>;

    async fn update_subscription(
        &self,
        user_id: &str,
        update: &UpdateSubscriptionEntity,
    ) -> Result<()>;
}
