use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;
use async_trait::async_trait;
use crates::domain::{
    entities::user_profiles::{UpdateSubscriptionEntity, UserProfileEntity},
    repositories::user_profiles::UserProfileRepository,
    value_objects::customer_claims::CustomerClaim,
};

/// Profile store kept in memory, for tests that need state across calls.
#[derive(Default)]
pub(crate) struct InMemoryUserProfiles {
    profiles: Mutex<HashMap<String, UserProfileEntity>>,
}

impl InMemoryUserProfiles {
    pub(crate) fn with_profile(self, profile: UserProfileEntity) -> Self {
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.user_id.clone(), profile);
        self
    }

    pub(crate) fn profile(&self, user_id: &str) -> Option<UserProfileEntity> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryUserProfiles {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfileEntity>> {
        Ok(self.profile(user_id))
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserProfileEntity>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .find(|profile| profile.stripe_customer_id() == Some(stripe_customer_id))
            .cloned())
    }

    async fn claim_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
    ) -> Result<CustomerClaim> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfileEntity {
                user_id: user_id.to_string(),
                ..Default::default()
            });

        if let Some(existing) = profile.stripe_customer_id() {
            return Ok(CustomerClaim::AlreadyClaimed(existing.to_string()));
        }

        profile.stripe_customer_id = Some(stripe_customer_id.to_string());
        Ok(CustomerClaim::Claimed)
    }

    async fn update_subscription(
        &self,
        user_id: &str,
        update: &UpdateSubscriptionEntity,
    ) -> Result<()> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfileEntity {
                user_id: user_id.to_string(),
                ..Default::default()
            });

        profile.plan_id = Some(update.plan_id.clone());
        profile.plan_name = Some(update.plan_name.clone());
        profile.subscription_status = Some(update.subscription_status.clone());
        profile.subscription_end_date = Some(update.subscription_end_date);
        Ok(())
    }
}
