use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    domain::{
        entities::user_profiles::{UpdateSubscriptionEntity, UserProfileEntity},
        repositories::user_profiles::UserProfileRepository,
        value_objects::customer_claims::CustomerClaim,
    },
    infra::firestore::{
        firestore_connection::{FirestoreClient, PatchOutcome, Precondition},
        values::{Document, Value},
    },
};

pub const USER_PROFILES_COLLECTION: &str = "userProfiles";

/// Read-compare-write rounds before giving up on a profile that keeps changing.
const CLAIM_ATTEMPTS: usize = 3;

mod fields {
    pub const STRIPE_CUSTOMER_ID: &str = "stripeCustomerId";
    pub const PLAN_ID: &str = "planId";
    pub const PLAN_NAME: &str = "planName";
    pub const SUBSCRIPTION_STATUS: &str = "subscriptionStatus";
    pub const SUBSCRIPTION_END_DATE: &str = "subscriptionEndDate";
}

pub struct UserProfileFirestore {
    client: Arc<FirestoreClient>,
    collection: String,
}

impl UserProfileFirestore {
    pub fn new(client: Arc<FirestoreClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }
}

impl From<Document> for UserProfileEntity {
    fn from(document: Document) -> Self {
        let string_field = |key: &str| document.string_field(key).map(str::to_string);

        Self {
            user_id: document.id().to_string(),
            stripe_customer_id: string_field(fields::STRIPE_CUSTOMER_ID),
            plan_id: string_field(fields::PLAN_ID),
            plan_name: string_field(fields::PLAN_NAME),
            subscription_status: string_field(fields::SUBSCRIPTION_STATUS),
            subscription_end_date: document.timestamp_field(fields::SUBSCRIPTION_END_DATE),
        }
    }
}

#[async_trait]
impl UserProfileRepository for UserProfileFirestore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfileEntity>> {
        let document = self.client.get_document(&self.collection, user_id).await?;

        Ok(document.map(UserProfileEntity::from))
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserProfileEntity>> {
        let document = self
            .client
            .find_first_by_field(
                &self.collection,
                fields::STRIPE_CUSTOMER_ID,
                Value::string(stripe_customer_id),
            )
            .await?;

        Ok(document.map(UserProfileEntity::from))
    }

    async fn claim_stripe_customer_id(
        &self,
        user_id: &str,
        stripe_customer_id: &str,
    ) -> Result<CustomerClaim> {
        for attempt in 1..=CLAIM_ATTEMPTS {
            let current = self.client.get_document(&self.collection, user_id).await?;

            let precondition = match current {
                Some(document) => {
                    if let Some(existing) = document
                        .string_field(fields::STRIPE_CUSTOMER_ID)
                        .filter(|existing| !existing.trim().is_empty())
                    {
                        return Ok(CustomerClaim::AlreadyClaimed(existing.to_string()));
                    }

                    match document.update_time {
                        Some(update_time) => Precondition::UpdateTime(update_time),
                        None => bail!("profile {user_id} was returned without an updateTime"),
                    }
                }
                None => Precondition::Exists(false),
            };

            debug!(
                %user_id,
                attempt,
                precondition = ?precondition,
                "user_profiles: writing stripe customer id"
            );

            let outcome = self
                .client
                .patch_document(
                    &self.collection,
                    user_id,
                    HashMap::from([(
                        fields::STRIPE_CUSTOMER_ID.to_string(),
                        Value::string(stripe_customer_id),
                    )]),
                    Some(precondition),
                )
                .await?;

            match outcome {
                PatchOutcome::Applied(_) => return Ok(CustomerClaim::Claimed),
                PatchOutcome::PreconditionFailed => {
                    warn!(
                        %user_id,
                        attempt,
                        "user_profiles: profile changed while claiming stripe customer id"
                    );
                }
            }
        }

        bail!("profile {user_id} kept changing while claiming a stripe customer id")
    }

    async fn update_subscription(
        &self,
        user_id: &str,
        update: &UpdateSubscriptionEntity,
    ) -> Result<()> {
        let update_fields = HashMap::from([
            (fields::PLAN_ID.to_string(), Value::string(&update.plan_id)),
            (fields::PLAN_NAME.to_string(), Value::string(&update.plan_name)),
            (
                fields::SUBSCRIPTION_STATUS.to_string(),
                Value::string(&update.subscription_status),
            ),
            (
                fields::SUBSCRIPTION_END_DATE.to_string(),
                Value::timestamp(update.subscription_end_date),
            ),
        ]);

        self.client
            .patch_document(&self.collection, user_id, update_fields, None)
            .await?;

        Ok(())
    }
}
