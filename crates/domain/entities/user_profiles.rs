use chrono::{DateTime, Utc};

/// The billing-related slice of a `userProfiles` document.
///
/// Documents carry other fields owned by the registration flow; those are never
/// loaded here and every write is a field-masked merge so they survive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfileEntity {
    pub user_id: String,
    pub stripe_customer_id: Option<String>,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_end_date: Option<DateTime<Utc>>,
}

impl UserProfileEntity {
    /// Customer id stored on the profile, ignoring empty strings.
    pub fn stripe_customer_id(&self) -> Option<&str> {
        self.stripe_customer_id
            .as_deref()
            .filter(|customer_id| !customer_id.trim().is_empty())
    }
}

/// Subscription fields merged into a profile by webhook reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSubscriptionEntity {
    pub plan_id: String,
    pub plan_name: String,
    pub subscription_status: String,
    pub subscription_end_date: DateTime<Utc>,
}
