pub mod billing_sessions;
pub mod customer_claims;
pub mod plans;
