pub mod checkout_sessions;
pub mod portal_sessions;
pub mod stripe_webhook;
