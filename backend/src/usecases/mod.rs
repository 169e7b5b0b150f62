pub mod billing_errors;
pub mod checkout_sessions;
pub mod portal_sessions;
pub mod stripe_gateway;
pub mod stripe_webhook;
#[cfg(test)]
pub(crate) mod test_support;
