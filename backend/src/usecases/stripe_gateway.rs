use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{CreateCheckoutSession, StripeClient, StripeEvent};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, user_id: String, email: Option<String>) -> AnyResult<String>;

    async fn delete_customer(&self, customer_id: String) -> AnyResult<()>;

    async fn create_checkout_session(&self, params: CreateCheckoutSession) -> AnyResult<String>;

    async fn create_billing_portal_session(
        &self,
        customer_id: String,
        return_url: String,
    ) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_customer(&self, user_id: String, email: Option<String>) -> AnyResult<String> {
        self.create_customer(&user_id, email.as_deref()).await
    }

    async fn delete_customer(&self, customer_id: String) -> AnyResult<()> {
        self.delete_customer(&customer_id).await
    }

    async fn create_checkout_session(&self, params: CreateCheckoutSession) -> AnyResult<String> {
        self.create_checkout_session(&params).await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: String,
        return_url: String,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(&customer_id, &return_url)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
