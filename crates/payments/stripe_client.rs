use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Maximum age (either direction) of a signed webhook timestamp.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe REST v1 over reqwest: customers, Checkout, Billing Portal, webhooks.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Deserialize)]
struct IdResp {
    id: String,
}

#[derive(Deserialize)]
struct PortalResp {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: Option<String>,
    pub customer: Option<String>,
    pub status: Option<String>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

/// Parameters of a subscription-mode Checkout Session with a single line item.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCheckoutSession {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub allow_promotion_codes: bool,
}

impl StripeSubscription {
    /// Returns the period end timestamp, falling back to the first item when the
    /// top-level field is absent (newer API versions only set it per item).
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    pub fn price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Form-encoded POST to `path`, decoding the JSON reply on success.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
        operation: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .with_context(|| format!("stripe {operation}: request not sent"))?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp, operation).await);
        }

        resp.json()
            .await
            .with_context(|| format!("stripe {operation}: unexpected response body"))
    }

    /// Logs the Stripe error envelope and turns it into an error value.
    async fn api_error(resp: reqwest::Response, operation: &str) -> anyhow::Error {
        let status = resp.status();
        let request_id = ["request-id", "stripe-request-id"]
            .iter()
            .find_map(|name| resp.headers().get(*name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let details = resp
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<StripeErrorEnvelope>(&body).ok())
            .map(|envelope| envelope.error);
        let details = details.as_ref();

        error!(
            %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.and_then(|d| d.message.as_deref()),
            operation,
            "stripe: api call rejected"
        );

        anyhow!("stripe {operation} failed with status {status} (request_id={request_id:?})")
    }

    /// Creates a Stripe customer linked back to the profile through metadata.
    pub async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String> {
        let mut form = vec![("metadata[firebaseUID]", user_id)];
        if let Some(email) = email {
            form.push(("email", email));
        }

        let customer: IdResp = self.post_form("/v1/customers", &form, "create customer").await?;
        Ok(customer.id)
    }

    /// Removes a customer that lost the race to be stored on a profile.
    pub async fn delete_customer(&self, customer_id: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}/v1/customers/{}", self.api_base, customer_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .context("stripe delete customer: request not sent")?;

        if !resp.status().is_success() {
            return Err(Self::api_error(resp, "delete customer").await);
        }

        Ok(())
    }

    /// Subscription-mode Checkout Session with a single card line item; returns its id.
    pub async fn create_checkout_session(&self, params: &CreateCheckoutSession) -> Result<String> {
        let allow_promotion_codes = params.allow_promotion_codes.to_string();
        let form = [
            ("mode", "subscription"),
            ("customer", params.customer_id.as_str()),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", params.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", params.success_url.as_str()),
            ("cancel_url", params.cancel_url.as_str()),
            ("allow_promotion_codes", allow_promotion_codes.as_str()),
        ];

        let session: IdResp = self
            .post_form("/v1/checkout/sessions", &form, "create checkout session")
            .await?;
        Ok(session.id)
    }

    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        let form = [("customer", customer_id), ("return_url", return_url)];

        let session: PortalResp = self
            .post_form("/v1/billing_portal/sessions", &form, "create billing portal session")
            .await?;
        Ok(session.url)
    }

    /// Authenticates a webhook delivery and parses the event it carries.
    /// See https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        verify_signature_at(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
        )
    }

    /// Reads `data.object` as a subscription; `None` if it does not decode as one.
    pub fn extract_subscription(event: &StripeEvent) -> Option<StripeSubscription> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

/// `stripe-signature` header split into its timestamp and `v1` candidates.
struct SignatureHeader<'a> {
    timestamp: &'a str,
    candidates: Vec<Vec<u8>>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(raw: &'a str) -> Result<Self> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for (key, value) in raw.split(',').filter_map(|part| part.trim().split_once('=')) {
            match key {
                "t" => timestamp = Some(value),
                // Undecodable entries can never match; skip them.
                "v1" => candidates.extend(hex::decode(value).ok()),
                _ => {}
            }
        }

        let timestamp = timestamp.context("stripe-signature has no timestamp")?;
        if candidates.is_empty() {
            bail!("stripe-signature has no usable v1 signature");
        }

        Ok(Self {
            timestamp,
            candidates,
        })
    }
}

/// Checks `signature_header` against `secret` as of `now` (unix seconds), then
/// parses the payload.
pub fn verify_signature_at(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: i64,
) -> Result<StripeEvent> {
    let header = SignatureHeader::parse(signature_header)?;

    let signed_at: i64 = header
        .timestamp
        .parse()
        .context("stripe-signature timestamp is not a number")?;
    let skew = now.checked_sub(signed_at).map(i64::unsigned_abs);
    if !skew.is_some_and(|skew| skew <= SIGNATURE_TOLERANCE_SECS.unsigned_abs()) {
        bail!("stripe-signature timestamp {signed_at} is outside the tolerance window");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| anyhow!("webhook secret rejected by hmac: {err}"))?;
    mac.update(header.timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = header
        .candidates
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());
    if !matched {
        bail!("no v1 signature matches the payload");
    }

    serde_json::from_slice(payload).context("webhook payload is not a stripe event")
}
