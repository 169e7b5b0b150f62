use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::service_account::ServiceAccountKey;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
/// The emulator accepts this bearer token as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide credential binding to Firestore.
///
/// The first caller exchanges the service-account assertion for an access
/// token; later callers reuse it until shortly before it expires. The mutex is
/// held across the exchange so concurrent first requests trigger one exchange.
pub struct AccessTokenProvider {
    http: reqwest::Client,
    service_account: Option<ServiceAccountKey>,
    cached: Mutex<Option<AccessToken>>,
}

impl AccessTokenProvider {
    pub fn service_account(http: reqwest::Client, key: ServiceAccountKey) -> Self {
        Self {
            http,
            service_account: Some(key),
            cached: Mutex::new(None),
        }
    }

    pub fn emulator(http: reqwest::Client) -> Self {
        Self {
            http,
            service_account: None,
            cached: Mutex::new(None),
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn bearer_token(&self) -> Result<String> {
        let Some(key) = self.service_account.as_ref() else {
            return Ok(EMULATOR_TOKEN.to_string());
        };

        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange(key, now).await?;
        let value = token.value.clone();
        *cached = Some(token);

        Ok(value)
    }

    async fn exchange(&self, key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<AccessToken> {
        let assertion = key.signed_assertion(DATASTORE_SCOPE, now)?;

        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("failed to reach the OAuth2 token endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(
                status = %status,
                client_email = %key.client_email,
                response_body = %body,
                "firestore: service account token exchange failed"
            );
            bail!("service account token exchange failed (status {status})");
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .context("token endpoint returned an unexpected body")?;
        let lifetime = parsed.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        info!(
            client_email = %key.client_email,
            expires_in = lifetime,
            "firestore: access token refreshed"
        );

        Ok(AccessToken {
            value: parsed.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}
