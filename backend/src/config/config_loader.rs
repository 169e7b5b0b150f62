use std::str::FromStr;

use anyhow::{Context, Result};
use crates::{
    domain::value_objects::plans::{ANNUAL_PLAN_LABEL, ANNUAL_PRICE_ID, MONTHLY_PLAN_LABEL, PlanCatalog},
    infra::{
        firestore::{firestore_connection::FirestoreCredentials, service_account::ServiceAccountKey},
        repositories::user_profiles::USER_PROFILES_COLLECTION,
    },
};
use tracing::warn;

use super::{
    config_model::{BackendServer, DotEnvyConfig, Firestore, Stripe},
    stage::Stage,
};

const DEFAULT_PORT: u16 = 8888;
const DEFAULT_BODY_LIMIT_MB: u64 = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMULATOR_PROJECT_ID: &str = "demo-project";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from an arbitrary variable source.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let env = Env { lookup };

    let backend_server = BackendServer {
        port: env.parsed_or("SERVER_PORT", DEFAULT_PORT)?,
        body_limit: env.parsed_or("SERVER_BODY_LIMIT", DEFAULT_BODY_LIMIT_MB)?,
        timeout: env.parsed_or("SERVER_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
    };

    let stage = match env.optional("STAGE") {
        Some(raw) => Stage::try_from(raw.as_str()).unwrap_or_else(|err| {
            warn!(error = %err, "config: falling back to the local stage");
            Stage::default()
        }),
        None => Stage::default(),
    };

    let stripe = Stripe {
        secret_key: env.required("STRIPE_SECRET_KEY")?,
        webhook_secret: env.required("STRIPE_WEBHOOK_SECRET")?,
        api_base: env.optional("STRIPE_API_BASE"),
        plan_catalog: plan_catalog(&env)?,
    };

    let firestore = firestore(&env)?;

    Ok(DotEnvyConfig {
        backend_server,
        stage,
        stripe,
        firestore,
    })
}

fn plan_catalog<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<PlanCatalog> {
    let default_label = env
        .optional("STRIPE_DEFAULT_PLAN_LABEL")
        .unwrap_or_else(|| MONTHLY_PLAN_LABEL.to_string());
    let annual_price_id = env
        .optional("STRIPE_ANNUAL_PRICE_ID")
        .unwrap_or_else(|| ANNUAL_PRICE_ID.to_string());

    let mut catalog = PlanCatalog::new(default_label).with_label(annual_price_id, ANNUAL_PLAN_LABEL);

    if let Some(raw) = env.optional("STRIPE_PLAN_LABELS") {
        let pairs = PlanCatalog::parse_labels(&raw).context("STRIPE_PLAN_LABELS is invalid")?;
        for (price_id, label) in pairs {
            catalog = catalog.with_label(price_id, label);
        }
    }

    Ok(catalog)
}

fn firestore<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Firestore> {
    let project_override = env.optional("FIRESTORE_PROJECT_ID");
    let profiles_collection = env
        .optional("FIRESTORE_PROFILES_COLLECTION")
        .unwrap_or_else(|| USER_PROFILES_COLLECTION.to_string());

    if let Some(host) = env.optional("FIRESTORE_EMULATOR_HOST") {
        return Ok(Firestore {
            project_id: project_override.unwrap_or_else(|| DEFAULT_EMULATOR_PROJECT_ID.to_string()),
            credentials: FirestoreCredentials::Emulator { host },
            profiles_collection,
        });
    }

    let raw_key = env.required("FIREBASE_SERVICE_ACCOUNT")?;
    let key = ServiceAccountKey::from_json(&raw_key).context("FIREBASE_SERVICE_ACCOUNT is invalid")?;

    Ok(Firestore {
        project_id: project_override.unwrap_or_else(|| key.project_id.clone()),
        credentials: FirestoreCredentials::ServiceAccount(key),
        profiles_collection,
    })
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .with_context(|| format!("{key} is missing"))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
            None => Ok(default),
        }
    }
}
