use crates::{
    domain::value_objects::plans::PlanCatalog,
    infra::firestore::firestore_connection::FirestoreCredentials,
};

use super::stage::Stage;

#[derive(Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub stage: Stage,
    pub stripe: Stripe,
    pub firestore: Firestore,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: Option<String>,
    pub plan_catalog: PlanCatalog,
}

#[derive(Debug, Clone)]
pub struct Firestore {
    pub project_id: String,
    pub credentials: FirestoreCredentials,
    pub profiles_collection: String,
}
