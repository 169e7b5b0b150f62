use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::infra::firestore::firestore_connection;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let firestore = firestore_connection::establish_connection(
        &dotenvy_env.firestore.project_id,
        dotenvy_env.firestore.credentials.clone(),
    )?;
    info!(
        project_id = %dotenvy_env.firestore.project_id,
        "Firestore client has been configured"
    );

    http_serve::start(Arc::new(dotenvy_env), Arc::new(firestore)).await?;

    Ok(())
}
