use crate::{
    axum_http::{
        default_routers,
        routers::{checkout_sessions, portal_sessions, stripe_webhook},
    },
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::{
        firestore::firestore_connection::FirestoreClient,
        repositories::user_profiles::UserProfileFirestore,
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, firestore: Arc<FirestoreClient>) -> Result<()> {
    let app = app(&config, firestore)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        stage = %config.stage,
        "Server is running on port {}",
        config.backend_server.port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn app(config: &DotEnvyConfig, firestore: Arc<FirestoreClient>) -> Result<Router> {
    let profile_repo = Arc::new(UserProfileFirestore::new(
        firestore,
        config.firestore.profiles_collection.clone(),
    ));

    let mut stripe_client = StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
    );
    if let Some(api_base) = config.stripe.api_base.as_deref() {
        stripe_client = stripe_client.with_api_base(api_base);
    }
    let stripe_client = Arc::new(stripe_client);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .merge(checkout_sessions::routes(
            Arc::clone(&profile_repo),
            Arc::clone(&stripe_client),
        ))
        .merge(portal_sessions::routes(
            Arc::clone(&profile_repo),
            Arc::clone(&stripe_client),
        ))
        .merge(stripe_webhook::routes(
            Arc::clone(&profile_repo),
            Arc::clone(&stripe_client),
            config.stripe.plan_catalog.clone(),
        ))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
