use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::user_profiles::UserProfileRepository,
        value_objects::billing_sessions::PortalSessionModel,
    },
    infra::repositories::user_profiles::UserProfileFirestore,
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    axum_http::{default_routers, error_responses::parse_json_body},
    usecases::{portal_sessions::PortalSessionUseCase, stripe_gateway::StripeGateway},
};

pub const PATH: &str = "/api/v1/create-portal-session";

pub fn routes(profile_repo: Arc<UserProfileFirestore>, stripe_client: Arc<StripeClient>) -> Router {
    let usecase = PortalSessionUseCase::new(profile_repo, stripe_client);

    router(Arc::new(usecase))
}

pub fn router<R, S>(usecase: Arc<PortalSessionUseCase<R, S>>) -> Router
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            PATH,
            post(create_portal_session::<R, S>).fallback(default_routers::method_not_allowed),
        )
        .with_state(usecase)
}

pub async fn create_portal_session<R, S>(
    State(usecase): State<Arc<PortalSessionUseCase<R, S>>>,
    body: Bytes,
) -> Response
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!("portal: request received");
    let model: PortalSessionModel = match parse_json_body(&body) {
        Ok(model) => model,
        Err(err) => return err.into_response(),
    };

    match usecase.create_portal_session(model).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}
