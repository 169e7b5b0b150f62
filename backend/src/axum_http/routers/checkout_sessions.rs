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
        value_objects::billing_sessions::CheckoutSessionModel,
    },
    infra::repositories::user_profiles::UserProfileFirestore,
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    axum_http::{default_routers, error_responses::parse_json_body},
    usecases::{checkout_sessions::CheckoutSessionUseCase, stripe_gateway::StripeGateway},
};

pub const PATH: &str = "/api/v1/create-checkout-session";

pub fn routes(profile_repo: Arc<UserProfileFirestore>, stripe_client: Arc<StripeClient>) -> Router {
    let usecase = CheckoutSessionUseCase::new(profile_repo, stripe_client);

    router(Arc::new(usecase))
}

pub fn router<R, S>(usecase: Arc<CheckoutSessionUseCase<R, S>>) -> Router
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            PATH,
            post(create_checkout_session::<R, S>).fallback(default_routers::method_not_allowed),
        )
        .with_state(usecase)
}

pub async fn create_checkout_session<R, S>(
    State(usecase): State<Arc<CheckoutSessionUseCase<R, S>>>,
    body: Bytes,
) -> Response
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    info!("checkout: request received");
    let model: CheckoutSessionModel = match parse_json_body(&body) {
        Ok(model) => model,
        Err(err) => return err.into_response(),
    };

    match usecase.create_checkout_session(model).await {
        Ok(dto) => Json(dto).into_response(),
        Err(err) => err.into_response(),
    }
}
