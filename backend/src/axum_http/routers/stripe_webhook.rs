use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::user_profiles::UserProfileRepository, value_objects::plans::PlanCatalog,
    },
    infra::repositories::user_profiles::UserProfileFirestore,
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    axum_http::default_routers,
    usecases::{stripe_gateway::StripeGateway, stripe_webhook::StripeWebhookUseCase},
};

pub const PATH: &str = "/api/v1/webhook";
const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    profile_repo: Arc<UserProfileFirestore>,
    stripe_client: Arc<StripeClient>,
    plan_catalog: PlanCatalog,
) -> Router {
    let usecase = StripeWebhookUseCase::new(profile_repo, stripe_client, plan_catalog);

    router(Arc::new(usecase))
}

pub fn router<R, S>(usecase: Arc<StripeWebhookUseCase<R, S>>) -> Router
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route(
            PATH,
            post(stripe_webhook::<R, S>).fallback(default_routers::method_not_allowed),
        )
        .with_state(usecase)
}

pub async fn stripe_webhook<R, S>(
    State(usecase): State<Arc<StripeWebhookUseCase<R, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: UserProfileRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "stripe webhook: handled");
            (StatusCode::OK, "ok").into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::InMemoryUserProfiles;
    use axum::{body::Body, http::Request};
    use chrono::Utc;
    use crates::domain::entities::user_profiles::UserProfileEntity;
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha256;
    use tower::ServiceExt;

    const SECRET: &str = "whsec_router_test";

    fn signed_header(payload: &[u8]) -> String {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn payload() -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "customer.subscription.created",
            "data": { "object": {
                "object": "subscription",
                "customer": "cus_1",
                "status": "trialing",
                "current_period_end": 1_767_225_600,
                "items": { "data": [{ "price": { "id": "price_monthly" } }] }
            } }
        })
        .to_string()
        .into_bytes()
    }

    fn app(profiles: Arc<InMemoryUserProfiles>) -> Router {
        let stripe = StripeClient::new("sk_test_unused".to_string(), SECRET.to_string());
        router(Arc::new(StripeWebhookUseCase::new(
            profiles,
            Arc::new(stripe),
            PlanCatalog::default(),
        )))
    }

    fn profiles() -> Arc<InMemoryUserProfiles> {
        Arc::new(InMemoryUserProfiles::default().with_profile(UserProfileEntity {
            user_id: "uid-1".to_string(),
            stripe_customer_id: Some("cus_1".to_string()),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn signed_event_updates_profile() {
        let profiles = profiles();
        let payload = payload();
        let header = signed_header(&payload);

        let response = app(Arc::clone(&profiles))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(PATH)
                    .header(STRIPE_SIGNATURE_HEADER, header)
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");

        let stored = profiles.profile("uid-1").unwrap();
        assert_eq!(stored.plan_name.as_deref(), Some("Monthly"));
        assert_eq!(stored.subscription_status.as_deref(), Some("trialing"));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_changes() {
        let profiles = profiles();

        let response = app(Arc::clone(&profiles))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(PATH)
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=deadbeef")
                    .body(Body::from(payload()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let stored = profiles.profile("uid-1").unwrap();
        assert_eq!(stored.plan_id, None);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let response = app(profiles())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(PATH)
                    .body(Body::from(payload()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_is_method_not_allowed() {
        let response = app(profiles())
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
