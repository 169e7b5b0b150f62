use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("You must be signed in.")]
    Unauthenticated,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("No billing customer was found for this user.")]
    CustomerNotFound,
    #[error("Webhook signature verification failed.")]
    InvalidSignature,
    #[error("Could not create the checkout session.")]
    CheckoutSessionFailed(#[source] anyhow::Error),
    #[error("Could not open the billing portal.")]
    PortalSessionFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            BillingError::InvalidRequest(_) | BillingError::InvalidSignature => {
                StatusCode::BAD_REQUEST
            }
            BillingError::CustomerNotFound => StatusCode::NOT_FOUND,
            BillingError::CheckoutSessionFailed(_)
            | BillingError::PortalSessionFailed(_)
            | BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            BillingError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        BillingError::InvalidRequest(format!("Missing required field: {field}."))
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BillingError>;
