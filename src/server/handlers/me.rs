//! Resource endpoints authorized by the session credential.
//!
//! Flow Overview:
//! 1) Authenticate via session cookie or bearer token (401 otherwise).
//! 2) Answer from the live session, never from a handoff snapshot.

use super::require_auth;
use crate::identity::{claims, Decision, Error};
use crate::server::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClaimView {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub claims: Vec<ClaimView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    pub policy: String,
    pub allowed: bool,
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Return the authenticated principal.", body = MeResponse),
        (status = 401, description = "Missing, invalid or revoked session."),
    ),
    tag = "me"
)]
pub async fn get_me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let principal = match require_auth(&headers, state.sessions()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let response = MeResponse {
        user_id: claims::user_id(&principal).map(ToString::to_string),
        display_name: claims::display_name(&principal).map(ToString::to_string),
        claims: principal
            .claims()
            .iter()
            .map(|claim| ClaimView {
                claim_type: claim.claim_type().to_string(),
                value: claim.value().to_string(),
            })
            .collect(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

#[utoipa::path(
    get,
    path = "/v1/authorize/{policy}",
    params(("policy" = String, Path, description = "Registered policy name")),
    responses(
        (status = 200, description = "Policy allows the principal.", body = AuthorizeResponse),
        (status = 401, description = "Missing, invalid or revoked session."),
        (status = 403, description = "Policy denies the principal.", body = AuthorizeResponse),
        (status = 404, description = "Policy is not registered."),
    ),
    tag = "me"
)]
pub async fn authorize(
    Path(policy): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, state.sessions()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match state.config().policies().evaluate(&principal, &policy) {
        Ok(decision) => {
            debug!(policy = %policy, ?decision, "policy evaluated");
            let status = if decision == Decision::Allow {
                StatusCode::OK
            } else {
                StatusCode::FORBIDDEN
            };
            let body = AuthorizeResponse {
                policy,
                allowed: decision.is_allowed(),
            };
            (status, Json(body)).into_response()
        }
        Err(err @ Error::PolicyNotFound(_)) => {
            error!("{err}");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            error!("Failed to evaluate policy: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
