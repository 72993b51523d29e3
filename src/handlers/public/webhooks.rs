// handlers/public/webhooks.rs - POST /webhooks/identity
//
// Provisioning and membership events from the identity provider. The request
// must carry the shared secret in `x-webhook-secret`.

use axum::extract::{Json, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::database::models::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::AppState;

pub const SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub token_identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPayload {
    pub token_identifier: String,
    pub org_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IdentityEvent {
    #[serde(rename = "user.created")]
    UserCreated(UserPayload),
    #[serde(rename = "user.updated")]
    UserUpdated(UserPayload),
    #[serde(rename = "organizationMembership.created")]
    MembershipCreated(MembershipPayload),
    #[serde(rename = "organizationMembership.updated")]
    MembershipUpdated(MembershipPayload),
}

impl IdentityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityEvent::UserCreated(_) => "user.created",
            IdentityEvent::UserUpdated(_) => "user.updated",
            IdentityEvent::MembershipCreated(_) => "organizationMembership.created",
            IdentityEvent::MembershipUpdated(_) => "organizationMembership.updated",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Received {
    pub received: &'static str,
}

fn check_secret(expected: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    if expected.is_empty() {
        return Err(ApiError::service_unavailable("Identity webhook is not configured"));
    }
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        warn!("Rejected identity webhook with missing or wrong secret");
        return Err(ApiError::unauthorized("Invalid webhook secret"));
    }
    Ok(())
}

pub async fn identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<IdentityEvent>,
) -> ApiResult<Received> {
    check_secret(&state.config.security.webhook_secret, &headers)?;

    let kind = event.kind();
    info!("Identity webhook: {}", kind);
    match event {
        IdentityEvent::UserCreated(user) => {
            state
                .identity
                .create_user(&user.token_identifier, &user.name, &user.image)
                .await?;
        }
        IdentityEvent::UserUpdated(user) => {
            state
                .identity
                .update_user(&user.token_identifier, &user.name, &user.image)
                .await?;
        }
        IdentityEvent::MembershipCreated(m) => {
            state
                .identity
                .add_org_id_to_user(&m.token_identifier, &m.org_id, m.role)
                .await?;
        }
        IdentityEvent::MembershipUpdated(m) => {
            state
                .identity
                .update_role_in_org_for_user(&m.token_identifier, &m.org_id, m.role)
                .await?;
        }
    }

    Ok(ApiResponse::success(Received { received: kind }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_tagged_events() {
        let event: IdentityEvent = serde_json::from_str(
            r#"{"type":"organizationMembership.updated","data":{"tokenIdentifier":"t|1","orgId":"orgA","role":"org:admin"}}"#,
        )
        .unwrap();
        match event {
            IdentityEvent::MembershipUpdated(m) => {
                assert_eq!(m.org_id, "orgA");
                assert_eq!(m.role, Role::Admin);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn secret_checks() {
        let mut headers = HeaderMap::new();
        assert_eq!(check_secret("", &headers).unwrap_err().status_code(), 503);
        assert_eq!(check_secret("s", &headers).unwrap_err().status_code(), 401);
        headers.insert(SECRET_HEADER, HeaderValue::from_static("s"));
        assert!(check_secret("s", &headers).is_ok());
    }
}
