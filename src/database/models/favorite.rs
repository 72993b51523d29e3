use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Existence-only record keyed by (user, organization, file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: Uuid,
    pub org_id: String,
    pub file_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(user_id: Uuid, org_id: impl Into<String>, file_id: Uuid) -> Self {
        Self {
            user_id,
            org_id: org_id.into(),
            file_id,
            created_at: Utc::now(),
        }
    }
}
