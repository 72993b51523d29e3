use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role a user holds inside one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "org:member", alias = "member")]
    Member,
    #[serde(rename = "org:admin", alias = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "org:member",
            Role::Admin => "org:admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "org:member" | "member" => Ok(Role::Member),
            "org:admin" | "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub org_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub token_identifier: String,
    pub name: String,
    pub image: String,
    /// Kept in insertion order, at most one entry per organization
    pub memberships: Vec<Membership>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(token_identifier: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_identifier: token_identifier.into(),
            name: name.into(),
            image: image.into(),
            memberships: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn membership(&self, org_id: &str) -> Option<&Membership> {
        self.memberships.iter().find(|m| m.org_id == org_id)
    }

    pub fn role_in(&self, org_id: &str) -> Option<Role> {
        self.membership(org_id).map(|m| m.role)
    }

    /// Adds a membership, or replaces the role of the existing entry for that organization.
    pub fn upsert_membership(&mut self, org_id: &str, role: Role) {
        match self.memberships.iter_mut().find(|m| m.org_id == org_id) {
            Some(existing) => existing.role = role,
            None => self.memberships.push(Membership {
                org_id: org_id.to_string(),
                role,
            }),
        }
    }

    /// Updates the role of the membership keyed by `org_id` only.
    /// Returns false when the user is not a member of that organization.
    pub fn set_role(&mut self, org_id: &str, role: Role) -> bool {
        match self.memberships.iter_mut().find(|m| m.org_id == org_id) {
            Some(existing) => {
                existing.role = role;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_role_only_touches_matching_org() {
        let mut user = User::new("issuer|u1", "U1", "");
        user.upsert_membership("orgA", Role::Member);
        user.upsert_membership("orgB", Role::Member);

        assert!(user.set_role("orgB", Role::Admin));
        assert_eq!(user.role_in("orgA"), Some(Role::Member));
        assert_eq!(user.role_in("orgB"), Some(Role::Admin));
        assert!(!user.set_role("orgC", Role::Admin));
    }

    #[test]
    fn upsert_does_not_duplicate() {
        let mut user = User::new("issuer|u1", "U1", "");
        user.upsert_membership("orgA", Role::Member);
        user.upsert_membership("orgA", Role::Admin);
        assert_eq!(user.memberships.len(), 1);
        assert_eq!(user.role_in("orgA"), Some(Role::Admin));
    }

    #[test]
    fn role_accepts_short_and_prefixed_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("org:member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());

        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"org:admin\"");
    }
}
