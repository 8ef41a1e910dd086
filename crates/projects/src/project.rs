//! Project aggregate: owner, members, archive flag.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobhub_core::{DomainError, UserId};

/// Unique project identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("ProjectId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Role granted inside one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Collaborator,
    Viewer,
}

/// Member entry: who, with which role, invited when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user: UserId,
    pub role: ProjectRole,
    pub invited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub owner: UserId,
    /// Ordered by invitation time; small expected cardinality.
    pub members: Vec<ProjectMember>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: String,
        description: Option<String>,
        owner: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name,
            description,
            owner,
            members: Vec::new(),
            is_archived: false,
            created_at: now,
        }
    }

    /// Owner or any member may read the project.
    pub fn has_access(&self, user: UserId) -> bool {
        self.is_member(user)
    }

    pub fn role_of(&self, user: UserId) -> Option<ProjectRole> {
        if self.owner == user {
            return Some(ProjectRole::Owner);
        }
        self.members
            .iter()
            .find(|m| m.user == user)
            .map(|m| m.role)
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.owner == user || self.members.iter().any(|m| m.user == user)
    }

    /// Append a member entry. The caller is responsible for the owner-only
    /// authorization check; this only guards against duplicates.
    pub fn invite(
        &mut self,
        user: UserId,
        role: ProjectRole,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_member(user) {
            return Err(DomainError::validation("user already part of project"));
        }
        self.members.push(ProjectMember {
            user,
            role,
            invited_at: now,
        });
        Ok(())
    }
}
