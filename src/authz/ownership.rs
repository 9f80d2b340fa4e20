use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::{AccessDecision, DenialReason, Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceType {
    Student,
    Teacher,
    Class,
    User,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Student => "student",
            ResourceType::Teacher => "teacher",
            ResourceType::Class => "class",
            ResourceType::User => "user",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity an operation targets, with the principals tied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub owner_principal_id: Option<Uuid>,
    pub guardian_principal_ids: HashSet<Uuid>,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, resource_id: Uuid) -> Self {
        Self {
            resource_type,
            resource_id,
            owner_principal_id: None,
            guardian_principal_ids: HashSet::new(),
        }
    }

    pub fn owned_by(mut self, owner: Uuid) -> Self {
        self.owner_principal_id = Some(owner);
        self
    }

    pub fn with_guardians(mut self, guardians: impl IntoIterator<Item = Uuid>) -> Self {
        self.guardian_principal_ids = guardians.into_iter().collect();
        self
    }
}

/// Fine-grained check against one resource.
///
/// Evaluation order (first match wins):
/// 1. admin role -> allow
/// 2. principal owns the resource -> allow
/// 3. principal is a guardian of the resource -> allow
/// 4. deny
pub fn authorize_ownership(principal: &Principal, resource: &ResourceRef) -> AccessDecision {
    match principal.role {
        Role::Admin => return AccessDecision::allow(),
        Role::Teacher | Role::Student | Role::Parent => {}
    }

    if resource.owner_principal_id == Some(principal.id) {
        return AccessDecision::allow();
    }

    if resource.guardian_principal_ids.contains(&principal.id) {
        return AccessDecision::allow();
    }

    AccessDecision::deny(DenialReason::NotOwnerOrGuardian)
}
