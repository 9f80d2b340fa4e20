use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The caller's role is not in the operation's allowed set.
    RoleNotPermitted,
    /// The caller neither owns nor is a guardian of the target resource.
    NotOwnerOrGuardian,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::RoleNotPermitted => f.write_str("role not permitted for this operation"),
            DenialReason::NotOwnerOrGuardian => f.write_str("not the owner or guardian of this resource"),
        }
    }
}

/// Outcome of a single authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
}

impl AccessDecision {
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub const fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }

    pub fn into_result(self) -> AppResult<()> {
        match self.reason {
            None if self.allowed => Ok(()),
            Some(reason) => Err(AppError::unauthorized(reason)),
            None => Err(AppError::internal("denied decision without a reason")),
        }
    }
}
