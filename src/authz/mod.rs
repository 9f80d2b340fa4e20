//! Authorization core.
//!
//! Two orthogonal checks guard every operation:
//! - the role gate ([`authorize_role`]) compares the caller's role with the
//!   operation's declared role set;
//! - the ownership policy ([`authorize_ownership`]) decides whether the caller
//!   may act on one specific record (admin, owner, or guardian).
//!
//! Decisions are pure and never cached. [`Operation`] declares the policy of
//! each API operation.

mod decision;
mod gate;
mod ownership;
mod policy;
mod principal;
mod role;

pub use decision::{AccessDecision, DenialReason};
pub use gate::authorize_role;
pub use ownership::{authorize_ownership, ResourceRef, ResourceType};
pub use policy::Operation;
pub use principal::Principal;
pub use role::{Role, UnknownRole};

use uuid::Uuid;

use crate::db::Store;
use crate::errors::{AppError, AppResult};

/// Runs the role gate for `op`.
pub fn check(principal: &Principal, op: Operation) -> AppResult<()> {
    let decision = authorize_role(principal, op.allowed_roles());
    log_decision(principal, op, "role", decision);
    decision.into_result()
}

/// Runs the role gate, resolves the target record, then runs the ownership
/// policy. A missing record yields `NotFound` before any ownership decision.
pub async fn check_resource(
    store: &dyn Store,
    principal: &Principal,
    op: Operation,
    resource_id: Uuid,
) -> AppResult<ResourceRef> {
    check(principal, op)?;

    let resource_type = op
        .ownership_scope()
        .ok_or_else(|| AppError::internal(format!("{op} is not resource-scoped")))?;

    let resource = store.find_resource_ref(resource_type, resource_id).await?;
    let decision = authorize_ownership(principal, &resource);
    log_decision(principal, op, "ownership", decision);
    decision.into_result()?;

    Ok(resource)
}

fn log_decision(principal: &Principal, op: Operation, stage: &'static str, decision: AccessDecision) {
    if decision.allowed {
        tracing::debug!(
            principal_id = %principal.id,
            role = %principal.role,
            operation = %op,
            stage,
            "access allowed"
        );
    } else {
        tracing::debug!(
            principal_id = %principal.id,
            role = %principal.role,
            operation = %op,
            stage,
            reason = ?decision.reason,
            "access denied"
        );
    }
}
