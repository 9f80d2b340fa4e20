use super::{AccessDecision, DenialReason, Principal, Role};

/// Coarse role check. An empty `allowed` set admits any authenticated principal.
///
/// Admin gets no implicit pass here; an operation open to admins must list
/// [`Role::Admin`].
pub fn authorize_role(principal: &Principal, allowed: &[Role]) -> AccessDecision {
    if allowed.is_empty() || allowed.contains(&principal.role) {
        AccessDecision::allow()
    } else {
        AccessDecision::deny(DenialReason::RoleNotPermitted)
    }
}
