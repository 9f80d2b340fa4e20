use uuid::Uuid;

use super::validation::{looks_like_email, optional_text, Validator};
use super::{AccountInput, Change};
use crate::authz::{DenialReason, Principal, Role};
use crate::db::Store;
use crate::errors::{AppError, AppResult};
use crate::models::user::{LoginRequest, RegisterRequest, User, UserCreateRequest, UserUpdateRequest};
use crate::utils::{hash_password, utc_now, verify_password};

/// Self-service sign-up. Defaults to the student role and refuses admin.
pub async fn register(store: &dyn Store, payload: RegisterRequest) -> AppResult<User> {
    let mut v = Validator::new();
    let role = payload.role.unwrap_or(Role::Student);
    v.check(role != Role::Admin, "role", "admin accounts cannot self-register");

    let account = AccountInput {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
    }
    .validate(&mut v);
    v.finish()?;

    let (user, password_hash) = account.into_user(role)?;
    store.create_user(&user, &password_hash).await?;
    Ok(user)
}

/// Verifies login credentials. Unknown emails and wrong passwords are
/// indistinguishable to the caller.
pub async fn authenticate(store: &dyn Store, payload: LoginRequest) -> AppResult<User> {
    let mut v = Validator::new();
    let email = v.required_text("email", payload.email).to_lowercase();
    let password = v.required("password", payload.password);
    v.finish()?;

    let (user, password_hash) = store
        .find_credentials(&email)
        .await?
        .ok_or_else(|| AppError::unauthenticated("invalid credentials"))?;

    if !verify_password(&password, &password_hash)? {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    Ok(user)
}

pub async fn create_user(store: &dyn Store, payload: UserCreateRequest) -> AppResult<User> {
    let mut v = Validator::new();
    let role = payload.role.unwrap_or(Role::Student);
    let account = AccountInput {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        phone: payload.phone,
        address: payload.address,
    }
    .validate(&mut v);
    v.finish()?;

    let (user, password_hash) = account.into_user(role)?;
    store.create_user(&user, &password_hash).await?;
    Ok(user)
}

pub async fn get_user(store: &dyn Store, id: Uuid) -> AppResult<User> {
    store.get_user(id).await
}

pub async fn list_users(store: &dyn Store) -> AppResult<Vec<User>> {
    store.list_users().await
}

/// Partial update. Only admins may change a role.
/// Accounts that back a profile or are listed as a guardian keep their role.
async fn check_role_is_free(store: &dyn Store, user: &User) -> AppResult<()> {
    let profiles = store.count_profiles(user.id).await?;
    if profiles > 0 {
        return Err(AppError::conflict(format!(
            "cannot change role: the account backs {profiles} student or teacher profile(s)"
        )));
    }
    let wards = store.count_guardian_links(user.id).await?;
    if wards > 0 {
        return Err(AppError::conflict(format!(
            "cannot change role: the account is guardian of {wards} student(s)"
        )));
    }
    Ok(())
}

pub async fn update_user(
    store: &dyn Store,
    actor: &Principal,
    id: Uuid,
    payload: UserUpdateRequest,
) -> AppResult<Change<User>> {
    let before = store.get_user(id).await?;

    if let Some(role) = payload.role {
        if role != before.role {
            if !actor.is_admin() {
                return Err(AppError::unauthorized(DenialReason::RoleNotPermitted));
            }
            check_role_is_free(store, &before).await?;
        }
    }

    let mut v = Validator::new();
    let mut after = before.clone();

    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        v.check(!name.is_empty(), "name", "name cannot be blank");
        after.name = name;
    }
    if let Some(email) = payload.email {
        let email = email.trim().to_lowercase();
        v.check(looks_like_email(&email), "email", "email is not a valid address");
        after.email = email;
    }
    if let Some(password) = payload.password.as_deref() {
        v.check(
            password.len() >= crate::utils::MIN_PASSWORD_LENGTH,
            "password",
            format!("password must be at least {} characters", crate::utils::MIN_PASSWORD_LENGTH),
        );
    }
    if let Some(role) = payload.role {
        after.role = role;
    }
    if payload.phone.is_some() {
        after.phone = optional_text(payload.phone);
    }
    if payload.address.is_some() {
        after.address = optional_text(payload.address);
    }
    v.finish()?;

    let password_hash = payload.password.as_deref().map(hash_password).transpose()?;
    after.updated_at = utc_now();
    store.update_user(&after, password_hash.as_deref()).await?;

    Ok(Change { before, after })
}

/// Accounts still backing a student or teacher profile cannot be deleted.
pub async fn delete_user(store: &dyn Store, id: Uuid) -> AppResult<User> {
    let user = store.get_user(id).await?;

    let profiles = store.count_profiles(id).await?;
    if profiles > 0 {
        return Err(AppError::conflict(format!(
            "cannot delete user: the account backs {profiles} student or teacher profile(s)"
        )));
    }

    store.delete_user(id).await?;
    Ok(user)
}
