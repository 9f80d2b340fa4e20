//! CRUD services. Every function validates its whole input and checks
//! referenced records before the first write, so a failed call leaves the
//! store untouched. Callers run the authorization checks first.

pub mod classes;
pub mod students;
pub mod teachers;
pub mod users;
pub mod validation;

use uuid::Uuid;

use crate::authz::Role;
use crate::models::user::User;
use crate::utils::{hash_password, utc_now, MIN_PASSWORD_LENGTH};
use crate::errors::AppResult;
use validation::{looks_like_email, optional_text, Validator};

/// Before and after images of an updated record.
#[derive(Debug, Clone)]
pub struct Change<T> {
    pub before: T,
    pub after: T,
}

/// Login account fields shared by sign-up, user creation and profile creation.
#[derive(Debug, Default)]
pub(crate) struct AccountInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub(crate) struct PendingAccount {
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
    address: Option<String>,
}

impl AccountInput {
    pub(crate) fn validate(self, v: &mut Validator) -> PendingAccount {
        let name = v.required_text("name", self.name);
        let email = v.required_text("email", self.email).to_lowercase();
        let password = v.required("password", self.password);

        if !email.is_empty() {
            v.check(looks_like_email(&email), "email", "email is not a valid address");
        }
        if !password.is_empty() {
            v.check(
                password.len() >= MIN_PASSWORD_LENGTH,
                "password",
                format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        }

        PendingAccount {
            name,
            email,
            password,
            phone: optional_text(self.phone),
            address: optional_text(self.address),
        }
    }
}

impl PendingAccount {
    /// Hashes the password and materializes the account. Call only after
    /// validation succeeded.
    pub(crate) fn into_user(self, role: Role) -> AppResult<(User, String)> {
        let password_hash = hash_password(&self.password)?;
        let now = utc_now();
        let user = User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            role,
            phone: self.phone,
            address: self.address,
            created_at: now,
            updated_at: now,
        };
        Ok((user, password_hash))
    }
}
