//! Accounts and bearer-token authentication.
//!
//! Tokens are 32 random bytes, hex encoded, handed to the user once at creation. Only the
//! SHA-256 digest is stored, so a leaked database does not leak usable credentials.

use diesel::SqliteConnection;
use diesel::prelude::*;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{FieldErrors, PortfolioError, PortfolioResult};
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::types::Role;

/// The authenticated principal a request runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// User id.
    pub id: i32,
    /// Role.
    pub role: Role,
}

impl Caller {
    /// Admins bypass ownership checks.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Ok when the caller owns `owner_id`'s resource or is an admin.
    pub fn ensure_owns(&self, owner_id: i32) -> PortfolioResult<()> {
        if self.is_admin() || self.id == owner_id {
            Ok(())
        } else {
            Err(PortfolioError::Unauthorized)
        }
    }

    /// Ok only for admins.
    pub fn ensure_admin(&self) -> PortfolioResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PortfolioError::Unauthorized)
        }
    }
}

impl TryFrom<&User> for Caller {
    type Error = PortfolioError;

    fn try_from(u: &User) -> Result<Self, Self::Error> {
        let role = u
            .role
            .parse()
            .map_err(|e: crate::types::UnknownCode| PortfolioError::Internal(e.into()))?;
        Ok(Caller { id: u.id, role })
    }
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserInput {
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Requested role.
    pub role: Role,
}

impl NewUserInput {
    fn validate(&self) -> PortfolioResult<()> {
        let mut errs = FieldErrors::new();
        let email = self.email.trim();
        errs.check(
            email.len() >= 3 && email.contains('@') && !email.starts_with('@') && !email.ends_with('@'),
            "email",
            "must be a valid email address",
        );
        errs.check(!self.name.trim().is_empty(), "name", "is required");
        errs.finish()
    }
}

/// Fresh random bearer token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in `users.token_hash`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create an account and return it with its plaintext token.
///
/// `allow_admin` is false for self-registration; only the CLI creates admins.
pub fn create(
    conn: &mut SqliteConnection,
    input: &NewUserInput,
    allow_admin: bool,
) -> PortfolioResult<(User, String)> {
    input.validate()?;
    if input.role == Role::Admin && !allow_admin {
        return Err(PortfolioError::invalid("role", "admin accounts cannot self-register"));
    }

    let email = input.email.trim().to_lowercase();
    let token = generate_token();
    let token_hash = hash_token(&token);

    // the check and the insert share one write lock so concurrent sign-ups cannot race
    let user = conn.immediate_transaction::<_, PortfolioError, _>(|conn| {
        let taken = users::table
            .filter(users::email.eq(&email))
            .count()
            .get_result::<i64>(conn)?
            > 0;
        if taken {
            return Err(PortfolioError::invalid("email", "is already registered"));
        }

        Ok(diesel::insert_into(users::table)
            .values(&NewUser {
                email: &email,
                name: input.name.trim(),
                role: input.role.as_str(),
                token_hash: &token_hash,
            })
            .returning(User::as_returning())
            .get_result::<User>(conn)?)
    })?;

    info!(user_id = user.id, role = %input.role, "user created");
    Ok((user, token))
}

/// Resolve a bearer token to its user.
pub fn authenticate(conn: &mut SqliteConnection, token: &str) -> PortfolioResult<User> {
    users::table
        .filter(users::token_hash.eq(hash_token(token.trim())))
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or(PortfolioError::Unauthorized)
}

/// One user by id.
pub fn get(conn: &mut SqliteConnection, id: i32) -> PortfolioResult<User> {
    users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| PortfolioError::not_found("user", id))
}

/// Every user (admin listing).
pub fn list(conn: &mut SqliteConnection, caller: &Caller) -> PortfolioResult<Vec<User>> {
    caller.ensure_admin()?;
    Ok(users::table
        .order(users::id.asc())
        .select(User::as_select())
        .load(conn)?)
}

/// Change a user's role (admin only).
pub fn set_role(
    conn: &mut SqliteConnection,
    caller: &Caller,
    id: i32,
    role: Role,
) -> PortfolioResult<User> {
    caller.ensure_admin()?;
    diesel::update(users::table.find(id))
        .set(users::role.eq(role.as_str()))
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| PortfolioError::not_found("user", id))
}

/// Delete a user and, by cascade, everything they own (admin only).
pub fn delete(conn: &mut SqliteConnection, caller: &Caller, id: i32) -> PortfolioResult<()> {
    caller.ensure_admin()?;
    if caller.id == id {
        return Err(PortfolioError::invalid("id", "admins cannot delete themselves"));
    }
    let n = diesel::delete(users::table.find(id)).execute(conn)?;
    if n == 0 {
        return Err(PortfolioError::not_found("user", id));
    }
    info!(user_id = id, "user deleted");
    Ok(())
}
