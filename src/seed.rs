//! The well-known administrator identity written by the bootstrap.
//!
//! The hash below is a fixed bcrypt digest of [`DEFAULT_ADMIN_PASSWORD`]. It is
//! fixture material for first login, not a credential: operators must rotate
//! it, and the bootstrap warns on every run while it is still in place.

use diesel::prelude::*;
use diesel::PgConnection;

use crate::models::{NewIdentity, Role};
use crate::schema::users;

pub const ADMIN_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const ADMIN_EMAIL: &str = "admin@telehealth.example.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const ADMIN_PASSWORD_HASH: &str =
    "$2b$12$him1nNIESx8Jf85rfLqMy.SEVqqspkFRlR0Lhvi8im1/EdZQ8zDIK";

pub fn admin_identity() -> NewIdentity<'static> {
    NewIdentity {
        id: ADMIN_ID,
        email: ADMIN_EMAIL,
        password_hash: ADMIN_PASSWORD_HASH,
        first_name: "System",
        last_name: "Administrator",
        role: Role::Admin,
        is_active: true,
        email_verified: true,
    }
}

/// Insert the admin row unless something already occupies its id or email.
/// Returns whether a row was written.
pub fn insert_admin(conn: &mut PgConnection) -> QueryResult<bool> {
    let inserted = diesel::insert_into(users::table)
        .values(&admin_identity())
        .on_conflict_do_nothing()
        .execute(conn)?;
    Ok(inserted > 0)
}

pub fn admin_present(conn: &mut PgConnection) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(users::table.filter(users::id.eq(ADMIN_ID))))
        .get_result(conn)
}

/// True when the stored admin hash still accepts the default password.
pub fn default_password_active(conn: &mut PgConnection) -> QueryResult<bool> {
    let hash: Option<String> = users::table
        .filter(users::id.eq(ADMIN_ID))
        .select(users::password_hash)
        .first(conn)
        .optional()?;
    Ok(hash.is_some_and(|hash| is_default_password_hash(&hash)))
}

pub fn is_default_password_hash(hash: &str) -> bool {
    bcrypt::verify(DEFAULT_ADMIN_PASSWORD, hash).unwrap_or(false)
}
