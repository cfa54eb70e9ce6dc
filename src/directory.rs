//! Lookup of identities across the database boundary.
//!
//! Patient rows point at identities (`user_id`, `practitioner_id`) that live
//! in the auth database, where no foreign key can reach. The patient side
//! checks those references through this trait before writing them.

use diesel::prelude::*;

use crate::db::DbPool;
use crate::error::StoreResult;
use crate::models::Role;
use crate::schema::users;

pub trait IdentityDirectory {
    /// Role of an active identity, or `None` if it is unknown or deactivated.
    fn role_of(&self, identity_id: &str) -> StoreResult<Option<Role>>;

    fn has_role(&self, identity_id: &str, role: Role) -> StoreResult<bool> {
        Ok(self.role_of(identity_id)? == Some(role))
    }
}

/// Directory backed by a pool on the auth database.
#[derive(Clone)]
pub struct PgIdentityDirectory {
    pool: DbPool,
}

impl PgIdentityDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl IdentityDirectory for PgIdentityDirectory {
    fn role_of(&self, identity_id: &str) -> StoreResult<Option<Role>> {
        let mut conn = self.pool.get()?;
        let role = users::table
            .filter(users::id.eq(identity_id))
            .filter(users::is_active.eq(true))
            .select(users::role)
            .first::<Role>(&mut conn)
            .optional()?;
        Ok(role)
    }
}
