use std::time::Duration;

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;

use crate::error::{ProvisioningError, ProvisioningResult};

// Database connection pool type
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Open a single connection. `label` names the target in errors and logs.
pub fn connect(url: &str, label: &str) -> ProvisioningResult<PgConnection> {
    PgConnection::establish(url).map_err(|source| ProvisioningError::Connection {
        database: label.to_string(),
        source,
    })
}

/// Build a small pool without connecting up front, so a pool can exist for a
/// database that has not been created yet.
pub fn pool(url: &str, max_size: u32, checkout_timeout: Duration) -> DbPool {
    let manager = ConnectionManager::<PgConnection>::new(url);
    r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(Some(0))
        .connection_timeout(checkout_timeout)
        .build_unchecked(manager)
}
