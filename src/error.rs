use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Fatal bootstrap failure. The process must not serve traffic after one of these.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("failed to connect to {database}: {source}")]
    Connection {
        database: String,
        #[source]
        source: diesel::ConnectionError,
    },
    #[error("{step} failed: {source}")]
    Statement {
        step: &'static str,
        #[source]
        source: DieselError,
    },
    #[error("invalid database name {0:?}")]
    InvalidDatabaseName(String),
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("bootstrap step {0} panicked")]
    StepPanicked(&'static str),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ProvisioningError {
    pub(crate) fn statement(step: &'static str) -> impl FnOnce(DieselError) -> Self {
        move |source| ProvisioningError::Statement { step, source }
    }
}

pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Failures of the CRUD layer the services run over the bootstrapped schema.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("database error: {0}")]
    Database(DieselError),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound("row"),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                StoreError::InvalidReference(info.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_store_not_found() {
        let err = StoreError::from(DieselError::NotFound);
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn statement_error_names_the_step() {
        let err =
            ProvisioningError::statement("ensure_auth_schema")(DieselError::RollbackTransaction);
        assert!(err.to_string().starts_with("ensure_auth_schema failed"));
    }

    #[test]
    fn missing_config_message() {
        let err = ProvisioningError::from(ConfigError::Missing("DATABASE_URL"));
        assert_eq!(err.to_string(), "configuration error: DATABASE_URL must be set");
    }
}
