//! Idempotent provisioning of the per-service databases.
//!
//! [`Bootstrapper::run`] is the only entry point the services need. The
//! individual steps are public so operators and tests can drive them one at a
//! time, but they must respect the same order: databases first, the two schema
//! steps in any order (they touch different databases), the seed after the
//! auth schema, privileges last.
//!
//! Every step is safe to repeat and safe to race against another process doing
//! the same thing. Failures abort the run and leave whatever was created in
//! place for the next attempt.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use diesel::PgConnection;
use serde::Serialize;

use crate::catalog::{all_database_names, auth_schema, patient_schema, ServiceDatabase};
use crate::config::Config;
use crate::db;
use crate::ddl::{is_valid_identifier, quote_ident, SchemaDefinition};
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::inspect::existing_databases;
use crate::seed;

// Advisory lock key shared by every bootstrapper; scoped per database by Postgres.
const SCHEMA_LOCK_KEY: i64 = 0x7465_6c65_6865_616c;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub databases_created: Vec<String>,
    pub admin_seeded: bool,
    pub default_admin_password_active: bool,
}

pub struct Bootstrapper {
    config: Config,
}

impl Bootstrapper {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn connect_server(&self) -> ProvisioningResult<PgConnection> {
        db::connect(&self.config.server_connection_url(), "server")
    }

    fn connect(&self, database: &str) -> ProvisioningResult<PgConnection> {
        db::connect(&self.config.database_url(database), database)
    }

    /// Create every named database that does not exist yet. Returns the ones created here.
    pub fn ensure_databases<'a, I>(&self, names: I) -> ProvisioningResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        const STEP: &str = "ensure_databases";

        let mut names: Vec<&str> = names.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        if let Some(bad) = names.iter().find(|name| !is_valid_identifier(name)) {
            return Err(ProvisioningError::InvalidDatabaseName(bad.to_string()));
        }

        let mut conn = self.connect_server()?;
        // CREATE DATABASE cannot run in a transaction, so a session-level lock
        // serialises concurrent bootstrappers here instead.
        sql_query("SELECT pg_advisory_lock($1)")
            .bind::<BigInt, _>(SCHEMA_LOCK_KEY)
            .execute(&mut conn)
            .map_err(ProvisioningError::statement(STEP))?;
        let created = create_missing_databases(&mut conn, &names);
        let unlocked = sql_query("SELECT pg_advisory_unlock($1)")
            .bind::<BigInt, _>(SCHEMA_LOCK_KEY)
            .execute(&mut conn);
        if let (Err(_), Err(err)) = (&created, &unlocked) {
            tracing::warn!(error = %err, "failed to release database creation lock");
        }
        creation_outcome(created, unlocked).map_err(ProvisioningError::statement(STEP))
    }

    pub fn ensure_auth_schema(&self) -> ProvisioningResult<()> {
        self.apply_schema(ServiceDatabase::Auth.name(), &auth_schema(), "ensure_auth_schema")
    }

    pub fn ensure_patient_schema(&self) -> ProvisioningResult<()> {
        self.apply_schema(
            ServiceDatabase::Patient.name(),
            &patient_schema(),
            "ensure_patient_schema",
        )
    }

    fn apply_schema(
        &self,
        database: &str,
        schema: &SchemaDefinition,
        step: &'static str,
    ) -> ProvisioningResult<()> {
        let mut conn = self.connect(database)?;
        let statements = schema.statements();
        with_schema_lock(&mut conn, |conn| {
            for statement in &statements {
                conn.batch_execute(statement)?;
            }
            Ok(())
        })
        .map_err(ProvisioningError::statement(step))?;

        tracing::info!(
            database,
            tables = schema.tables.len(),
            indexes = schema.indexes.len(),
            "schema ensured"
        );
        Ok(())
    }

    /// Insert the well-known admin identity if absent. Returns whether this call inserted it.
    pub fn seed_admin_identity(&self) -> ProvisioningResult<bool> {
        const STEP: &str = "seed_admin_identity";

        let mut conn = self.connect(ServiceDatabase::Auth.name())?;
        let inserted = seed::insert_admin(&mut conn).map_err(ProvisioningError::statement(STEP))?;
        if inserted {
            tracing::info!(id = seed::ADMIN_ID, email = seed::ADMIN_EMAIL, "seeded admin identity");
        } else if !seed::admin_present(&mut conn).map_err(ProvisioningError::statement(STEP))? {
            tracing::warn!(
                email = seed::ADMIN_EMAIL,
                "admin email belongs to another identity; seed row not written"
            );
        }
        Ok(inserted)
    }

    /// Grant the runtime role everything on every service database and its tables and sequences.
    pub fn grant_service_privileges(&self) -> ProvisioningResult<()> {
        const STEP: &str = "grant_service_privileges";

        let role = quote_ident(&self.config.app_role);
        let names = all_database_names();

        let mut server = self.connect_server()?;
        with_schema_lock(&mut server, |conn| {
            for name in &names {
                conn.batch_execute(&format!(
                    "GRANT ALL PRIVILEGES ON DATABASE {} TO {role}",
                    quote_ident(name)
                ))?;
            }
            Ok(())
        })
        .map_err(ProvisioningError::statement(STEP))?;

        for name in &names {
            let mut conn = self.connect(name)?;
            with_schema_lock(&mut conn, |conn| {
                conn.batch_execute(&format!(
                    "GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA public TO {role};\n\
                     GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public TO {role};"
                ))
            })
            .map_err(ProvisioningError::statement(STEP))?;
        }

        tracing::info!(role = %self.config.app_role, databases = names.len(), "privileges granted");
        Ok(())
    }

    pub fn default_admin_password_active(&self) -> ProvisioningResult<bool> {
        let mut conn = self.connect(ServiceDatabase::Auth.name())?;
        seed::default_password_active(&mut conn)
            .map_err(ProvisioningError::statement("check admin credentials"))
    }

    /// Run the full sequence. Safe to call on every startup.
    pub fn run(&self) -> ProvisioningResult<BootstrapReport> {
        let databases_created = self.ensure_databases(all_database_names())?;

        let (auth, patient) = std::thread::scope(|scope| {
            let auth = scope.spawn(|| {
                self.ensure_auth_schema()?;
                self.seed_admin_identity()
            });
            let patient = scope.spawn(|| self.ensure_patient_schema());
            (auth.join(), patient.join())
        });
        let admin_seeded =
            auth.map_err(|_| ProvisioningError::StepPanicked("ensure_auth_schema"))??;
        patient.map_err(|_| ProvisioningError::StepPanicked("ensure_patient_schema"))??;

        self.grant_service_privileges()?;

        let default_admin_password_active = self.default_admin_password_active()?;
        if default_admin_password_active && !admin_seeded {
            tracing::warn!(
                email = seed::ADMIN_EMAIL,
                "admin identity still uses the default password; rotate it"
            );
        } else if admin_seeded {
            tracing::info!(
                "admin identity created with the default password; rotate it before go-live"
            );
        }

        tracing::info!(created = databases_created.len(), admin_seeded, "bootstrap complete");
        Ok(BootstrapReport {
            databases_created,
            admin_seeded,
            default_admin_password_active,
        })
    }
}

fn create_missing_databases(conn: &mut PgConnection, names: &[&str]) -> QueryResult<Vec<String>> {
    let existing = existing_databases(conn, names)?;
    let mut created = Vec::new();
    for name in names.iter().filter(|name| !existing.contains(**name)) {
        conn.batch_execute(&format!("CREATE DATABASE {}", quote_ident(name)))?;
        tracing::info!(database = name, "created database");
        created.push(name.to_string());
    }
    Ok(created)
}

// A creation failure wins over an unlock failure. The session lock goes away
// with the connection either way.
fn creation_outcome<T>(created: QueryResult<T>, unlocked: QueryResult<usize>) -> QueryResult<T> {
    let created = created?;
    unlocked?;
    Ok(created)
}

// Runs `f` in a transaction holding the bootstrap advisory lock, so concurrent
// bootstrappers apply their DDL one at a time within a database.
fn with_schema_lock<F>(conn: &mut PgConnection, f: F) -> QueryResult<()>
where
    F: FnOnce(&mut PgConnection) -> QueryResult<()>,
{
    conn.transaction(|conn| {
        sql_query("SELECT pg_advisory_xact_lock($1)")
            .bind::<BigInt, _>(SCHEMA_LOCK_KEY)
            .execute(conn)?;
        f(conn)
    })
}
