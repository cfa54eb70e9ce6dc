//! First-run behaviour on a server without any service database, and the
//! runtime role's privileges. These tests drop and recreate the service
//! databases, so `TELEHEALTH_TEST_DATABASE_URL` must point at a throwaway
//! server. Without it they skip.

#[macro_use]
mod common;

use std::sync::Mutex;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Text};
use telehealth_schema::catalog::{all_database_names, ServiceDatabase};
use telehealth_schema::ddl::quote_ident;
use telehealth_schema::schema::{
    attachments, medical_records, patient_practitioners, patients, users,
};
use telehealth_schema::seed::ADMIN_ID;
use telehealth_schema::{Bootstrapper, Config};
use uuid::Uuid;

// Both tests reshape server-wide state; run them one at a time.
static SERVER: Mutex<()> = Mutex::new(());

#[derive(QueryableByName)]
struct Granted {
    #[diesel(sql_type = Bool)]
    granted: bool,
}

fn drop_service_databases(config: &Config) {
    let mut server = PgConnection::establish(&config.server_connection_url()).unwrap();
    for name in all_database_names() {
        server
            .batch_execute(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", quote_ident(name)))
            .unwrap();
    }
}

fn granted(conn: &mut PgConnection, check: &str, role: &str) -> bool {
    sql_query(format!("SELECT {check} AS granted"))
        .bind::<Text, _>(role)
        .get_result::<Granted>(conn)
        .unwrap()
        .granted
}

fn runtime_privileges(config: &Config, role: &str) -> [bool; 4] {
    let mut server = PgConnection::establish(&config.server_connection_url()).unwrap();
    let mut auth = common::connect(config, ServiceDatabase::Auth);
    let mut patient = common::connect(config, ServiceDatabase::Patient);
    [
        granted(&mut server, "has_database_privilege($1, 'file_db', 'CREATE')", role),
        granted(&mut auth, "has_table_privilege($1, 'users', 'UPDATE')", role),
        granted(&mut patient, "has_table_privilege($1, 'attachments', 'DELETE')", role),
        granted(&mut patient, "has_table_privilege($1, 'patient_practitioners', 'INSERT')", role),
    ]
}

#[test]
fn first_run_creates_everything_and_second_run_nothing() {
    let config = require_database!(common::test_config());
    let _serial = SERVER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    drop_service_databases(&config);

    let first = Bootstrapper::new(config.clone()).run().unwrap();
    assert_eq!(first.databases_created.len(), 7, "{first:?}");
    assert!(first.admin_seeded);
    assert!(first.default_admin_password_active);

    let second = Bootstrapper::new(config.clone()).run().unwrap();
    assert!(second.databases_created.is_empty(), "{second:?}");
    assert!(!second.admin_seeded);

    let mut auth = common::connect(&config, ServiceDatabase::Auth);
    let identities: Vec<String> = users::table.select(users::id).load(&mut auth).unwrap();
    assert_eq!(identities, [ADMIN_ID]);

    let mut patient = common::connect(&config, ServiceDatabase::Patient);
    let counts: [i64; 4] = [
        patients::table.count().get_result(&mut patient).unwrap(),
        medical_records::table.count().get_result(&mut patient).unwrap(),
        attachments::table.count().get_result(&mut patient).unwrap(),
        patient_practitioners::table.count().get_result(&mut patient).unwrap(),
    ];
    assert_eq!(counts, [0; 4]);
}

#[test]
fn runtime_role_receives_privileges_on_every_database() {
    let role = format!("rt_{}", Uuid::new_v4().simple());
    let config = require_database!(common::test_config_with(&[("APP_DB_ROLE", role.as_str())]));
    let _serial = SERVER.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut server = PgConnection::establish(&config.server_connection_url()).unwrap();
    server
        .batch_execute(&format!("CREATE ROLE {} NOLOGIN NOSUPERUSER", quote_ident(&role)))
        .unwrap();

    let bootstrapper = Bootstrapper::new(config.clone());
    bootstrapper.ensure_databases(all_database_names()).unwrap();
    bootstrapper.ensure_auth_schema().unwrap();
    bootstrapper.ensure_patient_schema().unwrap();
    let before = runtime_privileges(&config, &role);

    bootstrapper.grant_service_privileges().unwrap();
    let after = runtime_privileges(&config, &role);

    for name in all_database_names() {
        let mut conn = PgConnection::establish(&config.database_url(name)).unwrap();
        conn.batch_execute(&format!("DROP OWNED BY {}", quote_ident(&role))).unwrap();
    }
    server.batch_execute(&format!("DROP ROLE {}", quote_ident(&role))).unwrap();

    assert_eq!(before, [false; 4]);
    assert_eq!(after, [true; 4]);
}
