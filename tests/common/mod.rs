#![allow(dead_code)]

use std::collections::HashMap;

use diesel::{Connection, PgConnection};
use telehealth_schema::catalog::ServiceDatabase;
use telehealth_schema::directory::IdentityDirectory;
use telehealth_schema::models::Role;
use telehealth_schema::{Bootstrapper, Config, StoreResult};

pub const TEST_DATABASE_URL: &str = "TELEHEALTH_TEST_DATABASE_URL";

/// Config for the test server, or `None` when no server is configured.
pub fn test_config() -> Option<Config> {
    test_config_with(&[])
}

/// Like [`test_config`], with extra variables layered over `DATABASE_URL`.
pub fn test_config_with(extra: &[(&str, &str)]) -> Option<Config> {
    let url = std::env::var(TEST_DATABASE_URL).ok()?;
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(url.clone()),
        _ => extra
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()),
    })
    .expect("test config");
    Some(config)
}

/// Run the bootstrap against the test server and hand back its config.
pub fn bootstrapped() -> Option<Config> {
    let config = test_config()?;
    Bootstrapper::new(config.clone()).run().expect("bootstrap");
    Some(config)
}

pub fn connect(config: &Config, database: ServiceDatabase) -> PgConnection {
    PgConnection::establish(&config.database_url(database.name())).expect("connect")
}

macro_rules! require_database {
    ($setup:expr) => {
        match $setup {
            Some(config) => config,
            None => {
                eprintln!("skipping: {} not set", common::TEST_DATABASE_URL);
                return;
            }
        }
    };
}

/// Directory with fixed answers, standing in for the auth service.
#[derive(Default)]
pub struct FixedDirectory(pub HashMap<String, Role>);

impl FixedDirectory {
    pub fn with(mut self, id: uuid::Uuid, role: Role) -> Self {
        self.0.insert(id.to_string(), role);
        self
    }
}

impl IdentityDirectory for FixedDirectory {
    fn role_of(&self, identity_id: &str) -> StoreResult<Option<Role>> {
        Ok(self.0.get(identity_id).copied())
    }
}
