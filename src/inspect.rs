//! Read the live catalog back and compare it with the expected schema.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Array, Bool, Nullable, Text};
use diesel::PgConnection;
use serde::Serialize;

use crate::catalog::{all_database_names, ServiceDatabase};
use crate::config::Config;
use crate::db::{self, DbPool};
use crate::ddl::SchemaDefinition;
use crate::error::{ProvisioningError, ProvisioningResult};
use crate::seed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, QueryableByName)]
pub struct ColumnInfo {
    #[diesel(sql_type = Text)]
    #[serde(skip)]
    pub table_name: String,
    #[diesel(sql_type = Text)]
    pub column_name: String,
    #[diesel(sql_type = Text)]
    pub data_type: String,
    #[diesel(sql_type = Bool)]
    pub not_null: bool,
    #[diesel(sql_type = Nullable<Text>)]
    pub column_default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, QueryableByName)]
pub struct CatalogDefinition {
    #[diesel(sql_type = Text)]
    pub table_name: String,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub definition: String,
}

#[derive(QueryableByName)]
struct EnumLabel {
    #[diesel(sql_type = Text)]
    type_name: String,
    #[diesel(sql_type = Text)]
    label: String,
}

#[derive(QueryableByName)]
struct DatabaseName {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Structural picture of one database's `public` schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSnapshot {
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
    pub indexes: BTreeMap<String, CatalogDefinition>,
    pub constraints: BTreeMap<String, CatalogDefinition>,
    pub enums: BTreeMap<String, Vec<String>>,
}

impl DatabaseSnapshot {
    /// Names of expected tables, indexes, enum types and labels absent from this snapshot.
    pub fn missing_from(&self, expected: &SchemaDefinition) -> Vec<String> {
        let mut missing = Vec::new();
        for table in expected.table_names() {
            if !self.tables.contains_key(table) {
                missing.push(format!("table {table}"));
            }
        }
        for index in expected.index_names() {
            if !self.indexes.contains_key(index) {
                missing.push(format!("index {index}"));
            }
        }
        for enum_type in &expected.enums {
            match self.enums.get(enum_type.name) {
                None => missing.push(format!("type {}", enum_type.name)),
                Some(labels) => {
                    for label in &enum_type.labels {
                        if !labels.iter().any(|l| l.as_str() == *label) {
                            missing.push(format!("label {}.{label}", enum_type.name));
                        }
                    }
                }
            }
        }
        missing
    }
}

pub fn inspect_database(conn: &mut PgConnection) -> QueryResult<DatabaseSnapshot> {
    let columns: Vec<ColumnInfo> = sql_query(
        "SELECT c.relname::text AS table_name, a.attname::text AS column_name, \
                format_type(a.atttypid, a.atttypmod) AS data_type, \
                a.attnotnull AS not_null, \
                pg_get_expr(d.adbin, d.adrelid) AS column_default \
         FROM pg_attribute a \
         JOIN pg_class c ON c.oid = a.attrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
         WHERE n.nspname = 'public' AND c.relkind = 'r' AND a.attnum > 0 AND NOT a.attisdropped \
         ORDER BY c.relname, a.attnum",
    )
    .load(conn)?;

    let indexes: Vec<CatalogDefinition> = sql_query(
        "SELECT tablename::text AS table_name, indexname::text AS name, indexdef AS definition \
         FROM pg_indexes WHERE schemaname = 'public' ORDER BY indexname",
    )
    .load(conn)?;

    let constraints: Vec<CatalogDefinition> = sql_query(
        "SELECT cl.relname::text AS table_name, con.conname::text AS name, \
                pg_get_constraintdef(con.oid) AS definition \
         FROM pg_constraint con \
         JOIN pg_class cl ON cl.oid = con.conrelid \
         JOIN pg_namespace n ON n.oid = con.connamespace \
         WHERE n.nspname = 'public' \
         ORDER BY cl.relname, con.conname",
    )
    .load(conn)?;

    let labels: Vec<EnumLabel> = sql_query(
        "SELECT t.typname::text AS type_name, e.enumlabel::text AS label \
         FROM pg_type t \
         JOIN pg_enum e ON e.enumtypid = t.oid \
         JOIN pg_namespace n ON n.oid = t.typnamespace \
         WHERE n.nspname = 'public' \
         ORDER BY t.typname, e.enumsortorder",
    )
    .load(conn)?;

    let mut snapshot = DatabaseSnapshot::default();
    for column in columns {
        snapshot
            .tables
            .entry(column.table_name.clone())
            .or_default()
            .push(column);
    }
    for index in indexes {
        snapshot.indexes.insert(index.name.clone(), index);
    }
    for constraint in constraints {
        let key = format!("{}.{}", constraint.table_name, constraint.name);
        snapshot.constraints.insert(key, constraint);
    }
    for EnumLabel { type_name, label } in labels {
        snapshot.enums.entry(type_name).or_default().push(label);
    }
    Ok(snapshot)
}

/// Which of `names` exist on the server the connection points at.
pub fn existing_databases(
    conn: &mut PgConnection,
    names: &[&str],
) -> QueryResult<BTreeSet<String>> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let rows: Vec<DatabaseName> =
        sql_query("SELECT datname::text AS name FROM pg_database WHERE datname = ANY($1)")
            .bind::<Array<Text>, _>(names)
            .load(conn)?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    pub missing_databases: Vec<String>,
    /// Missing objects keyed by database name; only databases with gaps appear.
    pub missing_objects: BTreeMap<String, Vec<String>>,
    pub admin_present: bool,
}

impl SchemaStatus {
    pub fn is_ready(&self) -> bool {
        self.missing_databases.is_empty() && self.missing_objects.is_empty() && self.admin_present
    }
}

/// Pools used to check the schema of a running deployment.
#[derive(Clone)]
pub struct SchemaProbe {
    server: DbPool,
    databases: BTreeMap<ServiceDatabase, DbPool>,
}

impl SchemaProbe {
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
        let databases = ServiceDatabase::ALL
            .iter()
            .filter(|database| database.schema().is_some())
            .map(|database| {
                let url = config.database_url(database.name());
                (*database, db::pool(&url, 2, timeout))
            })
            .collect();
        Self {
            server: db::pool(&config.server_connection_url(), 1, timeout),
            databases,
        }
    }

    pub fn status(&self) -> ProvisioningResult<SchemaStatus> {
        const STEP: &str = "inspect schema";

        let mut server = self.server.get()?;
        let names = all_database_names();
        let existing = existing_databases(&mut server, &names)
            .map_err(ProvisioningError::statement(STEP))?;

        let mut status = SchemaStatus {
            missing_databases: names
                .iter()
                .filter(|name| !existing.contains(**name))
                .map(|name| name.to_string())
                .collect(),
            ..Default::default()
        };

        for (database, pool) in &self.databases {
            if !existing.contains(database.name()) {
                continue;
            }
            let Some(expected) = database.schema() else {
                continue;
            };
            let mut conn = pool.get()?;
            let snapshot = inspect_database(&mut conn).map_err(ProvisioningError::statement(STEP))?;
            let missing = snapshot.missing_from(&expected);
            if !missing.is_empty() {
                status.missing_objects.insert(database.name().to_string(), missing);
            }
            if *database == ServiceDatabase::Auth && snapshot.tables.contains_key("users") {
                status.admin_present = seed::admin_present(&mut conn)
                    .map_err(ProvisioningError::statement(STEP))?;
            }
        }

        Ok(status)
    }
}
