//! Schema definitions built with `sea-query` and rendered to guarded PostgreSQL DDL.
//!
//! Every rendered statement is safe to run again: tables and indexes use
//! `IF NOT EXISTS`, enumerated types are wrapped in a catalog check because
//! PostgreSQL has no `CREATE TYPE IF NOT EXISTS`.

use sea_query::extension::postgres::Type;
use sea_query::{Alias, Iden, IndexCreateStatement, PostgresQueryBuilder, TableCreateStatement};

/// A `CREATE TABLE IF NOT EXISTS` statement and the table name it creates.
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub statement: TableCreateStatement,
}

impl TableDef {
    pub fn new<T>(table: T, mut statement: TableCreateStatement) -> Self
    where
        T: Iden + Copy + 'static,
    {
        statement.table(table).if_not_exists();
        Self {
            name: Iden::to_string(&table),
            statement,
        }
    }

    pub fn create_sql(&self) -> String {
        self.statement.to_string(PostgresQueryBuilder)
    }
}

/// A `CREATE INDEX IF NOT EXISTS` statement and its index name.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub name: &'static str,
    pub statement: IndexCreateStatement,
}

impl IndexDef {
    pub fn new(name: &'static str, mut statement: IndexCreateStatement) -> Self {
        statement.name(name).if_not_exists();
        Self { name, statement }
    }

    pub fn create_sql(&self) -> String {
        self.statement.to_string(PostgresQueryBuilder)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub name: &'static str,
    pub labels: Vec<&'static str>,
}

impl EnumType {
    pub fn create_sql(&self) -> String {
        let create = Type::create()
            .as_enum(Alias::new(self.name))
            .values(self.labels.iter().map(|label| Alias::new(*label)))
            .to_string(PostgresQueryBuilder);
        format!(
            "DO $$\nBEGIN\n    IF NOT EXISTS (\n        SELECT 1 FROM pg_type\n        \
             WHERE typname = {} AND typnamespace = 'public'::regnamespace AND typtype = 'e'\n    \
             ) THEN\n        {create};\n    END IF;\nEND\n$$",
            quote_literal(self.name),
        )
    }
}

/// Everything one service database needs, in creation order.
#[derive(Clone, Debug, Default)]
pub struct SchemaDefinition {
    pub extensions: Vec<&'static str>,
    pub enums: Vec<EnumType>,
    pub tables: Vec<TableDef>,
    pub indexes: Vec<IndexDef>,
}

impl SchemaDefinition {
    pub fn statements(&self) -> Vec<String> {
        let extensions = self
            .extensions
            .iter()
            .map(|ext| format!("CREATE EXTENSION IF NOT EXISTS {}", quote_ident(ext)));
        let enums = self.enums.iter().map(EnumType::create_sql);
        let tables = self.tables.iter().map(TableDef::create_sql);
        let indexes = self.indexes.iter().map(IndexDef::create_sql);
        extensions.chain(enums).chain(tables).chain(indexes).collect()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn index_names(&self) -> Vec<&'static str> {
        self.indexes.iter().map(|i| i.name).collect()
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// PostgreSQL truncates identifiers beyond 63 bytes; we reject them instead.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() <= 63 && !name.contains('\0')
}
