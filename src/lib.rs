//! Schema bootstrap for the telehealth platform's per-service PostgreSQL databases.
//!
//! A fresh deployment calls [`bootstrap::Bootstrapper::run`] once before any
//! service accepts connections. The call is idempotent and safe to race.

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod db;
pub mod ddl;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod inspect;
pub mod models;
pub mod repository;
pub mod schema;
pub mod seed;

pub use bootstrap::{BootstrapReport, Bootstrapper};
pub use config::Config;
pub use error::{ProvisioningError, ProvisioningResult, StoreError, StoreResult};
