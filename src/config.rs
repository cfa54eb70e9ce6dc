//! Runtime configuration, resolved once at startup.
//!
//! The binary calls [`Config::from_env`] after `dotenvy` has loaded `.env`.
//! Everything else takes a `Config` value, so tests build one with
//! [`Config::from_lookup`] and never touch process-wide environment.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_APP_ROLE: &str = "postgres";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVICE_NAME: &str = "schema-bootstrapper";
pub const DEFAULT_SERVICE_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVICE_PORT: u16 = 8000;

#[derive(Clone, Debug)]
pub struct Config {
    /// Server URL pointing at a maintenance database such as `postgres`.
    pub server_url: Url,
    /// Role the services connect as at runtime.
    pub app_role: String,
    pub connect_timeout_secs: u64,
    pub service_name: String,
    pub service_host: String,
    pub service_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let server_url = parse_server_url(raw_url.trim())?;

        let connect_timeout_secs = match lookup("DB_CONNECT_TIMEOUT_SECS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "DB_CONNECT_TIMEOUT_SECS",
                value,
            })?,
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let service_port = match lookup("SERVICE_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "SERVICE_PORT",
                value,
            })?,
            None => DEFAULT_SERVICE_PORT,
        };

        Ok(Self {
            app_role: lookup("APP_DB_ROLE")
                .or_else(|| url_user(&server_url))
                .unwrap_or_else(|| DEFAULT_APP_ROLE.into()),
            connect_timeout_secs,
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.into()),
            service_host: lookup("SERVICE_HOST").unwrap_or_else(|| DEFAULT_SERVICE_HOST.into()),
            service_port,
            server_url,
        })
    }

    /// Connection URL for the maintenance database named in `DATABASE_URL`.
    pub fn server_connection_url(&self) -> String {
        with_connect_timeout(self.server_url.clone(), self.connect_timeout_secs)
    }

    /// Connection URL for `database` on the same server, same credentials.
    pub fn database_url(&self, database: &str) -> String {
        let mut url = self.server_url.clone();
        url.set_path(&format!("/{database}"));
        with_connect_timeout(url, self.connect_timeout_secs)
    }
}

// Only `postgres://` URLs are accepted; libpq key/value strings have no path to swap.
// The rejected value is not echoed back since it may carry a password.
fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::Invalid {
        key: "DATABASE_URL",
        value: format!("not a connection URL ({err})"),
    })?;
    if !matches!(url.scheme(), "postgres" | "postgresql") || url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            key: "DATABASE_URL",
            value: format!("unsupported URL scheme {:?}", url.scheme()),
        });
    }
    Ok(url)
}

// User name from the userinfo part of the URL, percent-decoded.
fn url_user(url: &Url) -> Option<String> {
    let user = percent_decode_str(url.username()).decode_utf8().ok()?;
    (!user.is_empty()).then(|| user.into_owned())
}

fn with_connect_timeout(mut url: Url, secs: u64) -> String {
    if secs > 0 && !url.query_pairs().any(|(key, _)| key == "connect_timeout") {
        url.query_pairs_mut()
            .append_pair("connect_timeout", &secs.to_string());
    }
    url.into()
}
