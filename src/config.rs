//! Startup configuration, read from the environment.

use std::str::FromStr;

use thiserror::Error;

pub const CONNECTION_STRING_VAR: &str = "STORAGE_CONNECTION_STRING";
pub const CONTAINER_VAR: &str = "TODO_CONTAINER";
pub const PORT_VAR: &str = "PORT";
pub const BASE_PATH_VAR: &str = "BASE_PATH";

pub const DEFAULT_CONTAINER: &str = "todo-data";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REGION: &str = "us-east-1";

/// Name of the object holding the todo list.
pub const TODO_OBJECT_NAME: &str = "todos.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid PORT {0:?}")]
    InvalidPort(String),

    #[error("invalid STORAGE_CONNECTION_STRING: {0}")]
    ConnectionString(#[from] ConnectionStringError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("segment {0:?} is not a Key=Value pair")]
    MalformedSegment(String),

    #[error("missing {0}")]
    MissingKey(&'static str),
}

/// Credentials and location of the object store.
///
/// Written as `;`-separated `Key=Value` pairs, e.g.
/// `Endpoint=http://localhost:9000;AccessKeyId=minio;SecretAccessKey=secret`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub region: String,
}

// Keep the secret out of logs.
impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut endpoint = None;
        let mut region = None;

        for segment in s.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "accesskeyid" => access_key_id = Some(value),
                "secretaccesskey" => secret_access_key = Some(value),
                "endpoint" => endpoint = Some(value),
                "region" => region = Some(value),
                // unknown keys are ignored
                _ => {}
            }
        }

        Ok(ConnectionString {
            access_key_id: access_key_id
                .filter(|v| !v.is_empty())
                .ok_or(ConnectionStringError::MissingKey("AccessKeyId"))?,
            secret_access_key: secret_access_key
                .filter(|v| !v.is_empty())
                .ok_or(ConnectionStringError::MissingKey("SecretAccessKey"))?,
            endpoint: endpoint.filter(|v| !v.is_empty()),
            region: region
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionString,
    pub container: String,
    pub port: u16,
    pub base_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection = lookup(CONNECTION_STRING_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(CONNECTION_STRING_VAR))?
            .parse::<ConnectionString>()?;

        let container = lookup(CONTAINER_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

        let port = match lookup(PORT_VAR) {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?,
            None => DEFAULT_PORT,
        };

        let base_path = lookup(BASE_PATH_VAR)
            .map(|path| normalize_base_path(&path))
            .unwrap_or_default();

        Ok(Config {
            connection,
            container,
            port,
            base_path,
        })
    }
}

fn normalize_base_path(path: &str) -> String {
    let path = path.trim().trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const CONN: &str = "AccessKeyId=minio;SecretAccessKey=secret";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_connection_string_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(CONNECTION_STRING_VAR)));
        assert_eq!(err.to_string(), "STORAGE_CONNECTION_STRING is not set");
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[(CONNECTION_STRING_VAR, CONN)])).unwrap();
        assert_eq!(config.container, "todo-data");
        assert_eq!(config.port, 8000);
        assert_eq!(config.base_path, "");
        assert_eq!(config.connection.region, "us-east-1");
        assert_eq!(config.connection.endpoint, None);
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_lookup(lookup(&[
            (CONNECTION_STRING_VAR, CONN),
            (CONTAINER_VAR, "my-todos"),
            (PORT_VAR, "3000"),
            (BASE_PATH_VAR, "todos/"),
        ]))
        .unwrap();
        assert_eq!(config.container, "my-todos");
        assert_eq!(config.port, 3000);
        assert_eq!(config.base_path, "/todos");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Config::from_lookup(lookup(&[(CONNECTION_STRING_VAR, CONN), (PORT_VAR, "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(p) if p == "http"));
    }

    #[test]
    fn connection_string_parses_all_keys() {
        let conn: ConnectionString =
            "Endpoint=http://localhost:9000; accesskeyid=ak ;SecretAccessKey=a=b;Region=eu-west-1;"
                .parse()
                .unwrap();
        assert_eq!(conn.access_key_id, "ak");
        assert_eq!(conn.secret_access_key, "a=b");
        assert_eq!(conn.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(conn.region, "eu-west-1");
    }

    #[test]
    fn connection_string_requires_credentials() {
        assert_eq!(
            "SecretAccessKey=s".parse::<ConnectionString>(),
            Err(ConnectionStringError::MissingKey("AccessKeyId"))
        );
        assert_eq!(
            "AccessKeyId=a;SecretAccessKey=".parse::<ConnectionString>(),
            Err(ConnectionStringError::MissingKey("SecretAccessKey"))
        );
        assert_eq!(
            "AccessKeyId=a;garbage".parse::<ConnectionString>(),
            Err(ConnectionStringError::MalformedSegment("garbage".to_string()))
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let conn: ConnectionString = CONN.parse().unwrap();
        let debug = format!("{conn:?}");
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("<redacted>"));
    }
}
