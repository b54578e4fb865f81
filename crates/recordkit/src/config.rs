//! Client configuration: service endpoint, container, environment and database scope.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ENDPOINT: &str = "https://api.apple-cloudkit.com";
pub const DEFAULT_CONTAINER_ID: &str = "iCloud.recordkit.example";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown environment '{0}' (expected development or production)")]
    UnknownEnvironment(String),

    #[error("unknown database scope '{0}' (expected public, private or shared)")]
    UnknownScope(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::UnknownEnvironment(value.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database within a container that record and subscription calls target.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseScope {
    #[default]
    Public,
    Private,
    Shared,
}

impl DatabaseScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Shared => "shared",
        }
    }
}

impl FromStr for DatabaseScope {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "shared" => Ok(Self::Shared),
            _ => Err(ConfigError::UnknownScope(value.to_string())),
        }
    }
}

impl fmt::Display for DatabaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings injected into a client at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    pub container_id: String,
    pub environment: Environment,
    pub scope: DatabaseScope,
    pub api_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            environment: Environment::default(),
            scope: DatabaseScope::default(),
            api_token: None,
        }
    }
}

impl ClientConfig {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_scope(mut self, scope: DatabaseScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Reads `RECORDKIT_ENDPOINT`, `RECORDKIT_CONTAINER`, `RECORDKIT_ENVIRONMENT`,
    /// `RECORDKIT_SCOPE` and `RECORDKIT_API_TOKEN`. Blank values fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            endpoint: read("RECORDKIT_ENDPOINT").unwrap_or(defaults.endpoint),
            container_id: read("RECORDKIT_CONTAINER").unwrap_or(defaults.container_id),
            environment: read("RECORDKIT_ENVIRONMENT")
                .map(|value| value.parse::<Environment>())
                .transpose()?
                .unwrap_or(defaults.environment),
            scope: read("RECORDKIT_SCOPE")
                .map(|value| value.parse::<DatabaseScope>())
                .transpose()?
                .unwrap_or(defaults.scope),
            api_token: read("RECORDKIT_API_TOKEN"),
        })
    }
}
