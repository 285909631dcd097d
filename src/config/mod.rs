//! Connection configuration
//!
//! The connection file holds one block per environment (`local`, `prod`, ...).
//! It may be JSON or TOML, chosen by extension, and any value can be
//! overridden from the process environment with the `ES_LOADER_` prefix and
//! `__` as the nesting separator, e.g. `ES_LOADER_LOCAL__URLS=[http://es:9200]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Json, Toml};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::client::{Auth, ElasticsearchClientConfig};
use crate::errors::{ConfigError, ConfigResult};

/// One environment block of the connection file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Index service endpoints, used round-robin
    #[serde(default)]
    pub urls: Vec<String>,

    /// HTTP basic credentials
    #[serde(default)]
    pub http_auth: Option<HttpAuth>,

    /// Elasticsearch API key (the base64 `id:key` form)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request signing block; not supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Value>,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub extras: Extras,
}

/// Basic credentials as `{username, password}`, `[username, password]` or `"username:password"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HttpAuth {
    Fields {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    Pair(Vec<String>),
    Joined(String),
}

/// Client options passed through to the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extras {
    #[serde(default = "default_verify_certs")]
    pub verify_certs: bool,

    /// Options this client does not understand
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Default for Extras {
    fn default() -> Self {
        Self {
            verify_certs: default_verify_certs(),
            other: BTreeMap::new(),
        }
    }
}

fn default_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_REQUEST_TIMEOUT).unwrap_or(Duration::from_secs(30))
}

fn default_verify_certs() -> bool {
    DEFAULT_VERIFY_CERTS
}

impl HttpAuth {
    /// Split into username and password, if both are present and non-empty
    fn credentials(&self) -> Option<(String, String)> {
        let (username, password) = match self {
            HttpAuth::Fields { username, password } => (username.clone()?, password.clone()?),
            HttpAuth::Pair(parts) => match parts.as_slice() {
                [username, password] => (username.clone(), password.clone()),
                _ => return None,
            },
            HttpAuth::Joined(joined) => {
                let (username, password) = joined.split_once(':')?;
                (username.to_string(), password.to_string())
            }
        };

        (!username.is_empty() && !password.is_empty()).then_some((username, password))
    }
}

impl EnvironmentConfig {
    /// Validate the block and build the HTTP client settings
    pub fn client_config(&self, environment: &str) -> ConfigResult<ElasticsearchClientConfig> {
        let urls: Vec<String> = self
            .urls
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(ConfigError::MissingUrls {
                environment: environment.to_string(),
            });
        }

        if self.auth.is_some() {
            return Err(ConfigError::UnsupportedAuth {
                environment: environment.to_string(),
                message: "request signing is not supported, use http_auth or api_key".to_string(),
            });
        }

        let auth = match (&self.http_auth, &self.api_key) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "api_key",
                    "cannot be combined with http_auth",
                ));
            }
            (Some(http_auth), None) => {
                let (username, password) =
                    http_auth
                        .credentials()
                        .ok_or_else(|| ConfigError::IncompleteAuth {
                            environment: environment.to_string(),
                            message: "http_auth needs both a username and a password".to_string(),
                        })?;
                Some(Auth::Basic { username, password })
            }
            (None, Some(key)) if key.trim().is_empty() => {
                return Err(ConfigError::IncompleteAuth {
                    environment: environment.to_string(),
                    message: "api_key is empty".to_string(),
                });
            }
            (None, Some(key)) => Some(Auth::ApiKey(key.trim().to_string())),
            (None, None) => None,
        };

        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }

        for option in self.extras.other.keys() {
            warn!("Ignoring unsupported client option extras.{}", option);
        }

        Ok(ElasticsearchClientConfig {
            urls,
            auth,
            timeout: self.timeout,
            accept_invalid_certs: !self.extras.verify_certs,
        })
    }
}

/// Layered connection file plus environment overrides
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    figment: Figment,
    source: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Layer the connection file (JSON, or TOML for `.toml`) under `ES_LOADER_` overrides
    pub fn load(path: &Path) -> Self {
        if !path.is_file() {
            warn!(
                "Connection file {} not found, using environment overrides only",
                path.display()
            );
        }

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let figment = if is_toml {
            Figment::from(Toml::file(path))
        } else {
            Figment::from(Json::file(path))
        };

        Self {
            figment: figment.merge(Env::prefixed(ENV_PREFIX).split("__")),
            source: Some(path.to_path_buf()),
        }
    }

    /// Wrap an already assembled figment
    pub fn from_figment(figment: Figment) -> Self {
        Self {
            figment,
            source: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Extract one environment block
    pub fn environment(&self, environment: &str) -> ConfigResult<EnvironmentConfig> {
        if self.figment.find_value(environment).is_err() {
            return Err(ConfigError::MissingEnvironment {
                environment: environment.to_string(),
            });
        }

        let config: EnvironmentConfig = self.figment.extract_inner(environment)?;
        debug!("Loaded environment '{}' with {} url(s)", environment, config.urls.len());
        Ok(config)
    }

    /// Extract and validate one environment block into client settings
    pub fn client_config(&self, environment: &str) -> ConfigResult<ElasticsearchClientConfig> {
        self.environment(environment)?.client_config(environment)
    }
}
