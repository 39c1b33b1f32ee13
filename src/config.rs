//! Tracking configuration
//!
//! Resolved from the same environment variables MLflow clients read, with
//! CLI flags layered on top.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::experiment::DEFAULT_EXPERIMENT_ID;
use crate::{Error, Result};

/// Env var naming the tracking backend.
pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
/// Env var naming the target experiment.
pub const ENV_EXPERIMENT_NAME: &str = "MLFLOW_EXPERIMENT_NAME";
/// Env var with the target experiment ID (wins over the name).
pub const ENV_EXPERIMENT_ID: &str = "MLFLOW_EXPERIMENT_ID";
/// Env var with a bearer token for the REST backend.
pub const ENV_TRACKING_TOKEN: &str = "MLFLOW_TRACKING_TOKEN";
/// Env var with the basic-auth username for the REST backend.
pub const ENV_TRACKING_USERNAME: &str = "MLFLOW_TRACKING_USERNAME";
/// Env var with the basic-auth password for the REST backend.
pub const ENV_TRACKING_PASSWORD: &str = "MLFLOW_TRACKING_PASSWORD";
/// Env var with the REST request timeout in seconds.
pub const ENV_HTTP_TIMEOUT: &str = "MLFLOW_HTTP_REQUEST_TIMEOUT";
/// Env var disabling TLS certificate verification.
pub const ENV_INSECURE_TLS: &str = "MLFLOW_TRACKING_INSECURE_TLS";

/// Local store used when no tracking URI is configured.
pub const DEFAULT_TRACKING_DIR: &str = "run-records";
/// Default REST request timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Where runs are recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingUri {
    /// MLflow-compatible tracking server (`http://`, `https://`).
    Rest(Url),
    /// Local directory store (`file:` URI or a bare path).
    File(PathBuf),
    /// Process-local store (`memory://`), discarded on exit.
    Memory,
}

impl TrackingUri {
    /// Parse a tracking URI.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for empty input, unknown schemes, or a
    /// `file:` URI that does not map to a local path.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Config("tracking URI is empty".to_string()));
        }
        if raw == "memory" || raw.starts_with("memory:") {
            return Ok(Self::Memory);
        }
        if let Some(path) = relative_file_uri(raw) {
            return Ok(Self::File(path));
        }

        match Url::parse(raw) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Rest(url)),
                "file" => url
                    .to_file_path()
                    .map(Self::File)
                    .map_err(|()| Error::Config(format!("invalid file URI: {raw}"))),
                // Windows drive letters parse as one-letter schemes
                scheme if scheme.len() == 1 => Ok(Self::File(PathBuf::from(raw))),
                scheme => Err(Error::Config(format!(
                    "unsupported tracking URI scheme '{scheme}' in {raw}"
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Self::File(PathBuf::from(raw)))
            }
            Err(e) => Err(Error::Config(format!("invalid tracking URI {raw}: {e}"))),
        }
    }
}

/// Path of a relative `file:` URI such as `file:./mlruns`.
///
/// URL parsing would root these at `/`, so they are split off by hand.
pub(crate) fn relative_file_uri(raw: &str) -> Option<PathBuf> {
    let rest = raw.strip_prefix("file:")?;
    if rest.is_empty() || rest.starts_with('/') {
        return None;
    }
    Some(PathBuf::from(rest))
}

impl Default for TrackingUri {
    fn default() -> Self {
        Self::File(PathBuf::from(DEFAULT_TRACKING_DIR))
    }
}

impl fmt::Display for TrackingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => f.write_str("memory://"),
        }
    }
}

/// Which experiment new runs belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentSelector {
    /// Use this experiment ID as-is.
    Id(String),
    /// Look the experiment up by name, creating it if absent.
    Name(String),
}

impl Default for ExperimentSelector {
    fn default() -> Self {
        Self::Id(DEFAULT_EXPERIMENT_ID.to_string())
    }
}

/// REST credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP basic auth.
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({username}:***)"),
        }
    }
}

/// Resolved tracking configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Backend location
    pub tracking_uri: TrackingUri,
    /// Target experiment
    pub experiment: ExperimentSelector,
    /// REST credentials
    pub auth: Option<Auth>,
    /// REST request timeout
    pub timeout: Duration,
    /// Skip TLS certificate verification (REST only)
    pub insecure_tls: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracking_uri: TrackingUri::default(),
            experiment: ExperimentSelector::default(),
            auth: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            insecure_tls: false,
        }
    }
}

impl TrackingConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(uri) = var(ENV_TRACKING_URI) {
            config.tracking_uri = TrackingUri::parse(&uri)?;
        }

        if let Some(id) = var(ENV_EXPERIMENT_ID) {
            config.experiment = ExperimentSelector::Id(id);
        } else if let Some(name) = var(ENV_EXPERIMENT_NAME) {
            config.experiment = ExperimentSelector::Name(name);
        }

        config.auth = match (
            var(ENV_TRACKING_TOKEN),
            var(ENV_TRACKING_USERNAME),
            var(ENV_TRACKING_PASSWORD),
        ) {
            (Some(token), _, _) => Some(Auth::Bearer(token)),
            (None, Some(username), Some(password)) => Some(Auth::Basic { username, password }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(Error::Config(format!(
                    "{ENV_TRACKING_USERNAME} and {ENV_TRACKING_PASSWORD} must be set together"
                )));
            }
            (None, None, None) => None,
        };

        if let Some(raw) = var(ENV_HTTP_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_HTTP_TIMEOUT} must be whole seconds, got '{raw}'"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = var(ENV_INSECURE_TLS) {
            config.insecure_tls = matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1");
        }

        Ok(config)
    }

    /// Apply CLI overrides on top of the environment.
    ///
    /// An explicit experiment name replaces any env-provided experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `tracking_uri` does not parse.
    pub fn with_overrides(
        mut self,
        tracking_uri: Option<&str>,
        experiment_name: Option<&str>,
    ) -> Result<Self> {
        if let Some(uri) = tracking_uri {
            self.tracking_uri = TrackingUri::parse(uri)?;
        }
        if let Some(name) = experiment_name {
            self.experiment = ExperimentSelector::Name(name.to_string());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<TrackingConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        TrackingConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.tracking_uri, TrackingUri::File(PathBuf::from("run-records")));
        assert_eq!(config.experiment, ExperimentSelector::Id("0".to_string()));
        assert!(config.auth.is_none());
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.insecure_tls);
    }

    #[test]
    fn test_parse_tracking_uris() {
        assert!(matches!(
            TrackingUri::parse("http://localhost:5000").unwrap(),
            TrackingUri::Rest(_)
        ));
        assert_eq!(
            TrackingUri::parse("file:///tmp/mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("/tmp/mlruns"))
        );
        assert_eq!(
            TrackingUri::parse("./runs").unwrap(),
            TrackingUri::File(PathBuf::from("./runs"))
        );
        assert_eq!(TrackingUri::parse("memory://").unwrap(), TrackingUri::Memory);
        assert!(matches!(
            TrackingUri::parse("databricks://profile"),
            Err(Error::Config(_))
        ));
        assert!(matches!(TrackingUri::parse("  "), Err(Error::Config(_))));
    }

    #[test]
    fn test_relative_file_uri_stays_relative() {
        assert_eq!(
            TrackingUri::parse("file:./mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("./mlruns"))
        );
        assert_eq!(
            TrackingUri::parse("file:runs/local").unwrap(),
            TrackingUri::File(PathBuf::from("runs/local"))
        );
        assert_eq!(
            TrackingUri::parse("file:/srv/mlruns").unwrap(),
            TrackingUri::File(PathBuf::from("/srv/mlruns"))
        );
    }

    #[test]
    fn test_insecure_tls_flag() {
        assert!(config_from(&[(ENV_INSECURE_TLS, "true")]).unwrap().insecure_tls);
        assert!(config_from(&[(ENV_INSECURE_TLS, "1")]).unwrap().insecure_tls);
        assert!(!config_from(&[(ENV_INSECURE_TLS, "no")]).unwrap().insecure_tls);
    }

    #[test]
    fn test_experiment_id_wins_over_name() {
        let config = config_from(&[
            (ENV_EXPERIMENT_NAME, "demo"),
            (ENV_EXPERIMENT_ID, "42"),
        ])
        .unwrap();
        assert_eq!(config.experiment, ExperimentSelector::Id("42".to_string()));

        let config = config_from(&[(ENV_EXPERIMENT_NAME, "demo")]).unwrap();
        assert_eq!(config.experiment, ExperimentSelector::Name("demo".to_string()));
    }

    #[test]
    fn test_auth_resolution() {
        let config = config_from(&[
            (ENV_TRACKING_TOKEN, "tok"),
            (ENV_TRACKING_USERNAME, "u"),
        ])
        .unwrap();
        assert_eq!(config.auth, Some(Auth::Bearer("tok".to_string())));

        let config = config_from(&[
            (ENV_TRACKING_USERNAME, "u"),
            (ENV_TRACKING_PASSWORD, "p"),
        ])
        .unwrap();
        assert_eq!(
            config.auth,
            Some(Auth::Basic {
                username: "u".to_string(),
                password: "p".to_string()
            })
        );

        assert!(config_from(&[(ENV_TRACKING_USERNAME, "u")]).is_err());
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let debug = format!("{:?}", Auth::Bearer("secret-token".to_string()));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = config_from(&[(ENV_HTTP_TIMEOUT, "soon")]).unwrap_err();
        assert!(err.to_string().contains(ENV_HTTP_TIMEOUT));

        let config = config_from(&[(ENV_HTTP_TIMEOUT, "5")]).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_cli_overrides() {
        let config = config_from(&[(ENV_EXPERIMENT_ID, "3")])
            .unwrap()
            .with_overrides(Some("memory://"), Some("demo"))
            .unwrap();
        assert_eq!(config.tracking_uri, TrackingUri::Memory);
        assert_eq!(config.experiment, ExperimentSelector::Name("demo".to_string()));
    }
}
