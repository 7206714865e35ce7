use hyper::header::HeaderValue;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

pub const CLIENT_SHARED_KEY_ENV: &str = "CLIENT_SHARED_KEY";
pub const STORE_TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Health path must start with '/': {0}")]
    InvalidHealthPath(String),

    #[error("Store base URL cannot be used as a base: {0}")]
    InvalidBaseUrl(Url),

    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(&'static str),

    #[error("Empty default for {0}")]
    EmptyDefault(&'static str),
}

/// Save proxy configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Public listener serving the save endpoint and the health probe
    #[serde(default)]
    pub listener: Listener,
    /// Optional admin listener serving `/health` and `/ready`
    #[serde(default)]
    pub admin_listener: Option<Listener>,
    /// Path answered by the health probe; everything else is the save endpoint
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default)]
    pub store: StoreConfig,
    /// Location used for any field the caller leaves out
    #[serde(default)]
    pub defaults: LocationDefaults,
    #[serde(default)]
    pub cors: CorsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin_listener) = &self.admin_listener {
            admin_listener.validate()?;
        }

        if !self.health_path.starts_with('/') {
            return Err(ValidationError::InvalidHealthPath(
                self.health_path.clone(),
            ));
        }

        self.store.validate()?;
        self.defaults.validate()?;

        if HeaderValue::from_str(&self.cors.allow_origin).is_err() {
            return Err(ValidationError::InvalidHeaderValue("cors.allow_origin"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: None,
            health_path: default_health_path(),
            store: StoreConfig::default(),
            defaults: LocationDefaults::default(),
            cors: CorsConfig::default(),
        }
    }
}

fn default_health_path() -> String {
    "/api/health".into()
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Remote content store endpoint
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// API root of the store, e.g. `https://api.github.com`
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    /// Client label sent as `User-Agent` on every outbound call
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.cannot_be_a_base() {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.user_agent.is_empty() || HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(ValidationError::InvalidHeaderValue("store.user_agent"));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("https://api.github.com").expect("static URL is valid")
}

fn default_user_agent() -> String {
    "sth-directory-proxy".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationDefaults {
    pub owner: String,
    pub repository: String,
    pub path: String,
    pub branch: String,
}

impl LocationDefaults {
    fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("defaults.owner", &self.owner),
            ("defaults.repository", &self.repository),
            ("defaults.path", &self.path),
            ("defaults.branch", &self.branch),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(ValidationError::EmptyDefault(name));
            }
        }
        Ok(())
    }
}

impl Default for LocationDefaults {
    fn default() -> Self {
        LocationDefaults {
            owner: "synergytao".into(),
            repository: "synergytaohub-directory".into(),
            path: "data/directory.json".into(),
            branch: "main".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    /// Preflight cache lifetime
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allow_origin: "*".into(),
            max_age_secs: 86400,
        }
    }
}

/// Secrets read once at startup. Values never leave the process; `Debug`
/// prints lengths only.
#[derive(Clone, Default, PartialEq)]
pub struct Secrets {
    /// Expected value of the caller's `X-API-Key` or bearer token
    pub client_shared_key: String,
    /// Token used to authorize calls to the remote store
    pub store_token: String,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Secrets {
            client_shared_key: lookup(CLIENT_SHARED_KEY_ENV).unwrap_or_default(),
            store_token: lookup(STORE_TOKEN_ENV).unwrap_or_default(),
        }
    }

    /// Length in characters, as reported by the health probe.
    pub fn client_shared_key_len(&self) -> usize {
        self.client_shared_key.chars().count()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("client_shared_key_len", &self.client_shared_key_len())
            .field("store_token_len", &self.store_token.chars().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "127.0.0.1"
    port: 8080
admin_listener:
    host: "127.0.0.1"
    port: 8081
health_path: /healthz
store:
    base_url: "https://github.example.com/api/v3"
    user_agent: directory-admin
defaults:
    owner: acme
    path: data/people.json
cors:
    allow_origin: "https://admin.acme.org"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.admin_listener.as_ref().unwrap().port, 8081);
        assert_eq!(config.health_path, "/healthz");
        assert_eq!(
            config.store.base_url.as_str(),
            "https://github.example.com/api/v3"
        );
        assert_eq!(config.defaults.owner, "acme");
        // Unset defaults keep their built-in values
        assert_eq!(config.defaults.repository, "synergytaohub-directory");
        assert_eq!(config.defaults.branch, "main");
        assert_eq!(config.cors.max_age_secs, 86400);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.health_path, "/api/health");
        assert_eq!(config.store.base_url.as_str(), "https://api.github.com/");
        assert_eq!(config.store.user_agent, "sth-directory-proxy");
        assert!(config.admin_listener.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config::default();

        let mut config = base_config.clone();
        config.listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config.clone();
        config.admin_listener = Some(Listener {
            host: "127.0.0.1".into(),
            port: 0,
        });
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config.clone();
        config.health_path = "health".into();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidHealthPath(_)
        ));

        let mut config = base_config.clone();
        config.store.base_url = Url::parse("mailto:ops@example.org").unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidBaseUrl(_)
        ));

        let mut config = base_config.clone();
        config.store.user_agent = String::new();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidHeaderValue("store.user_agent")
        ));

        let mut config = base_config.clone();
        config.defaults.branch = String::new();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::EmptyDefault("defaults.branch")
        ));

        let mut config = base_config;
        config.cors.allow_origin = "a\u{7f}b".into();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidHeaderValue("cors.allow_origin")
        ));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid URL
        assert!(serde_yaml::from_str::<Config>("store: {base_url: not-a-url}").is_err());

        // Invalid port type
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: "not_a_number"}
"#
            )
            .is_err()
        );

        // Missing required listener field
        assert!(serde_yaml::from_str::<Config>("listener: {host: 0.0.0.0}").is_err());
    }

    #[test]
    fn test_secrets_lookup_and_redaction() {
        let env = HashMap::from([
            (CLIENT_SHARED_KEY_ENV, "abc123".to_string()),
            (STORE_TOKEN_ENV, "ghp_secret".to_string()),
        ]);
        let secrets = Secrets::from_lookup(|name| env.get(name).cloned());
        assert_eq!(secrets.client_shared_key, "abc123");
        assert_eq!(secrets.store_token, "ghp_secret");

        let debug = format!("{secrets:?}");
        assert!(!debug.contains("abc123"));
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("client_shared_key_len: 6"));

        let multibyte = Secrets {
            client_shared_key: "clé-ü".into(),
            store_token: String::new(),
        };
        assert_eq!(multibyte.client_shared_key_len(), 5);
        assert!(format!("{multibyte:?}").contains("client_shared_key_len: 5"));

        let missing = Secrets::from_lookup(|_| None);
        assert_eq!(missing, Secrets::default());
    }
}
