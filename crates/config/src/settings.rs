// Client configuration
// Loaded from ~/.config/crunch/config.toml, overridden by CRUNCH_* env vars

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_VAT_RATE: f64 = 20.0;

/// Request signature algorithm for the delegated-authorization headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureMethod {
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    #[serde(rename = "HMAC-SHA256")]
    HmacSha256,
}

impl SignatureMethod {
    /// Value sent as `oauth_signature_method`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
            SignatureMethod::HmacSha256 => "HMAC-SHA256",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HMAC-SHA1" => Some(SignatureMethod::HmacSha1),
            "HMAC-SHA256" => Some(SignatureMethod::HmacSha256),
            _ => None,
        }
    }
}

/// Every option the client recognizes. Unknown keys in the file are rejected
/// so a typo cannot silently fall back to a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL for the REST API (e.g. "https://api.example.com")
    pub api_endpoint: String,

    /// Base URL hosting the authorization handshake endpoints
    pub auth_endpoint: String,

    pub consumer_key: String,
    pub consumer_secret: String,

    /// Access token from a previous handshake; resumes the session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token_secret: Option<String>,

    /// Log every signed request and response
    pub debug: bool,

    /// VAT percentage applied to liable expenses and invoice lines
    pub vat_rate: f64,

    pub signature_method: SignatureMethod,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            auth_endpoint: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            oauth_token: None,
            oauth_token_secret: None,
            debug: false,
            vat_rate: DEFAULT_VAT_RATE,
            signature_method: SignatureMethod::default(),
        }
    }
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crunch")
        .join("config.toml")
}

impl ClientConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from an explicit file. The file must exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Load from `path` if given, else the default location (defaults if absent),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `CRUNCH_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("CRUNCH_API_ENDPOINT") {
            self.api_endpoint = v;
        }
        if let Some(v) = get("CRUNCH_AUTH_ENDPOINT") {
            self.auth_endpoint = v;
        }
        if let Some(v) = get("CRUNCH_CONSUMER_KEY") {
            self.consumer_key = v;
        }
        if let Some(v) = get("CRUNCH_CONSUMER_SECRET") {
            self.consumer_secret = v;
        }
        if let Some(v) = get("CRUNCH_OAUTH_TOKEN") {
            self.oauth_token = Some(v);
        }
        if let Some(v) = get("CRUNCH_OAUTH_TOKEN_SECRET") {
            self.oauth_token_secret = Some(v);
        }
        if let Some(v) = get("CRUNCH_DEBUG") {
            self.debug = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("CRUNCH_VAT_RATE") {
            self.vat_rate = v.parse().map_err(|_| ConfigError::Invalid {
                option: "vat_rate",
                message: format!("not a number: {:?}", v),
            })?;
        }
        if let Some(v) = get("CRUNCH_SIGNATURE_METHOD") {
            self.signature_method =
                SignatureMethod::parse(&v).ok_or_else(|| ConfigError::Invalid {
                    option: "signature_method",
                    message: format!("expected HMAC-SHA1 or HMAC-SHA256, got {:?}", v),
                })?;
        }
        Ok(())
    }

    /// Check the options needed to talk to the API at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("api_endpoint"));
        }
        if self.consumer_key.trim().is_empty() {
            return Err(ConfigError::Missing("consumer_key"));
        }
        if self.consumer_secret.trim().is_empty() {
            return Err(ConfigError::Missing("consumer_secret"));
        }
        if !self.vat_rate.is_finite() || !(0.0..=100.0).contains(&self.vat_rate) {
            return Err(ConfigError::Invalid {
                option: "vat_rate",
                message: format!("{} is outside 0..=100", self.vat_rate),
            });
        }
        match (&self.oauth_token, &self.oauth_token_secret) {
            (Some(_), None) => Err(ConfigError::Missing("oauth_token_secret")),
            (None, Some(_)) => Err(ConfigError::Missing("oauth_token")),
            _ => Ok(()),
        }
    }

    /// Check the handshake endpoint in addition to [`validate`](Self::validate).
    pub fn validate_for_authorization(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.auth_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("auth_endpoint"));
        }
        Ok(())
    }

    /// True when a stored access token can resume the session.
    pub fn has_tokens(&self) -> bool {
        self.oauth_token.is_some() && self.oauth_token_secret.is_some()
    }

    /// Persist an access-token pair into the config file at `path`, keeping
    /// every other key. Creates the parent directory; 0600 on Unix.
    pub fn save_tokens(path: &Path, token: &str, token_secret: &str) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut table: toml::Table = if path.exists() {
            let contents = fs::read_to_string(path).map_err(io_err)?;
            contents
                .parse()
                .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?
        } else {
            toml::Table::new()
        };

        table.insert("oauth_token".into(), toml::Value::String(token.to_string()));
        table.insert(
            "oauth_token_secret".into(),
            toml::Value::String(token_secret.to_string()),
        );

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let contents =
            toml::to_string_pretty(&table).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(io_err)?;

        // mode() only applies on create; tighten an existing file before writing
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        file.write_all(contents.as_bytes()).map_err(io_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> ClientConfig {
        ClientConfig {
            api_endpoint: "https://api.test".into(),
            auth_endpoint: "https://auth.test".into(),
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.vat_rate, 20.0);
        assert!(!config.debug);
        assert!(config.oauth_token.is_none());
        assert_eq!(config.signature_method, SignatureMethod::HmacSha1);
    }

    #[test]
    fn test_from_toml_partial_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
api_endpoint = "https://api.test"
consumer_key = "k"
consumer_secret = "s"
debug = true
"#,
        )
        .unwrap();
        assert_eq!(config.api_endpoint, "https://api.test");
        assert!(config.debug);
        assert_eq!(config.vat_rate, DEFAULT_VAT_RATE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_rejects_unknown_option() {
        let err = ClientConfig::from_toml("vat_rte = 17.5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_signature_method_from_toml() {
        let config = ClientConfig::from_toml(r#"signature_method = "HMAC-SHA256""#).unwrap();
        assert_eq!(config.signature_method, SignatureMethod::HmacSha256);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("CRUNCH_API_ENDPOINT", "https://override.test"),
            ("CRUNCH_VAT_RATE", "17.5"),
            ("CRUNCH_DEBUG", "true"),
            ("CRUNCH_OAUTH_TOKEN", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = complete();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_endpoint, "https://override.test");
        assert_eq!(config.vat_rate, 17.5);
        assert!(config.debug);
        // Blank values are ignored
        assert!(config.oauth_token.is_none());
    }

    #[test]
    fn test_override_bad_vat_rate() {
        let mut config = complete();
        let err = config
            .apply_overrides(|name| (name == "CRUNCH_VAT_RATE").then(|| "twenty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("vat_rate"));
    }

    #[test]
    fn test_validate_missing_fields() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("api_endpoint")));

        let mut config = complete();
        config.auth_endpoint.clear();
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_for_authorization().unwrap_err(),
            ConfigError::Missing("auth_endpoint")
        ));
    }

    #[test]
    fn test_validate_vat_rate_range() {
        let mut config = complete();
        config.vat_rate = 120.0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { option: "vat_rate", .. }
        ));
        config.vat_rate = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_half_token_pair() {
        let mut config = complete();
        config.oauth_token = Some("tok".into());
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Missing("oauth_token_secret")
        ));
        config.oauth_token_secret = Some("sec".into());
        assert!(config.validate().is_ok());
        assert!(config.has_tokens());
    }

    #[test]
    fn test_save_tokens_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "api_endpoint = \"https://api.test\"\nconsumer_key = \"k\"\nconsumer_secret = \"s\"\n",
        )
        .unwrap();

        ClientConfig::save_tokens(&path, "tok123", "sec456").unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api_endpoint, "https://api.test");
        assert_eq!(loaded.oauth_token.as_deref(), Some("tok123"));
        assert_eq!(loaded.oauth_token_secret.as_deref(), Some("sec456"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_save_tokens_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crunch").join("config.toml");
        ClientConfig::save_tokens(&path, "t", "s").unwrap();
        let loaded = ClientConfig::from_file(&path).unwrap();
        assert!(loaded.has_tokens());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_save_tokens_tightens_readable_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "consumer_key = \"k\"\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        ClientConfig::save_tokens(&path, "t", "s").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(ClientConfig::from_file(&path).unwrap().consumer_key, "k");
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains("crunch"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
