use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "fineweb-filter";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dataset filtered by default.
pub const DEFAULT_DATASET: &str = "HuggingFaceFW/fineweb";

/// Root folder for snapshot sidecars and batch outputs.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Extension of every batch output file.
pub const OUTPUT_EXT: &str = "csv";

/// Groq's OpenAI-compatible endpoint.
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// HTTP timeout for a single completion request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Attempts per completion before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,fineweb_filter_lib=debug"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime configuration sourced from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub primary_model: String,
    /// Fallback capacity used while the primary model is throttled.
    pub alternate_model: Option<String>,
    pub dataset: String,
    pub data_dir: PathBuf,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Read configuration from the real process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("GROQ_API_KEY").ok_or(ConfigError::MissingVar("GROQ_API_KEY"))?;
        let primary_model = get("GROQ_MODEL").ok_or(ConfigError::MissingVar("GROQ_MODEL"))?;

        let timeout_secs = match get("GROQ_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "GROQ_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            base_url: get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            primary_model,
            alternate_model: get("GROQ_ALTERNATIVE_MODEL"),
            dataset: get("FINEWEB_DATASET").unwrap_or_else(|| DEFAULT_DATASET.to_string()),
            data_dir: get("FINEWEB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("GROQ_MODEL", "llama3-70b")]))
                .unwrap();
        assert_eq!(config.primary_model, "llama3-70b");
        assert_eq!(config.alternate_model, None);
        assert_eq!(config.base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(config.dataset, DEFAULT_DATASET);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn alternate_model_read_when_present() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("GROQ_MODEL", "a"),
            ("GROQ_ALTERNATIVE_MODEL", "b"),
        ]))
        .unwrap();
        assert_eq!(config.alternate_model.as_deref(), Some("b"));
    }

    #[test]
    fn blank_alternate_is_unset() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("GROQ_MODEL", "a"),
            ("GROQ_ALTERNATIVE_MODEL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.alternate_model, None);
    }

    #[test]
    fn missing_model_is_error() {
        let err = AppConfig::from_lookup(lookup(&[("GROQ_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GROQ_MODEL")));
    }

    #[test]
    fn missing_api_key_is_error() {
        let err = AppConfig::from_lookup(lookup(&[("GROQ_MODEL", "a")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GROQ_API_KEY")));
    }

    #[test]
    fn bad_timeout_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("GROQ_MODEL", "a"),
            ("GROQ_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "GROQ_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
