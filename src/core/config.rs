use std::env;
use std::time::Duration;

use url::Url;

use super::models::EndpointKind;
use crate::errors::ProbeError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_KEY: &str = "your_api_key";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: DEFAULT_API_KEY.to_string(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
        }
    }
}

impl ProbeConfig {
    /// Reads `INFERNO_*` variables, falling back to the defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::ConfigError`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ProbeError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ProbeConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::ConfigError`] when a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProbeError> {
        let defaults = Self::default();
        let parse = |name: &str| lookup(name).map(|raw| (name.to_string(), raw));
        Ok(Self {
            host: lookup("INFERNO_HOST").unwrap_or(defaults.host),
            port: parse_var(parse("INFERNO_PORT"))?.unwrap_or(defaults.port),
            api_key: lookup("INFERNO_API_KEY").unwrap_or(defaults.api_key),
            model: lookup("INFERNO_MODEL"),
            max_tokens: parse_var(parse("INFERNO_MAX_TOKENS"))?.unwrap_or(defaults.max_tokens),
            temperature: parse_var(parse("INFERNO_TEMPERATURE"))?
                .unwrap_or(defaults.temperature),
            timeout: parse_var::<u64>(parse("INFERNO_TIMEOUT_SECS"))?.map(Duration::from_secs),
        })
    }

    /// `http://{host}:{port}/v1`
    pub fn base_url(&self) -> Result<Url, ProbeError> {
        let url = Url::parse(&format!("http://{}:{}/v1", self.host, self.port))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ProbeError::ConfigError(format!(
                "host {:?} is not a valid hostname",
                self.host
            )));
        }
        Ok(url)
    }

    pub fn endpoint_url(&self, kind: EndpointKind) -> Result<String, ProbeError> {
        Ok(endpoint_url(&self.base_url()?, kind))
    }
}

/// Joins the endpoint path onto a `/v1` base, tolerating a trailing slash.
#[must_use]
pub fn endpoint_url(base: &Url, kind: EndpointKind) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), kind.path())
}

/// Parses a looked-up `(name, raw)` pair; an unset variable is `None`.
fn parse_var<T>(var: Option<(String, String)>) -> Result<Option<T>, ProbeError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some((name, raw)) = var else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| ProbeError::ConfigError(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let config = ProbeConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.api_key, DEFAULT_API_KEY);
        assert_eq!(config.model, None);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert!((config.temperature - DEFAULT_TEMPERATURE).abs() < f64::EPSILON);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ProbeConfig::from_lookup(lookup_from(&[
            ("INFERNO_HOST", "10.0.0.5"),
            ("INFERNO_PORT", " 9001 "),
            ("INFERNO_API_KEY", "secret"),
            ("INFERNO_MODEL", "tiny"),
            ("INFERNO_MAX_TOKENS", "64"),
            ("INFERNO_TEMPERATURE", "0.25"),
            ("INFERNO_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 9001);
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.model.as_deref(), Some("tiny"));
        assert_eq!(config.max_tokens, 64);
        assert!((config.temperature - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.endpoint_url(EndpointKind::Completion).unwrap(),
            "http://10.0.0.5:9001/v1/completions"
        );
    }

    #[test]
    fn test_from_lookup_bad_port_is_config_error() {
        let err = ProbeConfig::from_lookup(lookup_from(&[("INFERNO_PORT", "abc")])).unwrap_err();

        match err {
            ProbeError::ConfigError(message) => assert!(message.starts_with("INFERNO_PORT: ")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_endpoint_urls() {
        let config = ProbeConfig::default();

        assert_eq!(
            config.endpoint_url(EndpointKind::Completion).unwrap(),
            "http://localhost:8000/v1/completions"
        );
        assert_eq!(
            config.endpoint_url(EndpointKind::Chat).unwrap(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_url_with_trailing_slash_base() {
        let base = Url::parse("http://127.0.0.1:9000/v1/").unwrap();
        assert_eq!(
            endpoint_url(&base, EndpointKind::Chat),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_host_is_config_error() {
        let config = ProbeConfig {
            host: "bad host".to_string(),
            ..ProbeConfig::default()
        };

        let err = config.base_url().unwrap_err();
        assert!(matches!(err, ProbeError::ConfigError(_)));
    }
}
