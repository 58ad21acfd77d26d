//! Configuration types and builders.

use crate::error::{ConfigError, McpError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::Duration;

/// Field names masked in every response unless overridden.
pub const DEFAULT_SENSITIVE_FIELDS: [&str; 5] = ["password", "email", "phone", "ssn", "credit_card"];

/// Transport used to receive MCP messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Http,
    Stdio,
}

impl TransportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "stdio" => Some(Self::Stdio),
            _ => None,
        }
    }
}

/// Remote Supabase project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    /// Service key: both the credential sent upstream and the secret
    /// callers must present as `x-api-key`.
    #[serde(skip_serializing)]
    pub service_key: String,
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
    pub transport: TransportKind,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3000,
            transport: TransportKind::default(),
        }
    }
}

impl ListenConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Admission pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_query_types: Vec<String>,
    pub query_timeout: Duration,
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_sweep_interval: Duration,
    /// Status returned when the rate limit rejects a request.
    pub rate_limit_status: u16,
    pub sensitive_fields: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_query_types: vec!["SELECT".into()],
            query_timeout: Duration::from_millis(5000),
            rate_limit: 100,
            rate_limit_window: Duration::from_millis(60_000),
            rate_limit_sweep_interval: Duration::from_millis(300_000),
            rate_limit_status: 401,
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub name: Cow<'static, str>,
    pub version: Cow<'static, str>,
    pub remote: RemoteConfig,
    pub server: ListenConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "supabase-mcp-gateway".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            remote: RemoteConfig::default(),
            server: ListenConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for GatewayConfig with fluent API.
#[derive(Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn supabase_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = url.into();
        self
    }

    pub fn service_key(mut self, key: impl Into<String>) -> Self {
        self.config.remote.service_key = key.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.config.server.transport = transport;
        self
    }

    pub fn allowed_query_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.security.allowed_query_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.security.query_timeout = timeout;
        self
    }

    pub fn rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.config.security.rate_limit = limit;
        self.config.security.rate_limit_window = window;
        self
    }

    pub fn rate_limit_status(mut self, status: u16) -> Self {
        self.config.security.rate_limit_status = status;
        self
    }

    pub fn sensitive_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.security.sensitive_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Build from environment variables.
    pub fn from_env(self) -> Result<Self> {
        self.from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.config.remote.url = url;
        }

        if let Some(key) = lookup("SUPABASE_SERVICE_KEY") {
            self.config.remote.service_key = key;
        }

        if let Some(host) = lookup("HOST") {
            self.config.server.host = host;
        }

        if let Some(port) = lookup("PORT") {
            self.config.server.port = parse_number("PORT", &port)?;
        }

        if let Some(transport) = lookup("MCP_TRANSPORT") {
            self.config.server.transport = TransportKind::parse(&transport).ok_or_else(|| {
                McpError::Config(ConfigError::InvalidValue {
                    field: "MCP_TRANSPORT".into(),
                    message: format!("Unknown transport: {}", transport).into(),
                })
            })?;
        }

        if let Some(types) = lookup("ALLOWED_QUERY_TYPES") {
            self.config.security.allowed_query_types = split_list(&types);
        }

        if let Some(timeout) = lookup("QUERY_TIMEOUT") {
            self.config.security.query_timeout =
                Duration::from_millis(parse_number("QUERY_TIMEOUT", &timeout)?);
        }

        if let Some(limit) = lookup("RATE_LIMIT") {
            self.config.security.rate_limit = parse_number("RATE_LIMIT", &limit)?;
        }

        if let Some(window) = lookup("RATE_LIMIT_WINDOW_MS") {
            self.config.security.rate_limit_window =
                Duration::from_millis(parse_number("RATE_LIMIT_WINDOW_MS", &window)?);
        }

        if let Some(sweep) = lookup("RATE_LIMIT_SWEEP_MS") {
            self.config.security.rate_limit_sweep_interval =
                Duration::from_millis(parse_number("RATE_LIMIT_SWEEP_MS", &sweep)?);
        }

        if let Some(status) = lookup("RATE_LIMIT_STATUS") {
            self.config.security.rate_limit_status = parse_number("RATE_LIMIT_STATUS", &status)?;
        }

        if let Some(fields) = lookup("SENSITIVE_FIELDS") {
            self.config.security.sensitive_fields = split_list(&fields);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.config.logging.level = level;
        }

        Ok(self)
    }

    pub fn build(self) -> Result<GatewayConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("SUPABASE_URL", self.config.remote.url.as_str()),
            ("SUPABASE_SERVICE_KEY", self.config.remote.service_key.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingField(missing.join(", ").into()).into());
        }

        let security = &self.config.security;
        if security.allowed_query_types.is_empty() {
            return Err(invalid("ALLOWED_QUERY_TYPES", "At least one query type is required"));
        }
        if security.query_timeout.is_zero() {
            return Err(invalid("QUERY_TIMEOUT", "Timeout must be greater than 0"));
        }
        if security.rate_limit == 0 {
            return Err(invalid("RATE_LIMIT", "Rate limit must be greater than 0"));
        }
        if security.rate_limit_window.as_millis() == 0 {
            return Err(invalid("RATE_LIMIT_WINDOW_MS", "Window must be at least 1ms"));
        }
        if !(400..=599).contains(&security.rate_limit_status) {
            return Err(invalid("RATE_LIMIT_STATUS", "Status must be a 4xx or 5xx code"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &'static str) -> McpError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
    .into()
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        McpError::Config(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("Not a valid number: {}", value).into(),
        })
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_minimal_env() {
        let config = GatewayConfigBuilder::new()
            .from_lookup(lookup(&[
                ("SUPABASE_URL", "https://abc.supabase.co"),
                ("SUPABASE_SERVICE_KEY", "service-key"),
            ]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.transport, TransportKind::Http);
        assert_eq!(config.security.allowed_query_types, vec!["SELECT"]);
        assert_eq!(config.security.query_timeout, Duration::from_millis(5000));
        assert_eq!(config.security.rate_limit, 100);
        assert_eq!(config.security.rate_limit_status, 401);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_required_lists_all() {
        let err = GatewayConfigBuilder::new()
            .from_lookup(lookup(&[]))
            .unwrap()
            .build()
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("SUPABASE_URL"));
        assert!(message.contains("SUPABASE_SERVICE_KEY"));
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfigBuilder::new()
            .from_lookup(lookup(&[
                ("SUPABASE_URL", "https://abc.supabase.co"),
                ("SUPABASE_SERVICE_KEY", "service-key"),
                ("PORT", "8080"),
                ("MCP_TRANSPORT", "stdio"),
                ("ALLOWED_QUERY_TYPES", "SELECT, WITH"),
                ("QUERY_TIMEOUT", "250"),
                ("RATE_LIMIT_STATUS", "429"),
                ("SENSITIVE_FIELDS", "token,secret"),
            ]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.transport, TransportKind::Stdio);
        assert_eq!(config.security.allowed_query_types, vec!["SELECT", "WITH"]);
        assert_eq!(config.security.query_timeout, Duration::from_millis(250));
        assert_eq!(config.security.rate_limit_status, 429);
        assert_eq!(config.security.sensitive_fields, vec!["token", "secret"]);
    }

    #[test]
    fn test_invalid_port() {
        let result = GatewayConfigBuilder::new().from_lookup(lookup(&[("PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_status() {
        let result = GatewayConfigBuilder::new()
            .supabase_url("https://abc.supabase.co")
            .service_key("k")
            .rate_limit_status(200)
            .build();
        assert!(result.is_err());
    }
}
