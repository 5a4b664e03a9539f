//! Gateway configuration loading.
//!
//! YAML is the sole config source; a CLI `--port` flag (see `main.rs`) may
//! override the file's port after loading.
//!
//! # Required fields
//! - `port`
//! - `integrations` (must contain at least `$connect` and `$disconnect`)
//!
//! All other fields have defaults matching the cloud service's own
//! conventions.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMode {
    LambdaProxy,
    HttpHeaders,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub stage: String,
    pub api_id: String,
    pub domain_name: String,
    pub integration_mode: IntegrationMode,
    pub route_selection_expression: Option<String>,
    pub integrations: HashMap<String, String>,
    pub idle_timeout_secs: u64,
    pub hard_timeout_secs: u64,
    pub verbose: bool,
}

// ---------------------------------------------------------------------------
// Raw YAML deserialization types (all-Option, validated after parsing)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    port: Option<u16>,
    stage: Option<String>,
    #[serde(rename = "apiId")]
    api_id: Option<String>,
    #[serde(rename = "domainName")]
    domain_name: Option<String>,
    #[serde(rename = "integrationMode")]
    integration_mode: Option<String>,
    #[serde(rename = "routeSelectionExpression")]
    route_selection_expression: Option<String>,
    integrations: Option<HashMap<String, String>>,
    #[serde(rename = "idleTimeoutSeconds")]
    idle_timeout_seconds: Option<u64>,
    #[serde(rename = "hardTimeoutSeconds")]
    hard_timeout_seconds: Option<u64>,
    verbose: Option<bool>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load config from a path on disk.
pub fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    let yaml_str = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_config_from_str(&yaml_str)
}

/// Load config from a YAML string, applying defaults and validating.
pub fn load_config_from_str(yaml_str: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(yaml_str)?;

    let port = raw
        .port
        .ok_or_else(|| ConfigError::MissingField("port".to_owned()))?;

    let stage = raw.stage.unwrap_or_else(|| "dev".to_owned());
    if stage.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "stage".to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }

    let api_id = raw.api_id.unwrap_or_else(|| "local".to_owned());
    if api_id.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "apiId".to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }

    let domain_name = match raw.domain_name {
        Some(d) if !d.is_empty() => d,
        _ => format!("localhost:{port}"),
    };

    let integration_mode = match raw.integration_mode.as_deref() {
        None | Some("lambda-proxy") => IntegrationMode::LambdaProxy,
        Some("http-headers") => IntegrationMode::HttpHeaders,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                field: "integrationMode".to_owned(),
                reason: format!("unrecognized mode '{other}'"),
            })
        }
    };

    let integrations = raw.integrations.unwrap_or_default();
    for (key, uri) in &integrations {
        if key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "integrations".to_owned(),
                reason: "route keys must not be empty".to_owned(),
            });
        }
        if url::Url::parse(uri).is_err() {
            return Err(ConfigError::InvalidValue {
                field: format!("integrations.{key}"),
                reason: format!("'{uri}' is not a valid absolute URI"),
            });
        }
    }

    let idle_timeout_secs = raw.idle_timeout_seconds.unwrap_or(600);
    let hard_timeout_secs = raw.hard_timeout_seconds.unwrap_or(7200);
    let verbose = raw.verbose.unwrap_or(false);

    Ok(Config {
        port,
        stage,
        api_id,
        domain_name,
        integration_mode,
        route_selection_expression: raw.route_selection_expression,
        integrations,
        idle_timeout_secs,
        hard_timeout_secs,
        verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
port: 3001
stage: dev
apiId: local
integrationMode: lambda-proxy
routeSelectionExpression: "$request.body.action"
idleTimeoutSeconds: 10
hardTimeoutSeconds: 120
integrations:
  "$connect": "http://localhost:4000/connect"
  "$disconnect": "http://localhost:4000/disconnect"
  "$default": "http://localhost:4000/default"
  join: "http://localhost:4000/join"
"#
    }

    #[test]
    fn loads_full_config_with_all_fields() {
        let cfg = load_config_from_str(sample_yaml()).expect("should parse");
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.integration_mode, IntegrationMode::LambdaProxy);
        assert_eq!(cfg.idle_timeout_secs, 10);
        assert_eq!(cfg.hard_timeout_secs, 120);
        assert_eq!(cfg.integrations.len(), 4);
        assert_eq!(
            cfg.route_selection_expression.as_deref(),
            Some("$request.body.action")
        );
    }

    #[test]
    fn defaults_domain_name_to_localhost_when_empty() {
        let cfg = load_config_from_str("port: 4000\n").expect("should parse");
        assert_eq!(cfg.domain_name, "localhost:4000");
        assert_eq!(cfg.stage, "dev");
        assert_eq!(cfg.api_id, "local");
        assert_eq!(cfg.idle_timeout_secs, 600);
        assert_eq!(cfg.hard_timeout_secs, 7200);
        assert!(!cfg.verbose);
    }

    #[test]
    fn rejects_missing_port() {
        let err = load_config_from_str("stage: dev\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "port"));
    }

    #[test]
    fn rejects_unrecognized_integration_mode() {
        let yaml = "port: 3001\nintegrationMode: carrier-pigeon\n";
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "integrationMode"));
    }

    #[test]
    fn rejects_malformed_integration_uri() {
        let yaml = "port: 3001\nintegrations:\n  \"$connect\": \"not-a-uri\"\n";
        let err = load_config_from_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "integrations.$connect"));
    }

    #[test]
    fn http_headers_mode_is_recognized() {
        let yaml = "port: 3001\nintegrationMode: http-headers\n";
        let cfg = load_config_from_str(yaml).expect("should parse");
        assert_eq!(cfg.integration_mode, IntegrationMode::HttpHeaders);
    }
}
