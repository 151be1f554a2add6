//! Application configuration loaded from `config/agent.toml`.
//!
//! Secrets never live in the TOML file: the `client_secret` and `api_key`
//! fields name environment variables, resolved at load time (with
//! `config/.env` honored for local development).

use crate::application::auth::IdentityConfig;
use crate::application::orchestrator::DEFAULT_MAX_TOOL_STEPS;
use crate::application::plugins::SanitizeTarget;
use dotenvy::from_filename;
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use thiserror::Error;
use tracing::{debug, warn};

/// Default config file path - can be overridden via CLI argument
pub const CONFIG_PATH: &str = "config/agent.toml";

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const DEFAULT_AUDIENCE: &str = "https://graph.microsoft.com/.default";

static ENV_LOADER: Once = Once::new();

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required field '{field}' in [identity]")]
    MissingIdentityField { field: &'static str },

    #[error("missing required field '{field}' in [model]")]
    MissingModelField { field: &'static str },
}

/// Completion backend settings.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Backend kind: "azure-openai" or "ollama"
    pub provider: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Deployment name (Azure) or model name (Ollama)
    pub model: String,
    pub api_version: String,
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub model: ModelConfig,
    /// Directory whose `plugins/` subdirectory holds the manifests
    pub root: PathBuf,
    pub sanitize: SanitizeTarget,
    pub max_tool_steps: usize,
}

impl AppConfig {
    /// Load configuration from a file path (or the default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        ensure_env_loaded();
        let config_path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));
        read_config(config_path)
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    identity: RawIdentity,
    #[serde(default)]
    model: RawModel,
    root: Option<PathBuf>,
    #[serde(default)]
    sanitize: RawSanitize,
    max_tool_steps: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawIdentity {
    client_id: Option<String>,
    tenant_id: Option<String>,
    /// Name of the environment variable holding the secret
    client_secret: Option<String>,
    authority: Option<String>,
    audience: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawModel {
    provider: Option<String>,
    endpoint: Option<String>,
    /// Name of the environment variable holding the key
    api_key: Option<String>,
    model: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawSanitize {
    operation: Option<String>,
    parameter: Option<String>,
}

/// Ensures environment variables are loaded from config/.env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename("config/.env");
    });
}

/// Resolve a secret from the environment variable a config field names.
fn resolve_secret(field: &str, spec: Option<&str>) -> Option<String> {
    let raw = spec.map(str::trim).filter(|value| !value.is_empty())?;
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                field,
                env_var = raw,
                %err,
                "Secret environment variable is not set"
            );
            None
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_and_build(parsed)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let identity = IdentityConfig {
        client_id: parsed
            .identity
            .client_id
            .ok_or(ConfigError::MissingIdentityField { field: "client_id" })?,
        tenant_id: parsed
            .identity
            .tenant_id
            .ok_or(ConfigError::MissingIdentityField { field: "tenant_id" })?,
        client_secret: resolve_secret("client_secret", parsed.identity.client_secret.as_deref())
            .unwrap_or_default(),
        authority: parsed
            .identity
            .authority
            .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
        audience: parsed
            .identity
            .audience
            .unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
    };

    let model = ModelConfig {
        provider: parsed
            .model
            .provider
            .ok_or(ConfigError::MissingModelField { field: "provider" })?,
        endpoint: parsed
            .model
            .endpoint
            .ok_or(ConfigError::MissingModelField { field: "endpoint" })?,
        api_key: resolve_secret("api_key", parsed.model.api_key.as_deref()),
        model: parsed
            .model
            .model
            .ok_or(ConfigError::MissingModelField { field: "model" })?,
        api_version: parsed.model.api_version.unwrap_or_default(),
    };

    let default_target = SanitizeTarget::default();
    let sanitize = SanitizeTarget::new(
        parsed
            .sanitize
            .operation
            .unwrap_or_else(|| default_target.operation.clone()),
        parsed
            .sanitize
            .parameter
            .unwrap_or_else(|| default_target.parameter.clone()),
    );

    Ok(AppConfig {
        identity,
        model,
        root: parsed.root.unwrap_or_else(|| PathBuf::from(".")),
        sanitize,
        max_tool_steps: parsed.max_tool_steps.unwrap_or(DEFAULT_MAX_TOOL_STEPS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp config");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_full_configuration() {
        let file = write_config(
            r#"
root = "/srv/agent"
max_tool_steps = 8

[identity]
client_id = "app-id"
tenant_id = "tenant-id"
authority = "https://login.example.com"

[model]
provider = "ollama"
endpoint = "http://localhost:11434"
model = "llama3"

[sanitize]
operation = "me_sendMail"
parameter = "payload"
"#,
        );

        let config = AppConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.identity.client_id, "app-id");
        assert_eq!(config.identity.authority, "https://login.example.com");
        assert_eq!(config.identity.audience, DEFAULT_AUDIENCE);
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.root, PathBuf::from("/srv/agent"));
        assert_eq!(config.max_tool_steps, 8);
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let file = write_config(
            r#"
[identity]
client_id = "app-id"
tenant_id = "tenant-id"

[model]
provider = "azure-openai"
endpoint = "https://example.openai.azure.com"
model = "gpt-4o"
api_version = "2024-10-21"
"#,
        );

        let config = AppConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.identity.authority, DEFAULT_AUTHORITY);
        assert_eq!(config.max_tool_steps, DEFAULT_MAX_TOOL_STEPS);
        assert_eq!(config.sanitize.operation, "me_sendMail");
        assert_eq!(config.sanitize.parameter, "payload");
        assert_eq!(config.root, PathBuf::from("."));
    }

    #[test]
    fn missing_identity_field_is_reported() {
        let file = write_config(
            r#"
[identity]
tenant_id = "tenant-id"

[model]
provider = "ollama"
endpoint = "http://localhost:11434"
model = "llama3"
"#,
        );

        let error = AppConfig::load(Some(file.path())).expect_err("should fail");
        assert!(matches!(
            error,
            ConfigError::MissingIdentityField { field: "client_id" }
        ));
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let error =
            AppConfig::load(Some(Path::new("/nonexistent/agent.toml"))).expect_err("should fail");
        assert!(matches!(error, ConfigError::NotFound { .. }));
    }

    #[test]
    fn secret_fields_resolve_from_the_environment() {
        std::env::set_var("TEST_AGENT_SECRET", "resolved-secret");
        let file = write_config(
            r#"
[identity]
client_id = "app-id"
tenant_id = "tenant-id"
client_secret = "TEST_AGENT_SECRET"

[model]
provider = "ollama"
endpoint = "http://localhost:11434"
model = "llama3"
"#,
        );

        let config = AppConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.identity.client_secret, "resolved-secret");
    }
}
