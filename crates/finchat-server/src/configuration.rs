use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use finchat::agent::{AgentConfig, DEFAULT_MAX_ROUNDS, DEFAULT_PREVIEW_ROWS};
use finchat::db::DEFAULT_MAX_ROWS;
use finchat::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use finchat::telemetry::TelemetryConfig;
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

/// Keys that have no default and must come from the environment
const REQUIRED: &[&str] = &["provider.api_key", "database.path"];

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiProviderConfig {
        OpenAiProviderConfig {
            host: self.host,
            api_key: self.api_key,
            model: self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

#[derive(Debug, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            preview_rows: default_preview_rows(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_rounds: self.agent.max_rounds,
            preview_rows: self.agent.preview_rows,
            telemetry: TelemetryConfig {
                enabled: self.telemetry.enabled,
                log_path: self.telemetry.log_path.clone(),
            },
            ..AgentConfig::default()
        }
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            .set_default("provider.temperature", 0.2)?
            // Database defaults
            .set_default("database.max_rows", default_max_rows() as u64)?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("FINCHAT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        for key in REQUIRED {
            if config.get::<config::Value>(key).is_err() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(key),
                });
            }
        }

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

fn default_max_rounds() -> usize {
    DEFAULT_MAX_ROUNDS
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "FINCHAT_SERVER__HOST",
        "FINCHAT_SERVER__PORT",
        "FINCHAT_PROVIDER__HOST",
        "FINCHAT_PROVIDER__API_KEY",
        "FINCHAT_PROVIDER__MODEL",
        "FINCHAT_PROVIDER__TEMPERATURE",
        "FINCHAT_DATABASE__PATH",
        "FINCHAT_DATABASE__MAX_ROWS",
        "FINCHAT_AGENT__MAX_ROUNDS",
        "FINCHAT_TELEMETRY__ENABLED",
        "FINCHAT_TELEMETRY__LOG_PATH",
        "FINCHAT_LOG__JSON",
    ];

    fn clean_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("FINCHAT_PROVIDER__API_KEY", "test-key");
        env::set_var("FINCHAT_DATABASE__PATH", "/tmp/finance.db");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.provider.host, "https://api.openai.com");
        assert_eq!(settings.provider.api_key, "test-key");
        assert_eq!(settings.provider.model, "gpt-4o-mini");
        assert_eq!(settings.provider.temperature, Some(0.2));
        assert_eq!(settings.database.path, PathBuf::from("/tmp/finance.db"));
        assert_eq!(settings.database.max_rows, 1000);
        assert_eq!(settings.agent.max_rounds, 5);
        assert!(settings.telemetry.enabled);
        assert!(!settings.log.json);

        clean_env();
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("FINCHAT_SERVER__PORT", "8080");
        env::set_var("FINCHAT_PROVIDER__API_KEY", "test-key");
        env::set_var("FINCHAT_PROVIDER__MODEL", "gpt-4o");
        env::set_var("FINCHAT_PROVIDER__TEMPERATURE", "0.8");
        env::set_var("FINCHAT_DATABASE__PATH", "/data/finance.db");
        env::set_var("FINCHAT_DATABASE__MAX_ROWS", "50");
        env::set_var("FINCHAT_AGENT__MAX_ROUNDS", "3");
        env::set_var("FINCHAT_TELEMETRY__ENABLED", "false");
        env::set_var("FINCHAT_TELEMETRY__LOG_PATH", "/tmp/events.jsonl");
        env::set_var("FINCHAT_LOG__JSON", "true");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.provider.model, "gpt-4o");
        assert_eq!(settings.provider.temperature, Some(0.8));
        assert_eq!(settings.database.max_rows, 50);
        assert!(settings.log.json);

        let agent = settings.agent_config();
        assert_eq!(agent.max_rounds, 3);
        assert_eq!(agent.preview_rows, 10);
        assert!(!agent.telemetry.enabled);
        assert_eq!(
            agent.telemetry.log_path,
            Some(PathBuf::from("/tmp/events.jsonl"))
        );

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();
        env::set_var("FINCHAT_DATABASE__PATH", "/tmp/finance.db");

        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "FINCHAT_PROVIDER__API_KEY");
            }
            other => panic!("Expected MissingEnvVar error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_database_path() {
        clean_env();
        env::set_var("FINCHAT_PROVIDER__API_KEY", "test-key");

        match Settings::new() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "FINCHAT_DATABASE__PATH")
            }
            other => panic!("Expected MissingEnvVar error, got {:?}", other),
        }

        clean_env();
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
