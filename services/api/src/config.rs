use describe_core::{
    gemini::DEFAULT_BASE_URL,
    tutor::{DEFAULT_IMAGE_MODEL, DEFAULT_TUTOR_MODEL},
};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub gemini_api_key: SecretString,
    pub gemini_base_url: String,
    pub image_model: String,
    pub tutor_model: String,
    pub http_timeout: Duration,
    /// Sessions untouched this long are evicted.
    pub session_idle_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                ConfigError::MissingVar("GEMINI_API_KEY (or API_KEY) must be set".to_string())
            })?;

        let gemini_base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let image_model =
            std::env::var("IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string());
        let tutor_model =
            std::env::var("TUTOR_MODEL").unwrap_or_else(|_| DEFAULT_TUTOR_MODEL.to_string());

        let http_timeout = match std::env::var("HTTP_TIMEOUT_SECS") {
            Ok(secs) => secs
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "HTTP_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", secs),
                    )
                })?,
            Err(_) => Duration::from_secs(120),
        };

        let session_idle_timeout = match std::env::var("SESSION_IDLE_SECS") {
            Ok(secs) => secs
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "SESSION_IDLE_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", secs),
                    )
                })?,
            Err(_) => Duration::from_secs(30 * 60),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        Ok(Self {
            bind_address,
            gemini_api_key,
            gemini_base_url,
            image_model,
            tutor_model,
            http_timeout,
            session_idle_timeout,
            log_level,
            prompts_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("API_KEY");
            env::remove_var("GEMINI_BASE_URL");
            env::remove_var("IMAGE_MODEL");
            env::remove_var("TUTOR_MODEL");
            env::remove_var("HTTP_TIMEOUT_SECS");
            env::remove_var("SESSION_IDLE_SECS");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.gemini_api_key.expose_secret(), "test-gemini-key");
        assert_eq!(config.gemini_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.tutor_model, "gemini-2.5-flash");
        assert_eq!(config.http_timeout, Duration::from_secs(120));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, None);
    }

    #[test]
    #[serial]
    fn test_config_falls_back_to_api_key() {
        clear_env_vars();
        unsafe {
            env::set_var("API_KEY", "legacy-key");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.gemini_api_key.expose_secret(), "legacy-key");
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("GEMINI_API_KEY", "custom-gemini-key");
            env::set_var("GEMINI_BASE_URL", "http://localhost:9000/v1beta");
            env::set_var("IMAGE_MODEL", "imagen-test");
            env::set_var("TUTOR_MODEL", "gemini-test");
            env::set_var("HTTP_TIMEOUT_SECS", "30");
            env::set_var("SESSION_IDLE_SECS", "600");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.gemini_base_url, "http://localhost:9000/v1beta");
        assert_eq!(config.image_model, "imagen-test");
        assert_eq!(config.tutor_model, "gemini-test");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(600));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, Some(PathBuf::from("/custom/prompts")));
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_blank_api_key_is_missing() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "  ");
        }

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_timeout() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("HTTP_TIMEOUT_SECS", "0");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "HTTP_TIMEOUT_SECS"),
            _ => panic!("Expected InvalidValue for HTTP_TIMEOUT_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_session_idle() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("SESSION_IDLE_SECS", "soon");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "SESSION_IDLE_SECS"),
            _ => panic!("Expected InvalidValue for SESSION_IDLE_SECS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
