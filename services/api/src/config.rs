use std::net::SocketAddr;
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
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Primary session store. When unset (or unreachable) the service falls
    /// back to the in-memory store.
    pub redis_url: Option<String>,
    pub openai_api_key: String,
    pub chat_model: String,
    pub deepgram_api_key: String,
    pub deepgram_base_url: String,
    pub cartesia_api_key: String,
    pub cartesia_base_url: String,
    pub cartesia_voice_id: String,
    pub cartesia_voice_id_spanish: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    /// Public base URL of this service, used to build webhook and
    /// media-stream URLs handed to Twilio.
    pub backend_url: String,
    /// Public base URL of the review form handed out over SMS.
    pub frontend_url: String,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
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

        let redis_url = std::env::var("REDIS_URL").ok();

        let openai_api_key = required("OPENAI_API_KEY")?;
        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let deepgram_api_key = required("DEEPGRAM_API_KEY")?;
        let deepgram_base_url = std::env::var("DEEPGRAM_BASE_URL")
            .unwrap_or_else(|_| "wss://api.deepgram.com/v1/listen".to_string());

        let cartesia_api_key = required("CARTESIA_API_KEY")?;
        let cartesia_base_url = std::env::var("CARTESIA_BASE_URL")
            .unwrap_or_else(|_| "https://api.cartesia.ai".to_string());
        let cartesia_voice_id = std::env::var("CARTESIA_VOICE_ID")
            .unwrap_or_else(|_| "a0e99841-438c-4a64-b679-ae501e7d6091".to_string());
        let cartesia_voice_id_spanish = std::env::var("CARTESIA_VOICE_ID_SPANISH")
            .unwrap_or_else(|_| "79a125e8-cd45-4c13-8a67-188112f4dd22".to_string());

        let twilio_account_sid = required("TWILIO_ACCOUNT_SID")?;
        let twilio_auth_token = required("TWILIO_AUTH_TOKEN")?;
        let twilio_phone_number = required("TWILIO_PHONE_NUMBER")?;

        let backend_url = required("BACKEND_URL")?;
        let backend_url = backend_url.trim_end_matches('/').to_string();
        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3001".to_string())
            .trim_end_matches('/')
            .to_string();

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            redis_url,
            openai_api_key,
            chat_model,
            deepgram_api_key,
            deepgram_base_url,
            cartesia_api_key,
            cartesia_base_url,
            cartesia_voice_id,
            cartesia_voice_id_spanish,
            twilio_account_sid,
            twilio_auth_token,
            twilio_phone_number,
            backend_url,
            frontend_url,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_VARS: &[&str] = &[
        "BIND_ADDRESS",
        "REDIS_URL",
        "OPENAI_API_KEY",
        "CHAT_MODEL",
        "DEEPGRAM_API_KEY",
        "DEEPGRAM_BASE_URL",
        "CARTESIA_API_KEY",
        "CARTESIA_BASE_URL",
        "CARTESIA_VOICE_ID",
        "CARTESIA_VOICE_ID_SPANISH",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_PHONE_NUMBER",
        "BACKEND_URL",
        "FRONTEND_URL",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        unsafe {
            for var in ALL_VARS {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
            env::set_var("DEEPGRAM_API_KEY", "test-deepgram-key");
            env::set_var("CARTESIA_API_KEY", "test-cartesia-key");
            env::set_var("TWILIO_ACCOUNT_SID", "ACtest");
            env::set_var("TWILIO_AUTH_TOKEN", "test-token");
            env::set_var("TWILIO_PHONE_NUMBER", "+15550000000");
            env::set_var("BACKEND_URL", "https://aldea.example.com/");
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.redis_url, None);
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(
            config.deepgram_base_url,
            "wss://api.deepgram.com/v1/listen"
        );
        assert_eq!(config.cartesia_base_url, "https://api.cartesia.ai");
        // Trailing slashes are stripped so URL joins stay clean.
        assert_eq!(config.backend_url, "https://aldea.example.com");
        assert_eq!(config.frontend_url, "http://localhost:3001");
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_missing_required_var() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::remove_var("DEEPGRAM_API_KEY");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "DEEPGRAM_API_KEY"),
            _ => panic!("Expected MissingVar for DEEPGRAM_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("REDIS_URL", "redis://localhost:6379");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::DEBUG);
    }
}
