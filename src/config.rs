use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub messaging: MessagingConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_text_length: u32,
    pub min_search_term_chars: u32,
    pub max_search_results: u32,
    /// Reserved sender id used by the AI assistant and system messages
    pub ai_sender_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub preview_chars: u32,
    /// "same_day" or "wrap_midnight"
    pub quiet_hours_mode: String,
    pub email_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/messaging.db".to_string(),
                max_connections: 10,
                connection_timeout_secs: 30,
                busy_timeout_ms: 5000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            messaging: MessagingConfig {
                default_page_size: 50,
                max_page_size: 200,
                max_text_length: 5000,
                min_search_term_chars: 2,
                max_search_results: 50,
                ai_sender_id: 0,
            },
            notifications: NotificationConfig {
                preview_chars: 100,
                quiet_hours_mode: "same_day".to_string(),
                email_enabled: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let builder = AppConfig::default()
            .default_entries()
            .into_iter()
            .try_fold(Config::builder(), |builder, (key, value)| builder.set_default(key, value))?;

        let config = builder
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            // Add environment variables with prefix, e.g. THRIFT_MSG__DATABASE__URL
            .add_source(
                Environment::with_prefix("THRIFT_MSG")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be greater than 0"));
        }
        if self.database.connection_timeout_secs == 0 {
            return Err(anyhow::anyhow!("connection_timeout_secs must be greater than 0"));
        }
        crate::validation::InputValidator::validate_database_url(&self.database.url)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        if self.messaging.default_page_size == 0 {
            return Err(anyhow::anyhow!("default_page_size must be greater than 0"));
        }
        if self.messaging.max_page_size < self.messaging.default_page_size {
            return Err(anyhow::anyhow!("max_page_size must be at least default_page_size"));
        }
        if self.messaging.max_text_length == 0 {
            return Err(anyhow::anyhow!("max_text_length must be greater than 0"));
        }
        if self.messaging.min_search_term_chars == 0 {
            return Err(anyhow::anyhow!("min_search_term_chars must be greater than 0"));
        }
        if self.messaging.max_search_results == 0 {
            return Err(anyhow::anyhow!("max_search_results must be greater than 0"));
        }

        if self.notifications.preview_chars == 0 {
            return Err(anyhow::anyhow!("preview_chars must be greater than 0"));
        }
        let valid_modes = ["same_day", "wrap_midnight"];
        if !valid_modes.contains(&self.notifications.quiet_hours_mode.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid quiet hours mode: {}. Must be one of: {:?}",
                self.notifications.quiet_hours_mode,
                valid_modes
            ));
        }

        Ok(())
    }

    /// Get database URL from environment or config
    pub fn get_database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Flatten the configuration into `section.key` pairs for the builder defaults
    pub fn default_entries(self) -> Vec<(String, config::Value)> {
        fn entry(key: &str, value: impl Into<config::Value>) -> (String, config::Value) {
            (key.to_string(), value.into())
        }

        let mut entries = vec![
            entry("database.url", self.database.url),
            entry("database.max_connections", self.database.max_connections),
            entry("database.connection_timeout_secs", self.database.connection_timeout_secs),
            entry("database.busy_timeout_ms", self.database.busy_timeout_ms),
            entry("logging.level", self.logging.level),
            entry("logging.format", self.logging.format),
            entry("messaging.default_page_size", self.messaging.default_page_size),
            entry("messaging.max_page_size", self.messaging.max_page_size),
            entry("messaging.max_text_length", self.messaging.max_text_length),
            entry("messaging.min_search_term_chars", self.messaging.min_search_term_chars),
            entry("messaging.max_search_results", self.messaging.max_search_results),
            entry("messaging.ai_sender_id", self.messaging.ai_sender_id),
            entry("notifications.preview_chars", self.notifications.preview_chars),
            entry("notifications.quiet_hours_mode", self.notifications.quiet_hours_mode),
            entry("notifications.email_enabled", self.notifications.email_enabled),
        ];

        if let Some(file_path) = self.logging.file_path {
            entries.push(entry("logging.file_path", file_path));
        }

        entries
    }
}
