use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::service::filter::DEFAULT_KEYWORDS;

pub const DEFAULT_CALENDAR_URL: &str = "http://localhost:9999/v1";

/// Raw `KEY=VALUE` pairs from an optional config file, with the environment as fallback.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File value first, then the process environment. Empty strings count as unset.
    pub fn prop(&self, key: &str) -> Option<String> {
        self.get(key)
            .or_else(|| env::var(key).ok())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    Simple,
    Agentic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct GroupMeSettings {
    pub bot_id: Option<String>,
    pub api_token: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub groupme: GroupMeSettings,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub ai_mode: AiMode,
    pub calendar_service_url: String,
    pub webhook_port: u16,
    pub confidence_threshold: u8,
    pub log_level: String,
    pub log_format: LogFormat,
    pub roster_file_path: PathBuf,
    pub cursor_file_path: PathBuf,
    pub timezone: Tz,
    pub poll_limit: u32,
    pub poll_interval: Duration,
    pub max_tool_rounds: usize,
    pub dispatch_max_attempts: u32,
    pub dispatch_backoff: Duration,
    pub shift_keywords: Vec<String>,
    pub post_confirmations: bool,
}

fn parse_or<T: std::str::FromStr>(
    config: &AppConfig,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match config.prop(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool(config: &AppConfig, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match config.prop(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let ai_mode = match config.prop("AI_MODE").as_deref().map(str::trim) {
            None | Some("simple") => AiMode::Simple,
            Some("agentic") => AiMode::Agentic,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "AI_MODE",
                    value: other.to_string(),
                });
            }
        };

        let log_format = match config.prop("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("compact") => LogFormat::Compact,
            Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        let confidence_threshold: u8 = parse_or(config, "CONFIDENCE_THRESHOLD", 70)?;
        if confidence_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                key: "CONFIDENCE_THRESHOLD",
                value: confidence_threshold.to_string(),
            });
        }

        let timezone = match config.prop("TIMEZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidValue { key: "TIMEZONE", value: raw })?,
            None => chrono_tz::America::New_York,
        };

        let dispatch_max_attempts: u32 = parse_or(config, "DISPATCH_MAX_ATTEMPTS", 3)?;
        if dispatch_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DISPATCH_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let shift_keywords = match config.prop("SHIFT_KEYWORDS") {
            Some(raw) => raw.split(',').map(|k| k.trim().to_string()).collect(),
            None => DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        };

        Ok(Self {
            groupme: GroupMeSettings {
                bot_id: config.prop("GROUPME_BOT_ID"),
                api_token: config.prop("GROUPME_API_TOKEN"),
                group_id: config.prop("GROUPME_GROUP_ID"),
            },
            openai_api_key: config.prop("OPENAI_API_KEY"),
            openai_model: config
                .prop("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ai_mode,
            calendar_service_url: config
                .prop("CALENDAR_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_CALENDAR_URL.to_string()),
            webhook_port: parse_or(config, "WEBHOOK_PORT", 8080)?,
            confidence_threshold,
            log_level: config.prop("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            roster_file_path: config
                .prop("ROSTER_FILE_PATH")
                .unwrap_or_else(|| "data/roster.json".to_string())
                .into(),
            cursor_file_path: config
                .prop("CURSOR_FILE_PATH")
                .unwrap_or_else(|| "data/last_message_id.txt".to_string())
                .into(),
            timezone,
            poll_limit: parse_or::<u32>(config, "POLL_LIMIT", 20)?.clamp(1, 100),
            poll_interval: Duration::from_secs(parse_or(config, "POLL_INTERVAL_SECS", 120)?),
            max_tool_rounds: parse_or(config, "MAX_TOOL_ROUNDS", 5)?,
            dispatch_max_attempts,
            dispatch_backoff: Duration::from_millis(parse_or(config, "DISPATCH_BACKOFF_MS", 500)?),
            shift_keywords,
            post_confirmations: parse_bool(config, "POST_CONFIRMATIONS", false)?,
        })
    }

    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))
    }

    pub fn require_bot_id(&self) -> Result<&str, ConfigError> {
        self.groupme
            .bot_id
            .as_deref()
            .ok_or(ConfigError::Missing("GROUPME_BOT_ID"))
    }

    pub fn require_poll_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let token = self
            .groupme
            .api_token
            .as_deref()
            .ok_or(ConfigError::Missing("GROUPME_API_TOKEN"))?;
        let group = self
            .groupme
            .group_id
            .as_deref()
            .ok_or(ConfigError::Missing("GROUPME_GROUP_ID"))?;
        Ok((token, group))
    }
}
