use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: i32 = 4096;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Persona prepended to every model call.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. \
Answer in the language the user writes in, Chinese or English, and keep a friendly, \
professional tone. If you are not sure about something, say so honestly and suggest \
what the user could try instead.";

/// Value shipped in the env template; never a real key.
const API_KEY_PLACEHOLDER: &str = "your_gemini_api_key_here";

pub const DEFAULT_APP_TITLE: &str = "Agent Service";
pub const DEFAULT_APP_DESCRIPTION: &str =
    "Conversational agent service with session memory, backed by Google Gemini";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub conversation: ConversationConfig,
    pub observability: ObservabilityConfig,
    pub docs: DocsConfig,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Secret<String>,
    /// Model identifier, e.g. `gemini-1.5-flash`.
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_output_tokens: i32,
    /// Transport-level timeout on the HTTP client.
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ConversationConfig {
    pub system_prompt: String,
    /// Upper bound on a single model call, after which the turn falls back.
    pub request_timeout: Duration,
    /// How many of the most recent history messages are sent to the model.
    /// `None` sends the whole history.
    pub history_max_messages: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

/// Metadata published in the OpenAPI document.
#[derive(Debug, Clone)]
pub struct DocsConfig {
    pub title: String,
    pub description: String,
    pub version: String,
    /// Serve Swagger UI under `/docs`. The OpenAPI JSON is always served.
    pub swagger_enabled: bool,
}

impl AgentConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the service settings from an arbitrary key lookup.
    ///
    /// Plain `HOST`/`PORT` take precedence over the `APP__` settings in `common`.
    pub fn from_lookup<F>(mut common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            common.host = host;
        }
        if let Some(port) = lookup("PORT") {
            common.port = parse_value("PORT", &port)?;
        }

        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        let env = EnvReader { lookup, is_prod };

        let api_key = env.get("GEMINI_API_KEY", None)?;
        if api_key.trim().is_empty() || api_key == API_KEY_PLACEHOLDER {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GEMINI_API_KEY must be set to a real API key"
            )));
        }

        let history_max_messages = match (env.lookup)("HISTORY_MAX_MESSAGES") {
            Some(raw) if !raw.trim().is_empty() => Some(parse_value("HISTORY_MAX_MESSAGES", &raw)?),
            _ => None,
        };

        Ok(AgentConfig {
            common,
            gemini: GeminiSettings {
                api_key: Secret::new(api_key),
                model: env.get("GEMINI_MODEL", Some(DEFAULT_MODEL))?,
                api_base: env.get("GEMINI_API_BASE", Some(DEFAULT_API_BASE))?,
                temperature: env.get_parsed("GEMINI_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                max_output_tokens: env
                    .get_parsed("GEMINI_MAX_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS)?,
                http_timeout: Duration::from_secs(
                    env.get_parsed("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
                ),
            },
            conversation: ConversationConfig {
                system_prompt: env.get("SYSTEM_PROMPT", Some(DEFAULT_SYSTEM_PROMPT))?,
                request_timeout: Duration::from_secs(
                    env.get_parsed("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                ),
                history_max_messages,
            },
            observability: ObservabilityConfig {
                log_level: env.get("LOG_LEVEL", Some("info"))?,
                otlp_endpoint: (env.lookup)("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            },
            docs: DocsConfig {
                title: env.get("APP_TITLE", Some(DEFAULT_APP_TITLE))?,
                description: env.get("APP_DESCRIPTION", Some(DEFAULT_APP_DESCRIPTION))?,
                version: env.get("APP_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
                swagger_enabled: env.get_parsed("ENABLE_SWAGGER", true)?,
            },
        })
    }
}

struct EnvReader<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match (self.lookup)(key) {
            Some(val) => Ok(val),
            None => {
                if self.is_prod {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required but not set",
                        key
                    )))
                }
            }
        }
    }

    fn get_parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr + ToString,
    {
        let raw = self.get(key, Some(&default.to_string()))?;
        parse_value(key, &raw)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse().map_err(|_| {
        AppError::ConfigError(anyhow::anyhow!("{} has an invalid value: {}", key, raw))
    })
}
