use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub crm: CrmConfig,
    pub server: ServerConfig,
    pub links: LinksConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub account_sid: Option<String>,
    pub auth_token: SecretString,
    pub from_number: String,
    pub api_base_url: String,
    pub send_timeout_secs: u64,
    pub max_message_chars: usize,
    pub max_send_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub planner_max_iterations: u32,
    pub turn_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub instance_url: Option<String>,
    pub access_token: Option<SecretString>,
    pub api_version: String,
    pub timeout_secs: u64,
    pub checkout_source: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LinksConfig {
    pub pending_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub whatsapp_enabled: Option<bool>,
    pub crm_enabled: Option<bool>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://cartline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                enabled: false,
                account_sid: None,
                auth_token: String::new().into(),
                from_number: "whatsapp:+14155238886".to_string(),
                api_base_url: "https://api.twilio.com".to_string(),
                send_timeout_secs: 3,
                max_message_chars: 3000,
                max_send_attempts: 3,
                retry_base_delay_ms: 1000,
            },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                temperature: 0.5,
            },
            agent: AgentConfig { planner_max_iterations: 2, turn_timeout_secs: 30 },
            crm: CrmConfig {
                enabled: false,
                instance_url: None,
                access_token: None,
                api_version: "v59.0".to_string(),
                timeout_secs: 10,
                checkout_source: "WhatsApp Bot".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            links: LinksConfig { pending_ttl_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("cartline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(enabled) = whatsapp.enabled {
                self.whatsapp.enabled = enabled;
            }
            if let Some(account_sid) = whatsapp.account_sid {
                self.whatsapp.account_sid = Some(account_sid);
            }
            if let Some(auth_token) = whatsapp.auth_token {
                self.whatsapp.auth_token = secret_value(auth_token);
            }
            if let Some(from_number) = whatsapp.from_number {
                self.whatsapp.from_number = from_number;
            }
            if let Some(api_base_url) = whatsapp.api_base_url {
                self.whatsapp.api_base_url = api_base_url;
            }
            if let Some(send_timeout_secs) = whatsapp.send_timeout_secs {
                self.whatsapp.send_timeout_secs = send_timeout_secs;
            }
            if let Some(max_message_chars) = whatsapp.max_message_chars {
                self.whatsapp.max_message_chars = max_message_chars;
            }
            if let Some(max_send_attempts) = whatsapp.max_send_attempts {
                self.whatsapp.max_send_attempts = max_send_attempts;
            }
            if let Some(retry_base_delay_ms) = whatsapp.retry_base_delay_ms {
                self.whatsapp.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(planner_max_iterations) = agent.planner_max_iterations {
                self.agent.planner_max_iterations = planner_max_iterations;
            }
            if let Some(turn_timeout_secs) = agent.turn_timeout_secs {
                self.agent.turn_timeout_secs = turn_timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(enabled) = crm.enabled {
                self.crm.enabled = enabled;
            }
            if let Some(instance_url) = crm.instance_url {
                self.crm.instance_url = Some(instance_url);
            }
            if let Some(access_token) = crm.access_token {
                self.crm.access_token = Some(secret_value(access_token));
            }
            if let Some(api_version) = crm.api_version {
                self.crm.api_version = api_version;
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
            if let Some(checkout_source) = crm.checkout_source {
                self.crm.checkout_source = checkout_source;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(links) = patch.links {
            if let Some(pending_ttl_secs) = links.pending_ttl_secs {
                self.links.pending_ttl_secs = pending_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CARTLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CARTLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("CARTLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("CARTLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTLINE_WHATSAPP_ENABLED") {
            self.whatsapp.enabled = parse_env("CARTLINE_WHATSAPP_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_ACCOUNT_SID") {
            self.whatsapp.account_sid = Some(value);
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_AUTH_TOKEN") {
            self.whatsapp.auth_token = secret_value(value);
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_FROM_NUMBER") {
            self.whatsapp.from_number = value;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_API_BASE_URL") {
            self.whatsapp.api_base_url = value;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_SEND_TIMEOUT_SECS") {
            self.whatsapp.send_timeout_secs =
                parse_env("CARTLINE_WHATSAPP_SEND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_MAX_MESSAGE_CHARS") {
            self.whatsapp.max_message_chars =
                parse_env("CARTLINE_WHATSAPP_MAX_MESSAGE_CHARS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_MAX_SEND_ATTEMPTS") {
            self.whatsapp.max_send_attempts =
                parse_env("CARTLINE_WHATSAPP_MAX_SEND_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_WHATSAPP_RETRY_BASE_DELAY_MS") {
            self.whatsapp.retry_base_delay_ms =
                parse_env("CARTLINE_WHATSAPP_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("CARTLINE_LLM_ENABLED") {
            self.llm.enabled = parse_env("CARTLINE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CARTLINE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARTLINE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CARTLINE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CARTLINE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("CARTLINE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("CARTLINE_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("CARTLINE_AGENT_PLANNER_MAX_ITERATIONS") {
            self.agent.planner_max_iterations =
                parse_env("CARTLINE_AGENT_PLANNER_MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_AGENT_TURN_TIMEOUT_SECS") {
            self.agent.turn_timeout_secs = parse_env("CARTLINE_AGENT_TURN_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTLINE_CRM_ENABLED") {
            self.crm.enabled = parse_env("CARTLINE_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_CRM_INSTANCE_URL") {
            self.crm.instance_url = Some(value);
        }
        if let Some(value) = read_env("CARTLINE_CRM_ACCESS_TOKEN") {
            self.crm.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("CARTLINE_CRM_API_VERSION") {
            self.crm.api_version = value;
        }
        if let Some(value) = read_env("CARTLINE_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_env("CARTLINE_CRM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_CRM_CHECKOUT_SOURCE") {
            self.crm.checkout_source = value;
        }

        if let Some(value) = read_env("CARTLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CARTLINE_SERVER_PORT") {
            self.server.port = parse_env("CARTLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CARTLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("CARTLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CARTLINE_LINKS_PENDING_TTL_SECS") {
            self.links.pending_ttl_secs = parse_env("CARTLINE_LINKS_PENDING_TTL_SECS", &value)?;
        }

        let log_level =
            read_env("CARTLINE_LOGGING_LEVEL").or_else(|| read_env("CARTLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CARTLINE_LOGGING_FORMAT").or_else(|| read_env("CARTLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(enabled) = overrides.whatsapp_enabled {
            self.whatsapp.enabled = enabled;
        }
        if let Some(enabled) = overrides.crm_enabled {
            self.crm.enabled = enabled;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_crm(&self.crm)?;
        validate_server(&self.server)?;
        validate_links(&self.links)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("cartline.toml"), PathBuf::from("config/cartline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        ));
    }
    if database.max_connections == 0 {
        return Err(validation("database.max_connections must be greater than zero"));
    }
    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(validation("database.timeout_secs must be in range 1..=300"));
    }
    Ok(())
}

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    if !(100..=4096).contains(&whatsapp.max_message_chars) {
        return Err(validation("whatsapp.max_message_chars must be in range 100..=4096"));
    }
    if whatsapp.max_send_attempts == 0 || whatsapp.max_send_attempts > 10 {
        return Err(validation("whatsapp.max_send_attempts must be in range 1..=10"));
    }
    if whatsapp.send_timeout_secs == 0 || whatsapp.send_timeout_secs > 60 {
        return Err(validation("whatsapp.send_timeout_secs must be in range 1..=60"));
    }
    if !is_http_url(&whatsapp.api_base_url) {
        return Err(validation("whatsapp.api_base_url must start with http:// or https://"));
    }
    if !whatsapp.enabled {
        return Ok(());
    }

    let sid = whatsapp.account_sid.as_deref().map(str::trim).unwrap_or_default();
    if sid.is_empty() {
        return Err(validation(
            "whatsapp.account_sid is required when whatsapp.enabled is true. Find it on the Twilio console dashboard",
        ));
    }
    if !sid.starts_with("AC") {
        return Err(validation("whatsapp.account_sid must start with `AC`"));
    }
    if whatsapp.auth_token.expose_secret().trim().is_empty() {
        return Err(validation("whatsapp.auth_token is required when whatsapp.enabled is true"));
    }
    if !whatsapp.from_number.starts_with("whatsapp:") {
        return Err(validation(
            "whatsapp.from_number must use the `whatsapp:+<number>` form (e.g. whatsapp:+14155238886)",
        ));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(validation("llm.timeout_secs must be in range 1..=300"));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(validation("llm.temperature must be in range 0.0..=2.0"));
    }
    if llm.model.trim().is_empty() {
        return Err(validation("llm.model must not be empty"));
    }
    if !llm.enabled {
        return Ok(());
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(validation(
                    "llm.api_key is required for openai/anthropic providers when llm.enabled is true",
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(validation("llm.base_url is required for ollama provider"));
            }
        }
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.planner_max_iterations == 0 || agent.planner_max_iterations > 2 {
        return Err(validation("agent.planner_max_iterations must be in range 1..=2"));
    }
    if agent.turn_timeout_secs == 0 || agent.turn_timeout_secs > 300 {
        return Err(validation("agent.turn_timeout_secs must be in range 1..=300"));
    }
    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    if crm.timeout_secs == 0 || crm.timeout_secs > 120 {
        return Err(validation("crm.timeout_secs must be in range 1..=120"));
    }
    if !crm.api_version.starts_with('v') {
        return Err(validation("crm.api_version must look like `v59.0`"));
    }
    if crm.checkout_source.trim().is_empty() {
        return Err(validation("crm.checkout_source must not be empty"));
    }
    if let Some(instance_url) = &crm.instance_url {
        if !is_http_url(instance_url) {
            return Err(validation("crm.instance_url must start with http:// or https://"));
        }
    }
    if crm.enabled {
        if crm.instance_url.is_none() {
            return Err(validation("crm.enabled is true but crm.instance_url is not configured"));
        }
        let missing_token = crm
            .access_token
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_token {
            return Err(validation("crm.enabled is true but crm.access_token is missing"));
        }
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(validation("server.port must be greater than zero"));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(validation("server.graceful_shutdown_secs must be greater than zero"));
    }
    Ok(())
}

fn validate_links(links: &LinksConfig) -> Result<(), ConfigError> {
    if links.pending_ttl_secs == 0 || links.pending_ttl_secs > 3600 {
        return Err(validation("links.pending_ttl_secs must be in range 1..=3600"));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validation("logging.level must be one of trace|debug|info|warn|error")),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsAppPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    crm: Option<CrmPatch>,
    server: Option<ServerPatch>,
    links: Option<LinksPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    enabled: Option<bool>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    api_base_url: Option<String>,
    send_timeout_secs: Option<u64>,
    max_message_chars: Option<usize>,
    max_send_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    planner_max_iterations: Option<u32>,
    turn_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    instance_url: Option<String>,
    access_token: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    checkout_source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksPatch {
    pending_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
