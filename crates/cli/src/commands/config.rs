use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cartline_core::config::{AppConfig, LlmProvider, LoadOptions, LogFormat};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);
    let file = config_file_path.as_deref().zip(config_file_doc.as_ref());

    render(&config, file)
}

/// Renders every effective value with where it came from. Secrets never leave
/// this function in clear text.
pub fn render(config: &AppConfig, file: Option<(&Path, &Value)>) -> String {
    let fields = [
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("whatsapp.enabled", config.whatsapp.enabled.to_string()),
        ("whatsapp.account_sid", mask_identifier(config.whatsapp.account_sid.as_deref())),
        ("whatsapp.auth_token", redact_secret(Some(&config.whatsapp.auth_token))),
        ("whatsapp.from_number", config.whatsapp.from_number.clone()),
        ("whatsapp.api_base_url", config.whatsapp.api_base_url.clone()),
        ("whatsapp.max_message_chars", config.whatsapp.max_message_chars.to_string()),
        ("whatsapp.max_send_attempts", config.whatsapp.max_send_attempts.to_string()),
        ("llm.enabled", config.llm.enabled.to_string()),
        ("llm.provider", provider_name(config.llm.provider).to_string()),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string())),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref())),
        ("agent.planner_max_iterations", config.agent.planner_max_iterations.to_string()),
        ("agent.turn_timeout_secs", config.agent.turn_timeout_secs.to_string()),
        ("crm.enabled", config.crm.enabled.to_string()),
        (
            "crm.instance_url",
            config.crm.instance_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        ("crm.access_token", redact_secret(config.crm.access_token.as_ref())),
        ("crm.api_version", config.crm.api_version.clone()),
        ("crm.checkout_source", config.crm.checkout_source.clone()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("links.pending_ttl_secs", config.links.pending_ttl_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format_name(config.logging.format).to_string()),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        fields
            .iter()
            .map(|(key, value)| format!("- {key} = {value} (source: {})", field_source(key, file))),
    );
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("cartline.toml"), PathBuf::from("config/cartline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn env_key(key_path: &str) -> String {
    format!("CARTLINE_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn field_source(key_path: &str, file: Option<(&Path, &Value)>) -> String {
    let env_key = env_key(key_path);
    if env::var_os(&env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some((path, doc)) = file {
        if contains_path(doc, key_path) {
            return format!("file ({})", path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    }
}

/// Twilio SIDs are not secret but are still worth shortening in shared output.
fn mask_identifier(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(value) if value.chars().count() > 6 => {
            format!("{}***", value.chars().take(6).collect::<String>())
        }
        Some(value) if !value.is_empty() => "***".to_string(),
        _ => "<unset>".to_string(),
    }
}

fn provider_name(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "open_ai",
        LlmProvider::Anthropic => "anthropic",
        LlmProvider::Ollama => "ollama",
    }
}

fn format_name(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use cartline_core::config::AppConfig;
    use secrecy::SecretString;
    use toml::Value;

    use super::{env_key, load_config_file_doc, mask_identifier, render};

    #[test]
    fn env_keys_follow_the_dotted_path() {
        assert_eq!(env_key("whatsapp.account_sid"), "CARTLINE_WHATSAPP_ACCOUNT_SID");
        assert_eq!(env_key("links.pending_ttl_secs"), "CARTLINE_LINKS_PENDING_TTL_SECS");
    }

    #[test]
    fn secrets_are_redacted_and_sids_masked() {
        let mut config = AppConfig::default();
        config.whatsapp.account_sid = Some("AC0123456789abcdef".to_string());
        config.whatsapp.auth_token = SecretString::from("twilio-secret-value".to_string());
        config.crm.access_token = Some(SecretString::from("sf-secret-value".to_string()));

        let output = render(&config, None);

        assert!(!output.contains("twilio-secret-value"));
        assert!(!output.contains("sf-secret-value"));
        assert!(!output.contains("AC0123456789abcdef"));
        assert!(output.contains("- whatsapp.auth_token = <redacted>"));
        assert!(output.contains("- crm.access_token = <redacted>"));
        assert!(output.contains("- llm.api_key = <unset>"));
        assert!(output.contains("- whatsapp.account_sid = AC0123***"));
    }

    #[test]
    fn keys_present_in_the_file_are_attributed_to_it() {
        let doc: Value = "[crm]\napi_version = \"v60.0\"\n".parse().expect("toml");
        let mut config = AppConfig::default();
        config.crm.api_version = "v60.0".to_string();

        let output = render(&config, Some((Path::new("cartline.toml"), &doc)));

        assert!(output.contains("- crm.api_version = v60.0 (source: file (cartline.toml))"));
        assert!(!output.contains("crm.checkout_source = WhatsApp Bot (source: file"));
        assert!(output.contains("(source: default)"));
    }

    #[test]
    fn config_file_on_disk_drives_attribution() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cartline.toml");
        std::fs::write(&path, "[server]\nport = 9090\n\n[links]\npending_ttl_secs = 60\n")
            .expect("write config");
        let doc = load_config_file_doc(&path).expect("parsed doc");
        let mut config = AppConfig::default();
        config.server.port = 9090;
        config.links.pending_ttl_secs = 60;

        let output = render(&config, Some((path.as_path(), &doc)));

        let from_file = format!("(source: file ({}))", path.display());
        assert!(output.contains(&format!("- server.port = 9090 {from_file}")));
        assert!(output.contains(&format!("- links.pending_ttl_secs = 60 {from_file}")));
        assert!(!output.contains(&format!("server.bind_address = 0.0.0.0 {from_file}")));
    }

    #[test]
    fn short_identifiers_are_fully_masked() {
        assert_eq!(mask_identifier(Some("AC12")), "***");
        assert_eq!(mask_identifier(Some("  ")), "<unset>");
        assert_eq!(mask_identifier(None), "<unset>");
    }
}
