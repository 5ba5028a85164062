// Layered configuration: built-in defaults, then config files, then environment.

use ::config::{Config, ConfigError, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix for structured environment overrides, e.g. `JOB_NOTIFIER__STORAGE__SEEN_PATH`.
const ENV_PREFIX: &str = "JOB_NOTIFIER";

/// Plain variable names read from `.env` / the process environment,
/// mapped onto their settings key.
const PLAIN_ENV_KEYS: &[(&str, &str)] = &[
    ("JOB_LOCATION", "source.location"),
    ("ADZUNA_APP_ID", "adzuna.app_id"),
    ("ADZUNA_APP_KEY", "adzuna.app_key"),
    ("NOTIFICATION_EMAIL", "notify.recipient"),
    ("EMAIL_SENDER", "notify.sender"),
    ("SENDGRID_API_KEY", "notify.sendgrid_api_key"),
    ("SPACY_MODEL", "nlp.model"),
];

/// Main settings structure, built once at startup and handed to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub source: SourceConfig,
    pub adzuna: AdzunaConfig,
    pub weworkremotely: WeWorkRemotelyConfig,
    pub notify: NotifyConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub nlp: NlpConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Adzuna,
    WeWorkRemotely,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Title keywords; an offer is kept if its title contains any of them.
    pub titles: Vec<String>,
    /// Location keyword; empty disables the location filter.
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdzunaConfig {
    pub base_url: String,
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub country: String,
    pub max_results: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeWorkRemotelyConfig {
    pub urls: Vec<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    /// Writes each notification to the log only.
    Log,
    SendGrid,
    Smtp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub channel: NotifyChannel,
    pub recipient: Option<String>,
    pub sender: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_base_url: String,
    /// Upper bound on sends per minute; unset means unthrottled.
    pub max_per_minute: Option<u32>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeenFormat {
    Json,
    Lines,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub seen_path: PathBuf,
    pub seen_format: SeenFormat,
    pub history_path: PathBuf,
    pub lock_path: PathBuf,
    pub lock_stale_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

/// Carried for the analysis agents; the notifier itself does not use it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NlpConfig {
    pub model: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                kind: SourceKind::Adzuna,
                titles: vec!["data analyst".to_string(), "data scientist".to_string()],
                location: "paris".to_string(),
            },
            adzuna: AdzunaConfig {
                base_url: "https://api.adzuna.com".to_string(),
                app_id: None,
                app_key: None,
                country: "fr".to_string(),
                max_results: 50,
                timeout_seconds: 15,
            },
            weworkremotely: WeWorkRemotelyConfig {
                urls: vec![
                    "https://weworkremotely.com/remote-software-developer-jobs".to_string(),
                    "https://weworkremotely.com/categories/remote-full-stack-programming-jobs"
                        .to_string(),
                    "https://weworkremotely.com/categories/remote-back-end-programming-jobs"
                        .to_string(),
                    "https://weworkremotely.com/categories/remote-front-end-programming-jobs"
                        .to_string(),
                ],
                timeout_seconds: 15,
            },
            notify: NotifyConfig {
                channel: NotifyChannel::Log,
                recipient: None,
                sender: None,
                sendgrid_api_key: None,
                sendgrid_base_url: "https://api.sendgrid.com".to_string(),
                max_per_minute: None,
                timeout_seconds: 15,
            },
            storage: StorageConfig {
                seen_path: PathBuf::from("logs/seen_offers.json"),
                seen_format: SeenFormat::Json,
                history_path: PathBuf::from("logs/notification_history.json"),
                lock_path: PathBuf::from("logs/job-notifier.lock"),
                lock_stale_seconds: 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            nlp: NlpConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from `config_dir` and the process environment.
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        Self::load_with_env(config_dir, std::env::vars().collect())
    }

    /// Load configuration with layered precedence:
    /// defaults → default.toml → local.toml → prefixed env → plain env names.
    pub fn load_with_env<P: AsRef<Path>>(
        config_dir: P,
        env: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("source.titles")
                    .with_list_parse_key("weworkremotely.urls")
                    .try_parsing(true)
                    .source(Some(env.clone())),
            );

        for (var, key) in PLAIN_ENV_KEYS {
            builder = builder.set_override_option(*key, non_empty(&env, var))?;
        }
        builder = builder.set_override_option(
            "source.kind",
            non_empty(&env, "JOB_SOURCE").map(|v| v.to_lowercase()),
        )?;
        if non_empty(&env, "SENDGRID").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            builder = builder.set_override("notify.channel", "sendgrid")?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.seen_path.as_os_str().is_empty() {
            return Err("Storage seen_path cannot be empty".to_string());
        }
        if self.storage.lock_path.as_os_str().is_empty() {
            return Err("Storage lock_path cannot be empty".to_string());
        }
        if self.storage.lock_stale_seconds == 0 {
            return Err("Storage lock_stale_seconds must be greater than 0".to_string());
        }

        match self.source.kind {
            SourceKind::Adzuna => {
                if self.adzuna.app_id.is_none() || self.adzuna.app_key.is_none() {
                    return Err(
                        "ADZUNA_APP_ID and ADZUNA_APP_KEY must be set for the adzuna source"
                            .to_string(),
                    );
                }
                if self.adzuna.max_results == 0 {
                    return Err("Adzuna max_results must be greater than 0".to_string());
                }
            }
            SourceKind::WeWorkRemotely => {
                if self.weworkremotely.urls.is_empty() {
                    return Err("WeWorkRemotely source needs at least one URL".to_string());
                }
            }
        }

        if let Some(recipient) = &self.notify.recipient {
            if !is_valid_email(recipient) {
                return Err(format!("Invalid recipient email address: {}", recipient));
            }
        }
        if let Some(sender) = &self.notify.sender {
            if !is_valid_email(sender) {
                return Err(format!("Invalid sender email address: {}", sender));
            }
        }
        if self.notify.max_per_minute == Some(0) {
            return Err("Notify max_per_minute must be greater than 0".to_string());
        }
        if self.notify.timeout_seconds == 0 {
            return Err("Notify timeout_seconds must be greater than 0".to_string());
        }

        match self.notify.channel {
            NotifyChannel::Log => {}
            NotifyChannel::SendGrid => {
                if self.notify.sendgrid_api_key.is_none() {
                    return Err("SENDGRID_API_KEY must be set for the sendgrid channel".to_string());
                }
                if self.notify.sender.is_none() {
                    return Err("EMAIL_SENDER must be set for the sendgrid channel".to_string());
                }
                if self.notify.recipient.is_none() {
                    return Err(
                        "NOTIFICATION_EMAIL must be set for the sendgrid channel".to_string()
                    );
                }
            }
            NotifyChannel::Smtp => {
                return Err("SMTP delivery is not supported; use sendgrid or log".to_string());
            }
        }

        Ok(())
    }
}

fn non_empty(env: &HashMap<String, String>, var: &str) -> Option<String> {
    env.get(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Basic address shape check: local part, `@`, domain with a TLD.
pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_files_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with_env(dir.path(), HashMap::new()).unwrap();

        assert_eq!(settings.source.kind, SourceKind::Adzuna);
        assert_eq!(settings.source.titles, vec!["data analyst", "data scientist"]);
        assert_eq!(settings.adzuna.max_results, 50);
        assert_eq!(settings.notify.channel, NotifyChannel::Log);
        assert_eq!(settings.storage.seen_format, SeenFormat::Json);
        assert!(settings.adzuna.app_id.is_none());
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[source]
kind = "weworkremotely"
location = "lyon"

[storage]
seen_format = "lines"
lock_stale_seconds = 600
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("local.toml"),
            "[source]\nlocation = \"bordeaux\"\n",
        )
        .unwrap();

        let settings = Settings::load_with_env(
            dir.path(),
            env(&[
                ("JOB_NOTIFIER__STORAGE__LOCK_STALE_SECONDS", "120"),
                ("JOB_NOTIFIER__SOURCE__TITLES", "rust,backend"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.source.kind, SourceKind::WeWorkRemotely);
        assert_eq!(settings.source.location, "bordeaux");
        assert_eq!(settings.source.titles, vec!["rust", "backend"]);
        assert_eq!(settings.storage.seen_format, SeenFormat::Lines);
        assert_eq!(settings.storage.lock_stale_seconds, 120);
    }

    #[test]
    fn test_plain_env_names_override_everything() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with_env(
            dir.path(),
            env(&[
                ("JOB_SOURCE", "ADZUNA"),
                ("JOB_LOCATION", "nantes"),
                ("ADZUNA_APP_ID", "app-id"),
                ("ADZUNA_APP_KEY", "app-key"),
                ("NOTIFICATION_EMAIL", "me@example.com"),
                ("EMAIL_SENDER", "bot@example.com"),
                ("SENDGRID", "true"),
                ("SENDGRID_API_KEY", "SG.key"),
                ("SPACY_MODEL", "fr_core_news_sm"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.source.kind, SourceKind::Adzuna);
        assert_eq!(settings.source.location, "nantes");
        assert_eq!(settings.adzuna.app_id.as_deref(), Some("app-id"));
        assert_eq!(settings.notify.channel, NotifyChannel::SendGrid);
        assert_eq!(settings.notify.recipient.as_deref(), Some("me@example.com"));
        assert_eq!(settings.nlp.model.as_deref(), Some("fr_core_news_sm"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sendgrid_false_keeps_configured_channel() {
        let dir = tempfile::tempdir().unwrap();
        let settings =
            Settings::load_with_env(dir.path(), env(&[("SENDGRID", "false")])).unwrap();
        assert_eq!(settings.notify.channel, NotifyChannel::Log);
    }

    #[test]
    fn test_validate_requires_adzuna_credentials() {
        let settings = Settings::default();
        let err = settings.validate().unwrap_err();
        assert!(err.contains("ADZUNA_APP_ID"));
    }

    #[test]
    fn test_validate_rejects_bad_recipient_and_smtp() {
        let mut settings = Settings::default();
        settings.source.kind = SourceKind::WeWorkRemotely;
        assert!(settings.validate().is_ok());

        settings.notify.recipient = Some("not-an-email".to_string());
        assert!(settings.validate().unwrap_err().contains("recipient"));

        settings.notify.recipient = Some("me@example.com".to_string());
        settings.notify.channel = NotifyChannel::Smtp;
        assert!(settings.validate().unwrap_err().contains("SMTP"));
    }

    #[test]
    fn test_validate_sendgrid_needs_key_and_sender() {
        let mut settings = Settings::default();
        settings.source.kind = SourceKind::WeWorkRemotely;
        settings.notify.channel = NotifyChannel::SendGrid;
        settings.notify.recipient = Some("me@example.com".to_string());
        assert!(settings.validate().unwrap_err().contains("SENDGRID_API_KEY"));

        settings.notify.sendgrid_api_key = Some("SG.key".to_string());
        assert!(settings.validate().unwrap_err().contains("EMAIL_SENDER"));

        settings.notify.sender = Some("bot@example.com".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_lock_window() {
        let mut settings = Settings::default();
        settings.source.kind = SourceKind::WeWorkRemotely;
        settings.storage.lock_stale_seconds = 0;
        assert!(settings.validate().unwrap_err().contains("lock_stale_seconds"));
    }

    #[test]
    fn test_notify_timeout_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with_env(dir.path(), HashMap::new()).unwrap();
        assert_eq!(settings.notify.timeout_seconds, 15);

        let mut settings = Settings::load_with_env(
            dir.path(),
            env(&[("JOB_NOTIFIER__NOTIFY__TIMEOUT_SECONDS", "5")]),
        )
        .unwrap();
        assert_eq!(settings.notify.timeout_seconds, 5);

        settings.source.kind = SourceKind::WeWorkRemotely;
        settings.notify.timeout_seconds = 0;
        assert!(settings.validate().unwrap_err().contains("timeout_seconds"));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("jordy.dupont@example.fr"));
        assert!(!is_valid_email("jordy@localhost"));
        assert!(!is_valid_email("@example.com"));
    }
}
