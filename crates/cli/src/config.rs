//! CLI configuration file.
//!
//! ```toml
//! [build_service]
//! url = "https://api.example.org"
//! user = "Iggy"
//! password_env = "BUILD_SERVICE_PASSWORD"
//! timeout_secs = 30
//!
//! [token]
//! id = 42
//! executor = "Iggy"
//!
//! [authorization]
//! allowed_actions = ["branch", "rebuild"]
//!
//! [subscriptions]
//! path = "/var/lib/scm-workflow/subscriptions.json"
//!
//! [telemetry]
//! format = "json"
//! otlp_endpoint = "http://localhost:4317"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use build_service::BuildServiceConfig;
use secrecy::SecretString;
use serde::Deserialize;
use workflow::{Action, TokenId, UserLogin, WorkflowToken};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub build_service: BuildServiceSection,
    pub token: TokenSection,
    #[serde(default)]
    pub authorization: AuthorizationSection,
    pub subscriptions: SubscriptionsSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildServiceSection {
    pub url: String,
    pub user: String,
    /// Environment variable holding the password.
    pub password_env: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSection {
    pub id: u64,
    pub executor: String,
}

/// Actions the token's executor may perform. Empty denies everything.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationSection {
    #[serde(default)]
    pub allowed_actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscriptionsSection {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    #[serde(default)]
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Connection settings with the password taken from the environment.
    pub fn build_service_config(&self) -> anyhow::Result<BuildServiceConfig> {
        let section = &self.build_service;
        let password = std::env::var(&section.password_env).with_context(|| {
            format!(
                "build service password variable {} is not set",
                section.password_env
            )
        })?;
        Ok(BuildServiceConfig {
            url: section.url.clone(),
            user: section.user.clone(),
            password: SecretString::from(password),
            timeout: section.timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn token(&self) -> anyhow::Result<WorkflowToken> {
        let executor = UserLogin::new(self.token.executor.as_str())
            .context("token executor must not be blank")?;
        Ok(WorkflowToken {
            id: TokenId::new(self.token.id),
            executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[build_service]
url = "https://api.example.org"
user = "Iggy"
password_env = "SCM_WORKFLOW_TEST_PASSWORD"
timeout_secs = 10

[token]
id = 42
executor = "Iggy"

[authorization]
allowed_actions = ["branch", "rebuild"]

[subscriptions]
path = "/tmp/subscriptions.json"

[telemetry]
format = "json"
otlp_endpoint = "http://localhost:4317"
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::parse(FULL).unwrap();
        assert_eq!(config.build_service.timeout_secs, Some(10));
        assert_eq!(
            config.authorization.allowed_actions,
            vec![Action::Branch, Action::Rebuild]
        );
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(
            config.telemetry.otlp_endpoint.as_deref(),
            Some("http://localhost:4317")
        );

        let token = config.token().unwrap();
        assert_eq!(token.id, TokenId::new(42));
        assert_eq!(token.executor.as_str(), "Iggy");
    }

    #[test]
    fn optional_sections_default_to_deny_all_and_pretty() {
        let config = Config::parse(
            r#"
[build_service]
url = "https://api.example.org"
user = "Iggy"
password_env = "X"

[token]
id = 1
executor = "Iggy"

[subscriptions]
path = "subs.json"
"#,
        )
        .unwrap();
        assert!(config.authorization.allowed_actions.is_empty());
        assert_eq!(config.telemetry.format, LogFormat::Pretty);
        assert_eq!(config.telemetry.otlp_endpoint, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = FULL.replace("timeout_secs = 10", "timeout = 10");
        assert!(Config::parse(&text).is_err());
    }

    #[test]
    fn unknown_action_is_rejected() {
        let text = FULL.replace(r#"["branch", "rebuild"]"#, r#"["delete"]"#);
        assert!(Config::parse(&text).is_err());
    }

    #[test]
    fn password_comes_from_the_environment() {
        use secrecy::ExposeSecret;

        let config = Config::parse(FULL).unwrap();
        std::env::remove_var("SCM_WORKFLOW_TEST_PASSWORD");
        assert!(config.build_service_config().is_err());

        std::env::set_var("SCM_WORKFLOW_TEST_PASSWORD", "opensesame");
        let settings = config.build_service_config().unwrap();
        assert_eq!(settings.password.expose_secret(), "opensesame");
        assert_eq!(settings.timeout, Some(Duration::from_secs(10)));
        std::env::remove_var("SCM_WORKFLOW_TEST_PASSWORD");
    }
}
