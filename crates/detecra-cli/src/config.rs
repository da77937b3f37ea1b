use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use detecra_auth::{CoordinatorConfig, RetryPolicy};
use detecra_supabase::SupabaseConfig;
use directories::ProjectDirs;
use serde::Deserialize;
use url::Url;

use crate::command::GlobalArgs;
use crate::logger::{LoggerConfig, LoggerFormat};

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct AppConfig {
    pub supabase: SupabaseSection,
    pub site: SiteSection,
    pub auth: AuthSection,
    pub session: SessionSection,
    pub log: LogSection,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SupabaseSection {
    pub url: Url,
    pub anon_key: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SiteSection {
    pub origin: Url,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct AuthSection {
    pub retry_attempts: u32,
    pub retry_backoff: RetryBackoff,
    /// First delay for exponential backoff, the only delay for fixed backoff.
    pub retry_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub call_timeout_ms: u64,
    pub signup_settle_ms: u64,
    pub oauth_wait_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RetryBackoff {
    Fixed,
    Exponential,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SessionSection {
    pub persist: bool,
    /// Defaults to `session.json` in the user data directory.
    pub file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct LogSection {
    pub format: LoggerFormat,
    pub level: String,
}

pub(crate) fn load_config(args: &GlobalArgs) -> anyhow::Result<AppConfig> {
    let config_file_path = match &args.config {
        Some(path_override) => path_override.clone(),
        None => {
            let user_config_dir = project_dirs()?.config_dir().to_path_buf();
            if !user_config_dir.exists() {
                std::fs::create_dir_all(&user_config_dir)?;
            }

            let config_file_path = user_config_dir.join("config.toml");
            if !config_file_path.exists() {
                write_default_config_file(&config_file_path)?;
            }

            config_file_path
        }
    };

    build_config(&config_file_path, args)
}

fn build_config(config_file_path: &Path, args: &GlobalArgs) -> anyhow::Result<AppConfig> {
    let config_file_path =
        config_file_path.to_str().ok_or_else(|| anyhow::anyhow!("config path is not valid UTF-8"))?;

    let config: AppConfig = Config::builder()
        .set_default("site.origin", "http://localhost:8765")?
        .set_default("auth.retry_attempts", 3)?
        .set_default("auth.retry_backoff", "fixed")?
        .set_default("auth.retry_delay_ms", 1000)?
        .set_default("auth.retry_max_delay_ms", 8000)?
        .set_default("auth.call_timeout_ms", 30000)?
        .set_default("auth.signup_settle_ms", 500)?
        .set_default("auth.oauth_wait_secs", 300)?
        .set_default("session.persist", true)?
        .set_default("log.format", "pretty")?
        .set_default("log.level", "warn")?
        .add_source(File::new(config_file_path, FileFormat::Toml))
        .add_source(Environment::with_prefix("DETECRA").separator("__").try_parsing(true))
        .set_override_option("supabase.url", args.supabase_url.clone())?
        .set_override_option("supabase.anon_key", args.supabase_anon_key.clone())?
        .set_override_option("log.level", args.log_level.clone())?
        .build()?
        .try_deserialize()?;

    Ok(config)
}

fn write_default_config_file(path: &Path) -> anyhow::Result<()> {
    let default_config_content = include_str!("../static/default_config.toml");
    std::fs::write(path, default_config_content)?;
    Ok(())
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("ai", "Detecra", "detecra").ok_or_else(|| anyhow::anyhow!("Failed to get user config directory"))
}

impl AppConfig {
    pub fn session_file(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.session.persist {
            return Ok(None);
        }
        match &self.session.file {
            Some(file) => Ok(Some(file.clone())),
            None => Ok(Some(project_dirs()?.data_dir().join("session.json"))),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.auth.retry_delay_ms);
        match self.auth.retry_backoff {
            RetryBackoff::Fixed => RetryPolicy::fixed(self.auth.retry_attempts, delay),
            RetryBackoff::Exponential => RetryPolicy::exponential(
                self.auth.retry_attempts,
                delay,
                Duration::from_millis(self.auth.retry_max_delay_ms),
            ),
        }
    }

    pub fn oauth_wait(&self) -> Duration {
        Duration::from_secs(self.auth.oauth_wait_secs)
    }

    pub fn supabase_config(&self) -> anyhow::Result<SupabaseConfig> {
        Ok(SupabaseConfig::builder()
            .url(self.supabase.url.clone())
            .anon_key(self.supabase.anon_key.clone())
            .maybe_session_file(self.session_file()?)
            .build())
    }
}

impl From<&AppConfig> for CoordinatorConfig {
    fn from(config: &AppConfig) -> Self {
        CoordinatorConfig::builder()
            .site_origin(config.site.origin.clone())
            .retry(config.retry_policy())
            .call_timeout(Duration::from_millis(config.auth.call_timeout_ms))
            .signup_settle(Duration::from_millis(config.auth.signup_settle_ms))
            .build()
    }
}

impl From<&AppConfig> for LoggerConfig {
    fn from(config: &AppConfig) -> Self {
        LoggerConfig { format: config.log.format, level: config.log.level.clone() }
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;
    use std::time::Duration;

    use detecra_auth::{CoordinatorConfig, RetryPolicy};

    use super::{build_config, write_default_config_file};
    use crate::command::GlobalArgs;
    use crate::logger::LoggerFormat;

    fn temp_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("detecra-config-{}-{name}.toml", std::process::id()));
        std::fs::write(&path, content).expect("writing temp config should be successful");
        path
    }

    #[test]
    fn when_default_file_is_loaded_then_auth_settings_match_provisioning_policy() {
        let path = std::env::temp_dir().join(format!("detecra-config-{}-default.toml", std::process::id()));
        write_default_config_file(&path).unwrap();

        let config = build_config(&path, &GlobalArgs::default()).expect("default config should load");
        let coordinator_config = CoordinatorConfig::from(&config);

        assert_eq!(coordinator_config.retry, RetryPolicy::fixed(3, Duration::from_secs(1)));
        assert_eq!(coordinator_config.call_timeout, Duration::from_secs(30));
        assert_eq!(coordinator_config.site_origin.as_str(), "http://localhost:8765/");
        assert!(matches!(config.log.format, LoggerFormat::Pretty));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn when_sections_are_omitted_then_defaults_fill_them_and_flags_override() {
        let path = temp_config(
            "minimal",
            r#"
            [supabase]
            url = "https://project.supabase.co"
            anon_key = "from-file"
            "#,
        );
        let args = GlobalArgs {
            supabase_anon_key: Some("from-flag".to_owned()),
            log_level: Some("debug".to_owned()),
            ..Default::default()
        };

        let config = build_config(&path, &args).expect("minimal config should load");

        assert_eq!(config.supabase.anon_key, "from-flag");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.auth.retry_attempts, 3);
        assert_eq!(config.auth.signup_settle_ms, 500);
        assert!(config.session.persist);
        assert_eq!(config.oauth_wait(), Duration::from_secs(300));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn when_exponential_backoff_is_configured_then_delays_double_up_to_max() {
        let path = temp_config(
            "exponential",
            r#"
            [supabase]
            url = "https://project.supabase.co"
            anon_key = "anon"

            [auth]
            retry_attempts = 4
            retry_backoff = "exponential"
            retry_delay_ms = 500
            retry_max_delay_ms = 1500
            "#,
        );

        let config = build_config(&path, &GlobalArgs::default()).expect("config should load");
        let coordinator_config = CoordinatorConfig::from(&config);

        assert_eq!(
            coordinator_config.retry,
            RetryPolicy::exponential(4, Duration::from_millis(500), Duration::from_millis(1500))
        );
        assert_eq!(coordinator_config.retry.delay_after(3), Some(Duration::from_millis(1500)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn when_persistence_is_disabled_then_no_session_file_is_used() {
        let path = temp_config(
            "no-persist",
            r#"
            [supabase]
            url = "https://project.supabase.co"
            anon_key = "anon"

            [session]
            persist = false
            "#,
        );

        let config = build_config(&path, &GlobalArgs::default()).expect("config should load");

        assert_eq!(config.session_file().unwrap(), None);

        std::fs::remove_file(path).unwrap();
    }
}
