//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Without a config file at the default path the built-in defaults apply and
//! the pool lives in memory only.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use key_pool::{DEFAULT_COOLDOWN_SECS, DEFAULT_DAILY_LIMIT, PolicyKind};
use serde::Deserialize;

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "KEY_ROTATOR_CONFIG";

/// Env var overriding `pool.state_file`.
pub const STATE_FILE_ENV: &str = "KEY_ROTATOR_STATE_FILE";

const DEFAULT_CONFIG_PATH: &str = "key-rotator.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,
}

/// Which admission policy the pool uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyName {
    DailyQuota,
    MinuteCooldown,
}

/// Pool settings
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_policy")]
    pub policy: PolicyName,
    /// Snapshot file. Omitted means memory only.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Per-key daily request limit used when `add` gets no `--limit`.
    /// Signed so a negative value is reported instead of failing to parse.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            state_file: None,
            daily_limit: default_daily_limit(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_policy() -> PolicyName {
    PolicyName::DailyQuota
}

fn default_daily_limit() -> i64 {
    DEFAULT_DAILY_LIMIT as i64
}

fn default_cooldown_secs() -> i64 {
    DEFAULT_COOLDOWN_SECS
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load from the resolved path, falling back to defaults when no file
    /// exists at the default location.
    ///
    /// A path named explicitly (CLI arg or env var) must exist.
    pub fn load_resolved(cli_path: Option<&str>) -> common::Result<(PathBuf, Self)> {
        let path = Self::resolve_path(cli_path);
        let explicit = cli_path.is_some() || std::env::var_os(CONFIG_PATH_ENV).is_some();

        if !explicit && !path.exists() {
            let mut config = Config::default();
            config.apply_env();
            config.validate()?;
            return Ok((path, config));
        }

        let config = Self::load(&path)?;
        Ok((path, config))
    }

    /// Resolve config file path from CLI arg or KEY_ROTATOR_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Pool kind with the configured defaults. Only valid after `validate`.
    pub fn policy_kind(&self) -> PolicyKind {
        match self.pool.policy {
            PolicyName::DailyQuota => PolicyKind::DailyQuota {
                default_limit: self.pool.daily_limit.max(0) as u64,
            },
            PolicyName::MinuteCooldown => PolicyKind::MinuteCooldown {
                window: TimeDelta::seconds(self.pool.cooldown_secs.max(0)),
            },
        }
    }

    fn apply_env(&mut self) {
        if let Some(state_file) = std::env::var_os(STATE_FILE_ENV) {
            self.pool.state_file = Some(PathBuf::from(state_file));
        }
    }

    fn validate(&self) -> common::Result<()> {
        if self.pool.daily_limit < 0 {
            return Err(common::Error::Config(format!(
                "daily_limit must be >= 0, got {}",
                self.pool.daily_limit
            )));
        }

        // Bound well below TimeDelta's range
        if !(0..=i64::from(u32::MAX)).contains(&self.pool.cooldown_secs) {
            return Err(common::Error::Config(format!(
                "cooldown_secs must be between 0 and {}, got {}",
                u32::MAX,
                self.pool.cooldown_secs
            )));
        }

        if let Some(ref state_file) = self.pool.state_file
            && state_file.as_os_str().is_empty()
        {
            return Err(common::Error::Config("state_file must not be empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("key-rotator.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
policy = "daily_quota"
state_file = "/var/lib/key-rotator/state.json"
daily_limit = 250
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.pool.policy, PolicyName::DailyQuota);
        assert_eq!(
            config.pool.state_file,
            Some(PathBuf::from("/var/lib/key-rotator/state.json"))
        );
        assert_eq!(config.pool.daily_limit, 250);
        assert_eq!(config.pool.cooldown_secs, 60);
        assert_eq!(
            config.policy_kind(),
            PolicyKind::DailyQuota { default_limit: 250 }
        );
    }

    #[test]
    fn test_minute_cooldown_policy() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
policy = "minute_cooldown"
cooldown_secs = 90
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.policy_kind(),
            PolicyKind::MinuteCooldown {
                window: TimeDelta::seconds(90)
            }
        );
        assert!(config.pool.state_file.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.policy_kind(), PolicyKind::daily_quota());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/key-rotator.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
policy = "hourly"
"#,
        );

        let result = Config::load(&path);
        assert!(result.is_err(), "unknown policy name must be rejected");
    }

    #[test]
    fn test_negative_daily_limit_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
daily_limit = -5
"#,
        );

        let err = Config::load(&path).unwrap_err();
        assert!(
            err.to_string().contains("daily_limit must be >= 0"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
policy = "minute_cooldown"
cooldown_secs = -1
"#,
        );

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Config(_))));
    }

    #[test]
    fn test_zero_limits_are_legal() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
daily_limit = 0
cooldown_secs = 0
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.policy_kind(), PolicyKind::DailyQuota { default_limit: 0 });
    }

    #[test]
    fn test_state_file_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[pool]
state_file = "/from/file.json"
"#,
        );

        unsafe { set_env(STATE_FILE_ENV, "/from/env.json") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(STATE_FILE_ENV) };

        assert_eq!(
            config.pool.state_file,
            Some(PathBuf::from("/from/env.json")),
            "KEY_ROTATOR_STATE_FILE must take precedence over the config file"
        );
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CONFIG_PATH_ENV, "/env/path.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env(CONFIG_PATH_ENV) };
        assert_eq!(path, PathBuf::from("/env/path.toml"));
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CONFIG_PATH_ENV) };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("key-rotator.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CONFIG_PATH_ENV, "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        unsafe { remove_env(CONFIG_PATH_ENV) };
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over KEY_ROTATOR_CONFIG env var"
        );
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CONFIG_PATH_ENV) };
        let result = Config::load_resolved(Some("/nonexistent/key-rotator.toml"));
        assert!(result.is_err(), "an explicitly named config file must exist");
    }
}
