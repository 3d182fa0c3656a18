use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail, ensure};

/// Placeholder session secret shipped as the default. The server warns
/// loudly when it is still in use.
pub const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";

/// Longest session lifetime accepted: ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub allow_self_like: bool,
    pub timeline_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("warbler.db"),
            host: "0.0.0.0".into(),
            port: 5000,
            session_secret: PLACEHOLDER_SECRET.into(),
            session_ttl_hours: 24 * 30,
            allow_self_like: false,
            timeline_limit: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset keys keep their
    /// defaults; set-but-malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            db_path: lookup("WARBLER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            host: lookup("WARBLER_HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "WARBLER_PORT", defaults.port)?,
            session_secret: lookup("WARBLER_SESSION_SECRET").unwrap_or(defaults.session_secret),
            session_ttl_hours: parse(&lookup, "WARBLER_SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            allow_self_like: parse_flag(&lookup, "WARBLER_ALLOW_SELF_LIKE", defaults.allow_self_like)?,
            timeline_limit: parse(&lookup, "WARBLER_TIMELINE_LIMIT", defaults.timeline_limit)?,
        };

        ensure!(
            config.session_ttl_hours > 0,
            "WARBLER_SESSION_TTL_HOURS must be positive"
        );
        ensure!(
            config.session_ttl_hours <= MAX_SESSION_TTL_HOURS,
            "WARBLER_SESSION_TTL_HOURS must be at most {MAX_SESSION_TTL_HOURS}"
        );
        ensure!(config.timeline_limit > 0, "WARBLER_TIMELINE_LIMIT must be positive");

        Ok(config)
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.session_secret.is_empty() || self.session_secret == PLACEHOLDER_SECRET
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is not valid: {raw:?}")),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.db_path, PathBuf::from("warbler.db"));
        assert_eq!(config.timeline_limit, 100);
        assert!(!config.allow_self_like);
        assert!(config.uses_placeholder_secret());
    }

    #[test]
    fn values_are_read_and_parsed() {
        let config = from_pairs(&[
            ("WARBLER_PORT", "8080"),
            ("WARBLER_DB_PATH", "/tmp/w.db"),
            ("WARBLER_SESSION_SECRET", "s3cret"),
            ("WARBLER_ALLOW_SELF_LIKE", "Yes"),
            ("WARBLER_SESSION_TTL_HOURS", " 2 "),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(config.session_ttl_hours, 2);
        assert!(config.allow_self_like);
        assert!(!config.uses_placeholder_secret());
    }

    #[test]
    fn session_ttl_upper_bound_is_inclusive() {
        let max = MAX_SESSION_TTL_HOURS.to_string();
        let config = from_pairs(&[("WARBLER_SESSION_TTL_HOURS", max.as_str())]).unwrap();
        assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);

        let over = (MAX_SESSION_TTL_HOURS + 1).to_string();
        assert!(from_pairs(&[("WARBLER_SESSION_TTL_HOURS", over.as_str())]).is_err());
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(from_pairs(&[("WARBLER_PORT", "eighty")]).is_err());
        assert!(from_pairs(&[("WARBLER_ALLOW_SELF_LIKE", "maybe")]).is_err());
        assert!(from_pairs(&[("WARBLER_SESSION_TTL_HOURS", "0")]).is_err());
        assert!(from_pairs(&[("WARBLER_SESSION_TTL_HOURS", "3000000000000")]).is_err());
        assert!(from_pairs(&[("WARBLER_TIMELINE_LIMIT", "0")]).is_err());
    }
}
