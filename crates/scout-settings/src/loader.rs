//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ScoutSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SCOUT_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ScoutSettings;

/// Resolve the default settings file path (`~/.scout/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".scout").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ScoutSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ScoutSettings> {
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<ScoutSettings> {
    let defaults = serde_json::to_value(ScoutSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ScoutSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_overrides<F>(settings: &mut ScoutSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Dispatcher ──────────────────────────────────────────────────
    if let Some(v) = env.u64("SCOUT_RECONNECT_INTERVAL_MS", 100, 3_600_000) {
        settings.dispatcher.reconnect_interval_ms = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("SCOUT_CLOSE_GRACE_MS", 0, 60_000) {
        settings.session.close_grace_ms = v;
    }
    if let Some(v) = env.u64("SCOUT_DRAIN_TIMEOUT_MS", 0, 3_600_000) {
        settings.session.drain_timeout_ms = v;
    }
    if let Some(v) = env.usize("SCOUT_MAX_CONCURRENT_TASKS", 0, 100_000) {
        settings.session.max_concurrent_tasks = v;
    }
    if let Some(v) = env.usize("SCOUT_QUEUE_CAPACITY", 1, 65_536) {
        settings.session.output_queue_capacity = v;
    }
    if let Some(v) = env.bool("SCOUT_ANNOUNCE_LEAVE") {
        settings.session.announce_leave = v;
    }

    // ── Fetch ───────────────────────────────────────────────────────
    if let Some(v) = env.bool("SCOUT_ACCEPT_INVALID_CERTS") {
        settings.fetch.accept_invalid_certs = v;
    }
    if let Some(v) = env.u64("SCOUT_FETCH_TIMEOUT_MS", 1, 3_600_000) {
        settings.fetch.timeout_ms = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SCOUT_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn overrides(pairs: &[(&str, &str)]) -> ScoutSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = ScoutSettings::default();
        apply_overrides(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"session": {"closeGraceMs": 1000, "drainTimeoutMs": 5}});
        let source = serde_json::json!({"session": {"closeGraceMs": 10}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["session"]["closeGraceMs"], 10);
        assert_eq!(merged["session"]["drainTimeoutMs"], 5);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── read_settings_file ──────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = read_settings_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, ScoutSettings::default());
    }

    #[test]
    fn partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"session": {"maxConcurrentTasks": 8}, "fetch": {"timeoutMs": 2500}}"#,
        )
        .unwrap();

        let settings = read_settings_file(&path).unwrap();
        assert_eq!(settings.session.max_concurrent_tasks, 8);
        assert_eq!(settings.fetch.timeout_ms, Some(2500));
        assert_eq!(settings.session.close_grace_ms, 1_000);
        assert!(settings.fetch.accept_invalid_certs);
    }

    #[test]
    fn invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = read_settings_file(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let settings = overrides(&[
            ("SCOUT_MAX_CONCURRENT_TASKS", "0"),
            ("SCOUT_CLOSE_GRACE_MS", "250"),
            ("SCOUT_ACCEPT_INVALID_CERTS", "off"),
            ("SCOUT_FETCH_TIMEOUT_MS", "1500"),
            ("SCOUT_LOG_LEVEL", "debug"),
            ("SCOUT_ANNOUNCE_LEAVE", "yes"),
        ]);
        assert_eq!(settings.session.max_concurrent_tasks, 0);
        assert_eq!(settings.session.close_grace_ms, 250);
        assert!(!settings.fetch.accept_invalid_certs);
        assert_eq!(settings.fetch.timeout_ms, Some(1500));
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.session.announce_leave);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let settings = overrides(&[
            ("SCOUT_QUEUE_CAPACITY", "0"),
            ("SCOUT_RECONNECT_INTERVAL_MS", "soon"),
            ("SCOUT_ACCEPT_INVALID_CERTS", "maybe"),
            ("SCOUT_LOG_LEVEL", ""),
        ]);
        assert_eq!(settings, ScoutSettings::default());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("1000", 1000, 2000), Some(1000));
        assert_eq!(parse_u64_range("999", 1000, 2000), None);
        assert_eq!(parse_usize_range("0", 0, 10), Some(0));
        assert_eq!(parse_usize_range("11", 0, 10), None);
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }
}
