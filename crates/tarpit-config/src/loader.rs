//! Four-pass overlay loader: built-in defaults, then an optional TOML
//! file, then `GOPOT__section__key` environment variables, then typed
//! CLI flags, each pass overriding only the keys it actually sets.
//! Grounded on `cordelia-node::config::NodeConfig::load_or_default` for
//! the file-optional behaviour, and on `original_source/config/flags.go`
//! for the environment variable naming scheme (`__` separates nesting,
//! mirroring that source's own env-to-key mapping).

use std::path::Path;

use crate::cli::ConfigOverrides;
use crate::sections::TarpitConfig;
use crate::validate::{validate, ConfigError};

const ENV_PREFIX: &str = "GOPOT__";

/// Runs the full overlay: defaults -> file -> environment -> CLI,
/// then validates the result.
pub fn load(overrides: &ConfigOverrides) -> Result<TarpitConfig, ConfigError> {
    let mut value = toml::Value::try_from(TarpitConfig::default()).expect("default config always serializes");

    if let Some(path) = &overrides.config_file {
        if path.exists() {
            merge_file(&mut value, path)?;
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    merge_env(&mut value, std::env::vars());

    let mut config: TarpitConfig = value.try_into().map_err(|source| ConfigError::Parse {
        path: overrides.config_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        source,
    })?;

    overrides.apply(&mut config).map_err(|message| ConfigError::Invalid(vec![message]))?;

    validate(&config)?;
    Ok(config)
}

fn merge_file(root: &mut toml::Value, path: &Path) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
    let file_value: toml::Value = toml::from_str(&content)
        .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
    deep_merge(root, file_value);
    Ok(())
}

fn merge_env(root: &mut toml::Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, raw_value) in vars {
        let Some(rest) = key.strip_prefix(ENV_PREFIX) else { continue };
        let path: Vec<String> = rest.to_lowercase().split("__").map(str::to_string).collect();
        if path.len() < 2 {
            continue;
        }
        set_at_path(root, &path, parse_scalar(&raw_value));
    }
}

/// Recursively overlays `overlay` onto `base`: tables merge key-by-key,
/// anything else replaces the base value outright.
fn deep_merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => deep_merge(existing, overlay_value),
                    None => {
                        base_table.insert(key, overlay_value);
                    }
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}

fn set_at_path(root: &mut toml::Value, path: &[String], value: toml::Value) {
    let mut cursor = root;
    for segment in &path[..path.len() - 1] {
        if !matches!(cursor, toml::Value::Table(_)) {
            *cursor = toml::Value::Table(Default::default());
        }
        let table = cursor.as_table_mut().expect("just normalised to a table");
        cursor = table.entry(segment.clone()).or_insert_with(|| toml::Value::Table(Default::default()));
    }
    if let Some(table) = cursor.as_table_mut() {
        table.insert(path[path.len() - 1].clone(), value);
    }
}

fn parse_scalar(raw: &str) -> toml::Value {
    if let Ok(n) = raw.parse::<i64>() {
        return toml::Value::Integer(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return toml::Value::Float(f);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    toml::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn loads_defaults_with_no_overrides() {
        let config = load(&ConfigOverrides::default()).unwrap();
        assert_eq!(config, TarpitConfig::default());
    }

    #[test]
    fn env_overlay_sets_nested_value() {
        let mut value = toml::Value::try_from(TarpitConfig::default()).unwrap();
        let vars: HashMap<String, String> = [("GOPOT__server__port".to_string(), "9100".to_string())].into();
        merge_env(&mut value, vars.into_iter());
        let config: TarpitConfig = value.try_into().unwrap();
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn file_overlay_merges_partial_sections() {
        let dir = std::env::temp_dir().join(format!("tarpit-config-test-{}-file", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[ftp_server]\nport = 2200\n").unwrap();

        let overrides = ConfigOverrides { config_file: Some(path.clone()), ..Default::default() };
        let config = load(&overrides).unwrap();
        assert_eq!(config.ftp_server.port, 2200);
        assert_eq!(config.server.port, TarpitConfig::default().server.port);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let overrides = ConfigOverrides {
            config_file: Some(std::path::PathBuf::from("/nonexistent/tarpit-config.toml")),
            ..Default::default()
        };
        let config = load(&overrides).unwrap();
        assert_eq!(config, TarpitConfig::default());
    }

    #[test]
    fn cli_override_wins_over_file() {
        let dir = std::env::temp_dir().join(format!("tarpit-config-test-{}-cli", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[server]\nport = 3000\n").unwrap();

        let overrides =
            ConfigOverrides { config_file: Some(path.clone()), server_port: Some(4000), ..Default::default() };
        let config = load(&overrides).unwrap();
        assert_eq!(config.server.port, 4000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
