//! Load configuration from XDG `config.toml` and project `.env`, then apply to the
//! process environment with priority: **existing env > .env > XDG**.
//!
//! [`Settings`] is the typed view the server and core constructors consume.

mod settings;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use settings::Settings;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads config from XDG `config.toml` and an optional project `.env`, then sets
/// environment variables only for keys that are **not** already set (so existing
/// env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory, or `override_dir` if given)
/// 2. Value from `$XDG_CONFIG_HOME/<app_name>/config.toml` `[env]` table
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = load_xdg_env_map(app_name)?;
    let dotenv_map = load_dotenv_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = xdg_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        if let Some(v) = dotenv_map.get(&key).or_else(|| xdg_map.get(&key)) {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

fn xdg_config_path(app_name: &str) -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::config_dir()?,
    };
    Some(base.join(app_name).join("config.toml"))
}

/// Reads the `[env]` table of `config.toml` as a string map. Missing file is not
/// an error; missing `[env]` table yields an empty map.
fn load_xdg_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let path = match xdg_config_path(app_name) {
        Some(p) => p,
        None => return Ok(HashMap::new()),
    };
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let parsed: toml::Value = raw.parse()?;
    let mut map = HashMap::new();
    if let Some(env) = parsed.get("env").and_then(|v| v.as_table()) {
        for (k, v) in env {
            if let Some(s) = v.as_str() {
                map.insert(k.clone(), s.to_string());
            }
        }
    }
    Ok(map)
}

/// Parses `.env` in `dir` (or the current directory). `KEY=VALUE` lines only;
/// `#` comments and blank lines are skipped; values may be single- or
/// double-quoted. Missing file yields an empty map.
fn load_dotenv_map(dir: Option<&Path>) -> Result<HashMap<String, String>, std::io::Error> {
    let path = match dir {
        Some(d) => d.join(".env"),
        None => std::env::current_dir()?.join(".env"),
    };
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(&path)?;
    let mut map = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    /// **Scenario**: a key already present in the environment is not overwritten.
    #[test]
    fn existing_env_wins() {
        env::set_var("VERDANT_TEST_EXISTING", "from_env");
        let _ = load_and_apply("verdant", None);
        assert_eq!(env::var("VERDANT_TEST_EXISTING").as_deref(), Ok("from_env"));
        env::remove_var("VERDANT_TEST_EXISTING");
    }

    /// **Scenario**: no config.toml and no .env is Ok (nothing to apply).
    #[test]
    fn load_and_apply_no_config_ok() {
        let r = load_and_apply("verdant-nonexistent-app-xyz", None::<&Path>);
        assert!(r.is_ok());
    }

    /// **Scenario**: .env value beats the XDG [env] table for the same key.
    #[test]
    fn dotenv_overrides_xdg() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("verdant");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nVERDANT_TEST_PRIORITY = \"from_xdg\"\n",
        )
        .unwrap();

        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "VERDANT_TEST_PRIORITY=from_dotenv\n",
        )
        .unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("VERDANT_TEST_PRIORITY");

        let _ = load_and_apply("verdant", Some(dotenv_dir.path()));
        let val = env::var("VERDANT_TEST_PRIORITY").unwrap();
        env::remove_var("VERDANT_TEST_PRIORITY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(val, "from_dotenv");
    }

    /// **Scenario**: quoted values in .env are unquoted; comments and blanks skipped.
    #[test]
    fn dotenv_parsing_quotes_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "# comment\n\nA=\"quoted\"\nB='single'\nC=plain\n",
        )
        .unwrap();
        let map = load_dotenv_map(Some(dir.path())).unwrap();
        assert_eq!(map.get("A").map(String::as_str), Some("quoted"));
        assert_eq!(map.get("B").map(String::as_str), Some("single"));
        assert_eq!(map.get("C").map(String::as_str), Some("plain"));
    }
}
