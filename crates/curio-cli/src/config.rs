// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_DEBOUNCE: &str = "500ms";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub persistence: Persistence,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            persistence: Persistence::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<usize>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Persistence {
    pub debounce: Option<String>,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            debounce: Some(DEFAULT_DEBOUNCE.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CURIO_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set CURIO_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(curio_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [storage], [ui], and [persistence]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(page_size) = self.ui.page_size
            && page_size == 0
        {
            bail!(
                "[ui].page_size in {} must be at least 1",
                path.display()
            );
        }
        self.debounce().with_context(|| {
            format!("[persistence].debounce in {} is invalid", path.display())
        })?;
        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.storage.db_path.as_ref() {
            return Ok(PathBuf::from(path));
        }
        curio_db::default_db_path()
    }

    pub fn page_size(&self) -> usize {
        self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    pub fn debounce(&self) -> Result<Duration> {
        let raw = self
            .persistence
            .debounce
            .as_deref()
            .unwrap_or(DEFAULT_DEBOUNCE);
        parse_duration(raw)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "\
# curio configuration ({})
version = 1

[storage]
# db_path = \"/path/to/curio.db\"

[ui]
page_size = {DEFAULT_PAGE_SIZE}

[persistence]
# Quiet period before pending order changes are written.
debounce = \"{DEFAULT_DEBOUNCE}\"
",
            path.display()
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let trimmed = raw.trim();
    if let Some(millis) = trimmed.strip_suffix("ms") {
        let value: u64 = millis
            .trim()
            .parse()
            .with_context(|| format!("parse duration {trimmed:?}"))?;
        return Ok(Duration::from_millis(value));
    }
    if let Some(secs) = trimmed.strip_suffix('s') {
        let value: u64 = secs
            .trim()
            .parse()
            .with_context(|| format!("parse duration {trimmed:?}"))?;
        return Ok(Duration::from_secs(value));
    }
    bail!("duration {trimmed:?} must end in `ms` or `s`, e.g. \"500ms\" or \"2s\"")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use std::fs;
    use std::time::Duration;

    #[test]
    fn parse_duration_accepts_ms_and_s() {
        assert_eq!(
            parse_duration("500ms").expect("ms"),
            Duration::from_millis(500)
        );
        assert_eq!(parse_duration("2s").expect("s"), Duration::from_secs(2));
        assert!(parse_duration("2 minutes").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load(&dir.path().join("absent.toml")).expect("defaults");
        assert_eq!(config.page_size(), 20);
        assert_eq!(config.debounce().expect("debounce"), Duration::from_millis(500));
    }

    #[test]
    fn versioned_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "
            version = 1

            [storage]
            db_path = \"/tmp/shelves.db\"

            [ui]
            page_size = 12

            [persistence]
            debounce = \"2s\"
            ",
        )
        .expect("write config");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.page_size(), 12);
        assert_eq!(config.debounce().expect("debounce"), Duration::from_secs(2));
        assert_eq!(
            config.db_path().expect("db path").to_string_lossy(),
            "/tmp/shelves.db"
        );
    }

    #[test]
    fn unversioned_file_is_rejected_with_guidance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ui]\npage_size = 5\n").expect("write config");

        let error = Config::load(&path).expect_err("missing version");
        assert!(error.to_string().contains("version = 1"));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "version = 1\n\n[ui]\npage_size = 0\n").expect("write config");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn example_config_is_loadable_after_uncommenting_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, Config::example_config(&path)).expect("write example");

        let config = Config::load(&path).expect("example config loads");
        assert_eq!(config.page_size(), 20);
    }
}
