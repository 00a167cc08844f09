// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use chatdesk_app::Locale;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_ASSIGN_RETRIES: u32 = 3;
const MAX_ASSIGN_RETRIES: u32 = 10;
/// Terminal rows are tall, so the dropdown sits one row under the trigger.
const DEFAULT_UI_DROPDOWN_GAP: u16 = 1;
const MAX_DROPDOWN_GAP: u16 = 20;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
    pub assign_retries: Option<u32>,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            db_path: None,
            assign_retries: Some(DEFAULT_ASSIGN_RETRIES),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub locale: Option<String>,
    pub dropdown_gap: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("CHATDESK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!(
                "cannot resolve config directory; set CHATDESK_CONFIG_PATH to the config file"
            )
        })?;

        let app_dir = config_root.join(chatdesk_db::APP_NAME);
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
                    "config file {} has no version. Add `version = 1` and keep values under [storage], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with --print-example-config",
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
        if let Some(db_path) = &self.storage.db_path {
            chatdesk_db::validate_db_path(db_path)?;
        }

        if let Some(retries) = self.storage.assign_retries
            && retries > MAX_ASSIGN_RETRIES
        {
            bail!(
                "storage.assign_retries in {} must be at most {MAX_ASSIGN_RETRIES}, got {retries}",
                path.display()
            );
        }

        if let Some(locale) = &self.ui.locale
            && Locale::parse(locale).is_none()
        {
            let supported = Locale::ALL
                .iter()
                .map(|locale| locale.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            bail!(
                "ui.locale {locale:?} in {} is not supported; use one of: {supported}",
                path.display()
            );
        }

        if let Some(gap) = self.ui.dropdown_gap
            && gap > MAX_DROPDOWN_GAP
        {
            bail!(
                "ui.dropdown_gap in {} must be at most {MAX_DROPDOWN_GAP} rows, got {gap}",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level {level:?} in {} is not a valid filter; use a level such as info or debug",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => chatdesk_db::default_db_path(),
        }
    }

    pub fn assign_retries(&self) -> u32 {
        self.storage
            .assign_retries
            .unwrap_or(DEFAULT_ASSIGN_RETRIES)
    }

    /// Configured locale, else the one named by `LANG`, else English.
    pub fn locale(&self) -> Locale {
        self.ui
            .locale
            .as_deref()
            .and_then(Locale::parse)
            .or_else(|| env::var("LANG").ok().as_deref().and_then(Locale::parse))
            .unwrap_or_default()
    }

    pub fn dropdown_gap(&self) -> u16 {
        self.ui.dropdown_gap.unwrap_or(DEFAULT_UI_DROPDOWN_GAP)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.log.file {
            return Ok(PathBuf::from(path));
        }

        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to a writable path")
        })?;
        Ok(data_root
            .join(chatdesk_db::APP_NAME)
            .join(format!("{}.log", chatdesk_db::APP_NAME)))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# chatdesk config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/chatdesk/chatdesk.db)\n# db_path = \"/absolute/path/to/chatdesk.db\"\nassign_retries = {}\n\n[ui]\n# Optional. One of en, de, es, fr. Defaults to $LANG, then en.\n# locale = \"en\"\ndropdown_gap = {}\n\n[log]\nlevel = \"{}\"\n# Optional. Default is chatdesk.log in the platform data dir.\n# file = \"/absolute/path/to/chatdesk.log\"\n",
            path.display(),
            DEFAULT_ASSIGN_RETRIES,
            DEFAULT_UI_DROPDOWN_GAP,
            DEFAULT_LOG_LEVEL,
        )
    }
}
