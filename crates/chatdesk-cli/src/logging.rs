// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub const LOG_ENV: &str = "CHATDESK_LOG";

/// Installs the global subscriber. Output goes to a file because the
/// terminal is owned by the UI. Returns the log file path.
pub fn init(config: &Config) -> Result<PathBuf> {
    let path = config.log_file()?;
    let env_value = env::var(LOG_ENV).ok();
    let filter = resolve_filter(env_value.as_deref(), config.log_level())?;
    let file = open_log_file(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;

    tracing::info!(log_file = %path.display(), "logging initialised");
    Ok(path)
}

/// `CHATDESK_LOG` wins over the configured level when it is set and non-blank.
fn resolve_filter(env_value: Option<&str>, configured: &str) -> Result<EnvFilter> {
    let (directive, source) = match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => (value, LOG_ENV),
        _ => (configured, "[log].level"),
    };
    EnvFilter::try_new(directive).with_context(|| {
        format!("invalid log filter {directive:?} from {source}; use a level such as info or debug")
    })
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {}; set [log].file to a writable path",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{LOG_ENV, open_log_file, resolve_filter};
    use anyhow::Result;

    #[test]
    fn env_value_overrides_configured_level() -> Result<()> {
        let filter = resolve_filter(Some("debug"), "warn")?;
        assert_eq!(filter.to_string(), "debug");
        Ok(())
    }

    #[test]
    fn blank_env_value_falls_back_to_config() -> Result<()> {
        let filter = resolve_filter(Some("   "), "warn")?;
        assert_eq!(filter.to_string(), "warn");
        assert_eq!(resolve_filter(None, "error")?.to_string(), "error");
        Ok(())
    }

    #[test]
    fn invalid_env_filter_names_its_source() {
        let error = resolve_filter(Some("chatdesk=loud"), "info").expect_err("bad filter");
        assert!(error.to_string().contains(LOG_ENV));
    }

    #[test]
    fn log_file_parent_directories_are_created() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("dir").join("chatdesk.log");
        open_log_file(&path)?;
        assert!(path.exists());
        Ok(())
    }
}
