use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sqlite,
}

impl Backend {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "sqlite" => Ok(Backend::Sqlite),
            other => bail!("unknown backend '{other}', expected memory or sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub backend: Backend,
    pub cache_max_entries: usize,
    pub page_size: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/admin_shell.db".into(),
            backend: Backend::Memory,
            cache_max_entries: 1000,
            page_size: 50,
            log_filter: "info".into(),
        }
    }
}

/// Keys accepted in `admin_shell.toml`; anything missing keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    database_url: Option<String>,
    backend: Option<Backend>,
    cache_max_entries: Option<usize>,
    page_size: Option<usize>,
    log_filter: Option<String>,
}

/// Command line flags, applied after the file and the environment.
#[derive(Debug, Default, Clone, Args)]
pub struct Overrides {
    #[arg(long)]
    pub database_url: Option<String>,
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
    #[arg(long)]
    pub cache_max_entries: Option<usize>,
    #[arg(long)]
    pub page_size: Option<usize>,
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl Settings {
    fn merge_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file.database_url {
            self.database_url = v;
        }
        if let Some(v) = file.backend {
            self.backend = v;
        }
        if let Some(v) = file.cache_max_entries {
            self.cache_max_entries = v;
        }
        if let Some(v) = file.page_size {
            self.page_size = v;
        }
        if let Some(v) = file.log_filter {
            self.log_filter = v;
        }
        Ok(())
    }

    fn merge_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = var("APP__DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = var("APP__BACKEND") {
            self.backend = Backend::parse(&v)?;
        }
        if let Some(v) = var("APP__CACHE_MAX_ENTRIES") {
            self.cache_max_entries = v
                .parse()
                .with_context(|| format!("APP__CACHE_MAX_ENTRIES is not a number: '{v}'"))?;
        }
        if let Some(v) = var("APP__PAGE_SIZE") {
            self.page_size = v
                .parse()
                .with_context(|| format!("APP__PAGE_SIZE is not a number: '{v}'"))?;
        }
        if let Some(v) = var("APP__LOG_FILTER") {
            self.log_filter = v;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(v) = &overrides.database_url {
            self.database_url = v.clone();
        }
        if let Some(v) = overrides.backend {
            self.backend = v;
        }
        if let Some(v) = overrides.cache_max_entries {
            self.cache_max_entries = v;
        }
        if let Some(v) = overrides.page_size {
            self.page_size = v;
        }
        if let Some(v) = &overrides.log_filter {
            self.log_filter = v.clone();
        }
    }
}

/// Defaults, then `path` if it exists, then `APP__*` variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    match fs::read_to_string(path) {
        Ok(raw) => settings
            .merge_file(&raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read '{}'", path.display()));
        }
    }
    settings.merge_env(var)?;
    Ok(settings)
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
