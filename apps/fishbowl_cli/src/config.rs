use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use fishbowl_api::FrontEndConfig;
use serde::Deserialize;
use shared::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_path: PathBuf,
    pub admins: Vec<String>,
    pub channel: String,
    pub meet_url: String,
    pub presentation_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("db.json"),
            admins: Vec::new(),
            channel: String::new(),
            meet_url: String::new(),
            presentation_url: String::new(),
        }
    }
}

impl Settings {
    pub fn front_end(&self) -> FrontEndConfig {
        FrontEndConfig {
            admins: self.admins.iter().map(|admin| UserId::new(admin.as_str())).collect(),
            channel: self.channel.clone(),
            meet_url: self.meet_url.clone(),
            presentation_url: self.presentation_url.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    data_path: Option<PathBuf>,
    admins: Option<Vec<String>>,
    channel: Option<String>,
    meet_url: Option<String>,
    presentation_url: Option<String>,
}

/// Defaults, then the TOML file at `config_path` if it exists, then the
/// process environment.
pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();
    apply_file(&mut settings, config_path)?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, config_path: &Path) -> anyhow::Result<()> {
    let raw = match fs::read_to_string(config_path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read config '{}'", config_path.display()))
        }
    };
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("invalid config file '{}'", config_path.display()))?;

    if let Some(v) = file_cfg.data_path {
        settings.data_path = v;
    }
    if let Some(v) = file_cfg.admins {
        settings.admins = v;
    }
    if let Some(v) = file_cfg.channel {
        settings.channel = v;
    }
    if let Some(v) = file_cfg.meet_url {
        settings.meet_url = v;
    }
    if let Some(v) = file_cfg.presentation_url {
        settings.presentation_url = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("FISHBOWL_DB") {
        settings.data_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__DATA_PATH") {
        settings.data_path = PathBuf::from(v);
    }

    if let Some(v) = lookup("FISHBOWL_ADMINS") {
        settings.admins = parse_admins(&v);
    }
    if let Some(v) = lookup("APP__ADMINS") {
        settings.admins = parse_admins(&v);
    }

    if let Some(v) = lookup("FISHBOWL_CHANNEL") {
        settings.channel = v;
    }
    if let Some(v) = lookup("APP__CHANNEL") {
        settings.channel = v;
    }

    if let Some(v) = lookup("FISHBOWL_MEET") {
        settings.meet_url = v;
    }
    if let Some(v) = lookup("APP__MEET_URL") {
        settings.meet_url = v;
    }

    if let Some(v) = lookup("FISHBOWL_PP") {
        settings.presentation_url = v;
    }
    if let Some(v) = lookup("APP__PRESENTATION_URL") {
        settings.presentation_url = v;
    }
}

fn parse_admins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|admin| !admin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
