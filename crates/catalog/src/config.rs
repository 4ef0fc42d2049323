use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "aac", "wav", "wma", "aif", "aiff", "ape", "mpc",
    "shn", "wv",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "avi", "mkv", "mp4", "m4v", "webm", "mov", "mpg", "mpeg", "flv", "wmv", "ogv",
];
const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8", "pls"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub version: u32,
    pub index_path: String,
    pub no_symlinks: bool,
    pub catalog_check_duplicate: bool,
    pub catalog_verify_by_time: bool,
    pub site_charset: String,
    pub lc_charset: String,
    pub move_match_pattern: bool,
    pub catalog_file_pattern: Vec<String>,
    pub catalog_video_pattern: Vec<String>,
    pub catalog_playlist_pattern: Vec<String>,
    pub chunk_size: usize,
    pub progress_interval: usize,
    pub rating_user: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            index_path: "catalog.redb".to_string(),
            no_symlinks: false,
            catalog_check_duplicate: false,
            catalog_verify_by_time: false,
            site_charset: "UTF-8".to_string(),
            lc_charset: String::new(),
            move_match_pattern: false,
            catalog_file_pattern: to_strings(AUDIO_EXTENSIONS),
            catalog_video_pattern: to_strings(VIDEO_EXTENSIONS),
            catalog_playlist_pattern: to_strings(PLAYLIST_EXTENSIONS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            rating_user: "admin".to_string(),
        }
    }
}

impl ScanConfig {
    /// Charset of on-disk names; falls back to the site charset.
    pub fn local_charset(&self) -> &str {
        let lc = self.lc_charset.trim();
        if lc.is_empty() {
            self.site_charset.trim()
        } else {
            lc
        }
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.index_path.trim().is_empty() {
            self.index_path = "catalog.redb".to_string();
        }
        if self.site_charset.trim().is_empty() {
            self.site_charset = "UTF-8".to_string();
        }
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if self.progress_interval == 0 {
            self.progress_interval = DEFAULT_PROGRESS_INTERVAL;
        }
        if self.rating_user.trim().is_empty() {
            self.rating_user = "admin".to_string();
        }
        for patterns in [
            &mut self.catalog_file_pattern,
            &mut self.catalog_video_pattern,
            &mut self.catalog_playlist_pattern,
        ] {
            for ext in patterns.iter_mut() {
                *ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            }
            patterns.retain(|ext| !ext.is_empty());
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("CATALOG_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ScanConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ScanConfig = serde_yaml::from_str(&contents)?;
        config.normalize();
        return Ok((config, false));
    }

    let config = ScanConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ScanConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
