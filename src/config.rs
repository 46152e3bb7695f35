//! Runtime configuration: defaults, optional `config.json`, env overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const STORAGE_PROFILE_FILE: &str = "storage_profile.json";
const DB_FILE: &str = "luminaire.db";
const THUMBNAIL_DIR: &str = "thumbnails";
const APP_DIR_NAME: &str = "luminaire";

pub const DEFAULT_THUMB_MAX_EDGE: u32 = 512;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;
const DEFAULT_VIDEO_FRAME_OFFSET_SECS: f64 = 1.0;
const DEFAULT_TOMBSTONE_GRACE_DAYS: u32 = 30;
const DEFAULT_DECODE_TIMEOUT_SECS: u64 = 30;
const HDD_FRIENDLY_THUMB_THREADS: usize = 4;
const SSD_FRIENDLY_THUMB_THREADS: usize = 12;
const HDD_FRIENDLY_DB_POOL_SIZE: u32 = 4;
const SSD_FRIENDLY_DB_POOL_SIZE: u32 = 12;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageProfile {
    #[default]
    Hdd,
    Ssd,
}

impl StorageProfile {
    pub fn label(self) -> &'static str {
        match self {
            StorageProfile::Hdd => "hdd",
            StorageProfile::Ssd => "ssd",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub cache_dir: PathBuf,
    pub storage_profile: StorageProfile,
    pub storage_profile_path: PathBuf,
    pub thumbnail_max_edge: u32,
    pub jpeg_quality: u8,
    pub worker_threads: usize,
    pub db_pool_size: u32,
    pub ffmpeg_path: PathBuf,
    pub video_frame_offset_secs: f64,
    /// Upper bound on one external frame extraction.
    pub decode_timeout_secs: u64,
    pub tombstone_grace_days: u32,
}

/// Optional on-disk overrides. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    thumbnail_max_edge: Option<u32>,
    jpeg_quality: Option<u8>,
    worker_threads: Option<usize>,
    db_pool_size: Option<u32>,
    ffmpeg_path: Option<PathBuf>,
    video_frame_offset_secs: Option<f64>,
    decode_timeout_secs: Option<u64>,
    tombstone_grace_days: Option<u32>,
}

impl Config {
    /// Resolves configuration for the default data directory.
    pub fn load() -> Self {
        let data_dir = std::env::var_os("LUMINAIRE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self::load_from(&data_dir)
    }

    /// Resolves configuration rooted at `data_dir`.
    pub fn load_from(data_dir: &Path) -> Self {
        let storage_profile_path = data_dir.join(STORAGE_PROFILE_FILE);
        let storage_profile = load_storage_profile(&storage_profile_path);
        let file = read_config_file(&data_dir.join(CONFIG_FILE));

        let mut config = Config {
            data_dir: data_dir.to_path_buf(),
            db_path: data_dir.join(DB_FILE),
            cache_dir: data_dir.join(THUMBNAIL_DIR),
            storage_profile,
            storage_profile_path,
            thumbnail_max_edge: file
                .thumbnail_max_edge
                .unwrap_or(DEFAULT_THUMB_MAX_EDGE),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            worker_threads: file
                .worker_threads
                .unwrap_or_else(|| default_worker_threads(storage_profile)),
            db_pool_size: file
                .db_pool_size
                .unwrap_or_else(|| default_db_pool_size(storage_profile)),
            ffmpeg_path: file.ffmpeg_path.unwrap_or_else(|| PathBuf::from("ffmpeg")),
            video_frame_offset_secs: file
                .video_frame_offset_secs
                .unwrap_or(DEFAULT_VIDEO_FRAME_OFFSET_SECS),
            decode_timeout_secs: file
                .decode_timeout_secs
                .unwrap_or(DEFAULT_DECODE_TIMEOUT_SECS),
            tombstone_grace_days: file
                .tombstone_grace_days
                .unwrap_or(DEFAULT_TOMBSTONE_GRACE_DAYS),
        };
        config.apply_env_overrides();
        config.clamp();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(threads) = env_parse::<usize>("LUMINAIRE_THUMB_THREADS") {
            self.worker_threads = threads;
        }
        if let Some(edge) = env_parse::<u32>("LUMINAIRE_THUMB_MAX_EDGE") {
            self.thumbnail_max_edge = edge;
        }
        if let Some(quality) = env_parse::<u8>("LUMINAIRE_THUMB_JPEG_QUALITY") {
            self.jpeg_quality = quality;
        }
        if let Some(pool_size) = env_parse::<u32>("LUMINAIRE_DB_POOL_SIZE") {
            self.db_pool_size = pool_size;
        }
        if let Some(timeout) = env_parse::<u64>("LUMINAIRE_DECODE_TIMEOUT_SECS") {
            self.decode_timeout_secs = timeout;
        }
        if let Some(ffmpeg) = std::env::var_os("LUMINAIRE_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(ffmpeg);
        }
    }

    fn clamp(&mut self) {
        self.worker_threads = self.worker_threads.clamp(1, 32);
        self.db_pool_size = self.db_pool_size.clamp(1, 32);
        self.thumbnail_max_edge = self.thumbnail_max_edge.clamp(64, 2048);
        self.jpeg_quality = self.jpeg_quality.clamp(40, 95);
        self.decode_timeout_secs = self.decode_timeout_secs.clamp(1, 600);
        if !self.video_frame_offset_secs.is_finite() || self.video_frame_offset_secs < 0.0 {
            self.video_frame_offset_secs = 0.0;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse::<T>().ok()
}

fn read_config_file(path: &Path) -> ConfigFile {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return ConfigFile::default(),
    };
    match serde_json::from_str::<ConfigFile>(&content) {
        Ok(file) => file,
        Err(error) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), error);
            ConfigFile::default()
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(xdg_data_home) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg_data_home).join(APP_DIR_NAME);
    }
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return PathBuf::from(app_data).join(APP_DIR_NAME);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR_NAME);
    }
    PathBuf::from("luminaire-data")
}

pub fn default_worker_threads(profile: StorageProfile) -> usize {
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4);
    match profile {
        StorageProfile::Hdd => cpu_count.clamp(2, HDD_FRIENDLY_THUMB_THREADS),
        StorageProfile::Ssd => cpu_count.clamp(4, SSD_FRIENDLY_THUMB_THREADS),
    }
}

fn default_db_pool_size(profile: StorageProfile) -> u32 {
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get() as u32)
        .unwrap_or(4);
    match profile {
        StorageProfile::Hdd => cpu_count.clamp(2, HDD_FRIENDLY_DB_POOL_SIZE),
        StorageProfile::Ssd => cpu_count.clamp(4, SSD_FRIENDLY_DB_POOL_SIZE),
    }
}

pub fn load_storage_profile(path: &Path) -> StorageProfile {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return StorageProfile::default(),
    };

    #[derive(Deserialize)]
    struct StorageProfileConfig {
        profile: StorageProfile,
    }

    serde_json::from_str::<StorageProfileConfig>(&content)
        .map(|config| config.profile)
        .unwrap_or_default()
}

pub fn persist_storage_profile(path: &Path, profile: StorageProfile) -> Result<(), String> {
    #[derive(Serialize)]
    struct StorageProfileConfig {
        profile: StorageProfile,
    }

    let payload = serde_json::to_string_pretty(&StorageProfileConfig { profile })
        .map_err(|error| format!("Failed to serialize storage profile: {}", error))?;

    std::fs::write(path, payload).map_err(|error| {
        format!(
            "Failed to save storage profile to {}: {}",
            path.display(),
            error
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_files_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(dir.path());
        assert_eq!(config.storage_profile, StorageProfile::Hdd);
        assert_eq!(config.db_path, dir.path().join(DB_FILE));
        assert_eq!(config.cache_dir, dir.path().join(THUMBNAIL_DIR));
        assert!(config.worker_threads >= 1);
    }

    #[test]
    fn test_config_file_values_are_clamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"thumbnail_max_edge": 10, "jpeg_quality": 100, "video_frame_offset_secs": -3, "decode_timeout_secs": 0}"#,
        )
        .expect("write config");
        let config = Config::load_from(dir.path());
        assert_eq!(config.thumbnail_max_edge, 64);
        assert_eq!(config.jpeg_quality, 95);
        assert_eq!(config.video_frame_offset_secs, 0.0);
        assert_eq!(config.decode_timeout_secs, 1);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").expect("write config");
        let config = Config::load_from(dir.path());
        assert_eq!(config.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_storage_profile_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(STORAGE_PROFILE_FILE);
        persist_storage_profile(&path, StorageProfile::Ssd).expect("persist");
        assert_eq!(load_storage_profile(&path), StorageProfile::Ssd);
    }
}
