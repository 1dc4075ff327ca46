//! Application configuration

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound for the default worker count
const DEFAULT_WORKER_CAP: usize = 4;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub workers: WorkerConfig,
    pub library: LibraryConfig,
}

/// Thumbnail cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root override; `None` uses the platform data directory
    pub root: Option<PathBuf>,
    /// Longest edge of a generated thumbnail, in pixels
    pub thumbnail_size: u32,
    /// JPEG quality for opaque thumbnails (1-100)
    pub jpeg_quality: u8,
    /// Reclaim orphaned thumbnails in the background at startup
    pub cleanup_on_startup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            thumbnail_size: 256,
            jpeg_quality: 85,
            cleanup_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Generation threads; `None` or 0 picks `min(available cores, 4)`
    pub max_workers: Option<usize>,
}

impl WorkerConfig {
    /// Effective pool size (always at least 1)
    pub fn resolved(&self) -> usize {
        match self.max_workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(DEFAULT_WORKER_CAP),
        }
    }
}

/// Library roots tracked by the browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub roots: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, falling back to defaults if it is absent
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            tracing::info!("Configuration loaded from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("Using default configuration");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        tracing::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Effective cache root
    pub fn cache_root(&self) -> PathBuf {
        self.cache.root.clone().unwrap_or_else(default_cache_root)
    }

    fn validate(&self) -> Result<(), crate::AppError> {
        if self.cache.thumbnail_size == 0 {
            return Err(crate::AppError::Config("cache.thumbnail_size must be > 0".into()));
        }
        if !(1..=100).contains(&self.cache.jpeg_quality) {
            return Err(crate::AppError::Config(format!(
                "cache.jpeg_quality must be within 1..=100, got {}",
                self.cache.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// `<local data dir>/thumbnails`
pub fn default_cache_root() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_local_dir().join("thumbnails"))
        .unwrap_or_else(|| PathBuf::from("./thumbnails"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "MediaViewer", "MediaViewer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.cache.thumbnail_size, 256);
        assert_eq!(config.cache.jpeg_quality, 85);
        assert!(config.library.roots.is_empty());
        assert!(config.cache_root().ends_with("thumbnails"));
    }

    #[test]
    fn test_worker_count() {
        let auto = WorkerConfig::default().resolved();
        assert!((1..=DEFAULT_WORKER_CAP).contains(&auto));
        assert_eq!(WorkerConfig { max_workers: Some(7) }.resolved(), 7);
        assert_eq!(WorkerConfig { max_workers: Some(0) }.resolved(), auto);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[library]\nroots = [\"/photos\"]\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.library.roots, vec!["/photos".to_string()]);
        assert_eq!(config.cache.thumbnail_size, 256);
    }

    #[test]
    fn test_save_and_reload() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.cache.root = Some(temp.path().join("thumbs"));
        config.workers.max_workers = Some(2);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.cache.root, config.cache.root);
        assert_eq!(loaded.workers.max_workers, Some(2));
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache]\njpeg_quality = 0\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.thumbnail_size, 256);
    }
}
