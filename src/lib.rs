pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod image_decode;
pub mod image_processing;
pub mod media_id;
pub mod query;
pub mod scanner;
pub mod thumbnails;

pub use config::{Config, StorageProfile};
pub use database::{Database, MediaKind, MediaRecord};
pub use error::{CatalogError, GenerationError, ScanError, StartupError};

use image_decode::{DefaultDecoder, MediaDecoder};
use query::QueryService;
use scanner::Scanner;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thumbnails::{EngineOptions, ThumbnailEngine};

/// Owned handles shared by every boundary command.
///
/// Cloning hands out the same catalog, scanner and engine.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub scanner: Scanner,
    pub thumbnails: Arc<ThumbnailEngine>,
    pub query: QueryService,
    pub storage_profile: Arc<RwLock<StorageProfile>>,
}

impl AppState {
    /// Opens the catalog and thumbnail cache described by `config`.
    pub fn open(config: Config) -> Result<Self, StartupError> {
        let decoder = Arc::new(
            DefaultDecoder::new(config.ffmpeg_path.clone(), config.video_frame_offset_secs)
                .with_timeout(Duration::from_secs(config.decode_timeout_secs)),
        );
        Self::open_with_decoder(config, decoder)
    }

    /// Like [`AppState::open`] with a caller-supplied media decoder.
    pub fn open_with_decoder(
        config: Config,
        decoder: Arc<dyn MediaDecoder>,
    ) -> Result<Self, StartupError> {
        image_decode::ensure_jxl_decoder_registered();
        std::fs::create_dir_all(&config.data_dir)?;

        let db = Database::open(&config.db_path, config.db_pool_size)?;
        let thumbnails = Arc::new(ThumbnailEngine::new(
            db.clone(),
            decoder,
            EngineOptions::from_config(&config),
        )?);
        log::info!(
            "Opened catalog {} ({} records, profile={})",
            config.db_path.display(),
            db.count()?,
            config.storage_profile.label()
        );

        Ok(AppState {
            scanner: Scanner::new(db.clone()),
            query: QueryService::new(db.clone()),
            storage_profile: Arc::new(RwLock::new(config.storage_profile)),
            config: Arc::new(config),
            thumbnails,
            db,
        })
    }

    pub fn storage_profile(&self) -> StorageProfile {
        self.storage_profile
            .read()
            .map(|profile| *profile)
            .unwrap_or_default()
    }

    /// Flushes the catalog so the next start sees every committed write.
    pub fn shutdown(self) -> Result<(), CatalogError> {
        self.db.checkpoint()?;
        log::info!("Catalog checkpointed; shutting down");
        Ok(())
    }
}

/// Installs the process logger. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Sizes the global rayon pool used outside the thumbnail engine.
pub fn configure_global_thread_pool() {
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(8);
    let rayon_threads = cpu_count.saturating_sub(1).max(2);
    if rayon::ThreadPoolBuilder::new()
        .num_threads(rayon_threads)
        .build_global()
        .is_ok()
    {
        log::info!(
            "Configured rayon global thread pool with {} workers ({} CPUs detected)",
            rayon_threads,
            cpu_count
        );
    }
}
