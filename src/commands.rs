//! Boundary operations consumed by the presentation layer.
//!
//! Each command is async, moves blocking catalog and filesystem work onto
//! the blocking thread pool, and flattens errors into one-line strings.

use crate::{
    database::{ListFilter, MediaRecord, SortKey},
    image_processing::{self, CachePruneReport},
    scanner::ScanReport,
    thumbnails::{GenerateMode, GenerationReport},
    AppState, StorageProfile,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub swept_thumbnails: usize,
    pub cache: CachePruneReport,
}

async fn run_blocking<T, F>(job: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|error| error.to_string())?
}

pub fn get_storage_profile(state: &AppState) -> Result<StorageProfile, String> {
    state
        .storage_profile
        .read()
        .map(|profile| *profile)
        .map_err(|_| "Failed to read storage profile".to_string())
}

/// Persists the profile. Pool sizes pick it up on the next start.
pub fn set_storage_profile(profile: StorageProfile, state: &AppState) -> Result<(), String> {
    {
        let mut lock = state
            .storage_profile
            .write()
            .map_err(|_| "Failed to update storage profile".to_string())?;
        *lock = profile;
    }

    crate::config::persist_storage_profile(&state.config.storage_profile_path, profile)?;
    log::info!("Storage profile set to {}", profile.label());
    Ok(())
}

include!("commands/scan.rs");

include!("commands/queries.rs");

include!("commands/thumbnails.rs");

include!("commands/maintenance.rs");
