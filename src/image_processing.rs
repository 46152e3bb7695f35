use crate::error::GenerationError;
use crate::media_id::is_valid_id;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Thumbnails are always JPEG; the cache name is `<id>.jpg`.
const THUMB_EXTENSION: &str = "jpg";
const THUMB_FILTER: FilterType = FilterType::Lanczos3;
const TEMP_MARKER: &str = ".tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CachePruneReport {
    pub removed_orphans: usize,
    pub removed_partials: usize,
    pub kept: usize,
}

pub fn prepare_cache_dir(cache_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(cache_dir)
}

/// Deterministic cache location for a media id.
pub fn thumbnail_path_for(cache_dir: &Path, id: &str) -> PathBuf {
    cache_dir.join(format!("{}.{}", id, THUMB_EXTENSION))
}

/// Shrinks `image` so its longest edge is at most `max_edge`.
///
/// Aspect ratio is preserved and images already within bounds are returned
/// untouched, so nothing is ever upscaled.
pub fn downscale(image: DynamicImage, max_edge: u32) -> DynamicImage {
    let max_edge = max_edge.max(1);
    if image.width() <= max_edge && image.height() <= max_edge {
        return image;
    }
    image.resize(max_edge, max_edge, THUMB_FILTER)
}

/// Encodes `image` as JPEG at `target` without ever exposing a partial file.
///
/// The bytes go to a sibling temp file first, which is then renamed over
/// the target. Readers see either the previous file or the complete new one.
pub fn write_jpeg_atomic(
    image: &DynamicImage,
    target: &Path,
    quality: u8,
) -> Result<(), GenerationError> {
    let temp_path = temp_path_for(target);
    if let Err(error) = encode_jpeg(image, &temp_path, quality) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(error);
    }
    if let Err(error) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(GenerationError::Write(format!(
            "failed to move thumbnail into place at {}: {}",
            target.display(),
            error
        )));
    }
    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("thumbnail.{}", THUMB_EXTENSION));
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(
        "{}{}{}-{}",
        file_name,
        TEMP_MARKER,
        std::process::id(),
        counter
    ))
}

fn encode_jpeg(image: &DynamicImage, out_path: &Path, quality: u8) -> Result<(), GenerationError> {
    let write_error = |error: &dyn std::fmt::Display| {
        GenerationError::Write(format!("{}: {}", out_path.display(), error))
    };

    let rgb = image.to_rgb8();
    let file = File::create(out_path).map_err(|e| write_error(&e))?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| write_error(&e))?;
    }
    // The renamed file must never be empty after a crash.
    let file = writer.into_inner().map_err(|e| write_error(e.error()))?;
    file.sync_all().map_err(|e| write_error(&e))?;
    Ok(())
}

/// Removes a thumbnail file, ignoring files that are already gone.
pub fn remove_thumbnail_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed thumbnail {}", path.display()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => log::warn!("Failed to remove thumbnail {}: {}", path.display(), error),
    }
}

/// Deletes cache files that no catalog id owns, plus leftover temp files.
///
/// Must not run while thumbnail jobs are writing into the same directory.
/// Files that do not look like cache entries are left alone.
pub fn prune_cache_dir(
    cache_dir: &Path,
    known_ids: &HashSet<String>,
) -> std::io::Result<CachePruneReport> {
    let mut report = CachePruneReport::default();
    let entries = match std::fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(error) => return Err(error),
    };

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();

        if name.contains(TEMP_MARKER) {
            remove_thumbnail_file(&entry.path());
            report.removed_partials += 1;
            continue;
        }

        let Some(id) = name.strip_suffix(&format!(".{}", THUMB_EXTENSION)) else {
            continue;
        };
        if !is_valid_id(id) {
            continue;
        }
        if known_ids.contains(id) {
            report.kept += 1;
        } else {
            remove_thumbnail_file(&entry.path());
            report.removed_orphans += 1;
        }
    }

    log::info!(
        "Pruned thumbnail cache {}: {} orphans, {} partial files removed, {} kept",
        cache_dir.display(),
        report.removed_orphans,
        report.removed_partials,
        report.kept
    );
    Ok(report)
}
