// ────────────────────────── Maintenance ──────────────────────────

/// Hard-deletes tombstones older than `older_than_days` (default from
/// config), unlinks their thumbnails and prunes orphaned cache files.
pub async fn sweep_tombstones(
    older_than_days: Option<u32>,
    state: &AppState,
) -> Result<SweepReport, String> {
    let db = state.db.clone();
    let engine = state.thumbnails.clone();
    let days = older_than_days.unwrap_or(state.config.tombstone_grace_days);
    run_blocking(move || {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(days.min(36_500)));
        let thumbnails = db.sweep_tombstones(cutoff).map_err(|e| e.to_string())?;
        for thumbnail in &thumbnails {
            image_processing::remove_thumbnail_file(std::path::Path::new(thumbnail));
        }
        let cache = engine.prune_orphans().map_err(|e| e.to_string())?;
        Ok(SweepReport {
            swept_thumbnails: thumbnails.len(),
            cache,
        })
    })
    .await
}
