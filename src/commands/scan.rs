// ────────────────────────── Scan ──────────────────────────

/// Walks `directory` and reconciles the catalog under it.
///
/// Per-file problems are returned inside the report; only an unusable root,
/// an overlapping scan or a catalog failure rejects the call.
pub async fn scan_dir(directory: String, state: &AppState) -> Result<ScanReport, String> {
    let scanner = state.scanner.clone();
    run_blocking(move || {
        let root = PathBuf::from(&directory);
        scanner.scan(&root).map_err(|error| {
            log::error!("Scan of {} failed: {}", directory, error);
            error.to_string()
        })
    })
    .await
}
