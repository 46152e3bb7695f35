// ────────────────────────── Thumbnails ──────────────────────────

/// Generates thumbnails for `ids`, waiting on any job already in flight.
///
/// Per-id failures are listed in the report; callers re-query the catalog
/// afterwards to observe the new `thumbnail_path` values.
pub async fn generate_thumbnails(
    ids: Vec<String>,
    state: &AppState,
) -> Result<GenerationReport, String> {
    generate_thumbnails_with_mode(ids, GenerateMode::Wait, state).await
}

pub async fn generate_thumbnails_with_mode(
    ids: Vec<String>,
    mode: GenerateMode,
    state: &AppState,
) -> Result<GenerationReport, String> {
    let engine = state.thumbnails.clone();
    run_blocking(move || Ok(engine.generate(&ids, mode))).await
}

/// Generates thumbnails for every live record that has none yet.
pub async fn generate_missing_thumbnails(state: &AppState) -> Result<GenerationReport, String> {
    let query = state.query.clone();
    let engine = state.thumbnails.clone();
    run_blocking(move || {
        let pending: Vec<String> = query
            .get_media()
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter(|record| record.thumbnail_path.is_none())
            .map(|record| record.id)
            .collect();
        log::info!("Generating {} missing thumbnails", pending.len());
        Ok(engine.generate(&pending, GenerateMode::Wait))
    })
    .await
}
