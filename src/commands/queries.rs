// ────────────────────────── Media queries ──────────────────────────

/// Every live record in insertion order.
pub async fn get_media(state: &AppState) -> Result<Vec<MediaRecord>, String> {
    let query = state.query.clone();
    run_blocking(move || query.get_media().map_err(|e| e.to_string())).await
}

pub async fn search_media(query_text: String, state: &AppState) -> Result<Vec<MediaRecord>, String> {
    let query = state.query.clone();
    run_blocking(move || {
        let started = std::time::Instant::now();
        let result = query.search_media(&query_text);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(records) => log::info!(
                "Query search_media({:?}) returned {} records in {:.1} ms",
                query_text,
                records.len(),
                elapsed_ms
            ),
            Err(error) => log::warn!(
                "Query search_media failed in {:.1} ms: {}",
                elapsed_ms,
                error
            ),
        }
        result.map_err(|e| e.to_string())
    })
    .await
}

/// Filtered, sorted listing. `sort_by` accepts `name`, `name_desc`,
/// `size` or `modified`; anything else keeps insertion order.
pub async fn list_media(
    filter: ListFilter,
    sort_by: Option<String>,
    state: &AppState,
) -> Result<Vec<MediaRecord>, String> {
    let query = state.query.clone();
    run_blocking(move || {
        let sort = sort_by
            .as_deref()
            .map(SortKey::parse)
            .unwrap_or_default();
        query.list(&filter, sort).map_err(|e| e.to_string())
    })
    .await
}

pub async fn get_media_detail(id: String, state: &AppState) -> Result<MediaRecord, String> {
    let query = state.query.clone();
    run_blocking(move || match query.get_by_id(&id) {
        Ok(Some(record)) => Ok(record),
        Ok(None) => Err(crate::CatalogError::NotFound(id).to_string()),
        Err(error) => Err(error.to_string()),
    })
    .await
}

pub async fn set_favorite(id: String, favorite: bool, state: &AppState) -> Result<(), String> {
    let db = state.db.clone();
    run_blocking(move || db.set_favorite(&id, favorite).map_err(|e| e.to_string())).await
}
