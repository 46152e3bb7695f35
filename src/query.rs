use crate::database::{CatalogResult, Database, ListFilter, MediaRecord, SortKey};

/// Read-only view over the catalog used by the presentation layer.
///
/// Every call reads a consistent snapshot; callers poll again after a
/// mutation rather than subscribing to changes.
#[derive(Clone)]
pub struct QueryService {
    db: Database,
}

impl QueryService {
    pub fn new(db: Database) -> Self {
        QueryService { db }
    }

    /// All live records in insertion order.
    pub fn get_media(&self) -> CatalogResult<Vec<MediaRecord>> {
        self.list(&ListFilter::default(), SortKey::Inserted)
    }

    /// Records whose filename contains `query`, ignoring ASCII case.
    /// A blank query matches everything.
    pub fn search_media(&self, query: &str) -> CatalogResult<Vec<MediaRecord>> {
        self.list(
            &ListFilter {
                search: Some(query.to_string()),
                ..Default::default()
            },
            SortKey::Inserted,
        )
    }

    pub fn list(&self, filter: &ListFilter, sort: SortKey) -> CatalogResult<Vec<MediaRecord>> {
        let started = std::time::Instant::now();
        let result = self.db.list(filter, sort);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(records) => log::debug!(
                "Query list returned {} records in {:.1} ms (sort={:?})",
                records.len(),
                elapsed_ms,
                sort
            ),
            Err(error) => log::warn!("Query list failed in {:.1} ms: {}", elapsed_ms, error),
        }
        result
    }

    pub fn get_by_id(&self, id: &str) -> CatalogResult<Option<MediaRecord>> {
        self.db.get_by_id(id)
    }

    pub fn count(&self) -> CatalogResult<u64> {
        self.db.count()
    }
}
