use super::*;

/// Optional narrowing applied by [`Database::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFilter {
    pub kind: Option<MediaKind>,
    /// Case-insensitive substring of the filename.
    pub search: Option<String>,
    pub favorites_only: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Inserted,
    Filename,
    FilenameDesc,
    Size,
    /// Newest file modification time first; unknown times last.
    Modified,
}

impl SortKey {
    pub fn parse(sort_by: &str) -> Self {
        match sort_by.trim().to_ascii_lowercase().as_str() {
            "name" | "filename" | "name_asc" => SortKey::Filename,
            "name_desc" | "filename_desc" => SortKey::FilenameDesc,
            "size" => SortKey::Size,
            "modified" | "date" | "newest" => SortKey::Modified,
            _ => SortKey::Inserted,
        }
    }

    fn order_clause(self) -> &'static str {
        match self {
            SortKey::Inserted => "seq ASC",
            SortKey::Filename => "filename COLLATE NOCASE ASC, seq ASC",
            SortKey::FilenameDesc => "filename COLLATE NOCASE DESC, seq ASC",
            SortKey::Size => "size DESC, seq ASC",
            SortKey::Modified => "file_mtime IS NULL, file_mtime DESC, seq ASC",
        }
    }
}

impl Database {
    // ────────────────────────── Listing ──────────────────────────

    /// Lists live records matching `filter`, ordered by `sort`.
    pub fn list(&self, filter: &ListFilter, sort: SortKey) -> CatalogResult<Vec<MediaRecord>> {
        let conn = self.pool.get()?;
        let mut clauses = vec!["removed_at IS NULL".to_string()];
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = filter.kind {
            values.push(Value::Text(kind.as_str().to_string()));
            clauses.push(format!("kind = ?{}", values.len()));
        }

        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            values.push(Value::Text(format!("%{}%", escape_like(search))));
            clauses.push(format!(
                "filename LIKE ?{} ESCAPE '\\'",
                values.len()
            ));
        }

        if filter.favorites_only {
            clauses.push("favorite = 1".to_string());
        }

        let sql = format!(
            "SELECT id, path, filename, kind, size, thumbnail_path
             FROM media
             WHERE {}
             ORDER BY {}",
            clauses.join(" AND "),
            sort.order_clause()
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), media_record_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

/// Escapes LIKE wildcards so user input matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
