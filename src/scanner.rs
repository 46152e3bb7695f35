use crate::database::{Database, MediaKind, MediaRecord, StoredEntry, UpsertRecord};
use crate::error::{FileIssue, ScanError};
use crate::media_id::id_for;
use byteorder::{BigEndian, ReadBytesExt};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

/// Rows per reconciliation transaction.
const BULK_CHUNK_SIZE: usize = 1_000;
const SNIFF_BYTES: usize = 16;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "jxl", "avif", "heic", "heif",
    "ico", "tga",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "mkv", "webm", "avi", "wmv", "flv", "mpg", "mpeg", "3gp", "ts",
];
/// ISO-BMFF brands that carry still images rather than video.
const STILL_IMAGE_BRANDS: &[&[u8; 4]] = &[b"avif", b"avis", b"heic", b"heix", b"mif1", b"msf1"];

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    pub file_mtime: Option<i64>,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<ScannedFile>,
    pub errors: Vec<FileIssue>,
    /// Entries that could not be read; records under them are kept.
    pub unreadable: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub root: String,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: usize,
    pub errors: Vec<FileIssue>,
    pub elapsed_ms: u64,
}

impl ScanReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Classifies a file by extension, falling back to magic bytes when the
/// name carries no extension. `Ok(None)` means unsupported.
pub fn classify(path: &Path) -> std::io::Result<Option<MediaKind>> {
    match path.extension() {
        Some(ext) => Ok(classify_extension(&ext.to_string_lossy())),
        None => sniff_kind(path),
    }
}

pub fn classify_extension(ext: &str) -> Option<MediaKind> {
    let ext_lower = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext_lower.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Reads the first bytes of a file and matches well-known signatures.
pub fn sniff_kind(path: &Path) -> std::io::Result<Option<MediaKind>> {
    let mut file = File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_BYTES);
    file.by_ref()
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut header)?;
    Ok(kind_from_signature(&header))
}

fn kind_from_signature(header: &[u8]) -> Option<MediaKind> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF])
        || header.starts_with(&[0x89, b'P', b'N', b'G'])
        || header.starts_with(b"GIF8")
        || header.starts_with(b"BM")
        || header.starts_with(b"II*\0")
        || header.starts_with(b"MM\0*")
        || header.starts_with(&[0xFF, 0x0A])
        || header.starts_with(&[0, 0, 0, 0x0C, b'J', b'X', b'L', b' '])
    {
        return Some(MediaKind::Image);
    }
    if header.len() >= 12 && header.starts_with(b"RIFF") {
        return match &header[8..12] {
            b"WEBP" => Some(MediaKind::Image),
            b"AVI " => Some(MediaKind::Video),
            _ => None,
        };
    }
    if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(MediaKind::Video);
    }
    iso_bmff_kind(header)
}

fn iso_bmff_kind(header: &[u8]) -> Option<MediaKind> {
    if header.len() < 12 || &header[4..8] != b"ftyp" {
        return None;
    }
    let box_size = Cursor::new(&header[..4]).read_u32::<BigEndian>().ok()?;
    if box_size < 12 {
        return None;
    }
    let brand = &header[8..12];
    if STILL_IMAGE_BRANDS.iter().any(|still| brand == still.as_slice()) {
        Some(MediaKind::Image)
    } else {
        Some(MediaKind::Video)
    }
}

/// Recursively enumerates supported media under `root`.
///
/// Symlinks are followed and cycles are skipped. A file reachable both
/// directly and through a link is listed once, under its direct path when
/// it has one. `root` is expected to be canonical. Unreadable entries and
/// names that are not valid UTF-8 are reported and the walk continues.
pub fn walk_root(root: &Path) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();
    let mut linked_files: Vec<ScannedFile> = Vec::new();
    let mut linked_dirs: Vec<PathBuf> = Vec::new();

    let mut entries = walkdir::WalkDir::new(root)
        .follow_links(true)
        .max_open(32)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                if error.loop_ancestor().is_some() {
                    log::debug!("Skipping symlink cycle at {:?}", error.path());
                    continue;
                }
                let path = error
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                if is_dangling_link(&path) {
                    log::debug!("Skipping dangling symlink {}", path.display());
                    continue;
                }
                record_unreadable(&mut outcome, path, error.to_string());
                continue;
            }
        };

        let path = entry.path();
        if path.to_str().is_none() {
            record_unreadable(
                &mut outcome,
                path.to_path_buf(),
                "path is not valid UTF-8".to_string(),
            );
            if entry.file_type().is_dir() {
                entries.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_dir() {
            if entry.path_is_symlink() {
                linked_dirs.push(path.to_path_buf());
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let kind = match classify(path) {
            Ok(Some(kind)) => kind,
            Ok(None) => continue,
            Err(error) => {
                record_unreadable(&mut outcome, path.to_path_buf(), error.to_string());
                continue;
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                record_unreadable(&mut outcome, path.to_path_buf(), error.to_string());
                continue;
            }
        };
        let file_mtime = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs() as i64);

        let scanned = ScannedFile {
            path: path.to_path_buf(),
            kind,
            size: metadata.len(),
            file_mtime,
        };
        if entry.path_is_symlink() || linked_dirs.iter().any(|dir| path.starts_with(dir)) {
            linked_files.push(scanned);
        } else {
            outcome.files.push(scanned);
        }
    }

    merge_linked_files(&mut outcome, linked_files);
    outcome
}

/// Appends files reached through links, one per canonical target.
///
/// Direct entries under a canonical root already are canonical paths.
fn merge_linked_files(outcome: &mut WalkOutcome, linked_files: Vec<ScannedFile>) {
    if linked_files.is_empty() {
        return;
    }
    let mut seen: HashSet<PathBuf> = outcome.files.iter().map(|f| f.path.clone()).collect();
    for scanned in linked_files {
        match std::fs::canonicalize(&scanned.path) {
            Ok(canonical) if seen.insert(canonical.clone()) => outcome.files.push(scanned),
            Ok(canonical) => log::debug!(
                "Skipping {}: already cataloged as {}",
                scanned.path.display(),
                canonical.display()
            ),
            Err(error) => record_unreadable(outcome, scanned.path, error.to_string()),
        }
    }
}

fn is_dangling_link(path: &Path) -> bool {
    let is_link = std::fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    is_link && std::fs::metadata(path).is_err()
}

fn record_unreadable(outcome: &mut WalkOutcome, path: PathBuf, reason: String) {
    log::warn!("Unreadable entry {}: {}", path.display(), reason);
    outcome.errors.push(FileIssue::FileUnreadable {
        path: path.to_string_lossy().to_string(),
        reason,
    });
    outcome.unreadable.push(path);
}

/// Walks roots and reconciles them against the catalog.
#[derive(Clone)]
pub struct Scanner {
    db: Database,
    active_roots: Arc<Mutex<Vec<PathBuf>>>,
}

/// Releases a root claimed by [`Scanner::claim_root`].
struct RootGuard {
    root: PathBuf,
    active_roots: Arc<Mutex<Vec<PathBuf>>>,
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        let mut roots = self
            .active_roots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        roots.retain(|root| root != &self.root);
    }
}

impl Scanner {
    pub fn new(db: Database) -> Self {
        Scanner {
            db,
            active_roots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn claim_root(&self, root: &Path) -> Result<RootGuard, ScanError> {
        let mut roots = self
            .active_roots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if roots
            .iter()
            .any(|active| active.starts_with(root) || root.starts_with(active))
        {
            return Err(ScanError::ScanInProgress(root.to_path_buf()));
        }
        roots.push(root.to_path_buf());
        Ok(RootGuard {
            root: root.to_path_buf(),
            active_roots: self.active_roots.clone(),
        })
    }

    /// Scans `root` and reconciles only the records under it.
    ///
    /// New files are added with no thumbnail, files whose size changed are
    /// updated with their thumbnail cleared, and records whose file is gone
    /// are tombstoned. Rescanning an unchanged tree writes nothing.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        let started = std::time::Instant::now();
        let root = resolve_root(root)?;
        let _guard = self.claim_root(&root)?;

        let walk_timer = std::time::Instant::now();
        let walk = walk_root(&root);
        let walk_elapsed = walk_timer.elapsed();

        let existing: HashMap<String, StoredEntry> = self
            .db
            .records_under_root(&root)?
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();

        let mut report = ScanReport {
            root: root.to_string_lossy().to_string(),
            errors: walk.errors,
            ..Default::default()
        };
        let mut pending: Vec<UpsertRecord> = Vec::new();
        let mut observed: HashSet<String> = HashSet::with_capacity(walk.files.len());

        let mut files = walk.files;
        files.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        let ids: Vec<String> = files
            .par_iter()
            .map(|scanned| id_for(&scanned.path))
            .collect();

        for (scanned, id) in files.into_iter().zip(ids) {
            if !observed.insert(id.clone()) {
                continue;
            }

            let thumbnail_path = match existing.get(&id) {
                Some(stored) if !stored.removed && stored.size == scanned.size => {
                    report.unchanged += 1;
                    continue;
                }
                Some(stored) if !stored.removed => {
                    log::debug!(
                        "Size changed for {} ({} -> {}); invalidating thumbnail",
                        stored.path,
                        stored.size,
                        scanned.size
                    );
                    report.updated.push(id.clone());
                    None
                }
                Some(stored) => {
                    report.added.push(id.clone());
                    stored
                        .thumbnail_path
                        .clone()
                        .filter(|_| stored.size == scanned.size)
                }
                None => {
                    report.added.push(id.clone());
                    None
                }
            };

            pending.push(UpsertRecord {
                record: MediaRecord {
                    id,
                    filename: scanned
                        .path
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string(),
                    path: scanned.path.to_string_lossy().to_string(),
                    kind: scanned.kind,
                    size: scanned.size,
                    thumbnail_path,
                },
                file_mtime: scanned.file_mtime,
            });
        }

        for chunk in pending.chunks(BULK_CHUNK_SIZE) {
            self.db.bulk_upsert(chunk)?;
        }

        let mut vanished: Vec<String> = existing
            .values()
            .filter(|stored| !stored.removed && !observed.contains(&stored.id))
            .filter(|stored| {
                let stored_path = Path::new(&stored.path);
                !walk
                    .unreadable
                    .iter()
                    .any(|unreadable| stored_path.starts_with(unreadable))
            })
            .map(|stored| stored.id.clone())
            .collect();
        vanished.sort_unstable();
        for chunk in vanished.chunks(BULK_CHUNK_SIZE) {
            self.db.tombstone_many(chunk)?;
        }
        report.removed = vanished;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        log::info!(
            "Scan complete for {}: {} added, {} updated, {} removed, {} unchanged, {} errors (walk={:.1}ms, total={}ms)",
            report.root,
            report.added.len(),
            report.updated.len(),
            report.removed.len(),
            report.unchanged,
            report.errors.len(),
            walk_elapsed.as_secs_f64() * 1000.0,
            report.elapsed_ms
        );
        Ok(report)
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let unavailable = |reason: String| ScanError::RootUnavailable {
        path: root.to_path_buf(),
        reason,
    };
    let canonical = std::fs::canonicalize(root).map_err(|error| unavailable(error.to_string()))?;
    if !canonical.is_dir() {
        return Err(unavailable("not a directory".to_string()));
    }
    std::fs::read_dir(&canonical).map_err(|error| unavailable(error.to_string()))?;
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::open_temp_db;
    use std::fs;

    fn write_file(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(path, bytes).expect("failed to write fixture");
    }

    #[test]
    fn test_classify_by_extension_is_case_insensitive() {
        assert_eq!(classify_extension("JPG"), Some(MediaKind::Image));
        assert_eq!(classify_extension("Mp4"), Some(MediaKind::Video));
        assert_eq!(classify_extension("txt"), None);
    }

    #[test]
    fn test_signature_sniffing() {
        assert_eq!(
            kind_from_signature(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(MediaKind::Image)
        );
        assert_eq!(
            kind_from_signature(b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00"),
            Some(MediaKind::Video)
        );
        assert_eq!(
            kind_from_signature(b"\x00\x00\x00\x1cftypavif\x00\x00\x00\x00"),
            Some(MediaKind::Image)
        );
        assert_eq!(
            kind_from_signature(b"RIFF\x10\x00\x00\x00WEBPVP8 "),
            Some(MediaKind::Image)
        );
        assert_eq!(kind_from_signature(b"hello world"), None);
        assert_eq!(kind_from_signature(&[]), None);
    }

    #[test]
    fn test_extensionless_file_is_sniffed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("IMG0001");
        write_file(&path, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(classify(&path).expect("classify"), Some(MediaKind::Image));
    }

    #[test]
    fn test_scan_adds_supported_files_and_skips_others() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        write_file(&root.path().join("a.jpg"), b"not really a jpeg");
        write_file(&root.path().join("nested/b.mp4"), b"video bytes");
        write_file(&root.path().join("c.txt"), b"notes");
        write_file(&root.path().join("d.png"), b"");

        let scanner = Scanner::new(db.clone());
        let report = scanner.scan(root.path()).expect("scan");
        assert_eq!(report.added.len(), 3);
        assert!(report.errors.is_empty());

        let all = db.get_all().expect("get_all");
        let mut names: Vec<&str> = all.iter().map(|r| r.filename.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.jpg", "b.mp4", "d.png"]);
        assert!(all.iter().all(|r| r.thumbnail_path.is_none()));
    }

    #[test]
    fn test_rescan_of_unchanged_root_is_noop() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        write_file(&root.path().join("a.jpg"), b"abc");
        write_file(&root.path().join("sub/b.webm"), b"abcd");

        let scanner = Scanner::new(db);
        scanner.scan(root.path()).expect("first scan");
        let second = scanner.scan(root.path()).expect("second scan");
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn test_rescan_tombstones_deleted_files_only_under_root() {
        let (_db_dir, db) = open_temp_db();
        let first_root = tempfile::tempdir().expect("tempdir");
        let other_root = tempfile::tempdir().expect("tempdir");
        write_file(&first_root.path().join("a.jpg"), b"abc");
        write_file(&first_root.path().join("b.jpg"), b"abc");
        write_file(&other_root.path().join("c.jpg"), b"abc");

        let scanner = Scanner::new(db.clone());
        scanner.scan(first_root.path()).expect("scan first");
        scanner.scan(other_root.path()).expect("scan other");

        fs::remove_file(first_root.path().join("b.jpg")).expect("remove");
        let report = scanner.scan(first_root.path()).expect("rescan");
        assert_eq!(report.removed.len(), 1);

        let mut names: Vec<String> = db
            .get_all()
            .expect("get_all")
            .into_iter()
            .map(|r| r.filename)
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.jpg".to_string(), "c.jpg".to_string()]);
    }

    #[test]
    fn test_size_change_invalidates_thumbnail() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        let file = root.path().join("a.jpg");
        write_file(&file, b"abc");

        let scanner = Scanner::new(db.clone());
        let first = scanner.scan(root.path()).expect("scan");
        let id = first.added[0].clone();
        db.set_thumbnail(&id, "/cache/a.jpg", 3).expect("thumbnail");

        write_file(&file, b"abcdef");
        let second = scanner.scan(root.path()).expect("rescan");
        assert_eq!(second.updated, vec![id.clone()]);

        let stored = db.get_by_id(&id).expect("get").expect("present");
        assert_eq!(stored.size, 6);
        assert!(stored.thumbnail_path.is_none());
    }

    #[test]
    fn test_missing_root_fails_with_root_unavailable() {
        let (_db_dir, db) = open_temp_db();
        let scanner = Scanner::new(db);
        let result = scanner.scan(Path::new("/definitely/not/here/luminaire"));
        assert!(matches!(result, Err(ScanError::RootUnavailable { .. })));
    }

    #[test]
    fn test_overlapping_scan_is_rejected() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        let scanner = Scanner::new(db);
        let canonical = fs::canonicalize(root.path()).expect("canonicalize");
        let _guard = scanner.claim_root(&canonical).expect("claim");
        let nested = root.path().join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        assert!(matches!(
            scanner.scan(&nested),
            Err(ScanError::ScanInProgress(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_does_not_hang_or_error() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        write_file(&root.path().join("a.jpg"), b"abc");
        write_file(&root.path().join("sub/b.jpg"), b"abc");
        std::os::unix::fs::symlink(root.path(), root.path().join("sub/loop")).expect("symlink");

        let report = Scanner::new(db).scan(root.path()).expect("scan");
        assert_eq!(report.added.len(), 2);
        assert!(report.errors.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_and_directory_are_cataloged_once() {
        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        let elsewhere = tempfile::tempdir().expect("tempdir");
        write_file(&root.path().join("real/a.jpg"), b"abc");
        write_file(&elsewhere.path().join("b.jpg"), b"abcd");
        write_file(&elsewhere.path().join("album/c.png"), b"abcde");
        std::os::unix::fs::symlink(elsewhere.path().join("b.jpg"), root.path().join("link.jpg"))
            .expect("file symlink");
        std::os::unix::fs::symlink(elsewhere.path().join("album"), root.path().join("album"))
            .expect("dir symlink");
        // Sorts before `real`, so it is walked first.
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias"))
            .expect("alias symlink");
        std::os::unix::fs::symlink(root.path().join("gone.jpg"), root.path().join("dangling.jpg"))
            .expect("dangling symlink");

        let report = Scanner::new(db.clone()).scan(root.path()).expect("scan");
        assert_eq!(report.added.len(), 3);
        assert!(report.errors.is_empty());

        let all = db.get_all().expect("get_all");
        let mut names: Vec<&str> = all.iter().map(|r| r.filename.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.jpg", "c.png", "link.jpg"]);
        assert!(all.iter().all(|r| !r.path.contains("alias")));
        let link = all.iter().find(|r| r.filename == "link.jpg").expect("link");
        assert_eq!(link.size, 4);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_name_is_reported_not_cataloged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        write_file(&root.path().join("ok.png"), b"abc");
        write_file(&root.path().join(OsStr::from_bytes(b"caf\xe9.png")), b"abc");
        write_file(&root.path().join(OsStr::from_bytes(b"caf\xe8.png")), b"abc");

        let report = Scanner::new(db.clone()).scan(root.path()).expect("scan");
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|issue| matches!(
            issue,
            FileIssue::FileUnreadable { reason, .. } if reason.contains("UTF-8")
        )));
        let all = db.get_all().expect("get_all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].filename, "ok.png");
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_reported_and_keeps_its_records() {
        use std::os::unix::fs::PermissionsExt;

        let (_db_dir, db) = open_temp_db();
        let root = tempfile::tempdir().expect("tempdir");
        let locked = root.path().join("locked");
        write_file(&locked.join("a.jpg"), b"abc");
        write_file(&root.path().join("b.jpg"), b"abc");

        let scanner = Scanner::new(db.clone());
        let first = scanner.scan(root.path()).expect("scan");
        assert_eq!(first.added.len(), 2);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
        if fs::read_dir(&locked).is_ok() {
            // Privileged users bypass directory permissions.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");
            return;
        }
        let second = scanner.scan(root.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod");
        let second = second.expect("rescan");

        assert_eq!(second.errors.len(), 1);
        assert!(matches!(second.errors[0], FileIssue::FileUnreadable { .. }));
        assert!(second.removed.is_empty());
        assert_eq!(second.unchanged, 1);
        assert_eq!(db.get_all().expect("get_all").len(), 2);
    }
}
