//! Thumbnail cache engine.
//!
//! Jobs run on a dedicated, fixed-size rayon pool. An in-flight table keyed
//! by media id guarantees that at most one job per id decodes at a time;
//! duplicate requests either wait for that job's outcome or are reported as
//! already in progress, depending on [`GenerateMode`].

use crate::config::Config;
use crate::database::{Database, ThumbnailState};
use crate::error::{CatalogError, GenerationError};
use crate::image_decode::MediaDecoder;
use crate::image_processing::{self, CachePruneReport};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerateMode {
    /// Duplicates of an in-flight id block until that job finishes.
    #[default]
    Wait,
    /// Duplicates return immediately in `already_in_progress`.
    NoWait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFailure {
    pub id: String,
    pub reason: GenerationError,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    /// `(id, thumbnail_path)` for every freshly written thumbnail.
    pub succeeded: Vec<(String, String)>,
    pub failed: Vec<GenerationFailure>,
    pub skipped: Vec<String>,
    pub already_in_progress: Vec<String>,
    pub elapsed_ms: u64,
}

impl GenerationReport {
    fn record(&mut self, id: String, outcome: JobOutcome) {
        match outcome {
            Ok(JobSuccess::Generated(path)) => self.succeeded.push((id, path)),
            Ok(JobSuccess::Skipped) => self.skipped.push(id),
            Err(reason) => self.failed.push(GenerationFailure { id, reason }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum JobSuccess {
    Generated(String),
    Skipped,
}

type JobOutcome = Result<JobSuccess, GenerationError>;

enum Claim {
    Owner,
    Waiter(mpsc::Receiver<JobOutcome>),
    Busy,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub cache_dir: PathBuf,
    pub max_edge: u32,
    pub jpeg_quality: u8,
    pub worker_threads: usize,
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        EngineOptions {
            cache_dir: config.cache_dir.clone(),
            max_edge: config.thumbnail_max_edge,
            jpeg_quality: config.jpeg_quality,
            worker_threads: config.worker_threads,
        }
    }
}

pub struct ThumbnailEngine {
    db: Database,
    decoder: Arc<dyn MediaDecoder>,
    options: EngineOptions,
    pool: rayon::ThreadPool,
    in_flight: Mutex<HashMap<String, Vec<mpsc::Sender<JobOutcome>>>>,
}

/// Releases an in-flight claim even if the job unwinds.
struct JobGuard<'a> {
    engine: &'a ThumbnailEngine,
    id: &'a str,
    finished: bool,
}

impl JobGuard<'_> {
    fn finish(mut self, outcome: &JobOutcome) {
        self.finished = true;
        self.engine.notify_waiters(self.id, outcome);
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.engine
                .notify_waiters(self.id, &Err(GenerationError::Aborted));
        }
    }
}

impl ThumbnailEngine {
    pub fn new(
        db: Database,
        decoder: Arc<dyn MediaDecoder>,
        options: EngineOptions,
    ) -> std::io::Result<Self> {
        image_processing::prepare_cache_dir(&options.cache_dir)?;
        let threads = options.worker_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("thumb-worker-{}", idx))
            .build()
            .map_err(std::io::Error::other)?;
        log::info!(
            "Thumbnail engine ready: {} workers, cache {}",
            threads,
            options.cache_dir.display()
        );
        Ok(ThumbnailEngine {
            db,
            decoder,
            options,
            pool,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.options.cache_dir
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, Vec<mpsc::Sender<JobOutcome>>>> {
        // A poisoned table still holds valid senders; keep serving.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, id: &str, mode: GenerateMode) -> Claim {
        let mut table = self.in_flight();
        match table.get_mut(id) {
            Some(waiters) => match mode {
                GenerateMode::Wait => {
                    let (tx, rx) = mpsc::channel();
                    waiters.push(tx);
                    Claim::Waiter(rx)
                }
                GenerateMode::NoWait => Claim::Busy,
            },
            None => {
                table.insert(id.to_string(), Vec::new());
                Claim::Owner
            }
        }
    }

    fn notify_waiters(&self, id: &str, outcome: &JobOutcome) {
        let waiters = self.in_flight().remove(id);
        for tx in waiters.into_iter().flatten() {
            let _ = tx.send(outcome.clone());
        }
    }

    /// Generates thumbnails for `ids`, returning one report entry per
    /// distinct id.
    pub fn generate(&self, ids: &[String], mode: GenerateMode) -> GenerationReport {
        let started = std::time::Instant::now();
        let mut report = GenerationReport::default();

        let mut seen = HashSet::with_capacity(ids.len());
        let mut owned: Vec<String> = Vec::new();
        let mut waiting: Vec<(String, mpsc::Receiver<JobOutcome>)> = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.claim(id, mode) {
                Claim::Owner => owned.push(id.clone()),
                Claim::Waiter(rx) => waiting.push((id.clone(), rx)),
                Claim::Busy => report.already_in_progress.push(id.clone()),
            }
        }

        let outcomes: Vec<(String, JobOutcome)> = match self.db.get_thumbnail_states(&owned) {
            Ok(states) => self.pool.install(|| {
                owned
                    .par_iter()
                    .map(|id| {
                        let guard = JobGuard {
                            engine: self,
                            id: id.as_str(),
                            finished: false,
                        };
                        let outcome = self.run_job(id, states.get(id));
                        guard.finish(&outcome);
                        (id.clone(), outcome)
                    })
                    .collect()
            }),
            Err(error) => {
                log::error!("Thumbnail batch could not read catalog: {}", error);
                let reason = GenerationError::from(error);
                owned
                    .iter()
                    .map(|id| {
                        let outcome = Err(reason.clone());
                        self.notify_waiters(id, &outcome);
                        (id.clone(), outcome)
                    })
                    .collect()
            }
        };
        for (id, outcome) in outcomes {
            if let Err(reason) = &outcome {
                log::warn!("Thumbnail generation failed for {}: {}", id, reason);
            }
            report.record(id, outcome);
        }

        for (id, rx) in waiting {
            let outcome = rx.recv().unwrap_or(Err(GenerationError::Aborted));
            report.record(id, outcome);
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        let elapsed_seconds = started.elapsed().as_secs_f64();
        let throughput = if elapsed_seconds > 0.0 {
            report.succeeded.len() as f64 / elapsed_seconds
        } else {
            report.succeeded.len() as f64
        };
        log::info!(
            "Thumbnail batch complete: requested={}, generated={}, skipped={}, failed={}, in_progress={}, elapsed={}ms, throughput={:.1} items/s",
            seen.len(),
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len(),
            report.already_in_progress.len(),
            report.elapsed_ms,
            throughput
        );
        report
    }

    fn run_job(&self, id: &str, state: Option<&ThumbnailState>) -> JobOutcome {
        let state = state.ok_or(GenerationError::NotFound)?;
        let record = &state.record;
        let source = Path::new(&record.path);

        let size = std::fs::metadata(source)
            .map_err(|error| GenerationError::FileUnreadable(format!("{}: {}", record.path, error)))?
            .len();

        if let Some(existing) = record.thumbnail_path.as_deref() {
            if state.thumb_source_size == Some(size) && Path::new(existing).is_file() {
                log::debug!("Thumbnail for {} is current; skipping", id);
                return Ok(JobSuccess::Skipped);
            }
        }

        if size == 0 {
            return Err(GenerationError::DecodeFailed("empty file".to_string()));
        }
        if size != record.size {
            return Err(GenerationError::Stale(format!(
                "{} is {} bytes on disk but {} in the catalog; rescan required",
                record.path, size, record.size
            )));
        }

        let decode_timer = std::time::Instant::now();
        let frame = self.decoder.decode(source, record.kind)?;
        let thumbnail = image_processing::downscale(frame, self.options.max_edge);
        let target = image_processing::thumbnail_path_for(&self.options.cache_dir, id);
        image_processing::write_jpeg_atomic(&thumbnail, &target, self.options.jpeg_quality)?;
        let target_str = target.to_string_lossy().to_string();

        match self.db.set_thumbnail(id, &target_str, size) {
            Ok(()) => {
                log::debug!(
                    "Generated thumbnail for {} in {:.1}ms",
                    record.path,
                    decode_timer.elapsed().as_secs_f64() * 1000.0
                );
                Ok(JobSuccess::Generated(target_str))
            }
            Err(error) => {
                // The record was removed or rescanned while the job ran.
                image_processing::remove_thumbnail_file(&target);
                Err(match error {
                    CatalogError::NotFound(_) => GenerationError::NotFound,
                    other => GenerationError::from(other),
                })
            }
        }
    }

    /// Removes cache files no catalog id owns, plus leftover temp files.
    ///
    /// Skipped while any job is in flight.
    pub fn prune_orphans(&self) -> Result<CachePruneReport, CatalogError> {
        let table = self.in_flight();
        if !table.is_empty() {
            log::info!(
                "Skipping thumbnail cache prune: {} jobs in flight",
                table.len()
            );
            return Ok(CachePruneReport::default());
        }
        let known: HashSet<String> = self.db.all_ids()?.into_iter().collect();
        let report = image_processing::prune_cache_dir(&self.options.cache_dir, &known)?;
        drop(table);
        Ok(report)
    }
}
