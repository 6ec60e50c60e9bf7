use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{GrabberError, Result};
use crate::models::{format_chapter_number, same_chapter_number, Chapter, ComicId};
use crate::progress::{ChapterFailure, FailureStage, OutcomeLedger, ProgressSender, RunOutcome};
use crate::resolver::ChapterResolver;
use crate::strategies::templated::parse_bounds;
use crate::traits::{ComicBackend, PageFetchStrategy};

/// Inclusive chapter-number range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRange {
    pub start: u32,
    pub end: u32,
}

impl ChapterRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(GrabberError::validation(format!(
                "invalid chapter range: {start} is greater than {end}"
            )));
        }
        Ok(Self { start, end })
    }
}

impl FromStr for ChapterRange {
    type Err = GrabberError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = parse_bounds(s, "chapter")?;
        Self::new(start, end)
    }
}

pub enum Targets {
    /// Chapters by number; missing ones are created on the way.
    Range(ChapterRange),
    /// Pre-fetched chapter records.
    Chapters(Vec<Chapter>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

/// Everything needed to start a run.
pub struct GrabJob {
    comic_id: ComicId,
    strategy: Box<dyn PageFetchStrategy>,
    targets: Targets,
}

impl GrabJob {
    pub fn range(comic_id: ComicId, range: ChapterRange, strategy: Box<dyn PageFetchStrategy>) -> Self {
        Self {
            comic_id,
            strategy,
            targets: Targets::Range(range),
        }
    }

    /// Targets the given chapters in ascending number order, one per number.
    pub fn chapters(comic_id: ComicId, mut chapters: Vec<Chapter>, strategy: Box<dyn PageFetchStrategy>) -> Self {
        chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
        chapters.dedup_by(|a, b| same_chapter_number(a.number, b.number));
        Self {
            comic_id,
            strategy,
            targets: Targets::Chapters(chapters),
        }
    }

    /// Like [`GrabJob::chapters`] but drops chapters the strategy cannot handle. The
    /// dropped chapters never show up in progress or outcome accounting.
    pub fn all_eligible(comic_id: ComicId, chapters: Vec<Chapter>, strategy: Box<dyn PageFetchStrategy>) -> Self {
        let eligible: Vec<Chapter> = chapters.into_iter().filter(|c| strategy.is_eligible(c)).collect();
        Self::chapters(comic_id, eligible, strategy)
    }

    pub fn comic_id(&self) -> ComicId {
        self.comic_id
    }

    pub fn state(&self) -> RunState {
        RunState::Idle
    }

    pub fn target_count(&self) -> usize {
        match &self.targets {
            Targets::Range(range) => (range.end - range.start) as usize + 1,
            Targets::Chapters(chapters) => chapters.len(),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Targets::Range(range) = &self.targets {
            ChapterRange::new(range.start, range.end)?;
        }
        self.strategy.validate()
    }
}

/// Per-comic run exclusivity. A lease is taken when a run starts and released when
/// its [`RunLease`] drops.
#[derive(Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashSet<ComicId>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, comic_id: ComicId) -> Result<RunLease> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(comic_id) {
            return Err(GrabberError::AlreadyRunning(comic_id));
        }
        Ok(RunLease {
            comic_id,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_running(&self, comic_id: ComicId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&comic_id)
    }
}

pub struct RunLease {
    comic_id: ComicId,
    active: Arc<Mutex<HashSet<ComicId>>>,
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.comic_id);
    }
}

/// Drives one page fetch strategy across an ordered set of chapters, one at a time.
pub struct BatchOrchestrator {
    backend: Arc<dyn ComicBackend>,
    runs: RunRegistry,
}

impl BatchOrchestrator {
    pub fn new(backend: Arc<dyn ComicBackend>) -> Self {
        Self::with_registry(backend, RunRegistry::new())
    }

    /// Orchestrators sharing a registry refuse overlapping runs on one comic.
    pub fn with_registry(backend: Arc<dyn ComicBackend>, runs: RunRegistry) -> Self {
        Self { backend, runs }
    }

    pub fn backend(&self) -> &Arc<dyn ComicBackend> {
        &self.backend
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Idle → Running. Fails before any external call on invalid input, on an
    /// unavailable backend, or when the comic already has a run in progress.
    pub async fn start(&self, job: GrabJob) -> Result<GrabRun> {
        job.validate()?;
        if !self.backend.is_ready().await {
            return Err(GrabberError::not_available("backend connection is not ready"));
        }
        let lease = self.runs.acquire(job.comic_id)?;

        info!(
            "[GRAB] Starting {} run for comic {} over {} chapter(s)",
            job.strategy.kind(),
            job.comic_id,
            job.target_count()
        );

        Ok(GrabRun {
            backend: Arc::clone(&self.backend),
            comic_id: job.comic_id,
            strategy: job.strategy,
            targets: job.targets,
            state: RunState::Running,
            _lease: lease,
        })
    }

    pub async fn run(&self, job: GrabJob, progress: Option<ProgressSender>) -> Result<RunOutcome> {
        Ok(self.start(job).await?.execute(progress).await)
    }
}

/// A started run holding the comic's lease. Executing it always yields a
/// [`RunOutcome`], however many chapters failed.
pub struct GrabRun {
    backend: Arc<dyn ComicBackend>,
    comic_id: ComicId,
    strategy: Box<dyn PageFetchStrategy>,
    targets: Targets,
    state: RunState,
    _lease: RunLease,
}

impl GrabRun {
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Running → Completed. Item failures are recorded and never stop the run; no
    /// already-persisted chapter or page is rolled back.
    pub async fn execute(mut self, progress: Option<ProgressSender>) -> RunOutcome {
        let numbered: Vec<(f64, String)> = match &self.targets {
            Targets::Range(range) => (range.start..=range.end).map(|n| (n as f64, String::new())).collect(),
            Targets::Chapters(chapters) => chapters.iter().map(|c| (c.number, c.title.clone())).collect(),
        };

        let mut ledger = OutcomeLedger::new(self.comic_id, self.strategy.kind(), numbered.len(), progress);
        let resolver = ChapterResolver::new(self.backend.as_ref());

        for (number, title) in numbered {
            let label = format_chapter_number(number);
            info!("[GRAB] Processing chapter {}...", label);

            let chapter = match resolver.resolve(self.comic_id, number, &title).await {
                Ok(chapter) => chapter,
                Err(e) => {
                    warn!("[GRAB] ✗ Could not resolve chapter {}: {}", label, e);
                    ledger.record_failure(ChapterFailure {
                        chapter_number: number,
                        chapter_id: None,
                        stage: FailureStage::ChapterCreation,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.strategy.fetch(self.backend.as_ref(), self.comic_id, &chapter).await {
                Ok(()) => {
                    info!("[GRAB] ✓ Chapter {} done", label);
                    ledger.record_success(number, chapter.id);
                }
                Err(e) => {
                    warn!("[GRAB] ✗ Chapter {} failed: {}", label, e);
                    ledger.record_failure(ChapterFailure {
                        chapter_number: number,
                        chapter_id: Some(chapter.id),
                        stage: FailureStage::PageFetch,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.state = RunState::Completed;
        let outcome = ledger.finish();
        info!(
            "[GRAB] Run for comic {} completed: {} succeeded, {} failed",
            self.comic_id,
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }
}
