use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FetchKind;
use crate::models::{format_chapter_number, same_chapter_number, ChapterId, ComicId};

/// Where a chapter failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    ChapterCreation,
    PageFetch,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::ChapterCreation => write!(f, "chapter-creation"),
            FailureStage::PageFetch => write!(f, "page-fetch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSuccess {
    pub chapter_number: f64,
    pub chapter_id: ChapterId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterFailure {
    pub chapter_number: f64,
    /// Absent when the chapter could not be created.
    pub chapter_id: Option<ChapterId>,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Succeeded { chapter_id: ChapterId },
    Failed(ChapterFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub processed_count: usize,
    pub total_count: usize,
    pub chapter_number: f64,
    pub outcome: ItemOutcome,
    /// One human-readable log line for this item.
    pub message: String,
}

impl ProgressEvent {
    pub fn percent(&self) -> u8 {
        if self.total_count == 0 {
            return 100;
        }
        ((self.processed_count * 100) / self.total_count) as u8
    }
}

pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;
pub type ProgressStream = mpsc::UnboundedReceiver<ProgressEvent>;

/// Channel for observing a run. Dropping the stream only stops updates; the run
/// itself carries on.
pub fn progress_channel() -> (ProgressSender, ProgressStream) {
    mpsc::unbounded()
}

/// Final, read-only summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub comic_id: ComicId,
    pub strategy: FetchKind,
    pub total_count: usize,
    pub succeeded: Vec<ChapterSuccess>,
    pub failed: Vec<ChapterFailure>,
}

impl RunOutcome {
    pub fn succeeded_chapter_ids(&self) -> Vec<ChapterId> {
        self.succeeded.iter().map(|s| s.chapter_id).collect()
    }

    /// Ids of failed chapters that exist in the store. Chapters that could not be
    /// created have no id and are only listed by `failed_numbers`.
    pub fn failed_chapter_ids(&self) -> Vec<ChapterId> {
        self.failed.iter().filter_map(|f| f.chapter_id).collect()
    }

    pub fn succeeded_numbers(&self) -> Vec<f64> {
        self.succeeded.iter().map(|s| s.chapter_number).collect()
    }

    pub fn failed_numbers(&self) -> Vec<f64> {
        self.failed.iter().map(|f| f.chapter_number).collect()
    }

    /// `(chapter number, "stage: reason")` for every failure, in processing order.
    pub fn failure_reasons(&self) -> Vec<(f64, String)> {
        self.failed
            .iter()
            .map(|f| (f.chapter_number, format!("{}: {}", f.stage, f.reason)))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mutable per-run accounting. Each target is classified at most once; a second
/// classification of the same chapter is ignored.
pub(crate) struct OutcomeLedger {
    comic_id: ComicId,
    strategy: FetchKind,
    total: usize,
    processed: usize,
    succeeded: Vec<ChapterSuccess>,
    failed: Vec<ChapterFailure>,
    sink: Option<ProgressSender>,
}

impl OutcomeLedger {
    pub(crate) fn new(comic_id: ComicId, strategy: FetchKind, total: usize, sink: Option<ProgressSender>) -> Self {
        Self {
            comic_id,
            strategy,
            total,
            processed: 0,
            succeeded: Vec::with_capacity(total),
            failed: Vec::new(),
            sink,
        }
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed
    }

    fn is_classified(&self, chapter_number: f64) -> bool {
        self.succeeded
            .iter()
            .any(|s| same_chapter_number(s.chapter_number, chapter_number))
            || self
                .failed
                .iter()
                .any(|f| same_chapter_number(f.chapter_number, chapter_number))
    }

    pub(crate) fn record_success(&mut self, chapter_number: f64, chapter_id: ChapterId) {
        if self.is_classified(chapter_number) {
            warn!("Chapter {} already classified in this run", format_chapter_number(chapter_number));
            return;
        }
        self.succeeded.push(ChapterSuccess {
            chapter_number,
            chapter_id,
        });
        let message = format!("✓ Chapter {} done", format_chapter_number(chapter_number));
        self.advance(chapter_number, ItemOutcome::Succeeded { chapter_id }, message);
    }

    pub(crate) fn record_failure(&mut self, failure: ChapterFailure) {
        if self.is_classified(failure.chapter_number) {
            warn!("Chapter {} already classified in this run", format_chapter_number(failure.chapter_number));
            return;
        }
        let message = format!(
            "✗ Chapter {} failed ({}): {}",
            format_chapter_number(failure.chapter_number),
            failure.stage,
            failure.reason
        );
        self.failed.push(failure.clone());
        self.advance(failure.chapter_number, ItemOutcome::Failed(failure), message);
    }

    fn advance(&mut self, chapter_number: f64, outcome: ItemOutcome, message: String) {
        self.processed += 1;
        if let Some(sink) = &self.sink {
            let event = ProgressEvent {
                processed_count: self.processed,
                total_count: self.total,
                chapter_number,
                outcome,
                message,
            };
            // A closed receiver means the caller stopped listening.
            if sink.unbounded_send(event).is_err() {
                self.sink = None;
            }
        }
    }

    pub(crate) fn finish(self) -> RunOutcome {
        RunOutcome {
            comic_id: self.comic_id,
            strategy: self.strategy,
            total_count: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}
