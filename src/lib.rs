pub mod backend;
pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod resolver;
pub mod sources;
pub mod strategies;
pub mod template;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod testing;

pub use backend::LocalBackend;
pub use config::Config;
pub use database::Database;
pub use error::{FetchKind, GrabberError, Result};
pub use orchestrator::{BatchOrchestrator, ChapterRange, GrabJob, GrabRun, RunRegistry, RunState};
pub use pipeline::ImportPipeline;
pub use progress::{progress_channel, ProgressEvent, RunOutcome};
pub use resolver::ChapterResolver;
pub use traits::{CatalogSource, ComicBackend, PageExtractor, PageFetchStrategy};
