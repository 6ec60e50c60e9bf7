use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use comic_grabber::models::{format_chapter_number, ChapterId, ComicId};
use comic_grabber::progress::{progress_channel, ProgressSender, RunOutcome};
use comic_grabber::strategies::{PageDiscoveryGrab, PageRange, TemplatedRangeGrab};
use comic_grabber::{ChapterRange, ComicBackend, Config, Database, GrabJob, GrabberError, ImportPipeline, LocalBackend};

#[derive(Parser)]
#[command(name = "comic-grabber")]
#[command(about = "Chapter and page acquisition for a comic catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize database and configuration
    Init,
    /// Import a comic from the external catalog
    Import {
        /// Catalog id or catalog URL
        input: String,
    },
    /// Fetch and store the catalog chapter list for an imported comic
    Chapters {
        comic_id: ComicId,
        /// Catalog id or catalog URL
        input: String,
    },
    /// Grab the pages of one chapter from the external catalog
    GrabChapter {
        chapter_id: ChapterId,
        /// Print the run outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Grab every chapter that carries an external chapter id
    GrabAll {
        comic_id: ComicId,
        #[arg(long)]
        json: bool,
    },
    /// Grab a chapter range from a URL template with {ch} and {page}
    GrabTemplate {
        comic_id: ComicId,
        template: String,
        /// Chapter range, e.g. 1-10
        #[arg(long)]
        chapters: ChapterRange,
        /// Page range, e.g. 1-20 (defaults from config)
        #[arg(long)]
        pages: Option<PageRange>,
        #[arg(long)]
        json: bool,
    },
    /// Discover pages from chapter URLs built from a {ch} template
    Discover {
        comic_id: ComicId,
        template: String,
        #[arg(long)]
        chapters: ChapterRange,
        #[arg(long)]
        json: bool,
    },
    /// Show comics, or the chapters of one comic
    Status { comic_id: Option<ComicId> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = Config::load(&cli.config)?;

    if let Commands::Init = cli.command {
        info!("Initializing comic grabber...");
        let db = Database::new(&config.database.url, config.database.max_connections).await?;
        db.init().await?;
        if !Path::new(&cli.config).exists() {
            config.save(&cli.config)?;
            info!("Wrote default configuration to {}", cli.config);
        }
        info!("Database initialized successfully");
        return Ok(());
    }

    let backend = Arc::new(LocalBackend::from_config(&config).await?);
    let pipeline = ImportPipeline::new(backend.clone());

    match cli.command {
        Commands::Init => {}
        Commands::Import { input } => {
            let comic_id = pipeline.import(&input).await?;
            println!("✅ Imported comic {}", comic_id);
        }
        Commands::Chapters { comic_id, input } => {
            let chapters = pipeline.fetch_chapter_list(&input, comic_id).await?;

            println!("{:<10} {:<40} {:<38}", "Number", "Title", "External id");
            println!("{}", "-".repeat(88));
            for chapter in chapters {
                println!(
                    "{:<10} {:<40} {:<38}",
                    chapter.number_label(),
                    chapter.title,
                    chapter.external_id().unwrap_or("-")
                );
            }
        }
        Commands::GrabChapter { chapter_id, json } => {
            let chapter = backend
                .database()
                .get_chapter(chapter_id)
                .await?
                .ok_or(GrabberError::ChapterNotFound(chapter_id))?;
            let outcome = pipeline.grab_chapter(chapter.comic_id, chapter_id).await?;
            report(&outcome, json)?;
        }
        Commands::GrabAll { comic_id, json } => {
            let outcome = with_progress(|tx| pipeline.grab_all(comic_id, Some(tx))).await?;
            report(&outcome, json)?;
        }
        Commands::GrabTemplate {
            comic_id,
            template,
            chapters,
            pages,
            json,
        } => {
            let pages = match pages {
                Some(pages) => pages,
                None => PageRange::new(config.grabber.default_page_start, config.grabber.default_page_end)?,
            };
            let job = GrabJob::range(comic_id, chapters, Box::new(TemplatedRangeGrab::new(&template, pages)));
            let outcome = with_progress(|tx| pipeline.orchestrator().run(job, Some(tx))).await?;
            report(&outcome, json)?;
        }
        Commands::Discover {
            comic_id,
            template,
            chapters,
            json,
        } => {
            let job = GrabJob::range(comic_id, chapters, Box::new(PageDiscoveryGrab::for_template(&template)));
            let outcome = with_progress(|tx| pipeline.orchestrator().run(job, Some(tx))).await?;
            report(&outcome, json)?;
        }
        Commands::Status { comic_id } => {
            show_status(backend.as_ref(), comic_id).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!("comic_grabber={}", level))
        .with_target(false)
        .init();

    Ok(())
}

/// Drives a run while a progress bar follows its event stream.
async fn with_progress<F, Fut>(start: F) -> Result<RunOutcome>
where
    F: FnOnce(ProgressSender) -> Fut,
    Fut: Future<Output = comic_grabber::Result<RunOutcome>>,
{
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let (tx, mut rx) = progress_channel();
    let watch = async {
        while let Some(event) = rx.next().await {
            pb.set_length(event.total_count as u64);
            pb.set_position(event.processed_count as u64);
            pb.println(&event.message);
        }
    };

    let (outcome, ()) = tokio::join!(start(tx), watch);
    pb.finish_and_clear();
    Ok(outcome?)
}

fn report(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!(
        "📊 {} run for comic {}: {} succeeded, {} failed (of {})",
        outcome.strategy,
        outcome.comic_id,
        outcome.succeeded.len(),
        outcome.failed.len(),
        outcome.total_count
    );
    for (number, reason) in outcome.failure_reasons() {
        println!("   ❌ Chapter {}: {}", format_chapter_number(number), reason);
    }
    if !outcome.is_clean() {
        warn!("Re-run the command to retry failed chapters");
    }
    Ok(())
}

async fn show_status(backend: &LocalBackend, comic_id: Option<ComicId>) -> Result<()> {
    let db = backend.database();

    match comic_id {
        None => {
            let comics = db.list_comics().await?;

            println!("📚 Comics:");
            println!("{:<6} {:<40} {:<10} {:<16} {:<12}", "Id", "Title", "Status", "Source", "Updated");
            println!("{}", "-".repeat(86));
            for comic in comics {
                println!(
                    "{:<6} {:<40} {:<10} {:<16} {:<12}",
                    comic.id,
                    comic.title,
                    comic.status.to_string(),
                    comic.source_type.to_string(),
                    comic.updated_at.format("%Y-%m-%d")
                );
            }
        }
        Some(comic_id) => {
            let comic = db
                .get_comic(comic_id)
                .await?
                .ok_or(GrabberError::ComicNotFound(comic_id))?;
            let chapters = backend.list_chapters_by_comic(comic_id).await?;

            println!("📖 {} ({} chapters)", comic.title, chapters.len());
            println!("{:<10} {:<40} {:<8} {:<10}", "Number", "Title", "Pages", "Catalog");
            println!("{}", "-".repeat(70));
            for chapter in chapters {
                let pages = db.count_pages(chapter.id).await?;
                println!(
                    "{:<10} {:<40} {:<8} {:<10}",
                    chapter.number_label(),
                    chapter.title,
                    pages,
                    if chapter.external_id().is_some() { "yes" } else { "no" }
                );
            }
        }
    }

    Ok(())
}
