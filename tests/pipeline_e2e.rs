use std::sync::Arc;

use comic_grabber::models::{ComicStatus, SourceType};
use comic_grabber::progress::FailureStage;
use comic_grabber::strategies::{PageDiscoveryGrab, PageRange, TemplatedRangeGrab};
use comic_grabber::{ChapterRange, ComicBackend, Config, GrabJob, ImportPipeline, LocalBackend};
use mockito::{Matcher, Server, ServerGuard};
use tempfile::TempDir;

const MANGA_ID: &str = "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0";

async fn setup(server: &ServerGuard) -> (TempDir, Arc<LocalBackend>, ImportPipeline) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.database.url = format!("sqlite:{}", dir.path().join("grabber.db").display());
    config.database.max_connections = 1;
    config.catalog.base_url = server.url();
    config.catalog.uploads_url = "https://uploads.test".to_string();
    config.catalog.rate_limit_ms = 0;
    config.discovery.rate_limit_ms = 0;

    let backend = Arc::new(LocalBackend::from_config(&config).await.unwrap());
    let pipeline = ImportPipeline::new(backend.clone());
    (dir, backend, pipeline)
}

async fn mock_catalog(server: &mut ServerGuard) -> Vec<mockito::Mock> {
    let manga = server
        .mock("GET", format!("/manga/{MANGA_ID}").as_str())
        .match_query(Matcher::UrlEncoded("includes[]".into(), "cover_art".into()))
        .with_body(format!(
            r#"{{"result":"ok","data":{{"id":"{MANGA_ID}","attributes":{{
                "title":{{"en":"Solo Leveling"}},"description":{{"en":"Hunters."}},
                "status":"ongoing","contentRating":"safe",
                "tags":[{{"attributes":{{"name":{{"en":"Action"}},"group":"genre"}}}}]}},
              "relationships":[{{"type":"cover_art","attributes":{{"fileName":"cover.jpg"}}}}]}}}}"#
        ))
        .create_async()
        .await;
    let feed = server
        .mock("GET", format!("/manga/{MANGA_ID}/feed").as_str())
        .match_query(Matcher::Any)
        .with_body(
            r#"{"result":"ok","total":3,"data":[
                {"id":"c1","attributes":{"chapter":"1","title":"Awakening"}},
                {"id":"c2","attributes":{"chapter":"2","title":"Dungeon"}},
                {"id":"c3","attributes":{"chapter":"3","title":"Job Change"}}]}"#,
        )
        .create_async()
        .await;
    let c1 = server
        .mock("GET", "/at-home/server/c1")
        .with_body(r#"{"result":"ok","baseUrl":"https://node.test","chapter":{"hash":"h1","data":["1.png","2.png"]}}"#)
        .create_async()
        .await;
    let c2 = server
        .mock("GET", "/at-home/server/c2")
        .with_status(500)
        .create_async()
        .await;
    let c3 = server
        .mock("GET", "/at-home/server/c3")
        .with_body(r#"{"result":"ok","baseUrl":"https://node.test","chapter":{"hash":"h3","data":["1.png"]}}"#)
        .create_async()
        .await;
    vec![manga, feed, c1, c2, c3]
}

#[tokio::test]
async fn import_chapter_list_and_grab_all() {
    let mut server = Server::new_async().await;
    let _mocks = mock_catalog(&mut server).await;
    let (_dir, backend, pipeline) = setup(&server).await;

    let url = format!("https://mangadex.org/title/{MANGA_ID}/solo-leveling");
    let comic_id = pipeline.import(&url).await.unwrap();

    let comic = backend.database().get_comic(comic_id).await.unwrap().unwrap();
    assert_eq!(comic.title, "Solo Leveling");
    assert_eq!(comic.status, ComicStatus::Ongoing);
    assert_eq!(comic.source_type, SourceType::ExternalCatalog);
    assert_eq!(
        comic.cover_blob_id.as_deref(),
        Some(format!("https://uploads.test/covers/{MANGA_ID}/cover.jpg").as_str())
    );

    pipeline.fetch_chapter_list(&url, comic_id).await.unwrap();
    let chapters = pipeline.fetch_chapter_list(MANGA_ID, comic_id).await.unwrap();
    assert_eq!(chapters.len(), 3);
    assert_eq!(chapters[0].title, "Awakening");

    let outcome = pipeline.grab_all(comic_id, None).await.unwrap();

    assert_eq!(outcome.succeeded_numbers(), vec![1.0, 3.0]);
    assert_eq!(outcome.failed_numbers(), vec![2.0]);
    assert_eq!(outcome.failed[0].stage, FailureStage::PageFetch);

    let pages = backend.list_pages_by_chapter(chapters[0].id).await.unwrap();
    let urls: Vec<&str> = pages.iter().map(|p| p.blob_id.as_str()).collect();
    assert_eq!(urls, vec!["https://node.test/data/h1/1.png", "https://node.test/data/h1/2.png"]);
    assert!(backend.list_pages_by_chapter(chapters[1].id).await.unwrap().is_empty());
}

#[tokio::test]
async fn chapter_cleared_after_the_listing_fails_as_not_eligible() {
    let mut server = Server::new_async().await;
    let _mocks = mock_catalog(&mut server).await;
    let (_dir, backend, pipeline) = setup(&server).await;

    let comic_id = pipeline.import(MANGA_ID).await.unwrap();
    let chapters = pipeline.fetch_chapter_list(MANGA_ID, comic_id).await.unwrap();
    backend
        .database()
        .set_external_chapter_id(chapters[2].id, None)
        .await
        .unwrap();

    let outcome = pipeline.grab_eligible(comic_id, chapters, None).await.unwrap();

    assert_eq!(outcome.total_count, 3);
    assert_eq!(outcome.succeeded_numbers(), vec![1.0]);
    assert_eq!(outcome.failed_numbers(), vec![2.0, 3.0]);
    assert!(outcome.failed[1].reason.contains("no external chapter id"));
    assert!(outcome.failed[0].reason.starts_with("catalog fetch failed"));
}

#[tokio::test]
async fn repeated_import_creates_a_second_comic() {
    let mut server = Server::new_async().await;
    let _mocks = mock_catalog(&mut server).await;
    let (_dir, backend, pipeline) = setup(&server).await;

    let first = pipeline.import(MANGA_ID).await.unwrap();
    let second = pipeline.import(MANGA_ID).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(backend.database().list_comics().await.unwrap().len(), 2);
}

#[tokio::test]
async fn template_grab_reuses_catalog_chapters_and_overwrites_pages() {
    let mut server = Server::new_async().await;
    let _mocks = mock_catalog(&mut server).await;
    let (_dir, backend, pipeline) = setup(&server).await;

    let comic_id = pipeline.import(MANGA_ID).await.unwrap();
    pipeline.fetch_chapter_list(MANGA_ID, comic_id).await.unwrap();
    pipeline.grab_all(comic_id, None).await.unwrap();

    let job = GrabJob::range(
        comic_id,
        ChapterRange::new(3, 4).unwrap(),
        Box::new(TemplatedRangeGrab::new(
            "https://cdn.test/{ch}/{page}.jpg",
            PageRange::new(1, 2).unwrap(),
        )),
    );
    let outcome = pipeline.orchestrator().run(job, None).await.unwrap();
    assert!(outcome.is_clean());

    let chapters = backend.list_chapters_by_comic(comic_id).await.unwrap();
    assert_eq!(chapters.len(), 4);
    assert_eq!(chapters[2].title, "Job Change");
    assert_eq!(chapters[3].title, "");

    let pages = backend.list_pages_by_chapter(chapters[2].id).await.unwrap();
    let urls: Vec<&str> = pages.iter().map(|p| p.blob_id.as_str()).collect();
    assert_eq!(urls, vec!["https://cdn.test/3/1.jpg", "https://cdn.test/3/2.jpg"]);
}

#[tokio::test]
async fn discovery_grab_persists_pages_in_document_order() {
    let mut server = Server::new_async().await;
    let _mocks = mock_catalog(&mut server).await;
    let _page = server
        .mock("GET", "/read/ch-1")
        .with_body(
            r#"<html><body><div class="reading-content">
                <img src="/img/logo.png">
                <img data-src="/img/01.jpg" src="data:image/gif;base64,AAAA">
                <img src="/img/02.jpg">
                <img src="/img/01.jpg">
            </div></body></html>"#,
        )
        .create_async()
        .await;
    let (_dir, backend, pipeline) = setup(&server).await;
    let comic_id = pipeline.import(MANGA_ID).await.unwrap();

    let template = format!("{}/read/ch-{{ch}}", server.url());
    let job = GrabJob::range(
        comic_id,
        ChapterRange::new(1, 1).unwrap(),
        Box::new(PageDiscoveryGrab::for_template(&template)),
    );
    let outcome = pipeline.orchestrator().run(job, None).await.unwrap();

    assert!(outcome.is_clean());
    let chapter_id = outcome.succeeded_chapter_ids()[0];
    let pages = backend.list_pages_by_chapter(chapter_id).await.unwrap();
    let urls: Vec<String> = pages.into_iter().map(|p| p.blob_id).collect();
    assert_eq!(
        urls,
        vec![format!("{}/img/01.jpg", server.url()), format!("{}/img/02.jpg", server.url())]
    );
}
