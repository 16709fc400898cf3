//! HTTP persistence and book download against a mock server.

mod common;

use common::long_book;
use pretty_assertions::assert_eq;
use retroreader_core::archive;
use retroreader_core::bookmarks::NewBookmark;
use retroreader_core::config::{ApiUrls, BookData, ReaderConfig, SecurityConfig};
use retroreader_core::error::{ArchiveError, FetchError, ReaderError, SecurityError, SyncError};
use retroreader_core::layout::{EstimatedLayout, FrameMetrics};
use retroreader_core::position::PositionToken;
use retroreader_core::security::SecurityLimits;
use retroreader_core::session::{ReaderSession, SessionOptions};
use retroreader_core::settings::{FontFamily, ReaderSettings, Theme};
use retroreader_core::sync::{HttpReaderApi, ProgressUpdate, ReaderApi, CSRF_HEADER};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urls() -> ApiUrls {
    ApiUrls {
        save_progress: "/api/progress/7/".into(),
        bookmarks: "/api/bookmarks/7/".into(),
        create_bookmark: "/api/bookmarks/create/".into(),
        delete_bookmark_base: "/api/bookmarks/".into(),
        settings: "/api/settings/".into(),
    }
}

fn book_at_seven() -> BookData {
    BookData {
        epub_url: "/ereader/file/7/".into(),
        id: 7,
        title: None,
        author: None,
        csrf_token: "tok".into(),
        saved_progress: None,
        api_urls: urls(),
        theme: None,
    }
}

fn api_for(server: &MockServer) -> HttpReaderApi {
    let origin = reqwest::Url::parse(&server.uri()).unwrap();
    HttpReaderApi::new(reqwest::Client::new(), origin, urls(), "tok")
}

#[tokio::test]
async fn progress_save_posts_payload_with_csrf_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/progress/7/"))
        .and(header(CSRF_HEADER, "tok"))
        .and(body_json(serde_json::json!({
            "current_cfi": "page:11:21",
            "percentage": 50.0,
            "session_duration": 2
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let update = ProgressUpdate::for_position(PositionToken::new(11, 21), 2).unwrap();
    api_for(&server).save_progress(&update).await.unwrap();
}

#[tokio::test]
async fn server_error_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/progress/7/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let update = ProgressUpdate::for_position(PositionToken::new(2, 3), 0).unwrap();
    let err = api_for(&server).save_progress(&update).await.unwrap_err();
    assert!(matches!(err, SyncError::Status { status: 500, .. }));
}

#[tokio::test]
async fn bookmarks_list_create_delete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bookmarks/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "bookmarks": [{"id": 3, "title": "Page 5", "chapter_title": "II", "cfi": "page:5:20"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/bookmarks/create/"))
        .and(header(CSRF_HEADER, "tok"))
        .and(body_json(serde_json::json!({
            "ebook": 7, "cfi": "page:5:20", "title": "Page 5", "chapter_title": "II"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 3})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/bookmarks/3/delete/"))
        .and(header(CSRF_HEADER, "tok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let list = api.list_bookmarks().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].target_page(20), Some(5));

    let created = api
        .create_bookmark(&NewBookmark::at(7, PositionToken::new(5, 20), "II"))
        .await
        .unwrap();
    assert_eq!(created, Some(3));
    api.delete_bookmark(3).await.unwrap();
}

#[tokio::test]
async fn settings_round_trip_and_bad_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/settings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "theme": "sepia", "font_family": "mono", "font_size": 99
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/settings/"))
        .and(header(CSRF_HEADER, "tok"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let settings = api.fetch_settings().await.unwrap();
    assert_eq!(settings.theme, Theme::Sepia);
    assert_eq!(settings.font_family, FontFamily::Mono);
    assert_eq!(settings.font_size, 32);
    api.save_settings(&settings).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/settings/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    let err = api.fetch_settings().await.unwrap_err();
    assert!(matches!(err, SyncError::Decode { .. }));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let origin = reqwest::Url::parse("http://127.0.0.1:9/").unwrap();
    let api = HttpReaderApi::new(reqwest::Client::new(), origin, urls(), "tok");
    let err = api.list_bookmarks().await.unwrap_err();
    assert!(matches!(err, SyncError::Network { .. }));
}

#[tokio::test]
async fn download_failure_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/ereader/file/7/", server.uri());
    let err = archive::fetch(&reqwest::Client::new(), &url, &SecurityLimits::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReaderError::Fetch(FetchError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn open_downloads_and_starts_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ereader/file/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(long_book(3, 4).build()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/settings/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ReaderSettings::default()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bookmarks/7/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"bookmarks": []})),
        )
        .mount(&server)
        .await;

    let origin = reqwest::Url::parse(&server.uri()).unwrap();
    let layout = EstimatedLayout::new(FrameMetrics::new(600.0, 800.0));
    let options = SessionOptions::from_config(&ReaderConfig::default());
    let mut session = ReaderSession::open(book_at_seven(), origin, layout, options, None)
        .await
        .unwrap();
    let view = session.start().await;

    assert_eq!(view.page, 1);
    assert!(view.total_pages >= 3);
    assert_eq!(session.metadata().title.as_deref(), Some("Long Book"));
    assert_eq!(session.surface().len(), 3);
    assert!(session.bookmarks().is_empty());
}

#[tokio::test]
async fn configured_limits_apply_on_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ereader/file/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(long_book(3, 4).build()))
        .mount(&server)
        .await;

    let config = ReaderConfig {
        security: SecurityConfig {
            max_file_count: Some(2),
            ..SecurityConfig::default()
        },
        ..ReaderConfig::default()
    };
    let origin = reqwest::Url::parse(&server.uri()).unwrap();
    let layout = EstimatedLayout::new(FrameMetrics::new(600.0, 800.0));
    let result = ReaderSession::open(
        book_at_seven(),
        origin,
        layout,
        SessionOptions::from_config(&config),
        None,
    )
    .await;

    let Err(err) = result else {
        panic!("a package with more entries than allowed should not open");
    };
    assert!(matches!(
        err,
        ReaderError::Archive(ArchiveError::Security(SecurityError::TooManyFiles { limit: 2, .. }))
    ));
    assert_eq!(err.user_message(), "The book file is damaged or unsupported.");
}
