use bytes::Bytes;
use flate2::read::GzDecoder;
use http::{Request, Response, StatusCode, header};
use http_body_util::{BodyExt, Full};
use http_stage_middleware::{
    ApiRequest, Body, BoxError, ContentTypeLayer, GzipLayer, InMemorySettings, Locale,
    LocaleLayer, PipelineConfig, SettingsStore, SiteUrlLayer, StageError, StageLayer,
    StaticCatalog, current_locale,
};
use std::convert::Infallible;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::{Layer, ServiceExt, service_fn};

async fn text_handler(_req: Request<Body>) -> Result<Response<Body>, Infallible> {
    Ok(Response::new(Body::from("x".repeat(250))))
}

async fn collect(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn gunzip(data: &[u8]) -> String {
    let mut decoded = String::new();
    GzDecoder::new(data).read_to_string(&mut decoded).unwrap();
    decoded
}

fn request(uri: &str, headers: &[(header::HeaderName, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

fn catalog(default: &str, available: &[&str]) -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new(
        Locale::parse(default).unwrap(),
        available.iter().map(|t| Locale::parse(t).unwrap()),
    ))
}

// ----- content type -----

#[tokio::test]
async fn content_type_text_plain_for_api_text() {
    let service = ContentTypeLayer::new().layer(service_fn(text_handler));
    let response = service.oneshot(request("/api/card/1", &[])).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
}

#[tokio::test]
async fn content_type_json_for_api_bytes() {
    let service = ContentTypeLayer::new().layer(service_fn(|_req: Request<Body>| async {
        Ok::<_, Infallible>(Response::new(Body::from(Bytes::from_static(b"{\"id\":1}"))))
    }));
    let response = service.oneshot(request("/api/card/1", &[])).await.unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json; charset=utf-8"
    );
}

#[tokio::test]
async fn content_type_marker_extension_counts_as_api() {
    let service = ContentTypeLayer::new().layer(service_fn(text_handler));
    let mut req = request("/embed/card", &[]);
    req.extensions_mut().insert(ApiRequest);
    let response = service.oneshot(req).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
}

#[tokio::test]
async fn content_type_left_alone_for_static_assets() {
    let service = ContentTypeLayer::new().layer(service_fn(text_handler));
    let response = service.oneshot(request("/app/main.js", &[])).await.unwrap();
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn content_type_existing_header_unchanged() {
    let service = ContentTypeLayer::new().layer(service_fn(|_req: Request<Body>| async {
        let response = Response::builder()
            .header(header::CONTENT_TYPE, "text/csv")
            .header("x-extra", "1")
            .body(Body::from("a,b\n1,2\n"))
            .unwrap();
        Ok::<_, Infallible>(response)
    }));
    let response = service.oneshot(request("/api/dataset", &[])).await.unwrap();
    assert_eq!(response.headers().len(), 2);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(collect(response).await, Bytes::from("a,b\n1,2\n"));
}

#[tokio::test]
async fn content_type_custom_prefix() {
    let service = ContentTypeLayer::new()
        .api_prefix("/rest")
        .layer(service_fn(text_handler));
    let response = service.oneshot(request("/rest/x", &[])).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
}

// ----- site url -----

/// Store that records writes and can be told to fail them.
#[derive(Default)]
struct RecordingStore {
    uninitialized: bool,
    fail_writes: bool,
    site_url: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl SettingsStore for RecordingStore {
    fn is_initialized(&self) -> bool {
        !self.uninitialized
    }

    fn site_url(&self) -> Option<String> {
        self.site_url.lock().unwrap().clone()
    }

    fn set_site_url(&self, url: &str) -> Result<(), BoxError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err("settings table is read-only".into());
        }
        *self.site_url.lock().unwrap() = Some(url.to_owned());
        Ok(())
    }
}

#[tokio::test]
async fn site_url_not_written_when_store_uninitialized() {
    let store = Arc::new(RecordingStore {
        uninitialized: true,
        ..Default::default()
    });
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));
    let req = request(
        "/",
        &[(header::ORIGIN, "https://example.com"), (header::HOST, "example.com")],
    );
    service.oneshot(req).await.unwrap();

    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.site_url(), None);
}

#[tokio::test]
async fn site_url_seeded_from_origin() {
    let store = Arc::new(InMemorySettings::new());
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));
    let req = request("/", &[(header::ORIGIN, "https://example.com")]);
    service.oneshot(req).await.unwrap();

    assert_eq!(store.site_url().as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn site_url_seeded_from_host() {
    let store = Arc::new(InMemorySettings::new());
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));
    service
        .oneshot(request("/", &[(header::HOST, "localhost:3000")]))
        .await
        .unwrap();

    assert_eq!(store.site_url().as_deref(), Some("http://localhost:3000"));
}

#[tokio::test]
async fn site_url_never_overwritten() {
    let store = Arc::new(RecordingStore {
        site_url: Mutex::new(Some("https://x".to_owned())),
        ..Default::default()
    });
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));

    for origin in ["https://other.example", "https://third.example"] {
        service
            .clone()
            .oneshot(request("/", &[(header::ORIGIN, origin)]))
            .await
            .unwrap();
    }

    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.site_url().as_deref(), Some("https://x"));
}

#[tokio::test]
async fn site_url_written_once_across_requests() {
    let store = Arc::new(RecordingStore::default());
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));

    for origin in ["https://first.example", "https://second.example"] {
        service
            .clone()
            .oneshot(request("/", &[(header::ORIGIN, origin)]))
            .await
            .unwrap();
    }

    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.site_url().as_deref(), Some("https://first.example"));
}

#[tokio::test]
async fn site_url_without_candidate_does_nothing() {
    let store = Arc::new(RecordingStore::default());
    let service = SiteUrlLayer::new(store.clone()).layer(service_fn(text_handler));
    let response = service.oneshot(request("/", &[])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn site_url_write_failure_is_surfaced() {
    let store = Arc::new(RecordingStore {
        fail_writes: true,
        ..Default::default()
    });
    let called = Arc::new(AtomicUsize::new(0));
    let handler_calls = called.clone();
    let service = SiteUrlLayer::new(store).layer(service_fn(move |_req: Request<Body>| {
        handler_calls.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, Infallible>(Response::new(Body::empty())) }
    }));

    let err = service
        .oneshot(request("/", &[(header::ORIGIN, "https://example.com")]))
        .await
        .unwrap_err();

    let err = err.downcast::<StageError>().unwrap();
    assert!(matches!(*err, StageError::PersistSiteUrl { ref url, .. } if url == "https://example.com"));
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

// ----- locale -----

async fn locale_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Yield so that concurrent requests interleave before the locale is read.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let bound = current_locale().map(|l| l.to_string()).unwrap_or_default();
    let extension = req
        .extensions()
        .get::<Locale>()
        .map(|l| l.to_string())
        .unwrap_or_default();
    Ok(Response::new(Body::from(format!("{bound}|{extension}"))))
}

#[tokio::test]
async fn locale_negotiated_from_header() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));
    let response = service
        .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "fr-FR,en;q=0.5")]))
        .await
        .unwrap();
    assert_eq!(collect(response).await, Bytes::from("fr|fr"));
}

#[tokio::test]
async fn locale_negotiated_across_repeated_header_lines() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));
    let req = request(
        "/",
        &[
            (header::ACCEPT_LANGUAGE, "de"),
            (header::ACCEPT_LANGUAGE, "fr;q=0.9"),
        ],
    );
    let response = service.oneshot(req).await.unwrap();
    assert_eq!(collect(response).await, Bytes::from("fr|fr"));
}

#[tokio::test]
async fn locale_default_without_header() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));
    let response = service.oneshot(request("/", &[])).await.unwrap();
    assert_eq!(collect(response).await, Bytes::from("en|en"));
}

#[tokio::test]
async fn locale_default_for_malformed_header() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));
    let response = service
        .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "fr;q=banana")]))
        .await
        .unwrap();
    assert_eq!(collect(response).await, Bytes::from("en|en"));
}

#[tokio::test]
async fn locale_visible_in_synchronous_call() {
    let service = LocaleLayer::new(catalog("en", &["en", "de"])).layer(service_fn(
        |_req: Request<Body>| {
            // Read before the future is created.
            let seen = current_locale().map(|l| l.to_string()).unwrap_or_default();
            async move { Ok::<_, Infallible>(Response::new(Body::from(seen))) }
        },
    ));
    let response = service
        .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "de")]))
        .await
        .unwrap();
    assert_eq!(collect(response).await, Bytes::from("de"));
}

#[tokio::test]
async fn locale_not_leaked_after_request() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));
    service
        .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "fr")]))
        .await
        .unwrap();
    assert_eq!(current_locale(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn locale_isolated_between_concurrent_requests() {
    let layer = LocaleLayer::new(catalog("en", &["en", "fr", "de", "ja"]));
    let service = layer.layer(service_fn(locale_handler));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        for tag in ["fr", "de", "ja", "en"] {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let response = service
                    .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, tag)]))
                    .await
                    .unwrap();
                (tag, collect(response).await)
            }));
        }
    }

    for task in tasks {
        let (tag, body) = task.await.unwrap();
        assert_eq!(body, Bytes::from(format!("{tag}|{tag}")));
    }
}

#[tokio::test]
async fn locale_isolated_between_interleaved_futures_on_one_task() {
    let service = LocaleLayer::new(catalog("en", &["en", "fr"])).layer(service_fn(locale_handler));

    let french = service
        .clone()
        .oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "fr")]));
    let english = service.oneshot(request("/", &[(header::ACCEPT_LANGUAGE, "en")]));
    let (french, english) = futures_util::future::join(french, english).await;

    assert_eq!(collect(french.unwrap()).await, Bytes::from("fr|fr"));
    assert_eq!(collect(english.unwrap()).await, Bytes::from("en|en"));
}

// ----- gzip -----

fn gzip_request(accept_encoding: &str) -> Request<Body> {
    request("/", &[(header::ACCEPT_ENCODING, accept_encoding)])
}

#[tokio::test]
async fn gzip_compresses_long_text() {
    let service = GzipLayer::new().layer(service_fn(text_handler));
    let response = service.oneshot(gzip_request("gzip")).await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    let length: usize = response.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let body = collect(response).await;
    assert_eq!(body.len(), length);
    assert_eq!(gunzip(&body), "x".repeat(250));
}

#[tokio::test]
async fn gzip_accepted_from_later_header_line() {
    let service = GzipLayer::new().layer(service_fn(text_handler));
    let req = request(
        "/",
        &[
            (header::ACCEPT_ENCODING, "br"),
            (header::ACCEPT_ENCODING, "gzip"),
        ],
    );
    let response = service.oneshot(req).await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(gunzip(&collect(response).await), "x".repeat(250));
}

#[tokio::test]
async fn gzip_refused_by_zero_quality() {
    let service = GzipLayer::new().layer(service_fn(text_handler));
    let response = service.oneshot(gzip_request("gzip;q=0")).await.unwrap();

    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(collect(response).await, Bytes::from("x".repeat(250)));
}

#[tokio::test]
async fn gzip_accepted_with_fractional_quality() {
    let service = GzipLayer::new().layer(service_fn(text_handler));
    let response = service.oneshot(gzip_request("gzip;q=0.5")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn gzip_skips_non_200() {
    let service = GzipLayer::new().layer(service_fn(|_req: Request<Body>| async {
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("y".repeat(500)))
            .unwrap();
        Ok::<_, Infallible>(response)
    }));
    let response = service.oneshot(gzip_request("gzip, *")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
}

#[tokio::test]
async fn gzip_never_recompresses() {
    let service = GzipLayer::new().layer(service_fn(|_req: Request<Body>| async {
        let response = Response::builder()
            .header(header::CONTENT_ENCODING, "br")
            .body(Body::from("z".repeat(500)))
            .unwrap();
        Ok::<_, Infallible>(response)
    }));
    let response = service.oneshot(gzip_request("gzip")).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    assert_eq!(collect(response).await, Bytes::from("z".repeat(500)));
}

#[tokio::test]
async fn gzip_skips_short_text() {
    let service = GzipLayer::new().layer(service_fn(|_req: Request<Body>| async {
        Ok::<_, Infallible>(Response::new(Body::from("s".repeat(50))))
    }));
    let response = service.oneshot(gzip_request("gzip")).await.unwrap();
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
}

#[tokio::test]
async fn gzip_streams_body() {
    let service = GzipLayer::new().layer(service_fn(|_req: Request<Body>| async {
        let stream = Body::from_stream(Full::new(Bytes::from("streamed rows\n")));
        Ok::<_, Infallible>(Response::new(stream))
    }));
    let response = service.oneshot(gzip_request("deflate, gzip")).await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    assert_eq!(gunzip(&collect(response).await), "streamed rows\n");
}

#[tokio::test]
async fn gzip_propagates_handler_errors() {
    let service = GzipLayer::new().layer(service_fn(|_req: Request<Body>| async {
        Err::<Response<Body>, _>(std::io::Error::other("boom"))
    }));
    let err = service.oneshot(gzip_request("gzip")).await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

// ----- pipeline -----

#[tokio::test]
async fn pipeline_applies_all_stages() {
    let config = PipelineConfig::from_toml_str(
        r#"
gzip_min_text_len = 100
default_locale = "en"
available_locales = ["en", "fr"]
"#,
    )
    .unwrap();
    let store = Arc::new(InMemorySettings::new());
    let layer = StageLayer::new(&config, store.clone()).unwrap();

    let service = layer.layer(service_fn(|_req: Request<Body>| async {
        let locale = current_locale().unwrap();
        Ok::<_, Infallible>(Response::new(Body::from(format!("{locale} ").repeat(60))))
    }));

    let req = request(
        "/api/session/properties",
        &[
            (header::ORIGIN, "https://bi.example.com"),
            (header::ACCEPT_LANGUAGE, "fr-CA, en;q=0.8"),
            (header::ACCEPT_ENCODING, "gzip, deflate"),
        ],
    );
    let response = service.oneshot(req).await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(gunzip(&collect(response).await), "fr ".repeat(60));
    assert_eq!(store.site_url().as_deref(), Some("https://bi.example.com"));
}

#[tokio::test]
async fn pipeline_propagates_handler_errors_as_boxed() {
    let layer =
        StageLayer::new(&PipelineConfig::default(), Arc::new(InMemorySettings::new())).unwrap();
    let service = layer.layer(service_fn(|_req: Request<Body>| async {
        Err::<Response<Body>, _>(std::io::Error::other("handler failed"))
    }));

    let err = service.oneshot(request("/api/x", &[])).await.unwrap_err();
    assert!(err.downcast_ref::<std::io::Error>().is_some());
}
