//! Integration tests for the track resolver: retry behavior, terminal
//! error classification, and manifest caching.

use bridge_traits::{
    AccessTokenProvider, DownloadObserver, HttpClient, RetryPolicy, TransportError,
};
use bytes::Bytes;
use core_catalog::{shared, BrokenReason, CatalogError, Record, RecordId, TrackResolver};
use mockall::mock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

mock! {
    Http {}

    #[async_trait::async_trait]
    impl HttpClient for Http {
        async fn get(&self, url: Url) -> std::result::Result<Bytes, TransportError>;
        async fn download_file(
            &self,
            url: Url,
            destination: PathBuf,
            observer: Arc<dyn DownloadObserver>,
            cancel: CancellationToken,
        ) -> bridge_traits::error::Result<()>;
    }
}

/// Token provider that counts how many tokens were generated.
struct CountingTokens(AtomicU32);

impl CountingTokens {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU32::new(0)))
    }

    fn issued(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

impl AccessTokenProvider for CountingTokens {
    fn generate_token(&self) -> String {
        let n = self.0.fetch_add(1, Ordering::SeqCst);
        format!("tok-{n}")
    }
}

fn manifest_payload(urls: &[&str]) -> Bytes {
    let entries: Vec<serde_json::Value> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            serde_json::json!({
                "id": i + 1,
                "bitrate": "168kbps",
                "channels": "Stereo",
                "mode": "VBR",
                "size": 11141120,
                "url": url,
            })
        })
        .collect();
    Bytes::from(serde_json::to_vec(&entries).unwrap())
}

fn record() -> core_catalog::SharedRecord {
    shared(Record::new(RecordId::new(42), "Author", "Title", None, ""))
}

fn resolver(http: MockHttp, tokens: Arc<CountingTokens>) -> TrackResolver {
    TrackResolver::new(
        Arc::new(http),
        tokens,
        "http://core.mds.example/api/v1.0/mds/records",
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_secs(1),
        },
    )
}

#[tokio::test]
async fn resolves_first_playable_track_past_non_http_entries() {
    let mut http = MockHttp::new();
    http.expect_get().times(1).returning(|_| {
        Ok(manifest_payload(&[
            "ftp://mds.example/a.mp3",
            "rtsp://mds.example/b.mp3",
            "http://x/y.mp3",
            "http://x/z.mp3",
        ]))
    });

    let rec = record();
    let track = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap();

    assert_eq!(track.url.as_str(), "http://x/y.mp3");
    assert_eq!(rec.read().tracks().unwrap().len(), 4);
}

#[tokio::test]
async fn second_resolve_answers_from_cache_without_network() {
    let mut http = MockHttp::new();
    // Exactly one fetch across both resolve calls.
    http.expect_get()
        .times(1)
        .returning(|_| Ok(manifest_payload(&["http://x/y.mp3"])));

    let rec = record();
    let resolver = resolver(http, CountingTokens::new());

    let first = resolver.resolve(&rec).await.unwrap();
    let second = resolver.resolve(&rec).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let mut seq = mockall::Sequence::new();
    let mut http = MockHttp::new();
    http.expect_get()
        .times(3)
        .in_sequence(&mut seq)
        .returning(|_| Err(TransportError::Unreachable("dns".to_string())));
    http.expect_get()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(manifest_payload(&["http://x/y.mp3"])));

    let tokens = CountingTokens::new();
    let rec = record();
    let track = resolver(http, tokens.clone()).resolve(&rec).await.unwrap();

    assert_eq!(track.url.as_str(), "http://x/y.mp3");
    // A fresh token per attempt.
    assert_eq!(tokens.issued(), 4);
    assert!(!rec.read().is_broken());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_one_terminal_transport_error() {
    let mut http = MockHttp::new();
    // Initial attempt plus three retries, nothing more.
    http.expect_get()
        .times(4)
        .returning(|_| Err(TransportError::NoResponse));

    let rec = record();
    let err = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Transport(TransportError::NoResponse)
    ));
    // A failed fetch is not a broken record; a later resolve may retry.
    let rec = rec.read();
    assert!(!rec.is_broken());
    assert!(!rec.is_resolving());
}

#[tokio::test]
async fn parse_failure_is_terminal_without_retry() {
    let mut http = MockHttp::new();
    http.expect_get()
        .times(1)
        .returning(|_| Ok(Bytes::from_static(b"<html>not json</html>")));

    let rec = record();
    let err = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::MalformedManifest(_)));
    assert_eq!(
        rec.read().broken_reason(),
        Some(&BrokenReason::MalformedManifest)
    );
}

#[tokio::test]
async fn empty_manifest_marks_record_broken_without_retry() {
    let mut http = MockHttp::new();
    http.expect_get()
        .times(1)
        .returning(|_| Ok(Bytes::from_static(b"[]")));

    let rec = record();
    let resolver = resolver(http, CountingTokens::new());

    let err = resolver.resolve(&rec).await.unwrap_err();
    assert!(matches!(err, CatalogError::EmptyManifest));
    assert_eq!(rec.read().broken_reason(), Some(&BrokenReason::EmptyManifest));

    // Broken is terminal: the next resolve fails fast, no network call.
    let err = resolver.resolve(&rec).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::RecordBroken(BrokenReason::EmptyManifest)
    ));
}

#[tokio::test]
async fn manifest_without_playable_track_is_distinct_from_fetch_failure() {
    let mut http = MockHttp::new();
    http.expect_get()
        .times(1)
        .returning(|_| Ok(manifest_payload(&["ftp://mds.example/a.mp3"])));

    let rec = record();
    let err = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::NoPlayableTrack));
    assert_eq!(
        rec.read().broken_reason(),
        Some(&BrokenReason::NoPlayableTrack)
    );
}

#[tokio::test]
async fn cancellation_aborts_silently_without_marking_broken() {
    let mut http = MockHttp::new();
    http.expect_get()
        .times(1)
        .returning(|_| Err(TransportError::Cancelled));

    let rec = record();
    let err = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    let rec = rec.read();
    assert!(!rec.is_broken());
    assert!(!rec.is_resolving());
}

#[tokio::test]
async fn concurrent_resolution_is_rejected() {
    let http = MockHttp::new();

    let rec = record();
    rec.write().set_resolving();

    let err = resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::ResolveInFlight));
}

#[tokio::test]
async fn requested_manifest_url_is_authenticated() {
    let mut http = MockHttp::new();
    http.expect_get()
        .withf(|url: &Url| {
            url.path() == "/api/v1.0/mds/records/42/tracks/"
                && url.query() == Some("access-token=tok-0")
        })
        .times(1)
        .returning(|_| Ok(manifest_payload(&["http://x/y.mp3"])));

    let rec = record();
    resolver(http, CountingTokens::new())
        .resolve(&rec)
        .await
        .unwrap();
}
