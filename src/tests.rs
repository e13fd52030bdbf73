mod handler_tests {
    use crate::capture::{Screenshot, Screenshotter};
    use crate::error::CaptureError;
    use crate::server::{build_router, AppState};
    use crate::Config;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Stand-in for the browser-backed service so the handler contract can
    /// be exercised without Chromium.
    struct StubScreenshotter {
        response: Result<Vec<u8>, CaptureError>,
        hold: Option<Duration>,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubScreenshotter {
        fn succeeding() -> Self {
            let mut bytes = PNG_SIGNATURE.to_vec();
            bytes.extend_from_slice(&[0u8; 64]);
            Self::with_response(Ok(bytes))
        }

        fn failing(error: CaptureError) -> Self {
            Self::with_response(Err(error))
        }

        fn with_response(response: Result<Vec<u8>, CaptureError>) -> Self {
            Self {
                response,
                hold: None,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn holding(mut self, hold: Duration) -> Self {
            self.hold = Some(hold);
            self
        }
    }

    #[async_trait]
    impl Screenshotter for StubScreenshotter {
        async fn screenshot(&self, _target_url: &str) -> Result<Screenshot, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);

            if let Some(hold) = self.hold {
                tokio::time::sleep(hold).await;
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.response
                .clone()
                .map(|bytes| Screenshot { bytes })
        }
    }

    fn test_router(stub: Arc<StubScreenshotter>, config: &Config) -> Router {
        let service: Arc<dyn Screenshotter> = stub;
        let state = Arc::new(AppState::new(service, config, None));
        build_router(state, config)
    }

    fn screenshot_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/screenshot")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected_without_a_session() {
        let stub = Arc::new(StubScreenshotter::succeeding());
        let router = test_router(stub.clone(), &Config::default());

        let response = router.oneshot(screenshot_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "URL is required");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_url_is_rejected_without_a_session() {
        let stub = Arc::new(StubScreenshotter::succeeding());
        let router = test_router(stub.clone(), &Config::default());

        let response = router
            .oneshot(screenshot_request(r#"{"url": "   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_capture_returns_png_attachment() {
        let stub = Arc::new(StubScreenshotter::succeeding());
        let router = test_router(stub, &Config::default());

        let response = router
            .oneshot(screenshot_request(r#"{"url": "https://example.com"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"screenshot.png\""
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
    }

    #[tokio::test]
    async fn test_navigate_failure_maps_to_500_with_details() {
        let stub = Arc::new(StubScreenshotter::failing(CaptureError::Navigate(
            "net::ERR_NAME_NOT_RESOLVED".into(),
        )));
        let router = test_router(stub, &Config::default());

        let response = router
            .oneshot(screenshot_request(
                r#"{"url": "http://nonexistent.invalid"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to take screenshot");
        let details = body["details"].as_str().unwrap();
        assert!(!details.is_empty());
        assert!(details.contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    async fn test_launch_failure_details_are_redacted() {
        let stub = Arc::new(StubScreenshotter::failing(CaptureError::Launch(
            "could not spawn /opt/chrome/chrome: permission denied".into(),
        )));
        let router = test_router(stub, &Config::default());

        let response = router
            .oneshot(screenshot_request(r#"{"url": "https://example.com"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        let details = body["details"].as_str().unwrap();
        assert!(!details.contains("/opt/chrome"));
        assert_eq!(details, "browser failed to start");
    }

    #[test]
    fn test_health_is_browser_independent() {
        tokio_test::block_on(async {
            // Even a service that can never launch a browser reports healthy.
            let stub = Arc::new(StubScreenshotter::failing(CaptureError::Launch(
                "no executable".into(),
            )));
            let router = test_router(stub, &Config::default());

            let response = router
                .oneshot(
                    Request::builder()
                        .uri("/health")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            assert_eq!(body["status"], "OK");
            assert!(!body["message"].as_str().unwrap().is_empty());
        });
    }

    #[tokio::test]
    async fn test_requests_beyond_cap_are_rejected() {
        let config = Config {
            max_concurrent_captures: 1,
            queue_wait: Duration::from_millis(100),
            ..Default::default()
        };
        let stub = Arc::new(StubScreenshotter::succeeding().holding(Duration::from_millis(500)));
        let router = test_router(stub, &config);

        let (first, second) = tokio::join!(
            router
                .clone()
                .oneshot(screenshot_request(r#"{"url": "https://example.com/a"}"#)),
            router
                .clone()
                .oneshot(screenshot_request(r#"{"url": "https://example.com/b"}"#)),
        );

        let mut statuses = [first.unwrap().status(), second.unwrap().status()];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_concurrent_captures_never_exceed_cap() {
        let config = Config {
            max_concurrent_captures: 2,
            queue_wait: Duration::from_secs(5),
            ..Default::default()
        };
        let stub = Arc::new(StubScreenshotter::succeeding().holding(Duration::from_millis(200)));
        let router = test_router(stub.clone(), &config);

        let requests = (0..6).map(|i| {
            let router = router.clone();
            async move {
                router
                    .oneshot(screenshot_request(&format!(
                        r#"{{"url": "https://example.com/{i}"}}"#
                    )))
                    .await
                    .unwrap()
            }
        });
        let responses = futures::future::join_all(requests).await;

        for response in responses {
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 6);
        assert!(stub.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_requests_are_independent() {
        let stub = Arc::new(StubScreenshotter::succeeding());
        let router = test_router(stub.clone(), &Config::default());

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(screenshot_request(r#"{"url": "https://example.com"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_landing_page_is_served_with_cache_headers() {
        let stub = Arc::new(StubScreenshotter::succeeding());
        let router = test_router(stub, &Config::default());

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=300, s-maxage=600"
        );
    }
}
