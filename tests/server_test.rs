//! Integration tests for the odometer HTTP server and gateway client

#[cfg(feature = "server")]
mod server_tests {
    use pretty_assertions::assert_eq;
    use scroll_odometer::core::{DeltaExtractor, ExtractorConfig};
    use scroll_odometer::gateway::{GatewayClient, GatewayConfig, GatewayError};
    use scroll_odometer::server::{run, ServerConfig};
    use scroll_odometer::transparency::create_shared_log;
    use scroll_odometer::{
        DistanceSample, FixedClock, Ledger, MemoryStore, ScrollService, SharedClock,
    };
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn service_at(day: &str) -> ScrollService {
        let clock: SharedClock = Arc::new(FixedClock::at_day(day.parse().unwrap()));
        let ledger = Arc::new(Ledger::new(MemoryStore::new(), clock.clone()));
        let extractor = DeltaExtractor::new(ExtractorConfig::default(), clock);
        ScrollService::new(extractor, ledger, create_shared_log())
    }

    async fn start(day: &str) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
        let (addr, shutdown_tx) = run(ServerConfig::new(0), service_at(day))
            .await
            .expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    fn scroll(y: i32) -> serde_json::Value {
        json!({
            "type": "scroll",
            "window_id": 7,
            "scroll_y": y,
            "app_id": "com.example.reader",
            "display": {"xdpi": 254.0, "ydpi": 254.0, "density_dpi": 254.0, "density_scale": 1.0}
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start("2025-1-1").await;

        let response = reqwest::get(format!("http://{}/health", addr))
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_event_ingest_updates_totals() {
        let (addr, shutdown_tx) = start("2025-1-1").await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/events", addr))
            .json(&json!([scroll(0), scroll(254), {"type": "window_change"}, scroll(1000)]))
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["events"], 4);
        // The window change drops offset memory, so the last scroll measures nothing.
        assert_eq!(body["samples"], 1);
        assert_eq!(body["persist_failures"], 0);

        let totals: serde_json::Value = client
            .get(format!("http://{}/totals", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(totals["daily_scrolls"], 1);
        assert_eq!(totals["lifetime_scrolls"], 1);
        assert_eq!(totals["last_date_key"], "2025-1-1");
        let daily = totals["daily_distance"].as_f64().unwrap();
        assert!((daily - 0.0254).abs() < 1e-9);

        let board: serde_json::Value = client
            .get(format!("http://{}/leaderboard", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(board[0]["app_id"], "com.example.reader");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_restore_and_weekly() {
        let (addr, shutdown_tx) = start("2025-1-3").await;
        let client = reqwest::Client::new();

        let response = client
            .put(format!("http://{}/totals", addr))
            .json(&json!({
                "daily_distance": 12.5,
                "daily_scrolls": 40,
                "lifetime_distance": 300.0,
                "lifetime_scrolls": 900,
                "date_key": "2025-1-2"
            }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let totals: serde_json::Value = client
            .get(format!("http://{}/totals", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(totals["daily_distance"], 12.5);
        assert_eq!(totals["lifetime_scrolls"], 900);
        assert_eq!(totals["last_date_key"], "2025-1-2");

        let week: Vec<serde_json::Value> = client
            .get(format!("http://{}/weekly?start=2025-1-1", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0]["day"], "2025-1-1");
        assert_eq!(week[0]["distance"], 0.0);
        assert_eq!(week[1]["day"], "2025-1-2");
        assert_eq!(week[1]["distance"], 12.5);
        assert_eq!(week[1]["scrolls"], 40);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (addr, shutdown_tx) = start("2025-1-1").await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("http://{}/weekly?start=yesterday", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_DATE");

        let response = client
            .put(format!("http://{}/totals", addr))
            .json(&json!({
                "daily_distance": -1.0,
                "daily_scrolls": 0,
                "lifetime_distance": 0.0,
                "lifetime_scrolls": 0
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_app_saves_and_weekly_leaderboard() {
        let (addr, shutdown_tx) = start("2025-1-1").await;
        let client = reqwest::Client::new();

        for (app, distance, date) in [
            ("com.a", 1.5, "2025-1-1"),
            ("com.b", 1.0, "2025-1-2"),
            ("com.b", 1.0, "2025-1-4"),
            ("com.c", 0.0, "2025-1-2"),
        ] {
            let body: serde_json::Value = client
                .post(format!("http://{}/apps", addr))
                .json(&json!({"app_id": app, "distance": distance, "date_key": date}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(body["saved"], distance > 0.0);
        }

        let board: Vec<serde_json::Value> = client
            .get(format!("http://{}/leaderboard?week_start=2025-1-1", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0]["app_id"], "com.b");
        assert_eq!(board[0]["distance"], 2.0);
        assert_eq!(board[1]["app_id"], "com.a");

        let today: Vec<serde_json::Value> = client
            .get(format!("http://{}/leaderboard", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0]["app_id"], "com.a");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start("2025-1-1").await;

        let client = reqwest::Client::new();
        let response = client
            .request(reqwest::Method::OPTIONS, format!("http://{}/totals", addr))
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "PUT")
            .send()
            .await
            .expect("Failed to send request");

        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }

    /// Minimal stand-in for the presentation gateway.
    async fn mock_gateway(
        accept: bool,
    ) -> (SocketAddr, Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>) {
        use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};

        type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route(
                "/v1/samples",
                post(
                    move |State(seen): State<Seen>,
                          headers: HeaderMap,
                          Json(body): Json<serde_json::Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((auth, body));
                        if accept {
                            StatusCode::OK
                        } else {
                            StatusCode::UNAUTHORIZED
                        }
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, seen)
    }

    #[tokio::test]
    async fn test_gateway_client_pushes_samples() {
        let (addr, seen) = mock_gateway(true).await;
        let client =
            GatewayClient::new(GatewayConfig::new("127.0.0.1", addr.port(), "secret")).unwrap();

        let sample = DistanceSample::new(0.75, 1_700_000_000_000, "com.example", true);
        client.push_sample(&sample).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(seen[0].1["distance"], 0.75);
        assert_eq!(seen[0].1["app_id"], "com.example");
        assert_eq!(seen[0].1["device_id"], client.device_id());
    }

    #[tokio::test]
    async fn test_gateway_client_reports_rejection() {
        let (addr, _seen) = mock_gateway(false).await;
        let client =
            GatewayClient::new(GatewayConfig::new("127.0.0.1", addr.port(), "wrong")).unwrap();

        let sample = DistanceSample::new(0.1, 0, "test", false);
        let result = client.push_sample(&sample).await;
        assert!(matches!(
            result,
            Err(GatewayError::Server { status: 401, .. })
        ));
    }
}
