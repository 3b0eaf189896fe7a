//! Shared fixtures for platform tests: a mock ANIO API and a refreshed
//! coordinator wired against it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;

use anio_api::{AnioApiClient, AnioAuth};
use anio_coordinator::AnioDataUpdateCoordinator;
use anio_event_bus::{EventBus, SharedEventBus};

pub(crate) const TEST_DEVICE_ID: &str = "4645a84ad7";

/// Records "METHOD path" lines for command assertions
#[derive(Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub(crate) fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"HS256"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({"sub": "1234", "exp": exp}).to_string());
    format!("{header}.{payload}.sig")
}

pub(crate) async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub(crate) fn mock_api(recorder: Recorder) -> Router {
    Router::new()
        .route(
            "/v1/auth/refresh-access-token",
            post(|State(recorder): State<Recorder>| async move {
                recorder.push("POST /v1/auth/refresh-access-token".to_string());
                Json(serde_json::json!({
                    "accessToken": make_jwt(4_102_444_800),
                    "refreshToken": "rotated-refresh",
                }))
            }),
        )
        .route(
            "/v1/device/list",
            get(|| async {
                Json(serde_json::json!([{
                    "id": TEST_DEVICE_ID,
                    "imei": "123456789012345",
                    "config": {"generation": "5", "firmwareVersion": "1.2.3"},
                    "settings": {
                        "name": "Marla",
                        "hexColor": "#ff0000",
                        "battery": 85,
                        "ringProfile": "RING_AND_VIBRATE",
                    },
                }]))
            }),
        )
        .route(
            "/v1/geofence",
            get(|| async {
                Json(serde_json::json!([{
                    "id": "fence1",
                    "name": "Home",
                    "lat": 52.52,
                    "lng": 13.405,
                    "radius": 100,
                }]))
            }),
        )
        .route(
            "/v1/activity",
            get(|| async {
                Json(serde_json::json!([{
                    "id": "act1",
                    "deviceId": TEST_DEVICE_ID,
                    "type": "MESSAGE",
                    "timestamp": "2026-01-10T10:00:00Z",
                    "data": {
                        "id": "msg1",
                        "deviceId": TEST_DEVICE_ID,
                        "sender": "WATCH",
                        "type": "TEXT",
                        "text": "pick me up",
                        "createdAt": "2026-01-10T10:00:00Z",
                    },
                }]))
            }),
        )
        .route(
            "/v1/location/:id/last",
            get(|| async {
                Json(serde_json::json!({
                    "position": [52.52, 13.405],
                    "batteryLevel": 85,
                    "signalStrength": 60,
                    "positionDeterminedBy": "GPS",
                    "date": Utc::now().to_rfc3339(),
                    "lastResponse": Utc::now().to_rfc3339(),
                    "deviceId": TEST_DEVICE_ID,
                }))
            }),
        )
        .route(
            "/v1/chat/:id",
            get(|| async {
                Json(serde_json::json!([
                    {
                        "id": "msg0",
                        "deviceId": TEST_DEVICE_ID,
                        "text": "dinner is ready",
                        "type": "TEXT",
                        "sender": "APP",
                        "isRead": true,
                        "createdAt": "2026-01-10T09:00:00Z",
                    },
                    {
                        "id": "msg1",
                        "deviceId": TEST_DEVICE_ID,
                        "text": "pick me up",
                        "type": "TEXT",
                        "sender": "WATCH",
                        "createdAt": "2026-01-10T10:00:00Z",
                    },
                ]))
            }),
        )
        .route(
            "/v1/alarm-clock/:id",
            get(|| async {
                Json(serde_json::json!([
                    {
                        "id": "alarm123",
                        "deviceId": TEST_DEVICE_ID,
                        "time": "07:30",
                        "days": ["MON", "TUE", "WED", "THU", "FRI"],
                        "enabled": true,
                        "label": "School",
                    },
                    {
                        "id": "alarm124",
                        "deviceId": TEST_DEVICE_ID,
                        "time": "06:15",
                        "days": ["SAT"],
                        "enabled": false,
                    },
                ]))
            }),
        )
        .route(
            "/v1/silence-time/:id",
            get(|| async {
                Json(serde_json::json!([{
                    "id": "silence123",
                    "deviceId": TEST_DEVICE_ID,
                    "startTime": "22:00",
                    "endTime": "07:00",
                    "days": ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"],
                    "enabled": true,
                }]))
            }),
        )
        .route(
            "/v1/device/:id/trackingMode",
            get(|| async { Json(serde_json::json!({"trackingMode": "NORMAL"})) }).put(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("PUT /v1/device/{id}/trackingMode"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/device/:id/find",
            post(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("POST /v1/device/{id}/find"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/device/:id/poweroff",
            post(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("POST /v1/device/{id}/poweroff"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/device/:id/flower",
            post(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("POST /v1/device/{id}/flower"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/device/:id/settings",
            put(
                |State(recorder): State<Recorder>,
                 Path(id): Path<String>,
                 Json(body): Json<serde_json::Value>| async move {
                    recorder.push(format!("PUT /v1/device/{id}/settings {body}"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/chat/message/text",
            post(
                |State(recorder): State<Recorder>, Json(body): Json<serde_json::Value>| async move {
                    recorder.push(format!("POST /v1/chat/message/text {body}"));
                    Json(serde_json::json!({
                        "id": "sent1",
                        "deviceId": body["deviceId"],
                        "text": body["text"],
                        "type": "TEXT",
                        "sender": "APP",
                        "createdAt": "2026-01-10T10:05:00Z",
                    }))
                },
            ),
        )
        .route(
            "/v1/chat/message/emoji",
            post(
                |State(recorder): State<Recorder>, Json(body): Json<serde_json::Value>| async move {
                    recorder.push(format!("POST /v1/chat/message/emoji {body}"));
                    Json(serde_json::json!({
                        "id": "sent2",
                        "deviceId": body["deviceId"],
                        "text": body["text"],
                        "type": "EMOJI",
                        "sender": "APP",
                        "createdAt": "2026-01-10T10:05:00Z",
                    }))
                },
            ),
        )
        .route(
            "/v1/silence-time/:id/enable",
            post(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("POST /v1/silence-time/{id}/enable"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .route(
            "/v1/silence-time/:id/disable",
            post(
                |State(recorder): State<Recorder>, Path(id): Path<String>| async move {
                    recorder.push(format!("POST /v1/silence-time/{id}/disable"));
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(recorder)
}

pub(crate) struct TestHarness {
    pub bus: SharedEventBus,
    pub coordinator: Arc<AnioDataUpdateCoordinator>,
    pub client: Arc<AnioApiClient>,
    pub recorder: Recorder,
}

/// Spin up the mock API and a coordinator that has completed one poll
pub(crate) async fn harness() -> TestHarness {
    let recorder = Recorder::default();
    let base_url = spawn(mock_api(recorder.clone())).await;

    let auth = Arc::new(
        AnioAuth::new(reqwest::Client::new())
            .with_tokens(Some(make_jwt(4_102_444_800)), Some("refresh".to_string())),
    );
    let client = Arc::new(
        AnioApiClient::new(reqwest::Client::new(), auth)
            .with_base_url(base_url)
            .with_backoff(0),
    );
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let coordinator = Arc::new(AnioDataUpdateCoordinator::new(
        client.clone(),
        bus.clone(),
        Duration::from_secs(300),
    ));
    coordinator.refresh().await.unwrap();

    TestHarness {
        bus,
        coordinator,
        client,
        recorder,
    }
}
