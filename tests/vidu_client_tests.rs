#![cfg(feature = "api")]

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vidu_animator::{
    AspectRatio, Config, ConfigBuilder, JobId, PollError, ProviderStatus, Resolution, SubmitError,
    UploadedAsset, ViduClient, VideoJobRequest, VideoProvider,
};

const ID: &str = "abc123abc123abc123abc123";

#[derive(Clone, Default)]
struct Recorded {
    fields: Arc<Mutex<HashMap<String, String>>>,
    auth: Arc<Mutex<Option<String>>>,
}

async fn create_video(State(recorded): State<Recorded>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    *recorded.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut prompt = String::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let value = match file_name {
            Some(file_name) => format!("{}|{}", file_name, content_type),
            None => field.text().await.unwrap(),
        };
        if name == "prompt" {
            prompt = value.clone();
        }
        recorded.fields.lock().unwrap().insert(name, value);
    }

    match prompt.as_str() {
        "reject" => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "Prompt violates policy"})),
        )
            .into_response(),
        "garbage" => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        "noid" => Json(serde_json::json!({"status": "queued"})).into_response(),
        _ => Json(serde_json::json!({"videoId": ID})).into_response(),
    }
}

async fn video_status(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "processing00000000000000" => {
            Json(serde_json::json!({"status": "processing", "progress": 42})).into_response()
        }
        "completed000000000000000" => Json(serde_json::json!({
            "status": "completed",
            "videoUrl": "https://cdn.example.com/v.mp4"
        }))
        .into_response(),
        "slow00000000000000000000" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(serde_json::json!({"status": "processing"})).into_response()
        }
        "notjson00000000000000000" => (StatusCode::OK, "not json").into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": "Video not found"})),
        )
            .into_response(),
    }
}

async fn start_mock_provider() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/v1/videos", post(create_video))
        .route("/v1/videos/:id", get(video_status))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorded)
}

fn client(base_url: &str) -> ViduClient {
    let config: Config = ConfigBuilder::new()
        .with_base_url(base_url)
        .with_api_key("test-key")
        .with_status_timeout(1)
        .build();
    ViduClient::new(&config).unwrap()
}

fn request(prompt: &str) -> VideoJobRequest {
    VideoJobRequest::new(prompt)
        .with_primary_image(UploadedAsset::new("cat.png", "image/png", vec![1, 2, 3]))
        .with_background_image(UploadedAsset::new("park.jpg", "image/jpeg", vec![4, 5, 6]))
        .with_aspect_ratio(AspectRatio::Vertical)
        .with_resolution(Resolution::P360)
}

#[tokio::test]
async fn test_create_sends_multipart_form() {
    let (base_url, recorded) = start_mock_provider().await;
    let id = client(&base_url).create_job(request("A dancing cat")).await.unwrap();
    assert_eq!(id, ID);

    let fields = recorded.fields.lock().unwrap().clone();
    assert_eq!(fields["mainCharacter"], "cat.png|image/png");
    assert_eq!(fields["background"], "park.jpg|image/jpeg");
    assert!(!fields.contains_key("optionalImage"));
    assert_eq!(fields["prompt"], "A dancing cat");
    assert_eq!(fields["aspectRatio"], "9:16");
    assert_eq!(fields["resolution"], "360p");
    assert_eq!(fields["duration"], "4");
    assert_eq!(fields["model"], "vidu-2.0");
    assert_eq!(recorded.auth.lock().unwrap().as_deref(), Some("Bearer test-key"));
}

#[tokio::test]
async fn test_create_rejection_uses_body_message() {
    let (base_url, _) = start_mock_provider().await;
    let err = client(&base_url).create_job(request("reject")).await.unwrap_err();

    match err {
        SubmitError::Provider { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Prompt violates policy");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_rejection_without_json_uses_generic_message() {
    let (base_url, _) = start_mock_provider().await;
    let err = client(&base_url).create_job(request("garbage")).await.unwrap_err();

    match err {
        SubmitError::Provider { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, vidu_animator::error::GENERIC_SUBMIT_FAILURE);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_without_id_is_malformed() {
    let (base_url, _) = start_mock_provider().await;
    let err = client(&base_url).create_job(request("noid")).await.unwrap_err();
    assert!(matches!(err, SubmitError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_status_reports() {
    let (base_url, _) = start_mock_provider().await;
    let client = client(&base_url);

    let report = client
        .check_status(&JobId::parse("processing00000000000000").unwrap())
        .await
        .unwrap();
    assert_eq!(report.status, ProviderStatus::Processing);
    assert_eq!(report.progress, Some(42.0));

    let report = client
        .check_status(&JobId::parse("completed000000000000000").unwrap())
        .await
        .unwrap();
    assert_eq!(report.status, ProviderStatus::Completed);
    assert_eq!(report.video_url.as_deref(), Some("https://cdn.example.com/v.mp4"));
}

#[tokio::test]
async fn test_status_failures() {
    let (base_url, _) = start_mock_provider().await;
    let client = client(&base_url);

    let err = client
        .check_status(&JobId::parse("missing00000000000000000").unwrap())
        .await
        .unwrap_err();
    match err {
        PollError::Provider { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Video not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = client
        .check_status(&JobId::parse("notjson00000000000000000").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_status_timeout() {
    let (base_url, _) = start_mock_provider().await;
    let err = client(&base_url)
        .check_status(&JobId::parse("slow00000000000000000000").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Timeout(_)));
}

#[tokio::test]
async fn test_unreachable_provider_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr))
        .check_status(&JobId::parse(ID).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Transport(_)));
}
