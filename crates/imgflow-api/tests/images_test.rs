//! Image API integration tests.
//!
//! Run with: `cargo test -p imgflow-api --test images_test`

mod helpers;

use axum::http::StatusCode;
use image::GenericImageView;
use imgflow_core::{ArtifactStatus, Stage, StageStatus};
use imgflow_db::{ArtifactQueue, ArtifactStore};
use serde_json::Value;
use uuid::Uuid;

use helpers::{fixtures, setup_test_app, setup_test_app_with, TestOptions};

fn decode(bytes: &[u8]) -> image::DynamicImage {
    image::load_from_memory(bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_processes_every_stage() {
    let app = setup_test_app().await;
    let client = app.client();

    let id = app.upload_ok(fixtures::jpeg(500, 500)).await;
    let info = app.wait_for_aggregate(id).await;

    assert_eq!(info.status, ArtifactStatus::Done);
    assert_eq!(info.resize_status, StageStatus::Done);
    assert_eq!(info.thumbnail_status, StageStatus::Done);
    assert_eq!(info.watermark_status, StageStatus::Done);
    assert!(info.processed_path.unwrap().ends_with(&format!("{}_resized.jpg", id)));
    assert!(info.thumbnail_path.unwrap().ends_with(&format!("{}_thumb.jpg", id)));
    assert!(info
        .watermarked_path
        .unwrap()
        .ends_with(&format!("{}_watermarked.jpg", id)));

    let resized = client.get(&format!("/image/{}", id)).await;
    resized.assert_status_ok();
    assert_eq!(resized.header("content-type"), "image/jpeg");
    assert_eq!(decode(resized.as_bytes()).width(), 800);

    let thumb = client.get(&format!("/image/{}/thumbnail", id)).await;
    thumb.assert_status_ok();
    assert_eq!(decode(thumb.as_bytes()).dimensions(), (100, 100));

    let marked = client.get(&format!("/image/{}/watermarked", id)).await;
    marked.assert_status_ok();
    assert_eq!(decode(marked.as_bytes()).dimensions(), (500, 500));

    assert_eq!(app.queue.unacked(), 0);
    app.shutdown().await;
}

#[tokio::test]
async fn test_upload_creates_pending_record_with_original() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let upload = fixtures::png(40, 30);

    let response = app.upload(upload.clone(), "whatever.jpg").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
    assert!(body["message"].is_string());

    let info = app.info(id).await;
    assert_eq!(info.status, ArtifactStatus::Pending);
    assert_eq!(info.resize_status, StageStatus::Pending);
    assert_eq!(info.thumbnail_status, StageStatus::Pending);
    assert_eq!(info.watermark_status, StageStatus::Pending);
    // Extension follows the sniffed format, not the client file name.
    assert!(info.original_path.ends_with(&format!("{}.png", id)));
    assert_eq!(std::fs::read(&info.original_path).unwrap(), upload);

    let original = app.client().get(&format!("/image/{}/original", id)).await;
    original.assert_status_ok();
    assert_eq!(original.header("content-type"), "image/png");
    assert_eq!(original.as_bytes().to_vec(), upload);

    let message = app.queue.receive().await.unwrap();
    assert_eq!(message.artifact_id().unwrap(), id);
}

#[tokio::test]
async fn test_get_image_while_pending_returns_status() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;

    let response = app.client().get(&format!("/image/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["id"], id.to_string());
}

#[tokio::test]
async fn test_corrupt_upload_is_rejected() {
    let app = setup_test_app().await;

    let response = app.upload(fixtures::corrupt_jpeg(), "broken.jpg").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "IMAGE_PROCESSING_ERROR");

    assert!(app.store.is_empty().await);
    assert_eq!(app.queue.unacked(), 0);
    app.shutdown().await;
}

#[tokio::test]
async fn test_non_image_upload_is_rejected() {
    let app = setup_test_app().await;

    let response = app.upload(b"plain text, not an image".to_vec(), "notes.png").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty().await);
    app.shutdown().await;
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = setup_test_app().await;
    let max = app.state.config.max_file_size_bytes();

    let mut bytes = fixtures::jpeg(10, 10);
    bytes.resize(max + 1, 0);
    let response = app.upload(bytes, "big.jpg").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(app.store.is_empty().await);
    app.shutdown().await;
}

#[tokio::test]
async fn test_missing_upload_field_is_rejected() {
    let app = setup_test_app().await;
    let form = axum_test::multipart::MultipartForm::new().add_text("other", "value");

    let response = app.client().post("/upload").multipart(form).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    app.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_watermark_trigger_without_overlay_fails_only_that_stage() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        watermark: false,
    })
    .await;
    let client = app.client();
    let id = app.upload_ok(fixtures::jpeg(300, 200)).await;

    for stage in ["resize", "thumbnail", "watermark"] {
        let response = client.post(&format!("/image/{}/{}", id, stage)).await;
        assert_eq!(response.status_code(), StatusCode::ACCEPTED, "{stage}");
    }

    let info = app.wait_for_stages(id).await;
    assert_eq!(info.watermark_status, StageStatus::Error);
    assert_eq!(info.watermarked_path, None);
    assert_eq!(info.resize_status, StageStatus::Done);
    assert_eq!(info.thumbnail_status, StageStatus::Done);

    // Once the last stage run finishes, the aggregate follows the stages.
    let info = app.wait_for_aggregate(id).await;
    assert_eq!(info.status, ArtifactStatus::Partial);

    // Watermarked view falls back to the original.
    let fallback = client.get(&format!("/image/{}/watermarked", id)).await;
    fallback.assert_status_ok();
    assert_eq!(decode(fallback.as_bytes()).dimensions(), (300, 200));

    // With the overlay in place a retry succeeds and lifts the aggregate.
    fixtures::write_watermark(&app.state.config.processing().watermark_path);
    let retry = client.post(&format!("/image/{}/watermark", id)).await;
    assert_eq!(retry.status_code(), StatusCode::ACCEPTED);

    let info = app
        .wait_for(id, |info| info.status == ArtifactStatus::Done)
        .await;
    assert_eq!(info.watermark_status, StageStatus::Done);
    assert!(info.watermarked_path.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pipeline_without_overlay_ends_partial() {
    let app = setup_test_app_with(TestOptions {
        consumer: true,
        watermark: false,
    })
    .await;

    let id = app.upload_ok(fixtures::jpeg(120, 80)).await;
    let info = app.wait_for_aggregate(id).await;

    assert_eq!(info.status, ArtifactStatus::Partial);
    assert_eq!(info.watermark_status, StageStatus::Error);
    assert_eq!(info.resize_status, StageStatus::Done);
    assert_eq!(info.thumbnail_status, StageStatus::Done);

    // Partial is not done: the main view still reports status.
    let response = app.client().get(&format!("/image/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    app.shutdown().await;
}

#[tokio::test]
async fn test_trigger_on_processing_stage_is_in_progress() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;
    app.store.try_begin_stage(id, Stage::Thumbnail).await.unwrap();

    let response = app.client().post(&format!("/image/{}/thumbnail", id)).await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("in progress"));
    assert!(body.get("path").is_none());

    let info = app.info(id).await;
    assert_eq!(info.thumbnail_status, StageStatus::Processing);
    assert_eq!(info.resize_status, StageStatus::Pending);
}

#[tokio::test]
async fn test_trigger_on_done_stage_returns_path() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;
    app.store
        .set_stage(id, Stage::Resize, StageStatus::Done, Some("/kept/resized.jpg"))
        .await
        .unwrap();

    let response = app.client().post(&format!("/image/{}/resize", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["path"], "/kept/resized.jpg");
    assert!(app.state.registry().is_empty());
}

#[tokio::test]
async fn test_trigger_rejects_unknown_stage_and_id() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.post(&format!("/image/{}/resize", Uuid::new_v4())).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;
    let response = client.post(&format!("/image/{}/sharpen", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = client.post("/image/not-a-uuid/resize").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    app.shutdown().await;
}

#[tokio::test]
async fn test_delete_with_missing_files() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let client = app.client();
    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;
    app.store
        .set_stage(id, Stage::Thumbnail, StageStatus::Done, Some("/does/not/exist.jpg"))
        .await
        .unwrap();
    let original = app.info(id).await.original_path;
    std::fs::remove_file(&original).unwrap();

    let response = client.delete(&format!("/image/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    assert!(app.store.is_empty().await);
    let response = client.get(&format!("/image/{}/info", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_files() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let id = app.upload_ok(fixtures::jpeg(20, 20)).await;
    let original = app.info(id).await.original_path;
    assert!(std::path::Path::new(&original).exists());

    let response = app.client().delete(&format!("/image/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    assert!(!std::path::Path::new(&original).exists());
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let app = setup_test_app().await;
    let client = app.client();
    let unknown = Uuid::new_v4();

    for path in [
        format!("/image/{}", unknown),
        format!("/image/{}/info", unknown),
        format!("/image/{}/original", unknown),
        format!("/image/{}/thumbnail", unknown),
    ] {
        let response = client.get(&path).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND, "{path}");
        let body: Value = response.json();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    let response = client.delete(&format!("/image/{}", unknown)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = client.delete("/image/12345").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    app.shutdown().await;
}

#[tokio::test]
async fn test_thumbnail_falls_back_to_original_then_404() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    let client = app.client();
    let upload = fixtures::png(30, 30);
    let id = app.upload_ok(upload.clone()).await;

    let response = client.get(&format!("/image/{}/thumbnail", id)).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().to_vec(), upload);

    std::fs::remove_file(app.info(id).await.original_path).unwrap();
    let response = client.get(&format!("/image/{}/thumbnail", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = client.get(&format!("/image/{}/sepia", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_images() {
    let app = setup_test_app_with(TestOptions {
        consumer: false,
        ..Default::default()
    })
    .await;
    for _ in 0..3 {
        app.upload_ok(fixtures::jpeg(10, 10)).await;
    }

    let response = app.client().get("/images").add_query_param("limit", 2).await;
    response.assert_status_ok();
    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 2);

    let response = app.client().get("/images").add_query_param("limit", 0).await;
    let body: Vec<Value> = response.json();
    assert_eq!(body.len(), 1);
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = setup_test_app().await;

    let health = app.client().get("/health").await;
    health.assert_status_ok();
    let body: Value = health.json();
    assert_eq!(body["status"], "healthy");

    let spec = app.client().get("/api/openapi.json").await;
    spec.assert_status_ok();
    let body: Value = spec.json();
    assert!(body["paths"]["/upload"].is_object());
    app.shutdown().await;
}
