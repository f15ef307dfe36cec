//! Integration tests for uploads: skip-if-exists, overwrite, the two-step
//! upload handshake and the mtime stamp

use std::time::Duration;

use chrono::{TimeZone, Utc};
use cloudmirror_core::ports::{IRemoteStore, PutOutcome};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_bytes, body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, remote};

fn local_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_put_new_file_uploads_bytes_and_stamps_mtime() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"hello");
    let mtime = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_upload_link(&server, "/Backup/a.txt", false).await;
    Mock::given(method("PUT"))
        .and(path("/upload-target"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/resources"))
        .and(query_param("path", "/Backup/a.txt"))
        .and(body_json(json!({
            "custom_properties": { "mtime": "2023-11-14T22:13:20Z" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, mtime, false)
        .await
        .expect("upload failed");

    assert_eq!(outcome, PutOutcome::Uploaded);
}

#[tokio::test]
async fn test_put_existing_file_without_overwrite_sends_nothing() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"hello");

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_existing_file(&server, "/Backup/a.txt").await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Skipped);
    assert_eq!(
        common::count_requests(&server, "GET", "/resources/upload").await,
        0
    );
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 0);
    assert_eq!(common::count_requests(&server, "PATCH", "/resources").await, 0);
}

#[tokio::test]
async fn test_put_overwrite_replaces_without_existence_check() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"new content");

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_existing_file(&server, "/Backup/a.txt").await;
    common::mount_upload_link(&server, "/Backup/a.txt", true).await;
    common::mount_upload_target(&server).await;
    common::mount_patch(&server, "/Backup/a.txt").await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), true)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Uploaded);
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 1);
    let file_checks = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| {
            r.method.as_str() == "GET"
                && r.url.path() == "/resources"
                && r.url.query_pairs().any(|(k, v)| k == "path" && v == "/Backup/a.txt")
        })
        .count();
    assert_eq!(file_checks, 0);
}

#[tokio::test]
async fn test_put_conflict_on_upload_link_is_treated_as_skip() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    Mock::given(method("GET"))
        .and(path("/resources/upload"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "DiskResourceAlreadyExistsError",
            "description": "Resource already exists"
        })))
        .mount(&server)
        .await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Skipped);
}

#[tokio::test]
async fn test_put_creates_missing_parent_first() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .and(query_param("path", "/Backup/sub"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    common::mount_upload_link(&server, "/Backup/sub/a.txt", false).await;
    common::mount_upload_target(&server).await;
    common::mount_patch(&server, "/Backup/sub/a.txt").await;

    let outcome = store
        .put(&remote("/Backup/sub/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();
    assert_eq!(outcome, PutOutcome::Uploaded);

    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .position(|r| r.method.as_str() == "PUT" && r.url.path() == "/resources")
        .unwrap();
    let link = requests
        .iter()
        .position(|r| r.url.path() == "/resources/upload")
        .unwrap();
    assert!(create < link);
}

#[tokio::test]
async fn test_put_retries_transient_upload_failure() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_upload_link(&server, "/Backup/a.txt", false).await;
    Mock::given(method("PUT"))
        .and(path("/upload-target"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_upload_target(&server).await;
    common::mount_patch(&server, "/Backup/a.txt").await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Uploaded);
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 2);
}

#[tokio::test]
async fn test_put_honours_retry_after_on_429() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    Mock::given(method("GET"))
        .and(path("/resources/upload"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_upload_link(&server, "/Backup/a.txt", false).await;
    common::mount_upload_target(&server).await;
    common::mount_patch(&server, "/Backup/a.txt").await;

    let started = std::time::Instant::now();
    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Uploaded);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        common::count_requests(&server, "GET", "/resources/upload").await,
        2
    );
}

#[tokio::test]
async fn test_put_gives_up_after_retry_budget() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_upload_link(&server, "/Backup/a.txt", false).await;
    Mock::given(method("PUT"))
        .and(path("/upload-target"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Server error 500"));
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 3);
}

#[tokio::test]
async fn test_put_waits_for_uploaded_resource_before_stamping() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();
    let file = local_file(&dir, "a.txt", b"x");

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_upload_link(&server, "/Backup/a.txt", false).await;
    common::mount_upload_target(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    common::mount_patch(&server, "/Backup/a.txt").await;

    let outcome = store
        .put(&remote("/Backup/a.txt"), &file, Utc::now(), false)
        .await
        .unwrap();

    assert_eq!(outcome, PutOutcome::Uploaded);
    assert_eq!(common::count_requests(&server, "PATCH", "/resources").await, 2);
}

#[tokio::test]
async fn test_put_missing_local_file_fails() {
    let (server, store) = common::setup_disk_mock().await;
    let dir = TempDir::new().unwrap();

    common::mount_folder(&server, "/Backup", vec![]).await;
    common::mount_upload_link(&server, "/Backup/gone.txt", false).await;

    let err = store
        .put(
            &remote("/Backup/gone.txt"),
            &dir.path().join("gone.txt"),
            Utc::now(),
            false,
        )
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Failed to read local file"));
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 0);
}

#[tokio::test]
async fn test_set_modified_patches_mtime() {
    let (server, store) = common::setup_disk_mock().await;
    Mock::given(method("PATCH"))
        .and(path("/resources"))
        .and(query_param("path", "/Backup/sub"))
        .and(body_json(json!({
            "custom_properties": { "mtime": "2023-11-14T22:13:20.250Z" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    store
        .set_modified(
            &remote("/Backup/sub"),
            Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap(),
        )
        .await
        .unwrap();
}
