//! Integration tests for remote directory creation

use std::sync::Arc;

use cloudmirror_core::ports::IRemoteStore;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, remote};

fn created_paths(requests: &[wiremock::Request]) -> Vec<String> {
    requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT" && r.url.path() == "/resources")
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "path")
                .map(|(_, v)| v.into_owned())
        })
        .collect()
}

#[tokio::test]
async fn test_ensure_directory_creates_missing_chain_parent_first() {
    let (server, store) = common::setup_disk_mock().await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(201))
        .expect(3)
        .mount(&server)
        .await;

    store.ensure_directory(&remote("/Backup/a/b")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        created_paths(&requests),
        vec!["/Backup", "/Backup/a", "/Backup/a/b"]
    );
}

#[tokio::test]
async fn test_ensure_directory_skips_existing_prefixes() {
    let (server, store) = common::setup_disk_mock().await;
    common::mount_folder(&server, "/Backup", vec![]).await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    store.ensure_directory(&remote("/Backup/new")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(created_paths(&requests), vec!["/Backup/new"]);
}

#[tokio::test]
async fn test_ensure_directory_tolerates_conflict() {
    let (server, store) = common::setup_disk_mock().await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "DiskPathPointsToExistentDirectoryError",
            "description": "Specified path points to existent directory."
        })))
        .mount(&server)
        .await;

    store.ensure_directory(&remote("/Backup")).await.unwrap();
}

#[tokio::test]
async fn test_ensure_directory_surfaces_permission_error() {
    let (server, store) = common::setup_disk_mock().await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "DiskForbiddenError",
            "description": "Access denied"
        })))
        .mount(&server)
        .await;

    let err = store.ensure_directory(&remote("/Backup")).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Failed to create remote directory /Backup"), "{message}");
    assert!(message.contains("Access denied"), "{message}");
}

#[tokio::test]
async fn test_concurrent_uploads_share_new_parent() {
    let (server, store) = common::setup_disk_mock().await;
    let store = Arc::new(store);
    let dir = tempfile::TempDir::new().unwrap();

    common::mount_folder(&server, "/Backup", vec![]).await;
    // The first creator wins; anyone who raced past the existence check sees 409.
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .and(query_param("path", "/Backup/shared"))
        .respond_with(ResponseTemplate::new(201))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/resources"))
        .and(query_param("path", "/Backup/shared"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resources/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}/upload-target", server.uri()),
            "method": "PUT"
        })))
        .mount(&server)
        .await;
    common::mount_upload_target(&server).await;
    Mock::given(method("PATCH"))
        .and(path("/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let name = format!("f{i}.txt");
        let local = dir.path().join(&name);
        std::fs::write(&local, name.as_bytes()).unwrap();
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .put(
                    &remote(&format!("/Backup/shared/{name}")),
                    &local,
                    chrono::Utc::now(),
                    false,
                )
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, cloudmirror_core::ports::PutOutcome::Uploaded);
    }
    assert_eq!(common::count_requests(&server, "PUT", "/upload-target").await, 5);
}
