//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! End-to-End Protocol Tests
//!
//! Each test spawns a real server on an ephemeral port and drives it with
//! the client library (or raw packets where a scenario needs an off-script
//! move): login and lockout, chunked transfers, wrong-state rejections,
//! idle timeout, admission bounding, and graceful shutdown.

use cumulus_client::{ClientError, CloudClient};
use cumulus_core::{CloudServer, CommandContext, DiskStorage, JsonUserStore, ServerConfig};
use cumulus_proto::{meta, CommandCode, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

struct TestServer {
    addr: SocketAddr,
    shutdown: broadcast::Sender<()>,
    _data: TempDir,
}

async fn spawn_server(mutate: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let data = TempDir::new().expect("tempdir");
    let mut config = ServerConfig {
        data_dir: data.path().to_path_buf(),
        ..ServerConfig::default()
    };
    mutate(&mut config);
    let config = Arc::new(config);

    let users: Arc<dyn cumulus_core::UserRepository> =
        Arc::new(JsonUserStore::open(data.path()).expect("user store"));
    let storage: Arc<dyn cumulus_core::StorageBackend> =
        Arc::new(DiskStorage::open(data.path()).expect("storage"));
    let ctx = CommandContext {
        users,
        storage,
        config,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown, _) = broadcast::channel(1);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let server = CloudServer::new(ctx);
        let _ = server.serve(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        shutdown,
        _data: data,
    }
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 233) as u8).collect()
}

#[tokio::test]
async fn create_login_and_list_empty() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();

    let created = client.create_account("alice", "p@ss", "").await.unwrap();
    let logged_in = client.login("alice", "p@ss").await.unwrap();
    assert_eq!(created, logged_in);

    let files = client.list_files().await.unwrap();
    assert!(files.is_empty());

    client.logout().await.unwrap();
}

#[tokio::test]
async fn five_failed_logins_close_the_connection() {
    let server = spawn_server(|_| {}).await;
    let mut setup = CloudClient::connect(server.addr).await.unwrap();
    setup.create_account("bob", "right", "").await.unwrap();

    let mut client = CloudClient::connect(server.addr).await.unwrap();
    for attempt in 1..=5u32 {
        let err = client.login("bob", "wrong").await.unwrap_err();
        let ClientError::Refused(message) = err else {
            panic!("attempt {attempt}: expected refusal");
        };
        if attempt == 5 {
            assert!(message.contains("Maximum login attempts"));
        }
    }
    assert_eq!(client.failed_logins(), 5);

    // The server has closed the socket; the next read reports it.
    let mut conn = client.into_connection();
    let probe = Packet::request(CommandCode::LoginRequest)
        .with_payload(br#"{"username":"bob","password":"right"}"#.to_vec());
    let result = timeout(Duration::from_secs(5), conn.request(&probe)).await.unwrap();
    assert!(matches!(
        result,
        Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
    ));
}

#[tokio::test]
async fn empty_credentials_fail_locally_without_burning_attempts() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("carol", "pw", "").await.unwrap();

    for _ in 0..3 {
        assert!(matches!(
            client.login("", "").await.unwrap_err(),
            ClientError::EmptyCredentials
        ));
    }
    assert_eq!(client.failed_logins(), 0);
    client.login("carol", "pw").await.unwrap();
}

#[tokio::test]
async fn upload_and_download_two_and_a_half_mib() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("dave", "pw", "").await.unwrap();
    client.login("dave", "pw").await.unwrap();

    let content = patterned(2_621_440);
    let file_id = client
        .upload_bytes("a.bin", "application/octet-stream", &content, None)
        .await
        .unwrap();

    let files = client.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, file_id);
    assert!(files[0].is_complete);

    let download = client.download(file_id).await.unwrap();
    assert_eq!(download.info.total_chunks, 3);
    assert_eq!(download.info.file_name, "a.bin");
    assert_eq!(download.bytes, content);
}

#[tokio::test]
async fn out_of_order_chunk_is_refused_then_retried() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("erin", "pw", "").await.unwrap();
    let user_id = client.login("erin", "pw").await.unwrap();
    let mut conn = client.into_connection();
    let uid = user_id.to_string();

    let init = Packet::request(CommandCode::FileUploadInitRequest)
        .with_user(uid.clone())
        .with_payload(
            serde_json::to_vec(&serde_json::json!({
                "fileName": "b.bin",
                "fileSize": 16u64,
                "contentType": "application/octet-stream",
            }))
            .unwrap(),
        );
    let response = conn.request(&init).await.unwrap();
    assert!(response.success());
    let file_id = response.meta(meta::FILE_ID).unwrap().to_string();

    let wrong = Packet::request(CommandCode::FileUploadChunkRequest)
        .with_user(uid.clone())
        .with_meta(meta::FILE_ID, file_id.clone())
        .with_meta(meta::CHUNK_INDEX, "1")
        .with_meta(meta::IS_LAST_CHUNK, "true")
        .with_payload(vec![7u8; 16]);
    let response = conn.request(&wrong).await.unwrap();
    assert!(!response.success());
    assert!(response.message().unwrap().contains("expected 0"));

    // The transfer window stayed open; the expected index goes through.
    let right = Packet::request(CommandCode::FileUploadChunkRequest)
        .with_user(uid.clone())
        .with_meta(meta::FILE_ID, file_id.clone())
        .with_meta(meta::CHUNK_INDEX, "0")
        .with_meta(meta::IS_LAST_CHUNK, "true")
        .with_payload(vec![7u8; 16]);
    let response = conn.request(&right).await.unwrap();
    assert!(response.success());

    let complete = Packet::request(CommandCode::FileUploadCompleteRequest)
        .with_user(uid)
        .with_meta(meta::FILE_ID, file_id);
    let response = conn.request(&complete).await.unwrap();
    assert!(response.success());
}

#[tokio::test]
async fn non_transfer_command_is_rejected_mid_upload() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("frank", "pw", "").await.unwrap();
    let user_id = client.login("frank", "pw").await.unwrap();
    let mut conn = client.into_connection();
    let uid = user_id.to_string();

    let init = Packet::request(CommandCode::FileUploadInitRequest)
        .with_user(uid.clone())
        .with_payload(
            serde_json::to_vec(&serde_json::json!({
                "fileName": "c.bin",
                "fileSize": 4u64,
                "contentType": "text/plain",
            }))
            .unwrap(),
        );
    let response = conn.request(&init).await.unwrap();
    let file_id = response.meta(meta::FILE_ID).unwrap().to_string();

    let list = Packet::request(CommandCode::FileListRequest).with_user(uid.clone());
    let response = conn.request(&list).await.unwrap();
    assert_eq!(response.command, CommandCode::Error);
    assert!(!response.success());

    // Still in Transfer(upload): the chunk is accepted afterwards.
    let chunk = Packet::request(CommandCode::FileUploadChunkRequest)
        .with_user(uid)
        .with_meta(meta::FILE_ID, file_id)
        .with_meta(meta::CHUNK_INDEX, "0")
        .with_meta(meta::IS_LAST_CHUNK, "true")
        .with_payload(b"data".to_vec());
    let response = conn.request(&chunk).await.unwrap();
    assert!(response.success());
}

#[tokio::test]
async fn idle_session_is_swept_and_closed() {
    let server = spawn_server(|config| {
        config.session_timeout = Duration::from_millis(300);
        config.sweep_interval = Duration::from_millis(100);
    })
    .await;

    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("grace", "pw", "").await.unwrap();
    client.login("grace", "pw").await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut conn = client.into_connection();
    let probe = Packet::request(CommandCode::FileListRequest);
    let result = timeout(Duration::from_secs(5), conn.request(&probe)).await.unwrap();
    assert!(matches!(
        result,
        Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
    ));
}

#[tokio::test]
async fn excess_connections_are_dropped_without_response() {
    let server = spawn_server(|config| {
        config.max_sessions = 1;
    })
    .await;

    let mut first = CloudClient::connect(server.addr).await.unwrap();
    first.create_account("heidi", "pw", "").await.unwrap();
    first.login("heidi", "pw").await.unwrap();

    // The second connection is accepted at the TCP level, then dropped.
    let mut second = CloudClient::connect(server.addr).await.unwrap();
    let result = timeout(Duration::from_secs(5), second.login("heidi", "pw"))
        .await
        .unwrap();
    assert!(matches!(
        result,
        Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
    ));

    // The admitted session keeps working.
    assert!(first.list_files().await.unwrap().is_empty());
}

#[tokio::test]
async fn directory_and_move_flows_end_to_end() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("ivan", "pw", "").await.unwrap();
    client.login("ivan", "pw").await.unwrap();

    let created = client.create_directory("docs", None).await.unwrap();
    let docs_id = created.directory_id.unwrap();

    let file_id = client
        .upload_bytes("notes.txt", "text/plain", b"remember the milk", Some(docs_id))
        .await
        .unwrap();

    let contents = client.directory_contents(Some(docs_id)).await.unwrap();
    assert_eq!(contents.files.len(), 1);
    assert_eq!(contents.files[0].id, file_id);

    // Move back to the root, rename the directory, then clean up.
    client.move_file(file_id, None).await.unwrap();
    let contents = client.directory_contents(Some(docs_id)).await.unwrap();
    assert!(contents.files.is_empty());

    let renamed = client.rename_directory(docs_id, "archive").await.unwrap();
    assert_eq!(renamed.directory_name.as_deref(), Some("archive"));

    let dirs = client.list_directories(None).await.unwrap();
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].name, "archive");

    client.delete_directory(docs_id, false).await.unwrap();
    client.delete_file(file_id).await.unwrap();
    assert!(client.list_files().await.unwrap().is_empty());

    let download = client.download(file_id).await;
    assert!(matches!(download, Err(ClientError::Refused(_))));
}

#[tokio::test]
async fn shutdown_closes_live_sessions() {
    let server = spawn_server(|_| {}).await;
    let mut client = CloudClient::connect(server.addr).await.unwrap();
    client.create_account("judy", "pw", "").await.unwrap();
    client.login("judy", "pw").await.unwrap();

    server.shutdown.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut conn = client.into_connection();
    let probe = Packet::request(CommandCode::FileListRequest);
    let result = timeout(Duration::from_secs(5), conn.request(&probe)).await.unwrap();
    assert!(matches!(
        result,
        Err(ClientError::ConnectionClosed) | Err(ClientError::Io(_))
    ));
}
