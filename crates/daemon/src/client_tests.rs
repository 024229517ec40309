// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio::net::UnixListener;

use super::*;

/// Accept exactly one connection, read its request, and reply with
/// `response`, mimicking a single Request Server round trip.
async fn serve_once(socket_path: std::path::PathBuf, response: Response) {
    let listener = UnixListener::bind(&socket_path).unwrap();
    let (stream, _) = listener.accept().await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let _request = protocol::read_request(&mut reader, CLIENT_TIMEOUT).await.unwrap();
    protocol::write_response(&mut writer, &response, CLIENT_TIMEOUT)
        .await
        .unwrap();
}

#[tokio::test]
async fn query_build_info_decodes_a_query_build_reply() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("d.sock");

    let server = tokio::spawn(serve_once(
        socket_path.clone(),
        Response::QueryBuild {
            build_id: "b1".to_string(),
            completed_tasks: 2,
            pending_tasks: 0,
            pending_outputs: vec!["hi".to_string()],
        },
    ));
    // Give the listener a moment to bind before connecting.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let status = query_build_info(&socket_path, "b1").await.unwrap();
    assert_eq!(status.build_id, "b1");
    assert_eq!(status.completed_tasks, 2);
    assert_eq!(status.pending_tasks, 0);
    assert_eq!(status.pending_outputs, vec!["hi".to_string()]);

    server.await.unwrap();
}

#[tokio::test]
async fn query_build_info_rejects_a_heartbeat_shaped_reply() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("d.sock");

    let server = tokio::spawn(serve_once(socket_path.clone(), Response::heartbeat_ok()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = query_build_info(&socket_path, "b1").await.unwrap_err();
    assert!(matches!(err, protocol::ProtocolError::UnexpectedResponse));

    server.await.unwrap();
}

#[tokio::test]
async fn wait_for_build_returns_immediately_when_nothing_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("d.sock");

    let server = tokio::spawn(serve_once(
        socket_path.clone(),
        Response::QueryBuild {
            build_id: "b1".to_string(),
            completed_tasks: 1,
            pending_tasks: 0,
            pending_outputs: vec![],
        },
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let code = wait_for_build(&socket_path, "b1").await.unwrap();
    assert_eq!(code, 0);

    server.await.unwrap();
}

#[tokio::test]
async fn check_if_running_fails_when_nothing_is_listening() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("nobody-home.sock");
    assert_eq!(check_if_running(&socket_path).await, 1);
}

#[tokio::test]
async fn check_if_running_succeeds_against_a_live_listener() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("d.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let accept = tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    assert_eq!(check_if_running(&socket_path).await, 0);
    accept.await.unwrap();
}
