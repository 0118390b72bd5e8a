//! Credential exchange integration tests over localhost TCP.
//!
//! Each test plays the credential service's side of one exchange on an
//! ephemeral listener: chunked responses, rejections, silence (timeout),
//! and early close.

use std::time::Duration;

use confab_client::AuthClient;
use confab_core::error::ChatError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const GRANT: &str = concat!(
    r#"{"status":"Success","data":{"token":"tok-1","user":"#,
    r#"{"id":"u1","username":"ada","presence":{"type":"Online"},"status":null}}}"#,
);

#[tokio::test]
async fn login_resolves_on_chunked_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = socket.read(&mut buf).await.unwrap();
        let request: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(request["type"], "Login");
        assert_eq!(request["username"], "ada");

        // Split the response so the client has to accumulate chunks.
        let (head, tail) = GRANT.as_bytes().split_at(40);
        socket.write_all(head).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        socket.write_all(tail).await.unwrap();
    });

    let client = AuthClient::new(addr.to_string());
    let grant = client.login("ada", "hunter22").await.unwrap();
    assert_eq!(grant.token, "tok-1");
    assert_eq!(grant.user.username, "ada");
    server.await.unwrap();
}

#[tokio::test]
async fn rejection_fails_with_the_server_message() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        socket
            .write_all(br#"{"status":"Error","message":"Invalid credentials"}"#)
            .await
            .unwrap();
    });

    let client = AuthClient::new(addr.to_string());
    let error = client.login("ada", "wrong").await.unwrap_err();
    assert_eq!(error, ChatError::RemoteRejected("Invalid credentials".to_string()));
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // Accept, read the request, then say nothing.
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        drop(socket);
    });

    let client = AuthClient::new(addr.to_string()).with_timeout(Duration::from_millis(200));
    let error = client.login("ada", "hunter22").await.unwrap_err();
    assert_eq!(error, ChatError::RequestTimeout);
    server.abort();
}

#[tokio::test]
async fn close_before_response_fails_early() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let _ = socket.read(&mut buf).await.unwrap();
        // Drop without writing a byte.
    });

    let client = AuthClient::new(addr.to_string());
    let error = client.login("ada", "hunter22").await.unwrap_err();
    assert_eq!(error, ChatError::ConnectionClosedEarly);
    server.await.unwrap();
}

#[tokio::test]
async fn logout_swallows_the_success_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 1024];
        let n = socket.read(&mut buf).await.unwrap();
        let request: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(request["type"], "Logout");
        socket
            .write_all(br#"{"status":"Success","data":{"message":"Logged out"}}"#)
            .await
            .unwrap();
    });

    let client = AuthClient::new(addr.to_string());
    client.logout("tok-1").await.unwrap();
    server.await.unwrap();
}
