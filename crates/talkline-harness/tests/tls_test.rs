//! TLS upgrade and the certificate trust decision.

use std::{fs, time::Duration};

use talkline_client::{
    CertificateIssue, ClientConfig, Connector, Endpoint, SessionError, Transport, TrustPolicy,
};
use talkline_harness::{RecordingScreen, ScriptedTrust, SimServer, TestCa};
use tokio::io::AsyncReadExt;

const LIMIT: Duration = Duration::from_secs(5);

async fn connect(
    config: &ClientConfig,
    trust: &ScriptedTrust,
    endpoint: &Endpoint,
    screen: &RecordingScreen,
) -> Result<Transport, SessionError> {
    let connector = Connector::new(config, TrustPolicy::new(trust.clone())).unwrap();
    tokio::time::timeout(LIMIT, connector.connect(endpoint, screen)).await.unwrap()
}

#[tokio::test]
async fn untrusted_certificate_accepted_by_user() {
    let server = SimServer::self_signed(&["localhost"]).await.unwrap();
    let endpoint = server.endpoint();
    assert!(endpoint.secure);

    let server_side = tokio::spawn(async move {
        let mut conn = server.accept().await.unwrap();
        conn.send("Welcome over TLS").await.unwrap();
        conn
    });

    let trust = ScriptedTrust::accepting();
    let screen = RecordingScreen::new();

    let mut transport =
        connect(&ClientConfig::default(), &trust, &endpoint, &screen).await.unwrap();

    assert!(transport.is_secure());
    assert_eq!(trust.asked(), vec![CertificateIssue::UnknownIssuer]);
    assert!(screen.contains("Secure connection established successfully."));

    let _conn = server_side.await.unwrap();
    let mut buf = vec![0u8; 64];
    let n = transport.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"Welcome over TLS");
}

#[tokio::test]
async fn untrusted_certificate_rejected_by_user() {
    let server = SimServer::self_signed(&["localhost"]).await.unwrap();
    let endpoint = server.endpoint();

    // The server side fails once the client aborts the handshake.
    let server_side = tokio::spawn(async move { server.accept().await.is_err() });

    let trust = ScriptedTrust::rejecting();
    let screen = RecordingScreen::new();

    let err = connect(&ClientConfig::default(), &trust, &endpoint, &screen).await.unwrap_err();

    assert!(matches!(err, SessionError::SecurityHandshake(_)), "got {err:?}");
    assert!(err.is_connect_failure());
    assert_eq!(trust.asked().len(), 1);
    assert!(!screen.contains("Secure connection established"));
    assert!(tokio::time::timeout(LIMIT, server_side).await.unwrap().unwrap());
}

#[tokio::test]
async fn name_mismatch_from_trusted_ca_is_accepted_silently() {
    let dir = tempfile::tempdir().unwrap();
    let ca = TestCa::generate().unwrap();
    let ca_path = dir.path().join("ca.pem");
    fs::write(&ca_path, ca.pem()).unwrap();

    let server = SimServer::issued_by(&ca, &["chat.invalid"]).await.unwrap();
    let endpoint = server.endpoint();
    let server_side = tokio::spawn(async move { server.accept().await.map(|_| ()) });

    let config = ClientConfig { extra_roots: vec![ca_path], ..ClientConfig::default() };
    let trust = ScriptedTrust::rejecting();
    let transport = connect(&config, &trust, &endpoint, &RecordingScreen::new()).await.unwrap();

    assert!(transport.is_secure());
    assert!(trust.asked().is_empty());
    tokio::time::timeout(LIMIT, server_side).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn unknown_ca_is_put_to_the_user() {
    let ca = TestCa::generate().unwrap();
    let server = SimServer::issued_by(&ca, &["127.0.0.1"]).await.unwrap();
    let endpoint = server.endpoint();
    let _server_side = tokio::spawn(async move { server.accept().await.map(|_| ()) });

    // The CA is not configured as a root.
    let trust = ScriptedTrust::accepting();
    let screen = RecordingScreen::new();
    let transport = connect(&ClientConfig::default(), &trust, &endpoint, &screen).await.unwrap();

    assert!(transport.is_secure());
    assert_eq!(trust.asked(), vec![CertificateIssue::UnknownIssuer]);
}
