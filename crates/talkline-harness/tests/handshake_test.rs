//! Login/register handshake against a simulated server.

use std::{fs, time::Duration};

use talkline_client::{
    ClientConfig, Connector, Handshake, HandshakeOutcome, SavedList, SessionError, Shutdown,
    TrustPolicy,
};
use talkline_harness::{RecordingScreen, ScriptedPrompt, ScriptedTrust, SimServer};

const LIMIT: Duration = Duration::from_secs(5);

async fn connect(server: &SimServer) -> talkline_client::Transport {
    let connector =
        Connector::new(&ClientConfig::default(), TrustPolicy::new(ScriptedTrust::rejecting()))
            .unwrap();
    connector.connect(&server.endpoint(), &RecordingScreen::new()).await.unwrap()
}

#[tokio::test]
async fn login_then_remember_username() {
    let dir = tempfile::tempdir().unwrap();
    let users_path = dir.path().join("users.txt");
    let server = SimServer::plain().await.unwrap();
    let endpoint = server.endpoint();

    let server_side = tokio::spawn(async move {
        let mut conn = server.accept().await.unwrap();
        conn.send("Welcome to the chat server!").await.unwrap();
        let request = conn.recv_until("pw").await.unwrap();
        conn.send("Login successful. Welcome, alice!").await.unwrap();
        (request, conn)
    });

    let connector =
        Connector::new(&ClientConfig::default(), TrustPolicy::new(ScriptedTrust::rejecting()))
            .unwrap();
    let screen = RecordingScreen::new();
    let mut stream = connector.connect(&endpoint, &screen).await.unwrap();

    let mut prompt = ScriptedPrompt::from_lines(["1", "alice", "pw", "y"]);
    let mut users: SavedList<String> = SavedList::load(&users_path).unwrap();
    let shutdown = Shutdown::new();

    let outcome = Handshake::new(&mut prompt, &screen, &mut users, &shutdown, 1024)
        .run(&mut stream)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Authenticated { username: "alice".to_string() });
    let (request, _conn) = tokio::time::timeout(LIMIT, server_side).await.unwrap().unwrap();
    assert_eq!(request, "/login alice:pw");

    assert!(screen.contains("Welcome to the chat server!"));
    assert!(screen.contains("Authentication successful!"));
    assert!(screen.contains("Username saved!"));
    assert_eq!(fs::read_to_string(&users_path).unwrap(), "alice\n");
}

#[tokio::test]
async fn rejected_attempt_retries_with_register() {
    let server = SimServer::plain().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let users_path = dir.path().join("users.txt");

    let (conn, stream) = tokio::join!(server.accept(), connect(&server));
    let mut conn = conn.unwrap();
    let mut stream = stream;

    let server_side = tokio::spawn(async move {
        conn.send("Welcome").await.unwrap();
        let first = conn.recv_until("wrong").await.unwrap();
        conn.send("Invalid username or password").await.unwrap();
        let second = conn.recv_until("pw2").await.unwrap();
        conn.send("Registration successful").await.unwrap();
        (first, second, conn)
    });

    // Second attempt declines to save the username.
    let mut prompt =
        ScriptedPrompt::from_lines(["1", "alice", "wrong", "3", "2", "bob", "pw2", "n"]);
    let screen = RecordingScreen::new();
    let mut users: SavedList<String> = SavedList::load(&users_path).unwrap();
    let shutdown = Shutdown::new();

    let outcome = Handshake::new(&mut prompt, &screen, &mut users, &shutdown, 1024)
        .run(&mut stream)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Authenticated { username: "bob".to_string() });
    let (first, second, _conn) = tokio::time::timeout(LIMIT, server_side).await.unwrap().unwrap();
    assert_eq!(first, "/login alice:wrong");
    assert_eq!(second, "/register bob:pw2");
    assert!(screen.contains("Invalid username or password"));
    assert!(screen.contains("Invalid option. Please choose 1 or 2."));
    assert!(!users_path.exists());
}

#[tokio::test]
async fn saved_username_is_offered_for_login() {
    let server = SimServer::plain().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let users_path = dir.path().join("users.txt");
    fs::write(&users_path, "alice\ncarol\n").unwrap();

    let (conn, stream) = tokio::join!(server.accept(), connect(&server));
    let mut conn = conn.unwrap();
    let mut stream = stream;

    let server_side = tokio::spawn(async move {
        conn.send("Welcome").await.unwrap();
        let request = conn.recv_until("secret").await.unwrap();
        conn.send("Login successful").await.unwrap();
        (request, conn)
    });

    let mut prompt = ScriptedPrompt::from_lines(["1", "2", "secret"]);
    let screen = RecordingScreen::new();
    let mut users: SavedList<String> = SavedList::load(&users_path).unwrap();
    let shutdown = Shutdown::new();

    let outcome = Handshake::new(&mut prompt, &screen, &mut users, &shutdown, 1024)
        .run(&mut stream)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Authenticated { username: "carol".to_string() });
    let (request, _conn) = tokio::time::timeout(LIMIT, server_side).await.unwrap().unwrap();
    assert_eq!(request, "/login carol:secret");
    assert!(screen.contains("1. alice\n2. carol\n3. Use a new username\n"));
    assert!(!screen.contains("Remember this username"));
}

#[tokio::test]
async fn input_eof_abandons_after_banner() {
    let server = SimServer::plain().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let (conn, stream) = tokio::join!(server.accept(), connect(&server));
    let mut conn = conn.unwrap();
    let mut stream = stream;
    conn.send("Welcome").await.unwrap();

    let mut prompt = ScriptedPrompt::from_lines(Vec::<String>::new());
    let screen = RecordingScreen::new();
    let mut users: SavedList<String> = SavedList::load(dir.path().join("users.txt")).unwrap();
    let shutdown = Shutdown::new();

    let outcome = Handshake::new(&mut prompt, &screen, &mut users, &shutdown, 1024)
        .run(&mut stream)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Abandoned);
    assert!(screen.contains("Welcome"));
}

#[tokio::test]
async fn closed_before_banner_is_transport_error() {
    let server = SimServer::plain().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let (conn, stream) = tokio::join!(server.accept(), connect(&server));
    conn.unwrap().close().await.unwrap();
    let mut stream = stream;

    let mut prompt = ScriptedPrompt::from_lines(["1"]);
    let screen = RecordingScreen::new();
    let mut users: SavedList<String> = SavedList::load(dir.path().join("users.txt")).unwrap();
    let shutdown = Shutdown::new();

    let err = Handshake::new(&mut prompt, &screen, &mut users, &shutdown, 1024)
        .run(&mut stream)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Transport(_)), "got {err:?}");
    assert!(screen.contains("Error reading welcome message"));
}
