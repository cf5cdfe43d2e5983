//! Handshake tests -- login replies, timeouts and connect idempotence.

use tabcollab_client::{ClientError, Color, SessionState};

use crate::harness::{fast_config, new_client, FakeServer, Handshake};

#[tokio::test]
async fn test_session_list_reply_connects() {
    let mut server = FakeServer::start(Handshake::Reply("PROT_lista_sessoes;jam;practice"))
        .await
        .unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    assert_eq!(client.state(), SessionState::AwaitingAuth);
    assert!(client.login("Carol", "secret").await);

    let login = server.next_record().await.unwrap();
    assert_eq!(login.kind, "TUXGUITAR");
    assert_eq!(login.fields, vec!["Carol", "secret"]);

    assert!(client.is_connected());
    assert_eq!(client.get_login().as_deref(), Some("Carol"));
    assert_eq!(client.get_known_sessions(), vec!["jam", "practice"]);
    assert_eq!(client.get_current_color(), Some(Color::Cyan));
    assert_eq!(client.get_track_offset(), Some(2));

    client.disconnect().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_error_reply_refuses_login() {
    let mut server = FakeServer::start(Handshake::Reply("ERRO;ERRO")).await.unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    let err = client.try_login("Alice", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthFailed(_)), "got {err}");
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.is_connected());

    // No receiver or sender: the link is closed and nothing is queued.
    server.next_record().await.unwrap();
    assert!(server.wait_closed().await.unwrap().is_empty());
    assert!(!client.send_chat("hello?"));

    client.disconnect().await;
}

#[tokio::test]
async fn test_other_reply_connects_without_sessions() {
    let server = FakeServer::start(Handshake::Reply("PROT_inicio_sessao;Bob"))
        .await
        .unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.login("Bob", "pw").await);
    assert!(client.is_connected());
    assert!(client.get_known_sessions().is_empty());
    assert_eq!(client.get_current_color(), Some(Color::Blue));

    client.disconnect().await;
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let mut server = FakeServer::start(Handshake::Silent).await.unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    let err = client.try_login("Alice", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::HandshakeTimeout(300)), "got {err}");
    assert_eq!(client.state(), SessionState::Disconnected);

    server.next_record().await.unwrap();
    server.wait_closed().await.unwrap();
}

#[tokio::test]
async fn test_hangup_during_handshake() {
    let server = FakeServer::start(Handshake::Hangup).await.unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    let err = client.try_login("Alice", "pw").await.unwrap_err();
    assert!(matches!(err, ClientError::HandshakeClosed), "got {err}");
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = new_client(fast_config());

    assert!(client.connect("127.0.0.1", server.port).await);
    // The fake server accepts once. A redial would land on a connection it
    // never serves and the login below would time out.
    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.login("Dave", "pw").await);
    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn test_connect_resolves_hostnames() {
    let server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = new_client(fast_config());
    assert!(client.connect("localhost", server.port).await);
    client.disconnect().await;
}

#[tokio::test]
async fn test_configured_handshake_kind() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let mut cfg = fast_config();
    cfg.client.handshake_kind = "ARGO".into();
    let client = new_client(cfg);

    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.login("Alice", "pw").await);
    assert_eq!(server.next_record().await.unwrap().kind, "ARGO");

    client.disconnect().await;
}

#[tokio::test]
async fn test_login_twice_rejected() {
    let server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = new_client(fast_config());
    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.login("Alice", "pw").await);
    assert!(matches!(
        client.try_login("Alice", "pw").await,
        Err(ClientError::InvalidTransition { .. })
    ));
    assert!(client.is_connected());
    client.disconnect().await;
}
