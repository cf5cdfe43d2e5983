//! Exchange tests -- outbound flush order, remote replay and teardown.

use tabcollab_client::{ClientError, Color, SessionState};
use tabcollab_document::{BeatRef, Document};
use tabcollab_protocol::ProtocolError;

use crate::harness::{logged_in, wait_until, FakeServer, Handshake};

#[tokio::test]
async fn test_events_flushed_in_order() {
    let mut server = FakeServer::start(Handshake::Reply("PROT_lista_sessoes;jam"))
        .await
        .unwrap();
    let client = logged_in(&mut server, "Alice").await;

    assert!(client.join_session("jam"));
    assert!(client.enqueue_deferred_event(&["pencil"], "SEL_pencil"));
    assert!(client.play_note("C1.WAV", "piano"));
    assert!(client.send_chat("Alice: ready"));
    assert_eq!(client.promote_pending(), 1);

    let joined = server.next_record().await.unwrap();
    assert_eq!(joined.kind, "PROT_sessao_existente");
    assert_eq!(joined.fields, vec!["jam"]);

    let note = server.next_record().await.unwrap();
    assert_eq!(note.kind, "PlayNote");
    assert_eq!(note.fields, vec!["C1.WAV", "piano", "Alice"]);

    assert_eq!(server.next_record().await.unwrap().kind, "PROT_chat_msg");
    assert_eq!(server.next_record().await.unwrap().kind, "SEL_pencil");

    client.disconnect().await;
}

#[tokio::test]
async fn test_reserved_characters_rejected() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;

    assert!(!client.send_chat("one;two"));
    assert!(!client.send_chat("line\nbreak"));
    assert_eq!(client.queues().outgoing_len(), 0);
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn test_oversized_chat_rejected_link_kept() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;

    let long = "x".repeat(5000);
    assert!(!client.send_chat(&long));
    assert!(matches!(
        client.try_enqueue_event(&[long.as_str()], "PROT_chat_msg"),
        Err(ClientError::Protocol(ProtocolError::MessageTooLarge { max: 4096, .. }))
    ));
    assert_eq!(client.queues().outgoing_len(), 0);

    assert!(client.send_chat("short"));
    let chat = server.next_record().await.unwrap();
    assert_eq!(chat.fields, vec!["short"]);
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn test_oversized_inbound_frame_skipped() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;
    let document = client.document();

    server.send_line(&format!("PROT_chat_msg;{}", "y".repeat(5000)));
    server.send_line("PlayNote;C1.WAV;piano;Carol");

    wait_until(|| {
        document
            .try_lock()
            .map(|doc| doc.note_count() == 1)
            .unwrap_or(false)
    })
    .await
    .unwrap();
    assert!(client.is_connected());
    assert_eq!(client.get_current_color(), Some(Color::Cyan));

    assert!(client.send_chat("still here"));
    assert_eq!(server.next_record().await.unwrap().fields, vec!["still here"]);

    client.disconnect().await;
}

#[tokio::test]
async fn test_remote_play_note_replayed() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;
    let document = client.document();

    // Empty kind and empty frame are dropped; the link survives.
    server.send_raw("\n;orphan\n");
    server.send_line("PlayNote;C1.WAV;piano;Dave");

    wait_until(|| {
        document
            .try_lock()
            .map(|doc| doc.note_count() == 1)
            .unwrap_or(false)
    })
    .await
    .unwrap();

    {
        let doc = document.lock().await;
        let notes = doc.notes_at(BeatRef {
            track: 4,
            measure: 1,
            position: 0,
        });
        assert_eq!(notes.len(), 1);
        assert_eq!((notes[0].string, notes[0].fret), (5, 3));
        assert_eq!(notes[0].user, "Dave");
        assert_eq!(doc.caret().position, 1);
    }
    assert_eq!(client.get_current_color(), Some(Color::Magenta));
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn test_remote_notes_extend_song() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Bob").await;
    let document = client.document();

    for _ in 0..5 {
        server.send_line("PlayNote;E2.WAV;piano;Alice");
    }
    wait_until(|| {
        document
            .try_lock()
            .map(|doc| doc.note_count() == 5)
            .unwrap_or(false)
    })
    .await
    .unwrap();

    let doc = document.lock().await;
    assert_eq!(doc.measure_count(), 2);
    assert_eq!(doc.caret().measure, 2);
    assert_eq!(doc.caret().position, 1);
    drop(doc);

    client.disconnect().await;
}

#[tokio::test]
async fn test_server_close_drops_session() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;

    server.close();
    wait_until(|| !client.is_connected()).await.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.send_chat("anyone?"));

    client.disconnect().await;
    client.disconnect().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_disconnect_drains_then_closes() {
    let mut server = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut server, "Alice").await;

    assert!(client.leave_session());
    client.disconnect().await;
    assert!(!client.is_connected());

    let seen = server.wait_closed().await.unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, "PROT_fim_sessao");
    assert_eq!(seen[0].fields, vec!["Alice"]);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let mut first = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut first, "Alice").await;
    client.disconnect().await;

    let mut second = FakeServer::start(Handshake::Reply("PROT_lista_sessoes;encore"))
        .await
        .unwrap();
    assert!(client.connect("127.0.0.1", second.port).await);
    assert!(client.login("Alice", "pw").await);
    assert_eq!(second.next_record().await.unwrap().kind, "TUXGUITAR");
    assert_eq!(client.get_known_sessions(), vec!["encore"]);

    client.disconnect().await;
}

#[tokio::test]
async fn test_dead_session_events_not_replayed() {
    let mut first = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    let client = logged_in(&mut first, "Alice").await;

    assert!(client.enqueue_deferred_event(&["old"], "SEL_pencil"));
    first.close();
    wait_until(|| !client.is_connected()).await.unwrap();
    assert_eq!(client.promote_pending(), 0);

    let mut second = FakeServer::start(Handshake::Reply("OK")).await.unwrap();
    assert!(client.connect("127.0.0.1", second.port).await);
    assert_eq!(client.queues().deferred_len(), 0);
    assert!(client.login("Alice", "pw").await);
    assert_eq!(second.next_record().await.unwrap().kind, "TUXGUITAR");
    assert_eq!(client.promote_pending(), 0);

    assert!(client.send_chat("fresh"));
    let next = second.next_record().await.unwrap();
    assert_eq!(next.kind, "PROT_chat_msg");
    assert_eq!(next.fields, vec!["fresh"]);

    client.disconnect().await;
}
