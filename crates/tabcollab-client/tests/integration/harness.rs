//! Test harness for in-process tabcollab-client integration tests.
//!
//! Provides FakeServer, a single-connection collaboration server on a
//! loopback TcpListener that answers the handshake with a scripted reply,
//! reports every record the client sends and can push lines back.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tabcollab_client::config::ClientConfig;
use tabcollab_client::CollabClient;
use tabcollab_document::TabDocument;
use tabcollab_protocol::{decode, FrameCodec, Record};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::FramedRead;

pub const WAIT: Duration = Duration::from_secs(3);

/// How the fake server answers the login record.
#[allow(dead_code)]
pub enum Handshake {
    Reply(&'static str),
    /// Read the login record, then say nothing.
    Silent,
    /// Read the login record, then drop the connection.
    Hangup,
}

pub enum Inbound {
    Record(Record),
    Closed,
}

enum Outbound {
    Line(String),
    Close,
}

pub struct FakeServer {
    pub port: u16,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<Outbound>,
    _task: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl FakeServer {
    pub async fn start(handshake: Handshake) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let (in_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, mut out_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = FramedRead::new(read_half, FrameCodec::new());

            match reader.next().await {
                Some(Ok(frame)) => {
                    if let Some(Ok(record)) = frame.line().map(decode) {
                        let _ = in_tx.send(Inbound::Record(record));
                    }
                }
                _ => {
                    let _ = in_tx.send(Inbound::Closed);
                    return;
                }
            }
            match handshake {
                Handshake::Reply(line) => {
                    let _ = write_half.write_all(format!("{line}\n").as_bytes()).await;
                }
                Handshake::Silent => {}
                Handshake::Hangup => return,
            }

            loop {
                tokio::select! {
                    frame = reader.next() => match frame {
                        Some(Ok(frame)) => {
                            if let Some(Ok(record)) = frame.line().map(decode) {
                                let _ = in_tx.send(Inbound::Record(record));
                            }
                        }
                        _ => {
                            let _ = in_tx.send(Inbound::Closed);
                            break;
                        }
                    },
                    cmd = out_rx.recv() => match cmd {
                        Some(Outbound::Line(line)) => {
                            if write_half.write_all(line.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Close) | None => break,
                    },
                }
            }
        });

        Ok(Self {
            port,
            inbound,
            outbound,
            _task: task,
        })
    }

    /// Next record sent by the client.
    pub async fn next_record(&mut self) -> anyhow::Result<Record> {
        match tokio::time::timeout(WAIT, self.inbound.recv()).await {
            Ok(Some(Inbound::Record(record))) => Ok(record),
            Ok(Some(Inbound::Closed)) | Ok(None) => anyhow::bail!("client closed the link"),
            Err(_) => anyhow::bail!("no record within {:?}", WAIT),
        }
    }

    /// Skip records until the client closes its side.
    pub async fn wait_closed(&mut self) -> anyhow::Result<Vec<Record>> {
        let mut seen = Vec::new();
        loop {
            match tokio::time::timeout(WAIT, self.inbound.recv()).await {
                Ok(Some(Inbound::Record(record))) => seen.push(record),
                Ok(Some(Inbound::Closed)) | Ok(None) => return Ok(seen),
                Err(_) => anyhow::bail!("link still open after {:?}", WAIT),
            }
        }
    }

    /// Push raw bytes; include the trailing newline yourself.
    pub fn send_raw(&self, bytes: &str) {
        let _ = self.outbound.send(Outbound::Line(bytes.to_string()));
    }

    pub fn send_line(&self, line: &str) {
        self.send_raw(&format!("{line}\n"));
    }

    /// Drop the connection from the server side.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Config with short timings so tests finish quickly.
pub fn fast_config() -> ClientConfig {
    let mut cfg = ClientConfig::default();
    cfg.client.connect_timeout_ms = 1000;
    cfg.timing.flush_interval_ms = 20;
    cfg.timing.disconnect_grace_ms = 50;
    cfg.timing.handshake_timeout_ms = 300;
    cfg.timing.task_join_timeout_ms = 1000;
    cfg
}

pub fn new_client(cfg: ClientConfig) -> CollabClient<TabDocument> {
    CollabClient::new(cfg, Arc::new(Mutex::new(TabDocument::standard(4, 1))))
}

/// Connect and log in against `server`; panics on failure.
pub async fn logged_in(server: &mut FakeServer, user: &str) -> CollabClient<TabDocument> {
    let client = new_client(fast_config());
    assert!(client.connect("127.0.0.1", server.port).await);
    assert!(client.login(user, "pw").await);
    let login = server.next_record().await.unwrap();
    assert_eq!(login.fields[0], user);
    client
}

/// Poll `cond` every 10ms until true or WAIT elapses.
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("condition not met within {:?}", WAIT)
}
