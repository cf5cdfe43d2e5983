//! Collaboration client -- connection lifecycle and the collaborator API.
//!
//! `connect` opens the TCP link, `login` performs the synchronous handshake
//! and starts the sender and receiver tasks, `disconnect` tears everything
//! down. The boolean methods are the facade the editor calls; each has a
//! `try_` twin returning the underlying error.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tabcollab_document::Document;
use tabcollab_protocol::record::kind;
use tabcollab_protocol::{decode, EventKind, Frame, FrameCodec, ProtocolError, Record};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::applier::RemoteEventApplier;
use crate::config::ClientConfig;
use crate::identity::Color;
use crate::queues::{Enqueued, EventQueues};
use crate::session::{Session, SessionHandle, SessionState};
use crate::{receiver_task, sender_task, ClientError, Result};

/// Document handle shared by the editor and the receiver task.
pub type SharedDocument<D> = Arc<Mutex<D>>;

type Reader = FramedRead<OwnedReadHalf, FrameCodec>;
type Writer = FramedWrite<OwnedWriteHalf, FrameCodec>;

enum Link {
    Idle,
    /// TCP open, handshake not done.
    Open { reader: Reader, writer: Writer },
    /// Logged in; both loops running.
    Running {
        shutdown_tx: broadcast::Sender<()>,
        sender: JoinHandle<()>,
        receiver: JoinHandle<()>,
    },
}

pub struct CollabClient<D: Document + 'static> {
    config: ClientConfig,
    session: SessionHandle,
    queues: Arc<EventQueues>,
    document: SharedDocument<D>,
    applier: RemoteEventApplier,
    link: Mutex<Link>,
}

impl<D: Document + 'static> CollabClient<D> {
    pub fn new(config: ClientConfig, document: SharedDocument<D>) -> Self {
        Self::with_applier(config, document, RemoteEventApplier::default())
    }

    pub fn with_applier(
        config: ClientConfig,
        document: SharedDocument<D>,
        applier: RemoteEventApplier,
    ) -> Self {
        let queues = Arc::new(EventQueues::new(
            config.queue.capacity,
            config.queue.overflow,
        ));
        Self {
            config,
            session: SessionHandle::new(),
            queues,
            document,
            applier,
            link: Mutex::new(Link::Idle),
        }
    }

    // -- Connection lifecycle --

    /// Open the link to `host:port`. True if a link is (already) open.
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        match self.try_connect(host, port).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(host, port, error = %e, "client: connect failed");
                false
            }
        }
    }

    pub async fn try_connect(&self, host: &str, port: u16) -> Result<()> {
        let mut link = self.link.lock().await;
        if self.session.state().has_link() {
            tracing::debug!(host, port, "client: already connected");
            return Ok(());
        }
        // Loops that died on their own leave finished handles behind.
        let stale = std::mem::replace(&mut *link, Link::Idle);
        self.close_link(stale).await;
        self.discard_unsent();

        self.session.transition(SessionState::Connecting)?;
        let addr = format!("{host}:{port}");
        let stream = match self.open_stream(&addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.session.mark_disconnected("connect failed");
                return Err(e);
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "client: set_nodelay failed");
        }

        let codec = FrameCodec::with_max_frame_bytes(self.config.protocol.max_frame_bytes);
        let (read_half, write_half) = stream.into_split();
        *link = Link::Open {
            reader: FramedRead::new(read_half, codec.clone()),
            writer: FramedWrite::new(write_half, codec),
        };
        self.session.transition(SessionState::AwaitingAuth)?;
        tracing::info!(%addr, "client: connected, awaiting login");
        Ok(())
    }

    async fn open_stream(&self, addr: &str) -> Result<TcpStream> {
        let connect = TcpStream::connect(addr);
        let outcome = match self.config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                ClientError::ConnectFailed {
                    addr: addr.to_string(),
                    reason: format!("timed out after {} ms", limit.as_millis()),
                }
            })?,
            None => connect.await,
        };
        outcome.map_err(|e| ClientError::ConnectFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
    }

    /// Authenticate on an open link. True once both loops are running.
    pub async fn login(&self, user: &str, password: &str) -> bool {
        match self.try_login(user, password).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user, error = %e, "client: login failed");
                false
            }
        }
    }

    pub async fn try_login(&self, user: &str, password: &str) -> Result<()> {
        let mut link = self.link.lock().await;
        match self.session.state() {
            SessionState::AwaitingAuth => {}
            SessionState::Connected => {
                return Err(ClientError::InvalidTransition {
                    from: SessionState::Connected.name(),
                    to: SessionState::Connected.name(),
                })
            }
            _ => return Err(ClientError::NotConnected),
        }
        let Link::Open {
            mut reader,
            mut writer,
        } = std::mem::replace(&mut *link, Link::Idle)
        else {
            self.session.mark_disconnected("no open link");
            return Err(ClientError::NotConnected);
        };

        let request = Record::new(self.config.client.handshake_kind.as_str(), [user, password]);
        let reply = match self.handshake(&mut reader, &mut writer, request).await {
            Ok(reply) => reply,
            Err(e) => {
                close_writer(writer).await;
                self.session.mark_disconnected("handshake failed");
                return Err(e);
            }
        };

        if reply.event_kind() == EventKind::Error {
            close_writer(writer).await;
            self.session.mark_disconnected("login refused");
            let detail = if reply.fields.is_empty() {
                reply.kind
            } else {
                reply.fields.join(";")
            };
            return Err(ClientError::AuthFailed(detail));
        }
        let sessions = (reply.event_kind() == EventKind::SessionList).then_some(reply.fields);

        let established = self.session.write().establish(user, password, sessions);
        if let Err(e) = established {
            close_writer(writer).await;
            self.session.mark_disconnected("handshake state lost");
            return Err(e);
        }

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let sender = tokio::spawn(sender_task::run_sender_loop(
            writer,
            self.queues.clone(),
            self.session.clone(),
            self.config.timing.flush_interval(),
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        let receiver = tokio::spawn(receiver_task::run_receiver_loop(
            reader,
            self.document.clone(),
            self.applier.clone(),
            self.session.clone(),
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));
        *link = Link::Running {
            shutdown_tx,
            sender,
            receiver,
        };

        let session = self.session.read();
        tracing::info!(
            user,
            color = ?session.color,
            track_offset = ?session.track_offset,
            sessions = session.known_sessions.len(),
            "client: logged in"
        );
        Ok(())
    }

    /// Send the handshake record directly and wait for exactly one reply.
    async fn handshake(
        &self,
        reader: &mut Reader,
        writer: &mut Writer,
        request: Record,
    ) -> Result<Record> {
        writer.send(request).await?;

        let frame = match self.config.timing.handshake_timeout() {
            Some(limit) => tokio::time::timeout(limit, reader.next())
                .await
                .map_err(|_| ClientError::HandshakeTimeout(self.config.timing.handshake_timeout_ms))?,
            None => reader.next().await,
        };
        match frame {
            Some(Ok(Frame::Line(frame))) => Ok(decode(&frame)?),
            Some(Ok(Frame::Oversized { size })) => Err(ProtocolError::MessageTooLarge {
                size,
                max: self.config.protocol.max_frame_bytes,
            }
            .into()),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::HandshakeClosed),
        }
    }

    /// Close the link and stop both loops. Safe to call at any time.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        let previous = std::mem::replace(&mut *link, Link::Idle);

        if self.session.is_connected() && matches!(previous, Link::Running { .. }) {
            let grace = self.config.timing.disconnect_grace();
            tracing::info!(grace_ms = grace.as_millis() as u64, "client: disconnecting");
            tokio::time::sleep(grace).await;
        }
        self.close_link(previous).await;
        self.discard_unsent();
        self.session.mark_disconnected("disconnect requested");
    }

    /// Events queued for a session that no longer exists never reach the
    /// next one.
    fn discard_unsent(&self) {
        let dropped = self.queues.outgoing_len() + self.queues.deferred_len();
        if dropped > 0 {
            tracing::debug!(dropped, "client: discarding unsent events");
        }
        self.queues.clear();
    }

    async fn close_link(&self, link: Link) {
        match link {
            Link::Idle => {}
            Link::Open { reader, writer } => {
                drop(reader);
                close_writer(writer).await;
            }
            Link::Running {
                shutdown_tx,
                sender,
                receiver,
            } => {
                let _ = shutdown_tx.send(());
                let bound = self.config.timing.task_join_timeout();
                join_task("sender", sender, bound).await;
                join_task("receiver", receiver, bound).await;
            }
        }
    }

    // -- Collaborator API --

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn get_login(&self) -> Option<String> {
        self.session.read().login.clone()
    }

    pub fn get_known_sessions(&self) -> Vec<String> {
        self.session.read().known_sessions.clone()
    }

    /// Color of the collaborator whose edit was applied last.
    pub fn get_current_color(&self) -> Option<Color> {
        self.session.read().current_color
    }

    pub fn get_track_offset(&self) -> Option<u32> {
        self.session.read().track_offset
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn document(&self) -> SharedDocument<D> {
        self.document.clone()
    }

    pub fn queues(&self) -> &EventQueues {
        &self.queues
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Queue `kind;fields..` for the sender. False (event dropped) when not
    /// connected, the record is malformed or the queue refused it.
    pub fn enqueue_event<S: AsRef<str>>(&self, fields: &[S], kind: &str) -> bool {
        report(kind, self.try_enqueue_event(fields, kind))
    }

    pub fn try_enqueue_event<S: AsRef<str>>(&self, fields: &[S], kind: &str) -> Result<Enqueued> {
        let record = self.outbound(fields, kind)?;
        Ok(self.queues.enqueue(record)?)
    }

    /// Like `enqueue_event`, but held back until `promote_pending`.
    pub fn enqueue_deferred_event<S: AsRef<str>>(&self, fields: &[S], kind: &str) -> bool {
        report(kind, self.try_enqueue_deferred_event(fields, kind))
    }

    pub fn try_enqueue_deferred_event<S: AsRef<str>>(
        &self,
        fields: &[S],
        kind: &str,
    ) -> Result<Enqueued> {
        let record = self.outbound(fields, kind)?;
        Ok(self.queues.enqueue_deferred(record)?)
    }

    /// Release deferred events to the sender. Returns how many moved; zero
    /// when not connected.
    pub fn promote_pending(&self) -> usize {
        if !self.session.is_connected() {
            return 0;
        }
        self.queues.promote()
    }

    fn outbound<S: AsRef<str>>(&self, fields: &[S], kind: &str) -> Result<Record> {
        if !self.session.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let record = Record::new(kind, fields.iter().map(|f| f.as_ref()));
        FrameCodec::with_max_frame_bytes(self.config.protocol.max_frame_bytes).check(&record)?;
        Ok(record)
    }

    pub fn create_session(&self, name: &str) -> bool {
        self.enqueue_event(&[name], kind::NEW_SESSION)
    }

    pub fn join_session(&self, name: &str) -> bool {
        self.enqueue_event(&[name], kind::JOIN_SESSION)
    }

    pub fn leave_session(&self) -> bool {
        match self.get_login() {
            Some(login) => self.enqueue_event(&[login], kind::SESSION_ENDED),
            None => false,
        }
    }

    pub fn send_chat(&self, text: &str) -> bool {
        self.enqueue_event(&[text], kind::CHAT)
    }

    /// Announce a key played on the local keyboard.
    pub fn play_note(&self, note: &str, instrument: &str) -> bool {
        match self.get_login() {
            Some(login) => self.enqueue_event(&[note, instrument, login.as_str()], kind::PLAY_NOTE),
            None => false,
        }
    }
}

fn report(kind: &str, outcome: Result<Enqueued>) -> bool {
    match outcome {
        Ok(_) => true,
        Err(ClientError::NotConnected) => {
            tracing::debug!(kind, "client: not connected, event dropped");
            false
        }
        Err(e) => {
            tracing::warn!(kind, error = %e, "client: event dropped");
            false
        }
    }
}

async fn close_writer(mut writer: Writer) {
    if let Err(e) = SinkExt::<Record>::close(&mut writer).await {
        tracing::debug!(error = %e, "client: closing write half failed");
    }
}

async fn join_task(name: &'static str, handle: JoinHandle<()>, bound: Duration) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(bound, handle).await {
        Ok(Ok(())) => tracing::debug!(task = name, "client: task joined"),
        Ok(Err(e)) => tracing::warn!(task = name, error = %e, "client: task ended abnormally"),
        Err(_) => {
            tracing::warn!(task = name, "client: task did not stop in time, aborting");
            abort.abort();
        }
    }
}
