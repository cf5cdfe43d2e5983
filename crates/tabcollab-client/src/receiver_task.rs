//! Receiver task -- reads records from the server and replays them.
//!
//! Undecodable and oversized frames are logged and dropped. `PlayNote` takes
//! the document lock for the length of one applier call; notifications never
//! touch the document. EOF or a read error ends the link the same way a
//! sender failure does.

use futures::StreamExt;
use tabcollab_document::Document;
use tabcollab_protocol::{decode, EventKind, Frame, FrameCodec};
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;

use crate::applier::{Applied, RemoteEventApplier};
use crate::client::SharedDocument;
use crate::identity;
use crate::session::SessionHandle;

/// Run the receiver loop until shutdown, EOF or a read error.
pub async fn run_receiver_loop<R, D>(
    mut stream: FramedRead<R, FrameCodec>,
    document: SharedDocument<D>,
    applier: RemoteEventApplier,
    session: SessionHandle,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: AsyncRead + Unpin,
    D: Document,
{
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Frame::Line(frame))) => {
                    handle_frame(&frame, &document, &applier, &session).await
                }
                Some(Ok(Frame::Oversized { size })) => {
                    tracing::warn!(size, "receiver: dropping oversized frame");
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "receiver: read failed, dropping link");
                    session.mark_disconnected("read failed");
                    let _ = shutdown_tx.send(());
                    break;
                }
                None => {
                    tracing::info!("receiver: server closed the link");
                    session.mark_disconnected("server closed");
                    let _ = shutdown_tx.send(());
                    break;
                }
            },
            _ = shutdown.recv() => {
                tracing::debug!("receiver: stopped");
                break;
            }
        }
    }
}

async fn handle_frame<D: Document>(
    frame: &[u8],
    document: &SharedDocument<D>,
    applier: &RemoteEventApplier,
    session: &SessionHandle,
) {
    let record = match decode(frame) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, len = frame.len(), "receiver: dropping undecodable frame");
            return;
        }
    };
    tracing::debug!(kind = %record.kind, fields = record.fields.len(), "receiver: record");

    match record.event_kind() {
        EventKind::SessionList => session.write().known_sessions = record.fields.clone(),
        // The player's color shows even when the note cannot be placed.
        EventKind::PlayNote => {
            if let Some(user) = record.field(2) {
                session.set_current_color(identity::color_for(user));
            }
        }
        _ => {}
    }

    let outcome = if RemoteEventApplier::needs_document(&record) {
        let mut doc = document.lock().await;
        applier.apply(&mut *doc, &record)
    } else {
        Ok(applier.notify(&record))
    };

    match outcome {
        Ok(Applied::NoteInserted(ins)) => {
            tracing::debug!(
                user = %ins.user,
                track = ins.at.track,
                measure = ins.at.measure,
                string = ins.string,
                fret = ins.fret,
                "receiver: remote note applied"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(kind = %record.kind, error = %e, "receiver: event dropped"),
    }
}
