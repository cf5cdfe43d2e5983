//! Sender task -- flushes the outgoing queue to the server.
//!
//! Wakes on an enqueue notification or on the flush tick, whichever comes
//! first. Each wake drains the outgoing queue, feeds every record to the
//! sink and flushes once. A record that cannot be encoded is logged and
//! skipped. A write failure ends the link: the session drops to Disconnected
//! and the shared shutdown signal stops the receiver.
//! On shutdown the queue is drained one last time before the write half
//! closes.

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tabcollab_protocol::{FrameCodec, ProtocolError, Record};
use tokio::io::AsyncWrite;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::FramedWrite;

use crate::queues::EventQueues;
use crate::session::SessionHandle;

/// Run the sender loop until shutdown or a write failure.
pub async fn run_sender_loop<W>(
    mut sink: FramedWrite<W, FrameCodec>,
    queues: Arc<EventQueues>,
    session: SessionHandle,
    flush_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown: broadcast::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    let mut tick = tokio::time::interval(flush_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = queues.notified() => {}
            _ = tick.tick() => {}
            _ = shutdown.recv() => {
                match flush_batch(&mut sink, &queues).await {
                    Ok(0) => {}
                    Ok(sent) => tracing::debug!(sent, "sender: final drain flushed"),
                    Err(e) => tracing::warn!(error = %e, "sender: final drain failed"),
                }
                if let Err(e) = SinkExt::<Record>::close(&mut sink).await {
                    tracing::debug!(error = %e, "sender: close failed");
                }
                tracing::debug!("sender: stopped");
                return;
            }
        }

        if let Err(e) = flush_batch(&mut sink, &queues).await {
            tracing::warn!(error = %e, "sender: write failed, dropping link");
            session.mark_disconnected("write failed");
            let _ = shutdown_tx.send(());
            return;
        }
    }
}

/// Drain the outgoing queue into `sink` with a single flush. Returns the
/// number of records written. Only io errors are returned.
async fn flush_batch<W>(
    sink: &mut FramedWrite<W, FrameCodec>,
    queues: &EventQueues,
) -> Result<usize, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let batch = queues.drain();
    if batch.is_empty() {
        return Ok(0);
    }
    let mut sent = 0;
    for record in batch {
        tracing::debug!(kind = %record.kind, fields = record.fields.len(), "sender: record");
        let kind = record.kind.clone();
        match sink.feed(record).await {
            Ok(()) => sent += 1,
            Err(ProtocolError::Io(e)) => return Err(ProtocolError::Io(e)),
            Err(e) => tracing::warn!(kind = %kind, error = %e, "sender: skipping unencodable record"),
        }
    }
    SinkExt::<Record>::flush(sink).await?;
    Ok(sent)
}
