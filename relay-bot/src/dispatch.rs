//! Inbound message dispatch.
//!
//! Every conversation gets its own FIFO queue and worker task, so messages of
//! one conversation are handled strictly in arrival order while different
//! conversations proceed in parallel.

use crate::message::ChannelMessage;
use crate::orchestrator::Orchestrator;
use crate::traits::Channel;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

struct Worker {
    tx: mpsc::UnboundedSender<ChannelMessage>,
    handle: JoinHandle<()>,
}

fn spawn_worker<C>(
    conversation_id: String,
    orchestrator: Arc<Orchestrator>,
    channel: Arc<C>,
) -> Worker
where
    C: Channel + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelMessage>();

    let handle = tokio::spawn(async move {
        tracing::debug!(conversation_id = %conversation_id, "Conversation worker started");

        while let Some(message) = rx.recv().await {
            let span = relay_common::channel_span!(
                message.channel_type_str(),
                message.trace_id,
                message.user_id,
                conversation_id = %message.channel_id
            );

            async {
                let outcome = orchestrator.handle(&message, channel.as_ref()).await;
                tracing::debug!(?outcome, message_id = %message.id, "Message handled");
            }
            .instrument(span)
            .await;
        }
    });

    Worker { tx, handle }
}

/// Spawn the processor that routes inbound messages to per-conversation
/// workers.
///
/// The returned task finishes once `rx` is closed and every worker has drained
/// its queue.
pub fn spawn_processor<C>(
    orchestrator: Arc<Orchestrator>,
    channel: Arc<C>,
    mut rx: mpsc::Receiver<ChannelMessage>,
) -> JoinHandle<()>
where
    C: Channel + 'static,
{
    tokio::spawn(async move {
        tracing::info!(channel = channel.name(), "Message processor started");

        // One entry per conversation ever seen; `/reset` clears history only
        let mut workers: HashMap<String, Worker> = HashMap::new();

        while let Some(message) = rx.recv().await {
            // A worker whose queue is closed has died; replace it
            let message = match workers.get(&message.channel_id) {
                Some(worker) => match worker.tx.send(message) {
                    Ok(()) => continue,
                    Err(mpsc::error::SendError(message)) => {
                        tracing::warn!(
                            conversation_id = %message.channel_id,
                            "Conversation worker stopped unexpectedly, restarting"
                        );
                        message
                    }
                },
                None => message,
            };

            let conversation_id = message.channel_id.clone();
            let worker = spawn_worker(
                conversation_id.clone(),
                Arc::clone(&orchestrator),
                Arc::clone(&channel),
            );
            if worker.tx.send(message).is_err() {
                tracing::warn!(conversation_id = %conversation_id, "Dropped message for new worker");
            }
            workers.insert(conversation_id, worker);
        }

        let conversations = workers.len();
        let handles: Vec<JoinHandle<()>> = workers
            .into_values()
            .map(|Worker { tx, handle }| {
                drop(tx);
                handle
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Conversation worker panicked");
            }
        }

        tracing::info!(conversations, "Message processor stopped");
    })
}
