use crate::vendor::ConversationProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Leave,
    PageUnload,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Leave => write!(f, "leave"),
            CloseReason::PageUnload => write!(f, "page unload"),
        }
    }
}

struct CloseJob {
    conversation_id: String,
    reason: CloseReason,
    done: oneshot::Sender<()>,
}

#[derive(Clone)]
pub struct CloseDispatcher {
    tx: mpsc::UnboundedSender<CloseJob>,
}

pub struct CloseWorker {
    handle: JoinHandle<()>,
}

impl CloseDispatcher {
    pub fn spawn(provider: Arc<dyn ConversationProvider>) -> (Self, CloseWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(provider, rx));
        (Self { tx }, CloseWorker { handle })
    }

    /// Queues a close. The returned receiver resolves once the request has
    /// been attempted; `None` means the worker is gone and nothing was sent.
    pub fn dispatch(
        &self,
        conversation_id: &str,
        reason: CloseReason,
    ) -> Option<oneshot::Receiver<()>> {
        let (done, attempted) = oneshot::channel();
        let job = CloseJob {
            conversation_id: conversation_id.to_string(),
            reason,
            done,
        };
        match self.tx.send(job) {
            Ok(()) => Some(attempted),
            Err(_) => {
                warn!(
                    conversation_id,
                    "Close worker stopped, dropping end-conversation request"
                );
                None
            }
        }
    }
}

impl CloseWorker {
    /// Waits for queued closes, up to `grace`. All dispatchers must be
    /// dropped first or this waits the full grace period.
    pub async fn drain(self, grace: Duration) {
        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => info!("Close worker drained"),
            Ok(Err(e)) => error!("Close worker failed: {}", e),
            Err(_) => {
                warn!("Close worker did not drain within {:?}", grace);
                handle.abort();
            }
        }
    }
}

async fn run_worker(
    provider: Arc<dyn ConversationProvider>,
    mut rx: mpsc::UnboundedReceiver<CloseJob>,
) {
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                let provider = provider.clone();
                in_flight.spawn(async move {
                    match provider.end_conversation(&job.conversation_id).await {
                        Ok(_) => info!(
                            conversation_id = %job.conversation_id,
                            "Conversation ended ({})", job.reason
                        ),
                        Err(e) => warn!(
                            conversation_id = %job.conversation_id,
                            "Failed to end conversation ({}): {}", job.reason, e
                        ),
                    }
                    let _ = job.done.send(());
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    while in_flight.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::VendorError;
    use crate::vendor::testing::FakeConversationProvider;

    #[tokio::test]
    async fn test_dispatch_sends_end_request() {
        let provider = Arc::new(FakeConversationProvider::default());
        let (dispatcher, worker) = CloseDispatcher::spawn(provider.clone());

        let attempted = dispatcher.dispatch("c-1", CloseReason::Leave).unwrap();
        attempted.await.unwrap();

        assert_eq!(provider.ended_ids(), vec!["c-1"]);
        drop(dispatcher);
        worker.drain(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let provider = Arc::new(FakeConversationProvider {
            end_failure: Some(VendorError::from_status(404, "already ended")),
            ..Default::default()
        });
        let (dispatcher, worker) = CloseDispatcher::spawn(provider.clone());

        let attempted = dispatcher.dispatch("c-1", CloseReason::Leave).unwrap();
        attempted.await.unwrap();
        assert_eq!(provider.ended_ids(), vec!["c-1"]);

        drop(dispatcher);
        worker.drain(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_drain_flushes_queued_closes() {
        let provider = Arc::new(FakeConversationProvider::default());
        let (dispatcher, worker) = CloseDispatcher::spawn(provider.clone());

        dispatcher.dispatch("c-1", CloseReason::PageUnload);
        dispatcher.dispatch("c-2", CloseReason::PageUnload);
        drop(dispatcher);
        worker.drain(Duration::from_secs(1)).await;

        let mut ended = provider.ended_ids();
        ended.sort();
        assert_eq!(ended, vec!["c-1", "c-2"]);
    }
}
