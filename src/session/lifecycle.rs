use super::SessionError;
use super::dispatch::{CloseDispatcher, CloseReason};
use crate::model::Conversation;
use crate::vendor::{ConversationProvider, setup_cooking_conversation};
use std::sync::Arc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Creating,
    Open,
    Closing,
    Closed,
}

/// Owns one conversation at a time and guarantees its remote teardown is
/// requested at most once, whichever of leave/unload fires first.
pub struct ConversationManager {
    provider: Arc<dyn ConversationProvider>,
    closer: CloseDispatcher,
    persona_id: String,
    fallback: bool,
    state: ConversationState,
    conversation: Option<Conversation>,
    closing: Option<oneshot::Receiver<()>>,
}

impl ConversationManager {
    pub fn new(
        provider: Arc<dyn ConversationProvider>,
        closer: CloseDispatcher,
        persona_id: &str,
        fallback: bool,
    ) -> Self {
        Self {
            provider,
            closer,
            persona_id: persona_id.to_string(),
            fallback,
            state: ConversationState::Idle,
            conversation: None,
            closing: None,
        }
    }

    pub async fn start(&mut self, ingredients: Vec<String>) -> Result<Conversation, SessionError> {
        let state = self.state();
        if !matches!(state, ConversationState::Idle | ConversationState::Closed) {
            return Err(SessionError::Busy(state));
        }

        self.state = ConversationState::Creating;
        self.conversation = None;
        self.closing = None;

        match setup_cooking_conversation(
            self.provider.as_ref(),
            &self.persona_id,
            ingredients,
            self.fallback,
        )
        .await
        {
            Ok(conversation) => {
                let id = conversation
                    .conversation_id
                    .as_deref()
                    .unwrap_or("placeholder");
                info!(conversation_id = id, "Conversation open");
                self.state = ConversationState::Open;
                self.conversation = Some(conversation.clone());
                Ok(conversation)
            }
            Err(e) => {
                self.state = ConversationState::Idle;
                Err(e.into())
            }
        }
    }

    pub fn leave(&mut self) -> bool {
        self.close(CloseReason::Leave)
    }

    // Never waits on the network.
    pub fn page_unload(&mut self) -> bool {
        self.close(CloseReason::PageUnload)
    }

    fn close(&mut self, reason: CloseReason) -> bool {
        if self.state() != ConversationState::Open {
            debug!(state = ?self.state, "Ignoring {} signal", reason);
            return false;
        }

        let conversation_id = self
            .conversation
            .as_ref()
            .and_then(|c| c.conversation_id.clone());

        match conversation_id {
            Some(id) => {
                self.closing = self.closer.dispatch(&id, reason);
                self.state = if self.closing.is_some() {
                    ConversationState::Closing
                } else {
                    ConversationState::Closed
                };
            }
            None => {
                debug!("Placeholder conversation closed locally ({})", reason);
                self.state = ConversationState::Closed;
            }
        }
        true
    }

    pub fn state(&mut self) -> ConversationState {
        if self.state == ConversationState::Closing
            && let Some(attempted) = self.closing.as_mut()
        {
            match attempted.try_recv() {
                Ok(()) | Err(TryRecvError::Closed) => {
                    self.closing = None;
                    self.state = ConversationState::Closed;
                }
                Err(TryRecvError::Empty) => {}
            }
        }
        self.state
    }

    pub async fn closed(&mut self) {
        if let Some(attempted) = self.closing.take() {
            let _ = attempted.await;
        }
        if self.state == ConversationState::Closing {
            self.state = ConversationState::Closed;
        }
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::VendorError;
    use crate::vendor::testing::FakeConversationProvider;

    fn manager(provider: Arc<FakeConversationProvider>) -> ConversationManager {
        let (closer, _worker) = CloseDispatcher::spawn(provider.clone());
        ConversationManager::new(provider, closer, "p1", true)
    }

    #[tokio::test]
    async fn test_start_opens_conversation() {
        let provider = Arc::new(FakeConversationProvider::default());
        let mut manager = manager(provider);
        assert_eq!(manager.state(), ConversationState::Idle);

        let conversation = manager.start(vec!["eggs".into()]).await.unwrap();

        assert_eq!(manager.state(), ConversationState::Open);
        assert_eq!(conversation.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(manager.conversation(), Some(&conversation));
    }

    #[tokio::test]
    async fn test_failed_start_returns_to_idle() {
        let failure = VendorError::from_status(401, "invalid key");
        let provider = Arc::new(FakeConversationProvider::failing(failure));
        let mut manager = manager(provider);

        let err = manager.start(vec![]).await.unwrap_err();

        assert!(matches!(err, SessionError::Vendor(ref e) if e.status == Some(401)));
        assert_eq!(manager.state(), ConversationState::Idle);
        assert!(manager.conversation().is_none());
    }

    #[tokio::test]
    async fn test_leave_then_unload_ends_once() {
        let provider = Arc::new(FakeConversationProvider::default());
        let mut manager = manager(provider.clone());
        manager.start(vec!["eggs".into()]).await.unwrap();

        assert!(manager.leave());
        assert!(!manager.page_unload());
        manager.closed().await;
        assert!(!manager.leave());

        assert_eq!(manager.state(), ConversationState::Closed);
        assert_eq!(provider.ended_ids(), vec!["c-1"]);
    }

    #[tokio::test]
    async fn test_unload_then_leave_ends_once() {
        let provider = Arc::new(FakeConversationProvider::default());
        let mut manager = manager(provider.clone());
        manager.start(vec![]).await.unwrap();

        assert!(manager.page_unload());
        assert_eq!(manager.state(), ConversationState::Closing);
        assert!(!manager.leave());
        manager.closed().await;

        assert_eq!(provider.ended_ids(), vec!["c-1"]);
    }

    #[tokio::test]
    async fn test_close_without_conversation_is_noop() {
        let provider = Arc::new(FakeConversationProvider::default());
        let mut manager = manager(provider.clone());

        assert!(!manager.leave());
        assert!(!manager.page_unload());
        assert_eq!(manager.state(), ConversationState::Idle);
        assert!(provider.ended_ids().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_closes_without_request() {
        let provider = Arc::new(FakeConversationProvider::unreachable());
        let mut manager = manager(provider.clone());

        let conversation = manager.start(vec!["eggs".into()]).await.unwrap();
        assert!(conversation.is_placeholder());

        assert!(manager.leave());
        assert_eq!(manager.state(), ConversationState::Closed);
        assert!(provider.ended_ids().is_empty());
    }

    #[tokio::test]
    async fn test_restart_after_close_creates_new_conversation() {
        let provider = Arc::new(FakeConversationProvider::default());
        let mut manager = manager(provider.clone());

        manager.start(vec![]).await.unwrap();
        assert!(matches!(
            manager.start(vec![]).await,
            Err(SessionError::Busy(ConversationState::Open))
        ));

        manager.leave();
        manager.closed().await;
        let second = manager.start(vec![]).await.unwrap();

        assert_eq!(second.conversation_id.as_deref(), Some("c-2"));
        assert_eq!(manager.state(), ConversationState::Open);
        assert_eq!(provider.ended_ids(), vec!["c-1"]);
    }
}
