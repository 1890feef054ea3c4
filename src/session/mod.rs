mod dispatch;
mod lifecycle;
mod recipe;
mod transcript;
mod transport;

pub use dispatch::{CloseDispatcher, CloseReason, CloseWorker};
pub use lifecycle::{ConversationManager, ConversationState};
pub use recipe::{
    EXTRACTION_WINDOW, RECIPE_KEYWORDS, RecipeExtractor, mentions_recipe, render_window,
};
pub use transcript::{
    MessageHandler, SignalHandler, Speaker, TranscriptCollector, TranscriptMessage,
    TranscriptReader, TranscriptTransport, TransportMessage,
};
pub use transport::{LocalTransport, TransportEvent};

use crate::model::{Conversation, ExtractedRecipe};
use crate::vendor::{ConversationProvider, LanguageModel, VendorError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("conversation is {0:?}, cannot start another")]
    Busy(ConversationState),
    #[error("no open conversation to join")]
    NotOpen,
    #[error(transparent)]
    Vendor(#[from] VendorError),
}

struct LiveTranscript {
    collector: TranscriptCollector,
    extractor: Option<JoinHandle<()>>,
    recipe: watch::Receiver<Option<ExtractedRecipe>>,
}

impl LiveTranscript {
    fn stop(&mut self) {
        self.collector.detach();
        if let Some(extractor) = self.extractor.take() {
            extractor.abort();
        }
    }
}

impl Drop for LiveTranscript {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CookingSession {
    id: Uuid,
    manager: ConversationManager,
    model: Arc<dyn LanguageModel>,
    live: Option<LiveTranscript>,
}

impl CookingSession {
    pub fn new(
        provider: Arc<dyn ConversationProvider>,
        model: Arc<dyn LanguageModel>,
        closer: CloseDispatcher,
        persona_id: &str,
        fallback: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            manager: ConversationManager::new(provider, closer, persona_id, fallback),
            model,
            live: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn start(&mut self, ingredients: Vec<String>) -> Result<Conversation, SessionError> {
        let conversation = self.manager.start(ingredients).await?;
        self.live = None;
        info!(session = %self.id, url = %conversation.conversation_url, "Cooking session started");
        Ok(conversation)
    }

    pub fn join(&mut self, transport: Arc<dyn TranscriptTransport>) -> Result<(), SessionError> {
        if self.manager.state() != ConversationState::Open {
            return Err(SessionError::NotOpen);
        }
        // Release the old subscription before registering on a possibly shared transport.
        self.live = None;

        let collector = TranscriptCollector::attach(transport);
        let extractor = RecipeExtractor::new(self.model.clone());
        let recipe = extractor.subscribe();
        let handle = extractor.spawn(collector.reader(), collector.subscribe());

        debug!(session = %self.id, "Transcript attached");
        self.live = Some(LiveTranscript {
            collector,
            extractor: Some(handle),
            recipe,
        });
        Ok(())
    }

    pub fn messages(&self) -> Vec<TranscriptMessage> {
        self.live
            .as_ref()
            .map(|live| live.collector.messages())
            .unwrap_or_default()
    }

    pub fn is_listening(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.collector.is_listening())
    }

    pub fn recipe(&self) -> Option<ExtractedRecipe> {
        self.live
            .as_ref()
            .and_then(|live| live.recipe.borrow().clone())
    }

    pub fn recipe_updates(&self) -> Option<watch::Receiver<Option<ExtractedRecipe>>> {
        self.live.as_ref().map(|live| live.recipe.clone())
    }

    pub fn leave(&mut self) -> bool {
        self.stop_transcript();
        self.manager.leave()
    }

    pub fn page_unload(&mut self) -> bool {
        self.stop_transcript();
        self.manager.page_unload()
    }

    fn stop_transcript(&mut self) {
        if let Some(live) = self.live.as_mut() {
            live.stop();
        }
    }

    pub fn state(&mut self) -> ConversationState {
        self.manager.state()
    }

    pub async fn closed(&mut self) {
        self.manager.closed().await
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.manager.conversation()
    }
}
