use super::transcript::{TranscriptMessage, TranscriptReader};
use crate::model::ExtractedRecipe;
use crate::vendor::LanguageModel;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const RECIPE_KEYWORDS: [&str; 9] = [
    "recipe",
    "ingredients",
    "steps",
    "cook",
    "bake",
    "fry",
    "mix",
    "season",
    "heat",
];

pub const EXTRACTION_WINDOW: usize = 10;

pub fn render_window(messages: &[TranscriptMessage]) -> String {
    let start = messages.len().saturating_sub(EXTRACTION_WINDOW);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.speaker, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn mentions_recipe(text: &str) -> bool {
    let text = text.to_lowercase();
    RECIPE_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

pub struct RecipeExtractor {
    model: Arc<dyn LanguageModel>,
    current: watch::Sender<Option<ExtractedRecipe>>,
}

impl RecipeExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        let (current, _) = watch::channel(None);
        Self { model, current }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ExtractedRecipe>> {
        self.current.subscribe()
    }

    pub fn current(&self) -> Option<ExtractedRecipe> {
        self.current.borrow().clone()
    }

    pub async fn extract(&self, messages: &[TranscriptMessage]) -> bool {
        let conversation = render_window(messages);
        if !mentions_recipe(&conversation) {
            debug!("No recipe keywords in transcript window, skipping extraction");
            return false;
        }

        match self.model.extract_recipe(&conversation).await {
            Ok(Some(recipe)) if recipe.is_complete() => {
                info!(title = %recipe.title, steps = recipe.steps.len(), "Recipe extracted");
                self.current.send_replace(Some(recipe));
                true
            }
            Ok(_) => {
                debug!("Model found no complete recipe");
                false
            }
            Err(e) => {
                warn!("Recipe extraction failed: {}", e);
                false
            }
        }
    }

    // Signals that arrive during an extraction collapse into one run.
    pub fn spawn(
        self,
        reader: TranscriptReader,
        mut growth: watch::Receiver<u64>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while growth.changed().await.is_ok() {
                let window = reader.tail(EXTRACTION_WINDOW);
                self.extract(&window).await;
            }
            debug!("Transcript closed, recipe extractor stopping");
        })
    }
}
