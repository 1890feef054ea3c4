mod error;
mod handlers;

pub use error::ApiError;

use crate::config::Config;
use crate::vendor::{ConversationClient, ConversationProvider, LanguageModel, LlmClient};
use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;

// Base64 photos are big.
pub const BODY_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub conversations: Option<Arc<dyn ConversationProvider>>,
    pub model: Option<Arc<dyn LanguageModel>>,
    pub persona_id: Option<String>,
    pub placeholder_on_failure: bool,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let conversations: Option<Arc<dyn ConversationProvider>> =
            match config.conversation_api_key.as_deref() {
                Some(key) => Some(Arc::new(ConversationClient::new(
                    key,
                    &config.conversation_base_url,
                    Duration::from_secs(config.conversation_timeout),
                )?)),
                None => {
                    warn!("TAVUS_API_KEY not set, conversation endpoints are disabled");
                    None
                }
            };

        let model: Option<Arc<dyn LanguageModel>> = match config.llm_api_key.as_deref() {
            Some(key) => Some(Arc::new(LlmClient::new(key, config)?)),
            None => {
                warn!("OPENAI_API_KEY not set, ingredient and recipe extraction are disabled");
                None
            }
        };

        if config.persona_id.is_none() {
            warn!("PERSONA_ID not set, conversation setup will fail");
        }

        Ok(Self {
            conversations,
            model,
            persona_id: config.persona_id.clone(),
            placeholder_on_failure: config.placeholder_on_failure,
        })
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    let assets = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route(
            "/api/setup-cooking-conversation",
            post(handlers::setup_conversation),
        )
        .route("/api/extract-recipe", post(handlers::extract_recipe))
        .route("/api/conversations", get(handlers::list_conversations))
        .route("/api/end-conversation", post(handlers::end_conversation))
        .route(
            "/api/analyze-ingredients",
            post(handlers::analyze_ingredients),
        )
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
