use super::{ApiError, AppState};
use crate::model::Conversation;
use crate::utils::strip_data_url;
use crate::vendor::{ErrorKind, setup_cooking_conversation};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Deserialize)]
pub struct SetupRequest {
    #[serde(default)]
    ingredients: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct ExtractRecipeRequest {
    #[serde(default)]
    conversation: Option<String>,
}

#[derive(Deserialize)]
pub struct EndConversationRequest {
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn setup_conversation(
    State(state): State<AppState>,
    body: Result<Json<SetupRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    let Json(request) = body?;
    let provider = state
        .conversations
        .as_ref()
        .ok_or(ApiError::Configuration("Tavus API key not configured"))?;
    let persona_id = state
        .persona_id
        .as_deref()
        .ok_or(ApiError::Configuration("Persona id not configured"))?;

    let ingredients = request.ingredients.unwrap_or_default();
    info!(count = ingredients.len(), "Setting up cooking conversation");

    let conversation = setup_cooking_conversation(
        provider.as_ref(),
        persona_id,
        ingredients,
        state.placeholder_on_failure,
    )
    .await
    .map_err(|e| {
        error!("Conversation setup failed: {}", e);
        ApiError::upstream("Failed to setup conversation", e)
    })?;

    Ok(Json(conversation))
}

pub async fn extract_recipe(
    State(state): State<AppState>,
    body: Result<Json<ExtractRecipeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let conversation = non_empty(request.conversation)
        .ok_or_else(|| ApiError::bad_request("Conversation text is required"))?;
    let model = state
        .model
        .as_ref()
        .ok_or(ApiError::Configuration("OpenAI API key not configured"))?;

    match model.extract_recipe(&conversation).await {
        Ok(Some(recipe)) => {
            info!(title = %recipe.title, "Recipe extracted");
            Ok(Json(json!(recipe)))
        }
        Ok(None) => Ok(Json(json!({}))),
        Err(e) if e.kind == ErrorKind::Malformed => {
            warn!("Unreadable recipe completion: {}", e);
            Ok(Json(json!({})))
        }
        Err(e) => {
            error!("Recipe extraction failed: {}", e);
            Err(ApiError::upstream("Failed to extract recipe", e))
        }
    }
}

// The provider wraps its listing as `{"data": [...]}`.
fn listed_conversations(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut body) => match body.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub async fn list_conversations(State(state): State<AppState>) -> Json<Value> {
    let Some(provider) = state.conversations.as_ref() else {
        return Json(json!({ "conversations": [] }));
    };

    match provider.list_conversations().await {
        Ok(data) => Json(json!({ "conversations": listed_conversations(data) })),
        Err(e) => {
            warn!("Failed to list conversations: {}", e);
            Json(json!({ "conversations": [], "error": e.message }))
        }
    }
}

pub async fn end_conversation(
    State(state): State<AppState>,
    body: Result<Json<EndConversationRequest>, JsonRejection>,
) -> Json<Value> {
    let conversation_id = body
        .ok()
        .and_then(|Json(request)| non_empty(request.conversation_id));

    let (Some(provider), Some(conversation_id)) = (state.conversations.as_ref(), conversation_id)
    else {
        return Json(json!({
            "success": true,
            "message": "No API key or conversation ID provided"
        }));
    };

    match provider.end_conversation(&conversation_id).await {
        Ok(data) => {
            info!(conversation_id = %conversation_id, "Conversation ended");
            Json(json!({ "success": true, "data": data }))
        }
        Err(e) => {
            warn!(conversation_id = %conversation_id, "Failed to end conversation: {}", e);
            Json(json!({ "success": false, "error": e.message }))
        }
    }
}

pub async fn analyze_ingredients(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let image =
        non_empty(request.image).ok_or_else(|| ApiError::bad_request("No image provided"))?;
    let model = state
        .model
        .as_ref()
        .ok_or(ApiError::Configuration("OpenAI API key not configured"))?;

    let image_base64 = strip_data_url(&image);
    info!(image_len = image_base64.len(), "Analyzing ingredients");

    match model
        .extract_ingredients(image_base64, non_empty(request.prompt).as_deref())
        .await
    {
        Ok(ingredients) => {
            info!(count = ingredients.len(), "Ingredients detected");
            Ok(Json(json!({ "ingredients": ingredients })))
        }
        Err(e) if e.kind == ErrorKind::Malformed => {
            warn!("Unreadable vision completion: {}", e);
            Ok(Json(json!({ "ingredients": [] })))
        }
        Err(e) => {
            error!("Ingredient analysis failed: {}", e);
            Err(ApiError::upstream("Failed to analyze ingredients", e))
        }
    }
}
