use crate::utils;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

pub const PLACEHOLDER_CONVERSATION_URL: &str = "mock://conversation-url";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_url: String,
    pub conversation_id: Option<String>,
    pub persona: Value,
    pub ingredients: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Conversation {
    pub fn placeholder(persona_id: &str, ingredients: Vec<String>) -> Self {
        Self {
            conversation_url: PLACEHOLDER_CONVERSATION_URL.to_string(),
            conversation_id: None,
            persona: json!({ "id": persona_id, "name": "Cooking Assistant" }),
            ingredients,
            extra: Map::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.conversation_id.is_none() && self.conversation_url == PLACEHOLDER_CONVERSATION_URL
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeStep {
    #[serde(default, deserialize_with = "lenient_step_number")]
    pub step: u32,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecipe {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<RecipeStep>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub cooking_time: Option<String>,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub servings: Option<String>,
}

impl ExtractedRecipe {
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.steps.is_empty()
    }

    /// `None` unless `content` holds a complete recipe as JSON.
    pub fn parse(content: &str) -> Option<Self> {
        let cleaned = utils::strip_code_fences(content);
        let mut recipe: ExtractedRecipe = serde_json::from_str(&cleaned).ok()?;
        recipe.normalize();
        recipe.is_complete().then_some(recipe)
    }

    fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.ingredients.retain(|i| !i.trim().is_empty());
        self.steps.retain(|s| !s.instruction.trim().is_empty());
        for (index, step) in self.steps.iter_mut().enumerate() {
            if step.step == 0 {
                step.step = index as u32 + 1;
            }
        }
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_step_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => u32::try_from(number.as_u64().unwrap_or(0)).unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_recipe() {
        let content = r#"```json
        {
          "title": "Pancakes",
          "ingredients": ["eggs", "flour"],
          "steps": [
            {"step": 1, "instruction": "Mix eggs and flour"},
            {"step": 2, "instruction": "Heat the pan"}
          ],
          "cookingTime": "15 minutes",
          "servings": 2
        }
        ```"#;

        let recipe = ExtractedRecipe::parse(content).unwrap();
        assert_eq!(recipe.title, "Pancakes");
        assert_eq!(recipe.ingredients, vec!["eggs", "flour"]);
        assert_eq!(recipe.steps.len(), 2);
        assert_eq!(recipe.cooking_time.as_deref(), Some("15 minutes"));
        assert_eq!(recipe.servings.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_rejects_empty_and_incomplete() {
        assert!(ExtractedRecipe::parse("{}").is_none());
        assert!(ExtractedRecipe::parse("not json at all").is_none());
        assert!(ExtractedRecipe::parse(r#"{"title": "Soup", "steps": []}"#).is_none());

        let blank_title = r#"{"title": " ", "steps": [{"step": 1, "instruction": "Boil"}]}"#;
        assert!(ExtractedRecipe::parse(blank_title).is_none());
    }

    #[test]
    fn test_steps_are_numbered_by_position_when_missing() {
        let content = r#"{
            "title": "Toast",
            "steps": [
                {"instruction": "Slice"},
                {"step": "2", "instruction": "Toast"},
                {"instruction": "Butter"}
            ]
        }"#;

        let recipe = ExtractedRecipe::parse(content).unwrap();
        let numbers: Vec<u32> = recipe.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_out_of_range_step_number_is_replaced_by_position() {
        let content = r#"{
            "title": "Tea",
            "steps": [
                {"step": 1, "instruction": "Boil water"},
                {"step": 4294967297, "instruction": "Steep"}
            ]
        }"#;

        let recipe = ExtractedRecipe::parse(content).unwrap();
        assert_eq!(recipe.steps[1].step, 2);
    }

    #[test]
    fn test_serializes_camel_case_without_empty_optionals() {
        let recipe = ExtractedRecipe {
            title: "Omelette".into(),
            ingredients: vec!["eggs".into()],
            steps: vec![RecipeStep {
                step: 1,
                instruction: "Whisk".into(),
            }],
            cooking_time: Some("5 minutes".into()),
            servings: None,
        };

        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["cookingTime"], "5 minutes");
        assert!(value.get("servings").is_none());
    }

    #[test]
    fn test_placeholder_conversation() {
        let conversation = Conversation::placeholder("p42", vec!["eggs".into()]);

        assert!(conversation.is_placeholder());
        assert_eq!(conversation.conversation_url, PLACEHOLDER_CONVERSATION_URL);
        assert_eq!(conversation.persona["id"], "p42");

        let value = serde_json::to_value(&conversation).unwrap();
        assert!(value["conversation_id"].is_null());
        assert_eq!(value["ingredients"], json!(["eggs"]));
    }

    #[test]
    fn test_provider_fields_are_kept() {
        let conversation: Conversation = serde_json::from_value(json!({
            "conversation_url": "https://tavus.daily.co/c123",
            "conversation_id": "c123",
            "persona": {},
            "ingredients": [],
            "status": "active"
        }))
        .unwrap();

        assert!(!conversation.is_placeholder());
        assert_eq!(conversation.extra["status"], "active");
    }
}
