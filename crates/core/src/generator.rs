//! Lesson Generation Service
//!
//! Turns a free-text topic into a structured, step-by-step Blender lesson by
//! prompting a hosted model once and validating the JSON it returns.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    error::LessonError,
    lesson::{Lesson, LessonStep},
    llm_client::LessonModel,
};

/// Defines the contract for any service that can produce a lesson.
///
/// This abstraction lets the API swap between the model-backed generator and
/// a deterministic one for local development without touching handlers.
#[async_trait]
pub trait LessonGenerator: Send + Sync {
    /// Generates a lesson for `topic`.
    ///
    /// # Arguments
    ///
    /// * `topic` - A catalog chapter title, or the user's own request.
    /// * `is_custom_request` - `true` when `topic` is a free-form user request.
    async fn generate_lesson(&self, topic: &str, is_custom_request: bool)
    -> Result<Lesson, LessonError>;
}

/// A `LessonGenerator` backed by a hosted generation model.
pub struct LlmLessonGenerator {
    model: Arc<dyn LessonModel>,
}

impl LlmLessonGenerator {
    pub fn new(model: Arc<dyn LessonModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl LessonGenerator for LlmLessonGenerator {
    async fn generate_lesson(
        &self,
        topic: &str,
        is_custom_request: bool,
    ) -> Result<Lesson, LessonError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(LessonError::InvalidInput(
                "a chapter title or user request is required".to_string(),
            ));
        }

        let prompt = build_prompt(topic, is_custom_request);
        let reply = self
            .model
            .generate(&prompt)
            .await
            .map_err(LessonError::Model)?;

        let Some(content) = reply.candidate else {
            warn!(topic, "Generation model returned no candidates");
            return Err(LessonError::NoCandidates { raw: reply.raw });
        };
        debug!(topic, content = %content, "Generation model responded");

        let steps = parse_steps(&content)?;
        info!(topic, steps = steps.len(), "Lesson generated");

        Ok(Lesson {
            chapter: topic.to_string(),
            steps,
        })
    }
}

/// Builds the instruction prompt. Only the framing sentence depends on
/// whether the topic is a direct request; the requested output shape is fixed.
pub fn build_prompt(topic: &str, is_custom_request: bool) -> String {
    let framing = if is_custom_request {
        "The user has made a direct request, so provide a specific tutorial for this task."
    } else {
        "Based on the Blender 5.0 Manual, provide a 3-step interactive lesson script."
    };

    format!(
        "You are Chiron, an AI Blender Instructor.\n\
         The user wants to learn about: \"{topic}\".\n\
         {framing}\n\
         \n\
         Provide a 3-step interactive lesson script in JSON format.\n\
         Each step should include:\n\
         - text: The spoken instruction (brief and helpful).\n\
         - command: A simulated command (e.g., \"HIGHLIGHT_INTERFACE\", \"ADD_CUBE\", \"EXTRUDE_FACE\").\n\
         - ui_target: The part of the UI to focus on (e.g., \"VIEWPORT\", \"PROPERTIES\", \"TOOLBAR\").\n\
         \n\
         Return ONLY the JSON array."
    )
}

/// Removes every markdown code-fence marker from the model output.
pub fn strip_code_fences(content: &str) -> String {
    content.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses fence-wrapped model output into validated lesson steps.
///
/// Accepts a bare array, or an object whose `steps` field is the array.
pub fn parse_steps(content: &str) -> Result<Vec<LessonStep>, LessonError> {
    let value: Value = serde_json::from_str(&strip_code_fences(content))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("steps") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(LessonError::SchemaViolation {
                    index: 0,
                    reason: "expected a JSON array of steps".to_string(),
                });
            }
        },
        _ => {
            return Err(LessonError::SchemaViolation {
                index: 0,
                reason: "expected a JSON array of steps".to_string(),
            });
        }
    };

    if entries.is_empty() {
        return Err(LessonError::SchemaViolation {
            index: 0,
            reason: "lesson has no steps".to_string(),
        });
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| validate_step(index, entry))
        .collect()
}

fn validate_step(index: usize, entry: &Value) -> Result<LessonStep, LessonError> {
    let object = entry.as_object().ok_or_else(|| LessonError::SchemaViolation {
        index,
        reason: "step is not an object".to_string(),
    })?;

    let field = |name: &str| -> Result<String, LessonError> {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LessonError::SchemaViolation {
                index,
                reason: format!("missing string field `{name}`"),
            })
    };

    let text = field("text")?;
    if text.trim().is_empty() {
        return Err(LessonError::SchemaViolation {
            index,
            reason: "`text` is empty".to_string(),
        });
    }

    Ok(LessonStep {
        text,
        command: field("command")?,
        ui_target: field("ui_target")?,
    })
}

/// A deterministic `LessonGenerator` for development without model credentials.
pub struct MockLessonGenerator;

#[async_trait]
impl LessonGenerator for MockLessonGenerator {
    /// Returns the same three-step lesson for every topic.
    async fn generate_lesson(
        &self,
        topic: &str,
        _is_custom_request: bool,
    ) -> Result<Lesson, LessonError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(LessonError::InvalidInput(
                "a chapter title or user request is required".to_string(),
            ));
        }
        let step = |text: String, command: &str, ui_target: &str| LessonStep {
            text,
            command: command.to_string(),
            ui_target: ui_target.to_string(),
        };
        Ok(Lesson {
            chapter: topic.to_string(),
            steps: vec![
                step(
                    format!("Let's learn about {}. Look at the viewport.", topic),
                    "HIGHLIGHT_INTERFACE",
                    "VIEWPORT",
                ),
                step(
                    "Add a cube to work with.".to_string(),
                    "ADD_CUBE",
                    "VIEWPORT",
                ),
                step(
                    "Open the properties panel to inspect it.".to_string(),
                    "HIGHLIGHT_INTERFACE",
                    "PROPERTIES",
                ),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{MockLessonModel, ModelReply};
    use serde_json::json;

    const FENCED: &str = "```json\n[\n  {\"text\": \"Select a face.\", \"command\": \"HIGHLIGHT_INTERFACE\", \"ui_target\": \"VIEWPORT\"},\n  {\"text\": \"Press E to extrude.\", \"command\": \"EXTRUDE_FACE\", \"ui_target\": \"VIEWPORT\"},\n  {\"text\": \"Check the tool settings.\", \"command\": \"HIGHLIGHT_INTERFACE\", \"ui_target\": \"TOOLBAR\"}\n]\n```";

    fn generator_with(reply: anyhow::Result<ModelReply>) -> LlmLessonGenerator {
        let mut model = MockLessonModel::new();
        model.expect_generate().times(1).return_once(move |_| reply);
        LlmLessonGenerator::new(Arc::new(model))
    }

    #[test]
    fn test_prompt_branches_on_request_kind() {
        let catalog = build_prompt("Extrude Tool", false);
        let custom = build_prompt("make a donut", true);

        assert!(catalog.contains("\"Extrude Tool\""));
        assert!(catalog.contains("Blender 5.0 Manual"));
        assert!(custom.contains("direct request"));
        assert!(!custom.contains("Blender 5.0 Manual"));
        for prompt in [&catalog, &custom] {
            assert!(prompt.contains("ui_target"));
            assert!(prompt.ends_with("Return ONLY the JSON array."));
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[]\n```  "), "[]");
        assert_eq!(strip_code_fences("[\"plain\"]"), "[\"plain\"]");
    }

    #[tokio::test]
    async fn test_fenced_response_parses_to_steps() {
        let generator = generator_with(Ok(ModelReply {
            candidate: Some(FENCED.to_string()),
            raw: json!({}),
        }));

        let lesson = generator
            .generate_lesson("Extrude Tool", false)
            .await
            .unwrap();

        assert_eq!(lesson.chapter, "Extrude Tool");
        assert_eq!(lesson.steps.len(), 3);
        assert_eq!(lesson.steps[1].command, "EXTRUDE_FACE");
        assert_eq!(lesson.steps[2].ui_target, "TOOLBAR");
    }

    #[tokio::test]
    async fn test_no_candidates_carries_raw_response() {
        let raw = json!({ "choices": [], "prompt_feedback": "blocked" });
        let generator = generator_with(Ok(ModelReply {
            candidate: None,
            raw: raw.clone(),
        }));

        let err = generator.generate_lesson("Sculpting", false).await.unwrap_err();
        match err {
            LessonError::NoCandidates { raw: got } => assert_eq!(got, raw),
            other => panic!("expected NoCandidates, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_parse_error() {
        let generator = generator_with(Ok(ModelReply {
            candidate: Some("Sure! Here is your lesson: step one...".to_string()),
            raw: json!({}),
        }));

        let err = generator.generate_lesson("Modifiers", true).await.unwrap_err();
        assert!(matches!(err, LessonError::GenerationParse(_)));
    }

    #[tokio::test]
    async fn test_model_failure_is_not_retried() {
        let generator = generator_with(Err(anyhow::anyhow!("connection reset")));

        let err = generator.generate_lesson("Modifiers", false).await.unwrap_err();
        assert!(matches!(err, LessonError::Model(_)));
    }

    #[tokio::test]
    async fn test_blank_topic_skips_the_model() {
        let mut model = MockLessonModel::new();
        model.expect_generate().times(0);
        let generator = LlmLessonGenerator::new(Arc::new(model));

        let err = generator.generate_lesson("   ", false).await.unwrap_err();
        assert!(matches!(err, LessonError::InvalidInput(_)));
    }

    #[test]
    fn test_schema_violations() {
        let empty = parse_steps("[]").unwrap_err();
        assert!(matches!(empty, LessonError::SchemaViolation { .. }));

        let missing = parse_steps(r#"[{"text": "hi", "command": "ADD_CUBE"}]"#).unwrap_err();
        match missing {
            LessonError::SchemaViolation { index, reason } => {
                assert_eq!(index, 0);
                assert!(reason.contains("ui_target"));
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }

        let second = parse_steps(
            r#"[{"text": "a", "command": "ADD_CUBE", "ui_target": "VIEWPORT"}, {"text": "", "command": "X", "ui_target": "Y"}]"#,
        )
        .unwrap_err();
        assert!(matches!(second, LessonError::SchemaViolation { index: 1, .. }));

        let scalar = parse_steps("42").unwrap_err();
        assert!(matches!(scalar, LessonError::SchemaViolation { .. }));
    }

    #[test]
    fn test_steps_object_is_accepted() {
        let steps = parse_steps(
            r#"{"steps": [{"text": "Add a cube.", "command": "ADD_CUBE", "ui_target": "VIEWPORT"}]}"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_generator_is_deterministic() {
        let lesson = MockLessonGenerator
            .generate_lesson("Extrude Tool", false)
            .await
            .unwrap();
        assert_eq!(lesson.steps.len(), 3);
        assert!(lesson.steps.iter().all(|s| !s.command.is_empty()));
    }
}
