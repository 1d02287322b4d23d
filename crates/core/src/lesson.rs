//! Lesson and Envelope Types
//!
//! A `Lesson` is what the generator hands back to a client. A `ForwardEnvelope`
//! is the wire shape the downstream executor accepts: `{ "lesson": [...] }`
//! where every element carries a `command` identifier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SPEAK_COMMAND;

/// One spoken instruction paired with the action the executor should take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonStep {
    pub text: String,
    pub command: String,
    pub ui_target: String,
}

/// An ordered tutorial generated for a single topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub chapter: String,
    pub steps: Vec<LessonStep>,
}

impl Lesson {
    /// Converts the steps into executor commands, keeping their order.
    pub fn to_envelope(&self) -> ForwardEnvelope {
        let lesson = self
            .steps
            .iter()
            .map(|step| {
                let mut params = Map::new();
                params.insert("text".to_string(), Value::String(step.text.clone()));
                params.insert(
                    "ui_target".to_string(),
                    Value::String(step.ui_target.clone()),
                );
                ForwardCommand::new(step.command.clone(), Some(params))
            })
            .collect();
        ForwardEnvelope { lesson }
    }
}

/// A single command as seen by the downstream executor.
///
/// Unknown fields are carried through untouched; interpreting them is the
/// executor's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ForwardCommand {
    pub fn new(command: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            command: command.into(),
            params,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("missing lesson payload")]
    Missing,
    #[error("lesson entry {0} is not an object")]
    NotAnObject(usize),
    #[error("lesson entry {0} has no string `command` field")]
    MissingCommand(usize),
    #[error("lesson entry {index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },
}

/// The `{ "lesson": [...] }` body posted to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardEnvelope {
    pub lesson: Vec<ForwardCommand>,
}

impl ForwardEnvelope {
    /// Builds the single-step envelope that asks the executor to speak `text`.
    pub fn speak(text: &str, voice: Option<&str>, lang: Option<&str>) -> Self {
        let mut params = Map::new();
        params.insert("text".to_string(), Value::String(text.to_string()));
        if let Some(voice) = voice {
            params.insert("voice".to_string(), Value::String(voice.to_string()));
        }
        if let Some(lang) = lang {
            params.insert("lang".to_string(), Value::String(lang.to_string()));
        }
        Self {
            lesson: vec![ForwardCommand::new(SPEAK_COMMAND, Some(params))],
        }
    }

    /// Normalizes a client-supplied payload into an envelope.
    ///
    /// Accepts `{ "lesson": [...] }`, or any other value which is then treated
    /// as the lesson itself. A lone object becomes a one-command lesson.
    pub fn from_payload(payload: Value) -> Result<Self, EnvelopeError> {
        let lesson = match payload {
            Value::Object(mut map) if map.contains_key("lesson") => {
                map.remove("lesson").unwrap_or(Value::Null)
            }
            other => other,
        };

        let entries = match lesson {
            Value::Null => return Err(EnvelopeError::Missing),
            Value::Array(entries) if entries.is_empty() => return Err(EnvelopeError::Missing),
            Value::Array(entries) => entries,
            single => vec![single],
        };

        let lesson = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let object = entry
                    .as_object()
                    .ok_or(EnvelopeError::NotAnObject(index))?;
                if !object.get("command").is_some_and(Value::is_string) {
                    return Err(EnvelopeError::MissingCommand(index));
                }
                serde_json::from_value(entry).map_err(|e| EnvelopeError::Malformed {
                    index,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<ForwardCommand>, _>>()?;

        Ok(Self { lesson })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_speak_envelope_shape() {
        let envelope = ForwardEnvelope::speak("hi", None, Some("en-GB"));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            json!({ "lesson": [{ "command": "SPEAK", "params": { "text": "hi", "lang": "en-GB" } }] })
        );
    }

    #[test]
    fn test_lesson_to_envelope_keeps_order() {
        let lesson = Lesson {
            chapter: "Extrude Tool".to_string(),
            steps: vec![
                LessonStep {
                    text: "Select a face.".to_string(),
                    command: "HIGHLIGHT_INTERFACE".to_string(),
                    ui_target: "VIEWPORT".to_string(),
                },
                LessonStep {
                    text: "Press E.".to_string(),
                    command: "EXTRUDE_FACE".to_string(),
                    ui_target: "TOOLBAR".to_string(),
                },
            ],
        };

        let envelope = lesson.to_envelope();
        assert_eq!(envelope.lesson.len(), 2);
        assert_eq!(envelope.lesson[0].command, "HIGHLIGHT_INTERFACE");
        assert_eq!(envelope.lesson[1].command, "EXTRUDE_FACE");
        let params = envelope.lesson[1].params.as_ref().unwrap();
        assert_eq!(params["ui_target"], "TOOLBAR");
        assert_eq!(params["text"], "Press E.");
    }

    #[test]
    fn test_from_payload_wrapped_lesson() {
        let payload = json!({ "lesson": [{ "command": "WAIT", "params": { "seconds": 1 } }] });
        let envelope = ForwardEnvelope::from_payload(payload).unwrap();
        assert_eq!(envelope.lesson.len(), 1);
        assert_eq!(envelope.lesson[0].command, "WAIT");
    }

    #[test]
    fn test_from_payload_raw_object_is_the_lesson() {
        let payload = json!({ "command": "UI_HIGHLIGHT", "args": { "target": "PROPERTIES" } });
        let envelope = ForwardEnvelope::from_payload(payload).unwrap();

        assert_eq!(envelope.lesson.len(), 1);
        assert_eq!(envelope.lesson[0].command, "UI_HIGHLIGHT");
        assert!(envelope.lesson[0].params.is_none());
        // Extra fields survive the round trip to the executor.
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["lesson"][0]["args"]["target"], "PROPERTIES");
    }

    #[test]
    fn test_from_payload_rejects_missing_and_commandless() {
        assert_eq!(
            ForwardEnvelope::from_payload(Value::Null),
            Err(EnvelopeError::Missing)
        );
        assert_eq!(
            ForwardEnvelope::from_payload(json!({ "lesson": [] })),
            Err(EnvelopeError::Missing)
        );
        assert_eq!(
            ForwardEnvelope::from_payload(json!({ "lesson": [{ "params": {} }] })),
            Err(EnvelopeError::MissingCommand(0))
        );
        assert_eq!(
            ForwardEnvelope::from_payload(json!([{ "command": "SPEAK" }, "oops"])),
            Err(EnvelopeError::NotAnObject(1))
        );
    }

    #[test]
    fn test_from_payload_rejects_non_object_params() {
        let err = ForwardEnvelope::from_payload(json!([{ "command": "SPEAK", "params": [1, 2] }]))
            .unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed { index: 0, .. }));
    }
}
