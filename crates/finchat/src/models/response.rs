use serde::{Deserialize, Serialize};

use super::message::Role;
use super::tool::ToolCall;

/// A piece of text inside a message item, e.g. `output_text`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub kind: String,
    pub text: Option<String>,
}

impl TextSegment {
    pub fn output_text<S: Into<String>>(text: S) -> Self {
        Self {
            kind: "output_text".to_string(),
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseItem {
    Message {
        role: Role,
        segments: Vec<TextSegment>,
    },
    ToolCall(ToolCall),
    /// Items the agent does not act on (reasoning, web search, ...)
    Other { kind: String },
}

/// A model response in provider-neutral form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Consolidated text, when the provider reports one
    pub output_text: Option<String>,
    pub items: Vec<ResponseItem>,
}

impl ModelResponse {
    /// A response holding a single assistant message
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            output_text: None,
            items: vec![ResponseItem::Message {
                role: Role::Assistant,
                segments: vec![TextSegment::output_text(text)],
            }],
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.items.push(ResponseItem::ToolCall(call));
        self
    }

    /// Every tool call in the response, in response order
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ResponseItem::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }
}

type TextExtractor = fn(&ModelResponse) -> Option<String>;

/// Tried in order until one yields text
const EXTRACTORS: &[TextExtractor] = &[consolidated_text, message_segments_text];

fn consolidated_text(response: &ModelResponse) -> Option<String> {
    response
        .output_text
        .as_ref()
        .filter(|text| !text.trim().is_empty())
        .cloned()
}

fn message_segments_text(response: &ModelResponse) -> Option<String> {
    let text: String = response
        .items
        .iter()
        .filter_map(|item| match item {
            ResponseItem::Message { segments, .. } => Some(segments),
            _ => None,
        })
        .flatten()
        .filter_map(|segment| segment.text.as_deref())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Plain text of a response: the consolidated text if present, otherwise the concatenated text
/// segments of its message items. Never fails; a response without text yields "".
pub fn extract_text(response: &ModelResponse) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(response))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_consolidated_text() {
        let mut response = ModelResponse::text("from segments");
        response.output_text = Some("consolidated".to_string());
        assert_eq!(extract_text(&response), "consolidated");
    }

    #[test]
    fn test_blank_consolidated_text_falls_back() {
        let mut response = ModelResponse::text("from segments");
        response.output_text = Some("   ".to_string());
        assert_eq!(extract_text(&response), "from segments");
    }

    #[test]
    fn test_concatenates_message_segments() {
        let response = ModelResponse {
            output_text: None,
            items: vec![
                ResponseItem::Other {
                    kind: "reasoning".to_string(),
                },
                ResponseItem::Message {
                    role: Role::Assistant,
                    segments: vec![
                        TextSegment::output_text("{\"answer\": "),
                        TextSegment {
                            kind: "refusal".to_string(),
                            text: None,
                        },
                        TextSegment::output_text("\"ok\"}"),
                    ],
                },
            ],
        };
        assert_eq!(extract_text(&response), "{\"answer\": \"ok\"}");
    }

    #[test]
    fn test_no_text_is_empty() {
        let response = ModelResponse::default()
            .with_tool_call(ToolCall::new("1", "tool_list_tables", "{}"));
        assert_eq!(extract_text(&response), "");
        assert_eq!(response.tool_calls().len(), 1);
    }
}
