use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use super::base::Usage;
use crate::models::message::{InputItem, Role};
use crate::models::response::{ModelResponse, ResponseItem, TextSegment};
use crate::models::tool::{Tool, ToolCall};

/// Convert the agent's input items to the OpenAI Responses API `input` array.
///
/// Tool calls are echoed with their original `call_id` and raw argument text; outputs are
/// serialized to a JSON string as the API requires.
pub fn input_to_openai_spec(input: &[InputItem]) -> Vec<Value> {
    input
        .iter()
        .map(|item| match item {
            InputItem::Turn(turn) => json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            }),
            InputItem::ToolCall(call) => json!({
                "type": "function_call",
                "call_id": call.call_id,
                "name": call.name,
                "arguments": call.arguments,
            }),
            InputItem::ToolOutput(output) => json!({
                "type": "function_call_output",
                "call_id": output.call_id,
                "output": output.result.to_string(),
            }),
        })
        .collect()
}

/// Convert tools to the Responses API function tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }));
    }

    Ok(result)
}

/// Convert a Responses API body into a provider-neutral response
pub fn openai_response_to_model_response(response: &Value) -> Result<ModelResponse> {
    let output = response
        .get("output")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Response has no output array: {}", response))?;

    let mut items = Vec::with_capacity(output.len());
    for item in output {
        let kind = item.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "message" => {
                let role = match item.get("role").and_then(Value::as_str) {
                    Some("system") => Role::System,
                    Some("developer") => Role::Developer,
                    Some("user") => Role::User,
                    _ => Role::Assistant,
                };
                let segments = item
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|content| {
                        content
                            .iter()
                            .map(|segment| TextSegment {
                                kind: segment
                                    .get("type")
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string(),
                                text: segment
                                    .get("text")
                                    .and_then(Value::as_str)
                                    .map(String::from),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                items.push(ResponseItem::Message { role, segments });
            }
            "function_call" => {
                let call_id = item
                    .get("call_id")
                    .or_else(|| item.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
                let arguments = match item.get("arguments") {
                    Some(Value::String(raw)) => raw.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                items.push(ResponseItem::ToolCall(ToolCall::new(call_id, name, arguments)));
            }
            other => items.push(ResponseItem::Other {
                kind: other.to_string(),
            }),
        }
    }

    let output_text = response
        .get("output_text")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(ModelResponse { output_text, items })
}

/// Token usage of a Responses API body; absent counts stay `None`
pub fn get_usage(response: &Value) -> Usage {
    let Some(usage) = response.get("usage").filter(|u| u.is_object()) else {
        return Usage::default();
    };

    let count = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);
    let input_tokens = count("input_tokens");
    let output_tokens = count("output_tokens");
    let total_tokens = count("total_tokens").or(match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}
