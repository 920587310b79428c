use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Developer => "developer",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Turn {
            role,
            content: content.into(),
        }
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    pub fn developer<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Developer, content)
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One item of the input sent to the model in a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Turn(Turn),
    ToolCall(ToolCall),
    ToolOutput(ToolOutput),
}

impl InputItem {
    pub fn as_turn(&self) -> Option<&Turn> {
        match self {
            InputItem::Turn(turn) => Some(turn),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            InputItem::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_output(&self) -> Option<&ToolOutput> {
        match self {
            InputItem::ToolOutput(output) => Some(output),
            _ => None,
        }
    }
}

impl From<Turn> for InputItem {
    fn from(turn: Turn) -> Self {
        InputItem::Turn(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serializes_lowercase() {
        let turn = Turn::developer("ctx");
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({"role": "developer", "content": "ctx"})
        );
    }

    #[test]
    fn test_turn_deserializes_from_history_shape() {
        let turn: Turn =
            serde_json::from_value(json!({"role": "assistant", "content": "Revenue rose 10%"}))
                .unwrap();
        assert_eq!(turn, Turn::assistant("Revenue rose 10%"));
    }
}
