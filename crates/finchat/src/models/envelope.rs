use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest plain-text answer kept when the model did not return an envelope
pub const MAX_FALLBACK_ANSWER_CHARS: usize = 2000;

/// The result of an interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub answer: String,
    pub table_preview: Option<Vec<Map<String, Value>>>,
    pub followups: Vec<String>,
}

impl ResultEnvelope {
    /// Wrap free text the model returned instead of an envelope
    pub fn from_text(text: &str) -> Self {
        Self {
            answer: text.trim().chars().take(MAX_FALLBACK_ANSWER_CHARS).collect(),
            table_preview: None,
            followups: Vec::new(),
        }
    }

    /// Cap the table preview to `rows` rows
    pub fn bounded(mut self, rows: usize) -> Self {
        if let Some(preview) = self.table_preview.as_mut() {
            preview.truncate(rows);
        }
        self
    }
}

/// Best-effort parse of model text into an envelope.
///
/// Accepts a bare JSON object or one wrapped in prose / code fences. The object must carry an
/// `answer`; the other fields are optional and malformed values are dropped rather than failing.
pub fn try_parse_envelope(text: &str) -> Option<ResultEnvelope> {
    let object = parse_object(text.trim()).or_else(|| {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end <= start {
            return None;
        }
        parse_object(&text[start..=end])
    })?;

    let answer = match object.get("answer")? {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };

    let table_preview = match object.get("table_preview") {
        Some(Value::Array(rows)) => Some(
            rows.iter()
                .filter_map(|row| row.as_object().cloned())
                .collect(),
        ),
        _ => None,
    };

    let followups = match object.get("followups") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    };

    Some(ResultEnvelope {
        answer,
        table_preview,
        followups,
    })
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_envelope() {
        let text = r#"{"answer": "Total is 250", "table_preview": [{"total": 250}], "followups": ["By quarter?"]}"#;
        let envelope = try_parse_envelope(text).unwrap();
        assert_eq!(envelope.answer, "Total is 250");
        assert_eq!(
            envelope.table_preview,
            Some(vec![json!({"total": 250}).as_object().unwrap().clone()])
        );
        assert_eq!(envelope.followups, vec!["By quarter?".to_string()]);
    }

    #[test]
    fn test_parse_fenced_envelope() {
        let text = "Here you go:\n```json\n{\"answer\": \"ok\"}\n```";
        let envelope = try_parse_envelope(text).unwrap();
        assert_eq!(envelope.answer, "ok");
        assert_eq!(envelope.table_preview, None);
        assert!(envelope.followups.is_empty());
    }

    #[test]
    fn test_missing_answer_is_not_an_envelope() {
        assert!(try_parse_envelope(r#"{"rows": []}"#).is_none());
        assert!(try_parse_envelope("Revenue increased by 10% in Q2").is_none());
        assert!(try_parse_envelope("").is_none());
    }

    #[test]
    fn test_malformed_optional_fields_are_dropped() {
        let envelope =
            try_parse_envelope(r#"{"answer": "x", "table_preview": "n/a", "followups": [1, "y"]}"#)
                .unwrap();
        assert_eq!(envelope.table_preview, None);
        assert_eq!(envelope.followups, vec!["y".to_string()]);
    }

    #[test]
    fn test_from_text_trims_and_caps() {
        let long = format!("  {}  ", "a".repeat(MAX_FALLBACK_ANSWER_CHARS + 50));
        let envelope = ResultEnvelope::from_text(&long);
        assert_eq!(envelope.answer.len(), MAX_FALLBACK_ANSWER_CHARS);
        assert_eq!(envelope.table_preview, None);
        assert!(envelope.followups.is_empty());
    }

    #[test]
    fn test_bounded_truncates_preview() {
        let row = json!({"v": 1}).as_object().unwrap().clone();
        let envelope = ResultEnvelope {
            answer: "a".to_string(),
            table_preview: Some(vec![row; 12]),
            followups: vec![],
        }
        .bounded(10);
        assert_eq!(envelope.table_preview.unwrap().len(), 10);
    }
}
