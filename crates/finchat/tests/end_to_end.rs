use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use finchat::agent::{Agent, AgentConfig};
use finchat::context::Context;
use finchat::db::ReadGateway;
use finchat::models::message::{InputItem, Turn};
use finchat::models::response::ModelResponse;
use finchat::models::tool::{Tool, ToolCall, ToolOutput};
use finchat::providers::base::{Provider, Usage};
use finchat::providers::configs::OpenAiProviderConfig;
use finchat::providers::openai::OpenAiProvider;
use finchat::telemetry::MemorySink;
use finchat::tools::finance;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Plays back responses in order, repeating the last one, and keeps every input it was sent
#[derive(Clone)]
struct ScriptedProvider {
    script: Arc<Vec<ModelResponse>>,
    inputs: Arc<Mutex<Vec<Vec<InputItem>>>>,
}

impl ScriptedProvider {
    fn new(script: Vec<ModelResponse>) -> Self {
        Self {
            script: Arc::new(script),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn inputs(&self) -> Vec<Vec<InputItem>> {
        self.inputs.lock().unwrap().clone()
    }

    fn tool_outputs(&self, round: usize) -> Vec<ToolOutput> {
        self.inputs()[round]
            .iter()
            .filter_map(|item| item.as_tool_output().cloned())
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, input: &[InputItem], _tools: &[Tool]) -> Result<(ModelResponse, Usage)> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(input.to_vec());
        let index = (inputs.len() - 1).min(self.script.len() - 1);
        Ok((self.script[index].clone(), Usage::default()))
    }
}

fn finance_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finance.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE data (year INTEGER, quarter INTEGER, value REAL);
         INSERT INTO data VALUES (2024, 1, 100), (2024, 2, 150);",
    )
    .unwrap();
    (dir, path)
}

fn sql_call(call_id: &str, sql: &str) -> ModelResponse {
    ModelResponse::default().with_tool_call(ToolCall::new(
        call_id,
        finance::RUN_SQL,
        json!({ "sql": sql }).to_string(),
    ))
}

fn agent_over(path: &PathBuf, provider: ScriptedProvider, max_rows: usize) -> (Agent, MemorySink) {
    let sink = MemorySink::new();
    let registry = finance::registry(Arc::new(ReadGateway::new(path, max_rows)));
    let agent = Agent::new(Box::new(provider), registry, AgentConfig::default())
        .with_telemetry_sink(Arc::new(sink.clone()));
    (agent, sink)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
}

#[tokio::test]
async fn test_sum_bound_from_context_on_first_round() -> Result<()> {
    let (_dir, path) = finance_db();
    let provider = ScriptedProvider::new(vec![
        sql_call("call_1", "SELECT SUM(value) FROM data WHERE year = :year"),
        ModelResponse::text(r#"{"answer": "Total value for 2024 was 250.", "followups": []}"#),
    ]);
    let (agent, _) = agent_over(&path, provider.clone(), 1000);

    let context = Context::new().with("year", json!(2024));
    let envelope = agent
        .run_at(&[Turn::user("What was the total for the year?")], &context, today())
        .await?;

    let outputs = provider.tool_outputs(1);
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].call_id, "call_1");
    assert_eq!(outputs[0].result["rows"][0]["SUM(value)"], json!(250.0));
    assert_eq!(provider.inputs().len(), 2);
    assert_eq!(envelope.answer, "Total value for 2024 was 250.");
    Ok(())
}

#[tokio::test]
async fn test_unknown_tool_continues_interaction() -> Result<()> {
    let (_dir, path) = finance_db();
    let provider = ScriptedProvider::new(vec![
        ModelResponse::default().with_tool_call(ToolCall::new("call_x", "tool_delete_everything", "{}")),
        ModelResponse::text(r#"{"answer": "That tool does not exist."}"#),
    ]);
    let (agent, _) = agent_over(&path, provider.clone(), 1000);

    let envelope = agent
        .run_at(&[Turn::user("Delete everything")], &Context::new(), today())
        .await?;

    assert_eq!(
        provider.tool_outputs(1)[0].result,
        json!({"error": "unknown tool 'tool_delete_everything'"})
    );
    assert_eq!(envelope.answer, "That tool does not exist.");
    Ok(())
}

#[tokio::test]
async fn test_multi_statement_sql_never_reaches_the_database() -> Result<()> {
    let (_dir, path) = finance_db();
    let provider = ScriptedProvider::new(vec![
        sql_call("call_1", "SELECT * FROM data; DROP TABLE data;"),
        ModelResponse::text(r#"{"answer": "Refused."}"#),
    ]);
    let (agent, _) = agent_over(&path, provider.clone(), 1000);

    agent
        .run_at(&[Turn::user("Drop it")], &Context::new(), today())
        .await?;

    assert_eq!(
        provider.tool_outputs(1)[0].result,
        json!({"error": "Multiple SQL statements are not allowed."})
    );
    let conn = Connection::open(&path)?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))?;
    assert_eq!(count, 2);
    Ok(())
}

#[tokio::test]
async fn test_always_calling_tools_stops_after_five_rounds() -> Result<()> {
    let (_dir, path) = finance_db();
    let provider = ScriptedProvider::new(vec![sql_call("call_1", "SELECT COUNT(*) FROM data")]);
    let (agent, sink) = agent_over(&path, provider.clone(), 1000);

    let envelope = agent
        .run_at(&[Turn::user("Keep going")], &Context::new(), today())
        .await?;

    assert_eq!(provider.inputs().len(), 5);
    assert_eq!(envelope.answer, "");
    assert_eq!(envelope.table_preview, None);
    assert!(envelope.followups.is_empty());

    let kinds = sink.kinds();
    assert_eq!(kinds.iter().filter(|k| *k == "tool_call").count(), 5);
    assert!(kinds.contains(&"round_limit_reached".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_row_cap_applies_to_model_queries() -> Result<()> {
    let (_dir, path) = finance_db();
    let provider = ScriptedProvider::new(vec![
        sql_call("call_1", "SELECT * FROM data"),
        ModelResponse::text(r#"{"answer": "one row"}"#),
    ]);
    let (agent, _) = agent_over(&path, provider.clone(), 1);

    agent
        .run_at(&[Turn::user("Show data")], &Context::new(), today())
        .await?;

    let result = &provider.tool_outputs(1)[0].result;
    assert_eq!(result["row_count"], json!(1));
    assert_eq!(result["rows"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_openai_round_trip() -> Result<()> {
    let (_dir, db_path) = finance_db();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{
                "type": "function_call",
                "id": "fc_1",
                "call_id": "call_sum",
                "name": "tool_run_sql",
                "arguments": "{\"sql\": \"SELECT SUM(value) AS total FROM data WHERE year = :year\", \"named_params\": {\"year\": 2024}}"
            }],
            "usage": {"input_tokens": 900, "output_tokens": 40, "total_tokens": 940}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "output_text",
                    "text": "{\"answer\": \"250\", \"table_preview\": [{\"total\": 250.0}], \"followups\": [\"Split by quarter?\"]}"
                }]
            }],
            "usage": {"input_tokens": 1000, "output_tokens": 30, "total_tokens": 1030}
        })))
        .mount(&server)
        .await;

    let mut config = OpenAiProviderConfig::new("test_api_key");
    config.host = server.uri();
    let provider = OpenAiProvider::new(config)?;

    let sink = MemorySink::new();
    let registry = finance::registry(Arc::new(ReadGateway::new(&db_path, 1000)));
    let agent = Agent::new(Box::new(provider), registry, AgentConfig::default())
        .with_telemetry_sink(Arc::new(sink.clone()));

    let envelope = agent
        .run_at(&[Turn::user("Total for 2024?")], &Context::new(), today())
        .await?;

    assert_eq!(envelope.answer, "250");
    assert_eq!(envelope.followups, vec!["Split by quarter?".to_string()]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let second: Value = serde_json::from_slice(&requests[1].body)?;
    let input = second["input"].as_array().unwrap();
    let kinds: Vec<&str> = input
        .iter()
        .map(|item| item.get("type").and_then(Value::as_str).unwrap_or("message"))
        .collect();
    assert_eq!(
        kinds,
        vec!["message", "message", "message", "function_call", "function_call_output"]
    );
    assert_eq!(input[3]["call_id"], json!("call_sum"));
    assert_eq!(input[4]["call_id"], json!("call_sum"));
    let output: Value = serde_json::from_str(input[4]["output"].as_str().unwrap())?;
    assert_eq!(output["rows"][0]["total"], json!(250.0));

    let usage = sink
        .events()
        .into_iter()
        .find(|e| e.kind == "usage_total")
        .unwrap();
    assert_eq!(usage.fields["total_tokens"], json!(1970));
    Ok(())
}
