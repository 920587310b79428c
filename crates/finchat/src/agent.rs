use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::Context;
use crate::errors::{AgentError, AgentResult, ToolError, ToolResult};
use crate::models::envelope::{try_parse_envelope, ResultEnvelope};
use crate::models::message::{InputItem, Turn};
use crate::models::response::{extract_text, ModelResponse};
use crate::models::tool::{ToolCall, ToolOutput};
use crate::prompt_template::system_prompt;
use crate::providers::base::{Provider, Usage};
use crate::sql;
use crate::telemetry::{Telemetry, TelemetryConfig, TelemetrySink};
use crate::tools::finance;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_ROUNDS: usize = 5;
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Category values the instructions list for the model
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "operating_expenses",
    "revenue",
    "cost_of_goods_sold",
    "non_operating_expenses",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model calls per interaction
    pub max_rounds: usize,
    /// Rows kept in the returned table preview
    pub preview_rows: usize,
    pub categories: Vec<String>,
    pub telemetry: TelemetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

#[derive(Serialize)]
struct PromptContext<'a> {
    list_tables: &'a str,
    describe_table: &'a str,
    run_sql: &'a str,
    distinct_values: &'a str,
    preview_rows: usize,
    categories: &'a [String],
}

/// Agent drives a model through bounded rounds of tool use over the finance database
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    config: AgentConfig,
    sink: Arc<dyn TelemetrySink>,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry, config: AgentConfig) -> Self {
        let sink = Telemetry::sink_for(&config.telemetry);
        Self {
            provider,
            registry,
            config,
            sink,
        }
    }

    /// Send telemetry to `sink` instead of the configured destination
    pub fn with_telemetry_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn get_system_prompt(&self) -> AgentResult<String> {
        let context = PromptContext {
            list_tables: finance::LIST_TABLES,
            describe_table: finance::DESCRIBE_TABLE,
            run_sql: finance::RUN_SQL,
            distinct_values: finance::DISTINCT_VALUES,
            preview_rows: self.config.preview_rows,
            categories: &self.config.categories,
        };
        system_prompt(&context).map_err(|e| AgentError::Internal(e.to_string()))
    }

    /// System instructions, the effective context and the caller's turns
    fn base_input(&self, turns: &[Turn], context: &Context) -> AgentResult<Vec<InputItem>> {
        let mut input = Vec::with_capacity(turns.len() + 2);
        input.push(InputItem::Turn(Turn::system(self.get_system_prompt()?)));
        input.push(InputItem::Turn(Turn::developer(format!(
            "Interaction context (authoritative for SQL parameter bindings):\n{}",
            context.to_json()
        ))));
        input.extend(turns.iter().cloned().map(InputItem::Turn));
        Ok(input)
    }

    /// Answer the latest turn, with temporal defaults taken from the local date
    pub async fn run(&self, turns: &[Turn], context: &Context) -> AgentResult<ResultEnvelope> {
        self.run_at(turns, context, Local::now().date_naive()).await
    }

    /// Answer the latest turn as of `today`.
    ///
    /// Each round calls the model once and executes every tool call it returned, in order. The
    /// next round sees the base input followed by this round's calls and then their outputs.
    /// The interaction ends on the first response without tool calls, or after `max_rounds`
    /// rounds on whatever the last response said. Only a failed model call is fatal.
    pub async fn run_at(
        &self,
        turns: &[Turn],
        context: &Context,
        today: NaiveDate,
    ) -> AgentResult<ResultEnvelope> {
        let telemetry = Telemetry::new(self.config.telemetry.enabled, self.sink.clone());
        let context = context.effective(today);
        telemetry.record(
            "interaction_start",
            json!({
                "turns": turns.len(),
                "context": context.to_json(),
                "max_rounds": self.config.max_rounds,
            }),
        );

        let base = self.base_input(turns, &context)?;
        let tools = self.registry.tools();
        let max_rounds = self.config.max_rounds.max(1);

        let mut input = base.clone();
        let mut last_response = ModelResponse::default();
        let mut total_usage = Usage::default();
        let mut tables = BTreeSet::new();
        let mut rounds = 0;
        let mut answered = false;

        while rounds < max_rounds {
            rounds += 1;

            let (response, usage) = match self.provider.complete(&input, tools).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        interaction_id = %telemetry.interaction_id(),
                        round = rounds,
                        error = %e,
                        "model call failed"
                    );
                    telemetry.record(
                        "interaction_failed",
                        json!({"round": rounds, "error": e.to_string()}),
                    );
                    return Err(AgentError::Upstream(e.to_string()));
                }
            };

            if usage.is_reported() {
                telemetry.record(
                    "round_usage",
                    json!({
                        "round": rounds,
                        "input_tokens": usage.input_tokens,
                        "output_tokens": usage.output_tokens,
                        "total_tokens": usage.total_tokens,
                    }),
                );
                total_usage.accumulate(&usage);
            }

            let calls: Vec<ToolCall> = response.tool_calls().into_iter().cloned().collect();
            last_response = response;

            if calls.is_empty() {
                answered = true;
                break;
            }

            let mut outputs = Vec::with_capacity(calls.len());
            for call in &calls {
                outputs.push(
                    self.dispatch_tool_call(call, &context, &telemetry, &mut tables)
                        .await,
                );
            }

            input = base.clone();
            input.extend(calls.into_iter().map(InputItem::ToolCall));
            input.extend(outputs.into_iter().map(InputItem::ToolOutput));
        }

        if !answered {
            tracing::warn!(
                interaction_id = %telemetry.interaction_id(),
                rounds,
                "round limit reached while tools were still being called"
            );
            telemetry.record("round_limit_reached", json!({ "rounds": rounds }));
        }

        let text = extract_text(&last_response);
        let envelope = match try_parse_envelope(&text) {
            Some(envelope) => envelope,
            None => {
                telemetry.record(
                    "envelope_parse_failed",
                    json!({ "chars": text.chars().count() }),
                );
                ResultEnvelope::from_text(&text)
            }
        }
        .bounded(self.config.preview_rows);

        telemetry.record("tables_touched", json!({ "tables": tables }));
        telemetry.record("usage_total", json!(total_usage));
        telemetry.record(
            "interaction_complete",
            json!({
                "rounds": rounds,
                "answered": answered,
                "preview_rows": envelope.table_preview.as_ref().map(Vec::len),
                "followups": envelope.followups.len(),
            }),
        );

        Ok(envelope)
    }

    /// Execute one tool call. Failures become an error-shaped output, never an `Err`.
    async fn dispatch_tool_call(
        &self,
        call: &ToolCall,
        context: &Context,
        telemetry: &Telemetry,
        tables: &mut BTreeSet<String>,
    ) -> ToolOutput {
        telemetry.record(
            "tool_call",
            json!({
                "call_id": call.call_id,
                "name": call.name,
                "arguments": call.arguments,
            }),
        );

        match self.execute_tool_call(call, context, telemetry, tables).await {
            Ok(result) => ToolOutput::new(call.call_id.clone(), result),
            Err(err) => {
                tracing::debug!(tool = %call.name, error = %err, "tool call failed");
                telemetry.record(
                    "tool_error",
                    json!({
                        "call_id": call.call_id,
                        "name": call.name,
                        "error": err.to_string(),
                    }),
                );
                ToolOutput::new(call.call_id.clone(), err.to_output())
            }
        }
    }

    async fn execute_tool_call(
        &self,
        call: &ToolCall,
        context: &Context,
        telemetry: &Telemetry,
        tables: &mut BTreeSet<String>,
    ) -> ToolResult<Value> {
        if !self.registry.contains(&call.name) {
            return Err(ToolError::ToolNotFound(call.name.clone()));
        }

        let mut arguments = call.parsed_arguments()?;
        let is_sql = call.name == finance::RUN_SQL;
        if is_sql {
            self.bind_sql_parameters(call, &mut arguments, context, telemetry, tables);
        }

        let result = self.registry.call(&call.name, arguments).await?;

        if is_sql {
            telemetry.record(
                "sql_result",
                json!({
                    "call_id": call.call_id,
                    "row_count": result.get("row_count").cloned().unwrap_or(Value::Null),
                }),
            );
        }
        Ok(result)
    }

    /// Fill `named_params` from the context and note the tables the statement touches.
    /// Malformed arguments are left for the tool to reject.
    fn bind_sql_parameters(
        &self,
        call: &ToolCall,
        arguments: &mut Map<String, Value>,
        context: &Context,
        telemetry: &Telemetry,
        tables: &mut BTreeSet<String>,
    ) {
        let Some(statement) = arguments.get("sql").and_then(Value::as_str).map(String::from) else {
            return;
        };
        let Ok(supplied) = finance::named_params(arguments) else {
            return;
        };

        let resolved = sql::resolve(&statement, &supplied, context);
        let touched = sql::referenced_tables(&statement);
        telemetry.record(
            "sql_executed",
            json!({
                "call_id": call.call_id,
                "sql": statement,
                "params": resolved,
                "tables": touched,
            }),
        );
        tables.extend(touched);
        arguments.insert("named_params".to_string(), Value::Object(resolved));
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
