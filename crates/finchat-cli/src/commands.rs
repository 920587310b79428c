pub mod ask;
pub mod chat;
pub mod ingest;
pub mod version;

use anyhow::{anyhow, Result};
use bat::WrappingMode;
use console::style;
use finchat::agent::{Agent, AgentConfig};
use finchat::context::Context;
use finchat::db::ReadGateway;
use finchat::models::envelope::ResultEnvelope;
use finchat::providers::configs::OpenAiProviderConfig;
use finchat::providers::openai::OpenAiProvider;
use finchat::tools::finance;
use serde_json::Value;
use std::sync::Arc;

use crate::AgentArgs;

/// Build an agent over the database named in `args`
pub fn build_agent(args: &AgentArgs) -> Result<Agent> {
    if !args.db.exists() {
        return Err(anyhow!("database {} does not exist", args.db.display()));
    }

    let mut config = OpenAiProviderConfig::new(args.api_key.clone());
    config.host = args.host.clone();
    config.model = args.model.clone();
    let provider = OpenAiProvider::new(config)?;

    let registry = finance::registry(Arc::new(ReadGateway::new(&args.db, args.max_rows)));
    Ok(Agent::new(Box::new(provider), registry, AgentConfig::default()))
}

/// Parse `KEY=VALUE` pairs. Values that parse as JSON scalars keep their type, anything else is
/// a string.
pub fn parse_context(pairs: &[String]) -> Result<Context> {
    let mut context = Context::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("context must look like KEY=VALUE, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("context key is empty in '{}'", pair));
        }
        let value = match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) if !value.is_array() && !value.is_object() => value,
            _ => Value::String(raw.trim().to_string()),
        };
        context.insert(key, value);
    }
    Ok(context)
}

pub fn render_envelope(envelope: &ResultEnvelope) -> Result<()> {
    println!("{}", envelope.answer);

    if let Some(rows) = envelope.table_preview.as_ref().filter(|rows| !rows.is_empty()) {
        let content = serde_json::to_string_pretty(rows)?;
        println!();
        bat::PrettyPrinter::new()
            .input(bat::Input::from_bytes(content.as_bytes()).name("Preview"))
            .language("JSON")
            .grid(true)
            .header(true)
            .wrapping_mode(WrappingMode::Character)
            .print()
            .map_err(|e| anyhow!("failed to render preview: {}", e))?;
    }

    if !envelope.followups.is_empty() {
        println!("\n{}", style("Follow-up questions:").dim());
        for followup in &envelope.followups {
            println!("  {} {}", style("-").dim(), followup);
        }
    }
    Ok(())
}
