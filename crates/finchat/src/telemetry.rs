use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Append events as JSON lines to this file instead of the tracing log
    pub log_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: None,
        }
    }
}

/// A structured record of something that happened during an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub interaction_id: Uuid,
    pub kind: String,
    pub fields: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Emits events through `tracing` on the `finchat::telemetry` target
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) -> Result<()> {
        let fields = serde_json::to_string(&event.fields)?;
        tracing::info!(
            target: "finchat::telemetry",
            interaction_id = %event.interaction_id,
            event = %event.kind,
            fields = %fields,
        );
        Ok(())
    }
}

/// Appends one JSON object per event to a file
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &TelemetryEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: &TelemetryEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("telemetry buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Per-interaction telemetry handle carrying the correlation id.
///
/// Recording never fails and never blocks the interaction on the sink: errors are logged as a
/// `telemetry_error` event and dropped.
#[derive(Clone)]
pub struct Telemetry {
    enabled: bool,
    interaction_id: Uuid,
    sink: Arc<dyn TelemetrySink>,
}

impl Telemetry {
    pub fn new(enabled: bool, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            enabled,
            interaction_id: Uuid::new_v4(),
            sink,
        }
    }

    /// The sink described by `config`
    pub fn sink_for(config: &TelemetryConfig) -> Arc<dyn TelemetrySink> {
        match &config.log_path {
            Some(path) => Arc::new(JsonlSink::new(path)),
            None => Arc::new(TracingSink),
        }
    }

    pub fn interaction_id(&self) -> Uuid {
        self.interaction_id
    }

    /// Record an event. `fields` should be a JSON object; anything else is stored under `value`.
    pub fn record(&self, kind: &str, fields: Value) {
        if !self.enabled {
            return;
        }

        let fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        let event = TelemetryEvent {
            interaction_id: self.interaction_id,
            kind: kind.to_string(),
            fields,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.sink.record(&event) {
            tracing::warn!(
                target: "finchat::telemetry",
                interaction_id = %self.interaction_id,
                event = "telemetry_error",
                failed_event = %kind,
                error = %e,
            );
        }
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("enabled", &self.enabled)
            .field("interaction_id", &self.interaction_id)
            .finish()
    }
}
