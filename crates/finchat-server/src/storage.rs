use finchat::models::message::Turn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Turns kept per session
pub const MAX_HISTORY_TURNS: usize = 20;

/// In-memory conversation history, keyed by client session id
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Vec<Turn>>>>,
    max_turns: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(MAX_HISTORY_TURNS)
    }
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_turns,
        }
    }

    /// The most recent turns of a session, oldest first
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        let sessions = self.sessions.lock().await;
        sessions.get(session_id).cloned().unwrap_or_default()
    }

    /// Append turns to a session, dropping the oldest beyond the limit
    pub async fn append(&self, session_id: &str, turns: Vec<Turn>) {
        let mut sessions = self.sessions.lock().await;
        let history = sessions.entry(session_id.to_string()).or_default();
        history.extend(turns);
        if history.len() > self.max_turns {
            let excess = history.len() - self.max_turns;
            history.drain(..excess);
        }
    }
}
