use finchat::agent::AgentConfig;
use finchat::db::ReadGateway;
use finchat::providers::configs::OpenAiProviderConfig;
use std::sync::Arc;

use crate::configuration::Settings;
use crate::storage::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider_config: OpenAiProviderConfig,
    pub agent_config: AgentConfig,
    pub gateway: Arc<ReadGateway>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let agent_config = settings.agent_config();
        let gateway = Arc::new(ReadGateway::new(
            settings.database.path,
            settings.database.max_rows,
        ));
        Self {
            provider_config: settings.provider.into_config(),
            agent_config,
            gateway,
            sessions: SessionStore::default(),
        }
    }
}
