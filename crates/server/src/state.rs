use std::sync::Arc;

use convertino_core::{BatchOrchestrator, Config, Converter, PresetCatalog};

use crate::api::WsBroadcaster;
use crate::store::BatchStore;

/// Shared application state
pub struct AppState {
    config: Config,
    presets: PresetCatalog,
    orchestrator: BatchOrchestrator,
    store: Arc<BatchStore>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        presets: PresetCatalog,
        converter: Arc<dyn Converter>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        let orchestrator =
            BatchOrchestrator::new(converter, config.converter.max_parallel_conversions);
        let store = Arc::new(BatchStore::from_config(&config.retention));

        Self {
            config,
            presets,
            orchestrator,
            store,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &Arc<BatchStore> {
        &self.store
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
