use kengine_core::SharedBackend;

use crate::ai::PricingTable;
use crate::config::{EngineConfig, KengineConfig};
use crate::template::{MacroTable, TemplateStore};

/// Everything a step needs while it runs
#[derive(Clone)]
pub struct ExecutionContext {
    pub backend: SharedBackend,
    /// Template and output store
    pub memory: TemplateStore,
    pub pricing: PricingTable,
    pub engine: EngineConfig,
    /// Defaults layered under each step's macros
    pub macros: MacroTable,
}

impl ExecutionContext {
    pub fn new(backend: SharedBackend, memory: TemplateStore) -> Self {
        Self {
            backend,
            memory,
            pricing: PricingTable::default(),
            engine: EngineConfig::default(),
            macros: MacroTable::default(),
        }
    }

    /// Take pricing, engine settings and default macros from a configuration
    pub fn with_config(mut self, config: &KengineConfig) -> Self {
        self.pricing = PricingTable::from(config.pricing.clone());
        self.engine = config.engine.clone();
        self.macros = MacroTable::from(config.macros.clone());
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_macros(mut self, macros: MacroTable) -> Self {
        self.macros = macros;
        self
    }
}
