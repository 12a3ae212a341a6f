//! Application layer for Kengine
//!
//! Wires configuration, a chat backend and the two stores together and runs
//! processes by name.

use kengine_core::{ChatBackend, SharedBackend};
use std::sync::Arc;
use tracing::info;

use crate::backend::OpenAiBackend;
use crate::config::KengineConfig;
use crate::context::ExecutionContext;
use crate::error::{KengineError, Result};
use crate::process::{ProcessReport, ProcessRunner, ProcessStore};
use crate::storage::{LocalStorage, Storage};
use crate::template::TemplateStore;

/// The main Kengine application
pub struct KengineApp {
    config: KengineConfig,
    ctx: ExecutionContext,
    processes: ProcessStore,
    metadata: AppMetadata,
}

/// Metadata about the application
#[derive(Debug, Clone)]
pub struct AppMetadata {
    pub name: String,
    pub version: String,
}

impl KengineApp {
    /// Create a new builder
    pub fn builder(name: impl Into<String>) -> KengineAppBuilder {
        KengineAppBuilder::new(name)
    }

    /// Build with local storage and the HTTP backend described by `config`
    pub fn from_config(config: KengineConfig) -> Result<Self> {
        Self::builder("kengine").config(config).build()
    }

    pub fn config(&self) -> &KengineConfig {
        &self.config
    }

    pub fn metadata(&self) -> &AppMetadata {
        &self.metadata
    }

    /// Template and output store
    pub fn memory(&self) -> &TemplateStore {
        &self.ctx.memory
    }

    pub fn processes(&self) -> &ProcessStore {
        &self.processes
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.ctx.clone()).with_store(self.processes.clone())
    }

    /// Load a process and run all of its steps
    pub async fn run_process(&self, name: &str) -> Result<ProcessReport> {
        let mut process = self.processes.load(name).await?;
        info!("{}: running process {}", self.metadata.name, name);
        Ok(self.runner().run(&mut process).await?)
    }

    /// Load a process and run one of its steps
    pub async fn run_step(&self, process: &str, step: &str) -> Result<ProcessReport> {
        let mut loaded = self.processes.load(process).await?;
        info!("{}: running step {}/{}", self.metadata.name, process, step);
        Ok(self.runner().run_step(&mut loaded, step).await?)
    }
}

/// Builder for [`KengineApp`]
pub struct KengineAppBuilder {
    name: String,
    version: String,
    config: Option<KengineConfig>,
    backend: Option<SharedBackend>,
    memory: Option<Arc<dyn Storage>>,
    processes: Option<Arc<dyn Storage>>,
}

impl KengineAppBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: None,
            backend: None,
            memory: None,
            processes: None,
        }
    }

    /// Set the version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn config(mut self, config: KengineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the chat backend
    pub fn backend(mut self, backend: impl ChatBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Storage for templates and outputs
    pub fn memory_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.memory = Some(storage);
        self
    }

    /// Storage for process definitions
    pub fn process_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.processes = Some(storage);
        self
    }

    /// Build the application
    ///
    /// Missing parts come from the configuration: local directories for the
    /// stores and the HTTP backend for the model.
    pub fn build(self) -> Result<KengineApp> {
        let config = self.config.unwrap_or_default();

        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(OpenAiBackend::from_config(&config.api)?),
        };
        let memory = self
            .memory
            .unwrap_or_else(|| Arc::new(LocalStorage::for_memory(&config)));
        let processes = self
            .processes
            .unwrap_or_else(|| Arc::new(LocalStorage::for_processes(&config)));

        if config.engine.max_interactions == 0 {
            return Err(KengineError::Build(
                "engine.max_interactions must be at least 1".to_string(),
            ));
        }

        let ctx = ExecutionContext::new(backend, TemplateStore::new(memory)).with_config(&config);

        Ok(KengineApp {
            config,
            ctx,
            processes: ProcessStore::new(processes),
            metadata: AppMetadata {
                name: self.name,
                version: self.version,
            },
        })
    }
}
