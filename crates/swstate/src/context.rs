//! Shared handles passed to every manager, observer and controller.

use crate::config::AgentConfig;
use crate::pipeline::PipelineHandle;
use crate::scope::ScopeResolver;
use std::sync::Arc;

/// Everything a component needs to read and change switch state.
#[derive(Clone)]
pub struct AgentContext {
    pub resolver: Arc<ScopeResolver>,
    pub pipeline: PipelineHandle,
    pub config: Arc<AgentConfig>,
}

impl AgentContext {
    pub fn new(resolver: Arc<ScopeResolver>, pipeline: PipelineHandle) -> Self {
        Self::with_config(resolver, pipeline, Arc::new(AgentConfig::default()))
    }

    pub fn with_config(
        resolver: Arc<ScopeResolver>,
        pipeline: PipelineHandle,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            resolver,
            pipeline,
            config,
        }
    }
}
