//! Gateway state shared by every request.

use crate::config::GatewayConfig;
use crate::error::{McpError, Result};
use crate::gateway::{AdmissionPipeline, StatusPolicy};
use crate::protocol::ClientInfo;
use crate::remote::{PostgrestClient, RemoteExecutor};
use crate::security::{Clock, KeyAuthenticator, RateLimiterBuilder, Redactor, SystemClock};
use crate::tools::ToolRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct GatewayState {
    pub config: GatewayConfig,
    pub pipeline: AdmissionPipeline,
    pub tools: ToolRegistry,
    client_info: RwLock<Option<ClientInfo>>,
    request_count: AtomicU64,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, pipeline: AdmissionPipeline, tools: ToolRegistry) -> Self {
        Self {
            config,
            pipeline,
            tools,
            client_info: RwLock::new(None),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn set_client_info(&self, client_info: ClientInfo) {
        *self.client_info.write() = Some(client_info);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }

    pub fn next_request_id(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct GatewayStateBuilder {
    config: Option<GatewayConfig>,
    executor: Option<Arc<dyn RemoteExecutor>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GatewayStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the remote executor; defaults to a PostgREST client.
    pub fn executor(mut self, executor: Arc<dyn RemoteExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Override the rate limiter's clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<GatewayState> {
        let config = self.config.ok_or_else(|| McpError::Internal {
            message: "Config is required".into(),
        })?;

        let executor: Arc<dyn RemoteExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(PostgrestClient::new(&config.remote)?),
        };

        let security = &config.security;
        let rate_limiter = RateLimiterBuilder::new()
            .limit(security.rate_limit)
            .window(security.rate_limit_window)
            .sweep_interval(security.rate_limit_sweep_interval)
            .clock(self.clock.unwrap_or_else(|| Arc::new(SystemClock)))
            .build();

        let pipeline = AdmissionPipeline::new(
            KeyAuthenticator::new(&config.remote.service_key),
            Arc::new(rate_limiter),
            Redactor::new(&security.sensitive_fields),
            StatusPolicy::from_config(security),
        );

        let tools = crate::tools::create_registry(executor, security);

        Ok(GatewayState::new(config, pipeline, tools))
    }
}
