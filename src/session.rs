//! Job session wiring
//!
//! A [`JobSession`] is built once per front-end connection and owns every
//! component of the engine. Components reach each other through the session's
//! shared handles, never through global state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::jobs::channel::{ChannelResult, CommChannel, LogChannel};
use crate::jobs::coordinator::{JobCoordinator, Services};
use crate::jobs::gateway::{MessageGateway, Outbox};
use crate::jobs::poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
use crate::jobs::registry::JobRegistry;
use crate::services::{HttpJobInventory, HttpJobService, RemoteJobFactory, RpcClient, RpcConfig};

/// All components of one job-tracking session
pub struct JobSession {
    registry: Arc<JobRegistry>,
    outbox: Arc<Outbox>,
    poller: Arc<StatusPoller>,
    coordinator: Arc<JobCoordinator>,
    gateway: Arc<MessageGateway>,
}

impl JobSession {
    /// Start building a session around the given remote services
    pub fn builder(services: Services) -> JobSessionBuilder {
        JobSessionBuilder::new(services)
    }

    /// Build a session talking to the HTTP services named in `config`
    pub fn from_config(config: &Config, channel: Arc<dyn CommChannel>) -> Result<Self> {
        config.validate()?;

        let rpc_config = |url: &str| {
            let rpc = RpcConfig::new(url)
                .with_timeout(config.request_timeout())
                .with_retry(config.services.retry_count, config.retry_delay());
            match &config.services.auth_token {
                Some(token) => rpc.with_auth_token(token.clone()),
                None => rpc,
            }
        };

        let job_service = Arc::new(HttpJobService::new(
            RpcClient::new(rpc_config(&config.services.job_service_url))
                .map_err(|e| Error::remote("init", e))?,
        ));
        let inventory = Arc::new(HttpJobInventory::new(
            RpcClient::new(rpc_config(&config.services.job_state_url))
                .map_err(|e| Error::remote("init", e))?,
        ));

        let services = Services {
            inventory,
            job_service: job_service.clone(),
            client_factory: Arc::new(RemoteJobFactory::new(job_service)),
        };

        tracing::debug!(
            job_service_url = %config.services.job_service_url,
            job_state_url = %config.services.job_state_url,
            "Job session configured"
        );

        Ok(Self::builder(services)
            .channel(channel)
            .poll_interval(config.poll_interval())
            .start_poller_on_init(config.poller.start_on_init)
            .build())
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    pub fn poller(&self) -> &Arc<StatusPoller> {
        &self.poller
    }

    pub fn coordinator(&self) -> &Arc<JobCoordinator> {
        &self.coordinator
    }

    pub fn gateway(&self) -> &Arc<MessageGateway> {
        &self.gateway
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}

type ChannelOpener = Box<dyn Fn() -> ChannelResult<Arc<dyn CommChannel>> + Send + Sync>;

/// Builder for [`JobSession`]
pub struct JobSessionBuilder {
    services: Services,
    opener: ChannelOpener,
    poll_interval: Duration,
    start_poller_on_init: bool,
}

impl JobSessionBuilder {
    fn new(services: Services) -> Self {
        let fallback: Arc<dyn CommChannel> = Arc::new(LogChannel);
        Self {
            services,
            opener: Box::new(move || Ok(fallback.clone())),
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_poller_on_init: true,
        }
    }

    /// Send outbound messages over an already open channel
    pub fn channel(mut self, channel: Arc<dyn CommChannel>) -> Self {
        self.opener = Box::new(move || Ok(channel.clone()));
        self
    }

    /// Open the outbound channel on the first send
    pub fn channel_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn() -> ChannelResult<Arc<dyn CommChannel>> + Send + Sync + 'static,
    {
        self.opener = Box::new(opener);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn start_poller_on_init(mut self, enabled: bool) -> Self {
        self.start_poller_on_init = enabled;
        self
    }

    pub fn build(self) -> JobSession {
        let registry = Arc::new(JobRegistry::new());
        let outbox = Arc::new(Outbox::new(self.opener));
        let poller = Arc::new(StatusPoller::new(
            registry.clone(),
            outbox.clone(),
            self.poll_interval,
        ));
        let coordinator = Arc::new(
            JobCoordinator::new(registry.clone(), outbox.clone(), poller.clone(), self.services)
                .with_poller_on_init(self.start_poller_on_init),
        );
        let gateway = Arc::new(MessageGateway::new(coordinator.clone(), outbox.clone()));

        JobSession {
            registry,
            outbox,
            poller,
            coordinator,
            gateway,
        }
    }
}
