//! Self-registration and periodic heartbeats to the orchestrator.

use distcalc_common::protocol::error::Result;
use distcalc_common::transport::JsonRpcClient;
use distcalc_common::{methods, HeartbeatResponse, RegisterResponse, WorkerAddrRequest};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Heartbeat configuration.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// Per-call timeout for `register` and `heartbeat`
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Keeps this worker listed in the orchestrator's registry.
pub struct Heartbeat {
    client: JsonRpcClient,
    orchestrator: String,
    public_addr: String,
    config: HeartbeatConfig,
}

impl Heartbeat {
    /// # Arguments
    /// * `orchestrator` - orchestrator URL, e.g. `http://127.0.0.1:8080`
    /// * `public_addr` - address the orchestrator should dispatch to
    pub fn new(orchestrator: impl Into<String>, public_addr: impl Into<String>, config: HeartbeatConfig) -> Self {
        Self {
            client: JsonRpcClient::new(),
            orchestrator: orchestrator.into(),
            public_addr: public_addr.into(),
            config,
        }
    }

    fn params(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(WorkerAddrRequest {
            addr: self.public_addr.clone(),
        })?)
    }

    /// Registers once. Callers treat failure as fatal at startup.
    pub async fn register(&self) -> Result<RegisterResponse> {
        let result = self
            .client
            .call(&self.orchestrator, methods::REGISTER, self.params()?, self.config.timeout)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Sends a single heartbeat.
    pub async fn beat(&self) -> Result<HeartbeatResponse> {
        let result = self
            .client
            .call(&self.orchestrator, methods::HEARTBEAT, self.params()?, self.config.timeout)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Starts the heartbeat task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Beats every interval until the first failure, then stops.
    ///
    /// A failed delivery means the orchestrator has most likely dropped this
    /// worker; there is no re-registration.
    async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // registration counts as the first beat
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.beat().await {
                Ok(response) => {
                    if !response.was_known {
                        info!("Orchestrator re-added {} on heartbeat", self.public_addr);
                    }
                    debug!("Heartbeat delivered for {}", self.public_addr);
                }
                Err(e) => {
                    warn!(
                        "Heartbeat to {} failed, assuming deregistration and stopping: {}",
                        self.orchestrator, e
                    );
                    break;
                }
            }
        }
    }
}
