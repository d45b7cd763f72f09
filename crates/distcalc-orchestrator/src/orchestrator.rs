use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use distcalc_common::protocol::error::Result as DistcalcResult;
use distcalc_common::{OwnerId, WorkerStatus};
use distcalc_metrics::{MetricsRegistry, ServerInfo, ServerType};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::delays::{DelayTable, OperatorDelays};
use crate::error::{JobError, StartupError};
use crate::evaluator::Evaluator;
use crate::job::{Job, JobId, JobState};
use crate::load_balancer::LoadBalancer;
use crate::parser::parse_to_postfix;
use crate::queue::{job_queue, JobQueue, JobReceiver};
use crate::registry::{RegistrySweeper, WorkerRegistry};
use crate::store::{InMemoryJobStore, JobStore};
use crate::worker_client::{HttpWorkerClient, WorkerClient};

/// State shared between the public handle and the background tasks.
struct Core {
    config: OrchestratorConfig,
    registry: Arc<WorkerRegistry>,
    balancer: LoadBalancer,
    evaluator: Evaluator,
    delays: DelayTable,
    store: Arc<dyn JobStore>,
    queue: JobQueue,
    slots: Arc<Semaphore>,
    metrics: Arc<MetricsRegistry>,
}

/// The distcalc orchestrator.
///
/// Accepts infix expressions from clients, turns them into jobs and
/// evaluates each job on the worker with the most free capacity. Workers
/// join and leave through `register` and `heartbeat`.
///
/// Two background tasks run for the lifetime of the orchestrator: the
/// dispatch loop, which pulls jobs off the queue and evaluates up to
/// `max_concurrent_jobs` of them at once, and the registry sweep. Both are
/// aborted when the orchestrator is dropped.
pub struct Orchestrator {
    core: Arc<Core>,
    background: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Creates an orchestrator that reaches workers over HTTP and keeps jobs
    /// in memory.
    ///
    /// # Example
    /// ```no_run
    /// # use distcalc_orchestrator::{Orchestrator, OrchestratorConfig};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let orchestrator = Orchestrator::new(OrchestratorConfig::default()).await?;
    /// let job_id = orchestrator.submit(1, "(1 + 2) * 3").await?;
    /// println!("submitted {}", job_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: OrchestratorConfig) -> Result<Self, StartupError> {
        Self::with_components(
            config,
            Arc::new(HttpWorkerClient::new()),
            Arc::new(InMemoryJobStore::new()),
        )
        .await
    }

    /// Creates an orchestrator over the given worker client and job store.
    ///
    /// Unfinished jobs already in `store` are re-enqueued in submission
    /// order before this returns.
    ///
    /// # Errors
    /// - [`StartupError::InvalidConfig`] if `config` does not validate
    /// - [`StartupError::Recovery`] if the store cannot list its unfinished
    ///   jobs
    pub async fn with_components(
        config: OrchestratorConfig,
        client: Arc<dyn WorkerClient>,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, StartupError> {
        config.validate().map_err(StartupError::InvalidConfig)?;

        let recovered = store.unfinished()?;

        let metrics = Arc::new(MetricsRegistry::new());
        let registry = Arc::new(WorkerRegistry::new(config.wait_timeout));
        let balancer = LoadBalancer::new(registry.clone(), client.clone(), config.probe_timeout);
        let evaluator = Evaluator::new(client, config.dispatch_timeout, metrics.clone());
        let (queue, receiver) = job_queue(config.queue_capacity);

        let core = Arc::new(Core {
            delays: DelayTable::new(config.default_delay),
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            registry: registry.clone(),
            balancer,
            evaluator,
            store,
            queue,
            metrics,
            config,
        });

        let sweeper = RegistrySweeper::new(registry, core.config.sweep_interval);
        let background = vec![
            tokio::spawn(dispatch_loop(core.clone(), receiver)),
            sweeper.spawn(),
        ];

        if !recovered.is_empty() {
            info!("Recovering {} unfinished jobs", recovered.len());
        }
        for job in recovered {
            debug!("Re-enqueueing recovered job {}", job.id);
            core.queue.enqueue(job.id).await;
        }

        info!("Orchestrator initialized");

        Ok(Self { core, background })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.core.config
    }

    /// Parses `expression` and enqueues it as a job for `owner`.
    ///
    /// Submitting the same expression (after normalization to postfix) for
    /// the same owner again returns the existing job id and does not start a
    /// second evaluation.
    ///
    /// # Errors
    /// - [`JobError::Parse`] if the expression is rejected
    /// - [`JobError::QueueFull`] if the dispatch queue has no room; no job
    ///   is created, so the same expression can be submitted again later
    /// - [`JobError::Store`] if the job store fails
    pub async fn submit(&self, owner: OwnerId, expression: &str) -> Result<JobId, JobError> {
        let start = Instant::now();
        let result = self.submit_inner(owner, expression);
        self.core.metrics.record_call("submit", start, result.is_ok());
        result
    }

    fn submit_inner(&self, owner: OwnerId, expression: &str) -> Result<JobId, JobError> {
        let postfix = parse_to_postfix(expression)?;
        let job = Job::new(owner, postfix);
        let id = job.id;

        if self.core.store.get(id)?.is_some() {
            debug!("Job {} already submitted by owner {}", id, owner);
            return Ok(id);
        }

        // A job is only stored while its queue position is held, so every id
        // handed out refers to a stored job.
        let slot = self.core.queue.try_reserve().map_err(|e| {
            warn!("Rejecting job {}: {}", id, e);
            e
        })?;

        if let Some(existing) = self.core.store.insert_if_absent(job)? {
            debug!("Job {} already submitted by owner {}", existing.id, owner);
            return Ok(existing.id);
        }
        slot.enqueue(id);

        info!("Accepted job {} from owner {}", id, owner);
        Ok(id)
    }

    /// Current snapshot of a job.
    pub async fn get_result(&self, id: JobId) -> Result<Job, JobError> {
        self.core
            .store
            .get(id)?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Updates some of `owner`'s operator delays (symbol to milliseconds).
    ///
    /// # Errors
    /// [`JobError::UnknownOperator`] if any key is not one of `+ - * /`;
    /// nothing is changed in that case.
    pub async fn set_delays(
        &self,
        owner: OwnerId,
        delays: &BTreeMap<String, u64>,
    ) -> Result<OperatorDelays, JobError> {
        let updated = self
            .core
            .delays
            .set_delays(owner, delays)
            .await
            .map_err(|e| match e {
                distcalc_common::OperatorError::UnknownOperator(symbol) => {
                    JobError::UnknownOperator(symbol)
                }
                other => JobError::UnknownOperator(other.to_string()),
            })?;
        info!("Updated delays for owner {}", owner);
        Ok(updated)
    }

    pub async fn delays(&self, owner: OwnerId) -> OperatorDelays {
        self.core.delays.delays_for(owner).await
    }

    /// Returns `true` if the worker was not registered before.
    pub async fn register_worker(&self, addr: &str) -> bool {
        self.core.registry.register(addr).await
    }

    /// Returns `true` if the worker was already registered.
    pub async fn heartbeat(&self, addr: &str) -> bool {
        self.core.registry.heartbeat(addr).await
    }

    pub async fn workers(&self) -> Vec<WorkerStatus> {
        self.core.registry.workers().await
    }

    pub async fn live_workers(&self) -> Vec<String> {
        self.core.registry.live_workers().await
    }

    pub async fn get_metrics(&self) -> DistcalcResult<Value> {
        Ok(serde_json::to_value(self.core.metrics.snapshot(true))?)
    }

    pub async fn get_info(&self) -> DistcalcResult<Value> {
        let workers = self.core.registry.workers().await;
        let live = self.core.registry.live_workers().await;

        let base_info = ServerInfo::new(ServerType::Orchestrator, self.core.metrics.uptime_ms());
        let mut info = serde_json::to_value(base_info)?;

        if let Some(obj) = info.as_object_mut() {
            obj.insert("total_workers".to_string(), json!(workers.len()));
            obj.insert("live_workers".to_string(), json!(live.len()));
            obj.insert("queued_jobs".to_string(), json!(self.core.queue.len()));
            obj.insert("queue_capacity".to_string(), json!(self.core.queue.capacity()));
            obj.insert(
                "running_jobs".to_string(),
                json!(self.core.config.max_concurrent_jobs - self.core.slots.available_permits()),
            );
            obj.insert("workers".to_string(), serde_json::to_value(workers)?);
        }

        Ok(info)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for handle in &self.background {
            handle.abort();
        }
    }
}

/// Pulls job ids off the queue and evaluates them on their own tasks,
/// bounded by the slot semaphore.
async fn dispatch_loop(core: Arc<Core>, mut receiver: JobReceiver) {
    while let Some(id) = receiver.next().await {
        let permit = match core.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let core = core.clone();
        tokio::spawn(async move {
            core.process(id).await;
            drop(permit);
        });
    }
    debug!("Dispatch loop stopped");
}

impl Core {
    async fn process(self: &Arc<Self>, id: JobId) {
        let mut job = match self.store.get(id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("Job {} vanished before dispatch", id);
                return;
            }
            Err(e) => {
                error!("Failed to load job {}: {}", id, e);
                return;
            }
        };

        if job.is_finished() {
            debug!("Job {} already finished, skipping", id);
            return;
        }

        job.attempts += 1;
        let start = Instant::now();

        match self.balancer.select_worker().await {
            Ok(worker) => {
                info!("Dispatching job {} to {} (attempt {})", id, worker, job.attempts);
                let outcome = self
                    .evaluator
                    .evaluate(&job.postfix, &worker, &self.delays, job.owner)
                    .await;
                job.retry_scheduled = false;
                job.state = match outcome {
                    Ok(value) => {
                        info!("Job {} done: {}", id, value);
                        JobState::Done(value)
                    }
                    Err(e) => {
                        warn!("Job {} failed on {}: {}", id, worker, e);
                        JobState::Failed(e.to_string())
                    }
                };
                self.metrics
                    .record_call("evaluate", start, matches!(job.state, JobState::Done(_)));
                self.save(job);
            }
            Err(e) => {
                job.state = JobState::Failed(e.to_string());
                if job.attempts > self.config.retry.max_retries {
                    warn!("Job {} failed after {} attempts: {}", id, job.attempts, e);
                    job.retry_scheduled = false;
                    self.metrics.record_call("evaluate", start, false);
                    self.save(job);
                } else {
                    let backoff = self.config.retry.backoff_for(job.attempts);
                    debug!(
                        "Job {}: {}, retrying in {}ms (attempt {}/{})",
                        id,
                        e,
                        backoff.as_millis(),
                        job.attempts,
                        self.config.retry.max_retries + 1
                    );
                    job.retry_scheduled = true;
                    if self.save(job) {
                        let core = Arc::downgrade(self);
                        tokio::spawn(requeue_after(core, id, backoff));
                    }
                }
            }
        }
    }

    /// Writes the job back. Returns `false` if the store refused.
    fn save(&self, job: Job) -> bool {
        let id = job.id;
        match self.store.upsert(job) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store job {}: {}", id, e);
                false
            }
        }
    }
}

async fn requeue_after(core: Weak<Core>, id: JobId, backoff: std::time::Duration) {
    tokio::time::sleep(backoff).await;
    // The orchestrator may have shut down while we slept.
    let Some(core) = core.upgrade() else {
        return;
    };
    if !core.queue.enqueue(id).await {
        debug!("Queue closed, dropping retry of job {}", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use distcalc_common::{DistcalcError, Operator, OperationRequest};
    use futures::future::{BoxFuture, FutureExt};
    use std::time::Duration;

    /// Computes locally and always reports room.
    struct LocalWorkers;

    impl WorkerClient for LocalWorkers {
        fn execute<'a>(
            &'a self,
            _worker: &'a str,
            request: OperationRequest,
            _timeout: Duration,
        ) -> BoxFuture<'a, DistcalcResult<f64>> {
            async move {
                let op: Operator = request
                    .op
                    .parse()
                    .map_err(|e: distcalc_common::OperatorError| DistcalcError::Transport(e.to_string()))?;
                op.apply(request.a, request.b)
                    .map_err(|e| DistcalcError::Transport(e.to_string()))
            }
            .boxed()
        }

        fn free_capacity<'a>(
            &'a self,
            _worker: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, DistcalcResult<u32>> {
            async { Ok(5) }.boxed()
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig::default().with_default_delay(Duration::ZERO)
    }

    async fn orchestrator(config: OrchestratorConfig) -> Orchestrator {
        Orchestrator::with_components(config, Arc::new(LocalWorkers), Arc::new(InMemoryJobStore::new()))
            .await
            .unwrap()
    }

    async fn wait_finished(orchestrator: &Orchestrator, id: JobId) -> Job {
        for _ in 0..200 {
            let job = orchestrator.get_result(id).await.unwrap();
            if job.is_finished() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = Orchestrator::with_components(
            config().with_queue_capacity(0),
            Arc::new(LocalWorkers),
            Arc::new(InMemoryJobStore::new()),
        )
        .await;
        assert!(matches!(result, Err(StartupError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_submit_and_evaluate() {
        let orch = orchestrator(config()).await;
        orch.register_worker("w:1").await;

        let id = orch.submit(1, "(1 + 2) * 3").await.unwrap();
        let job = wait_finished(&orch, id).await;
        assert_eq!(job.state, JobState::Done(9.0));
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_parse_error_creates_no_job() {
        let orch = orchestrator(config()).await;
        assert!(matches!(orch.submit(1, "2 ^ 3").await, Err(JobError::Parse(_))));
        assert!(matches!(orch.submit(1, "1 + + 2 3").await, Err(JobError::Parse(_))));
        assert!(orch.core.queue.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let orch = orchestrator(config()).await;
        let id: JobId = "0123456789abcdef".parse().unwrap();
        assert!(matches!(orch.get_result(id).await, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_delays_unknown_operator() {
        let orch = orchestrator(config()).await;
        let mut updates = BTreeMap::new();
        updates.insert("^".to_string(), 10);
        assert!(matches!(
            orch.set_delays(1, &updates).await,
            Err(JobError::UnknownOperator(symbol)) if symbol == "^"
        ));
        assert_eq!(orch.delays(1).await, OperatorDelays::uniform(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_worker_fails_after_retries() {
        let retry = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            backoff_multiplier: 2.0,
        };
        let orch = orchestrator(config().with_retry(retry)).await;
        let id = orch.submit(1, "1 + 1").await.unwrap();

        let job = wait_finished(&orch, id).await;
        assert_eq!(job.state, JobState::Failed("no available worker".to_string()));
        assert_eq!(job.attempts, 3);
        assert!(!job.retry_scheduled);
    }

    #[tokio::test]
    async fn test_info_reports_workers() {
        let orch = orchestrator(config()).await;
        orch.register_worker("w:1").await;
        let info = orch.get_info().await.unwrap();
        assert_eq!(info["server_type"], "orchestrator");
        assert_eq!(info["live_workers"], 1);
        assert_eq!(info["workers"][0]["addr"], "w:1");
    }
}
