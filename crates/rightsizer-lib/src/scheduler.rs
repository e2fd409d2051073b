//! Harvest timer
//!
//! Periodically harvests recommendations for every configured resource kind,
//! with jitter so that replicas do not all hit the provider at once.

use crate::invocation::{InvocationResult, Invoker, Trigger};
use crate::models::ResourceKind;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the harvest scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Base interval between harvest rounds (default: 24 hours)
    pub interval: Duration,
    /// Maximum jitter added to every interval (default: 60 seconds)
    pub jitter: Duration,
    /// Kinds harvested each round, in order
    pub kinds: Vec<ResourceKind>,
    /// Run one round immediately instead of waiting a full interval
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            jitter: Duration::from_secs(60),
            kinds: ResourceKind::ALL.to_vec(),
            run_on_start: true,
        }
    }
}

pub struct HarvestScheduler {
    invoker: Arc<dyn Invoker>,
    config: SchedulerConfig,
}

impl HarvestScheduler {
    pub fn new(invoker: Arc<dyn Invoker>, config: SchedulerConfig) -> Self {
        Self { invoker, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            kinds = self.config.kinds.len(),
            "Starting harvest scheduler"
        );

        if self.config.run_on_start {
            self.run_once().await;
        }

        loop {
            let delay = self.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Next harvest round scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down harvest scheduler");
                    break;
                }
            }
        }
    }

    /// Harvest every configured kind once
    ///
    /// A failing kind is logged and does not stop the remaining kinds.
    pub async fn run_once(&self) -> Vec<InvocationResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(self.config.kinds.len());

        for kind in &self.config.kinds {
            let result = self.invoker.invoke(Trigger::Timer { kind: *kind }).await;
            if !result.is_success() {
                warn!(
                    kind = %kind,
                    status_code = result.status_code,
                    message = %result.message,
                    "Harvest failed, continuing with remaining kinds"
                );
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            kinds = results.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Harvest round complete"
        );

        results
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }
}

/// Pseudo-random value in `0..max_ms`
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for the harvest scheduler
pub struct HarvestSchedulerBuilder {
    invoker: Option<Arc<dyn Invoker>>,
    config: SchedulerConfig,
}

impl HarvestSchedulerBuilder {
    pub fn new() -> Self {
        Self {
            invoker: None,
            config: SchedulerConfig::default(),
        }
    }

    pub fn invoker(mut self, invoker: Arc<dyn Invoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn kinds(mut self, kinds: Vec<ResourceKind>) -> Self {
        self.config.kinds = kinds;
        self
    }

    pub fn run_on_start(mut self, run_on_start: bool) -> Self {
        self.config.run_on_start = run_on_start;
        self
    }

    pub fn build(self) -> Result<HarvestScheduler> {
        let invoker = self
            .invoker
            .ok_or_else(|| anyhow::anyhow!("Invoker is required"))?;
        if self.config.kinds.is_empty() {
            anyhow::bail!("At least one resource kind must be scheduled");
        }

        Ok(HarvestScheduler::new(invoker, self.config))
    }
}

impl Default for HarvestSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
