//! Region health monitoring.
//!
//! One monitor loop runs per configured region, independent of the state
//! machine's evaluation loop. Every sampling pass probes all configured
//! targets of the region; the region is healthy for that sample only if all
//! of them respond within the probe timeout. Probe errors are swallowed into
//! unhealthy samples: the sampling loop never exits because of a failing or
//! malformed endpoint.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use vigil_core::{FailoverError, HealthSample, RegionEndpoint, RegionId, Result};

/// A single health probe against one target URL.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probes the target, returning the observed latency on success.
    ///
    /// Success means a 2xx response within `timeout`. Anything else is an
    /// error; the monitor converts it into an unhealthy sample.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration>;
}

/// HTTPS GET health probe.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FailoverError::internal(format!("Failed to build probe client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<Duration> {
        let start = Instant::now();
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| FailoverError::timeout(format!("probe {}", url)))?
            .map_err(|e| FailoverError::probe(url, e.to_string()))?;

        if response.status().is_success() {
            Ok(start.elapsed())
        } else {
            Err(FailoverError::probe(
                url,
                format!("status {}", response.status()),
            ))
        }
    }
}

/// Bounded ring buffer of the most recent samples for one region.
#[derive(Debug, Clone)]
pub struct HealthWindow {
    capacity: usize,
    samples: VecDeque<HealthSample>,
}

impl HealthWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Appends a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: HealthSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of consecutive unhealthy samples at the tail of the window.
    pub fn consecutive_unhealthy(&self) -> u32 {
        self.samples
            .iter()
            .rev()
            .take_while(|s| !s.healthy)
            .count() as u32
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&HealthSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Shared per-region rolling windows, written by monitors and read by the
/// state machine and the status surface.
pub type WindowMap = Arc<DashMap<RegionId, HealthWindow>>;

/// Polls one region's health endpoints on a fixed interval.
pub struct HealthMonitor<P: HealthProbe> {
    endpoint: RegionEndpoint,
    probe: Arc<P>,
    interval: Duration,
    timeout: Duration,
    windows: WindowMap,
    window_size: usize,
    sample_tx: mpsc::UnboundedSender<HealthSample>,
}

impl<P: HealthProbe + 'static> HealthMonitor<P> {
    pub fn new(
        endpoint: RegionEndpoint,
        probe: Arc<P>,
        interval: Duration,
        timeout: Duration,
        window_size: usize,
        windows: WindowMap,
        sample_tx: mpsc::UnboundedSender<HealthSample>,
    ) -> Self {
        Self {
            endpoint,
            probe,
            interval,
            timeout,
            windows,
            window_size,
            sample_tx,
        }
    }

    /// Performs one sampling pass over every configured target.
    ///
    /// Never fails: probe errors become `healthy=false` samples with the
    /// first error recorded.
    pub async fn sample(&self) -> HealthSample {
        if self.endpoint.health_urls.is_empty() {
            return HealthSample::unhealthy(
                self.endpoint.region_id.clone(),
                "no probe targets configured",
            );
        }

        let mut worst_latency = Duration::ZERO;
        let mut first_error: Option<String> = None;

        for url in &self.endpoint.health_urls {
            match self.probe.probe(url, self.timeout).await {
                Ok(latency) => worst_latency = worst_latency.max(latency),
                Err(e) => {
                    debug!(region = %self.endpoint.region_id, url = %url, "probe failed: {}", e);
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }
        }

        match first_error {
            None => HealthSample::healthy(
                self.endpoint.region_id.clone(),
                worst_latency.as_millis() as u64,
            ),
            Some(error) => HealthSample::unhealthy(self.endpoint.region_id.clone(), error),
        }
    }

    /// Runs the sampling loop until the shutdown signal flips.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        debug!(region = %self.endpoint.region_id, "health monitor started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let sample = self.sample().await;

                    self.windows
                        .entry(self.endpoint.region_id.clone())
                        .or_insert_with(|| HealthWindow::new(self.window_size))
                        .push(sample.clone());

                    if self.sample_tx.send(sample).is_err() {
                        // Controller gone; nothing left to feed.
                        warn!(region = %self.endpoint.region_id, "sample channel closed, stopping monitor");
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!(region = %self.endpoint.region_id, "health monitor stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ScriptedProbe {
        outcomes: Mutex<VecDeque<bool>>,
    }

    impl ScriptedProbe {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self, url: &str, _timeout: Duration) -> Result<Duration> {
            let up = self.outcomes.lock().pop_front().unwrap_or(true);
            if up {
                Ok(Duration::from_millis(5))
            } else {
                Err(FailoverError::probe(url, "connection refused"))
            }
        }
    }

    fn endpoint(urls: &[&str]) -> RegionEndpoint {
        RegionEndpoint::new(
            "eu-west-1",
            vigil_core::RegionRole::Writer,
            urls.iter().map(|u| u.to_string()).collect(),
            "primary.db.example",
        )
    }

    fn monitor(probe: ScriptedProbe, urls: &[&str]) -> HealthMonitor<ScriptedProbe> {
        let (tx, _rx) = mpsc::unbounded_channel();
        HealthMonitor::new(
            endpoint(urls),
            Arc::new(probe),
            Duration::from_secs(10),
            Duration::from_secs(5),
            8,
            Arc::new(DashMap::new()),
            tx,
        )
    }

    #[tokio::test]
    async fn all_targets_must_succeed() {
        let m = monitor(ScriptedProbe::new(&[true, false]), &["a", "b"]);
        let sample = m.sample().await;
        assert!(!sample.healthy);
        assert!(sample.probe_error.is_some());
    }

    #[tokio::test]
    async fn healthy_when_every_target_responds() {
        let m = monitor(ScriptedProbe::new(&[true, true]), &["a", "b"]);
        let sample = m.sample().await;
        assert!(sample.healthy);
        assert!(sample.probe_error.is_none());
    }

    #[tokio::test]
    async fn no_targets_is_unhealthy() {
        let m = monitor(ScriptedProbe::new(&[]), &[]);
        let sample = m.sample().await;
        assert!(!sample.healthy);
    }

    #[test]
    fn window_counts_consecutive_unhealthy_from_tail() {
        let mut window = HealthWindow::new(4);
        window.push(HealthSample::healthy("r", 1));
        window.push(HealthSample::unhealthy("r", "down"));
        window.push(HealthSample::unhealthy("r", "down"));
        assert_eq!(window.consecutive_unhealthy(), 2);

        window.push(HealthSample::healthy("r", 1));
        assert_eq!(window.consecutive_unhealthy(), 0);
    }

    #[test]
    fn window_is_bounded() {
        let mut window = HealthWindow::new(2);
        for _ in 0..5 {
            window.push(HealthSample::unhealthy("r", "down"));
        }
        assert_eq!(window.len(), 2);
        assert_eq!(window.consecutive_unhealthy(), 2);
    }
}
