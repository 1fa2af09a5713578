//! Internet reachability tracking.
//!
//! A background sampler keeps one boolean up to date; readers tolerate
//! staleness by design and re-verify with a fresh probe before acting on it.

use crate::config::MonitorConfig;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Read access to the host's internet reachability.
pub trait Connectivity {
    /// Latest sampled reachability state. Never blocks.
    fn current_status(&self) -> bool;

    /// One fresh reachability probe, bypassing the cached sample.
    fn check_now(&self) -> impl Future<Output = bool> + Send;
}

/// Samples internet reachability at a fixed rate on a background task.
///
/// The sampler is the only writer of the shared flag; a failed probe reads as
/// "offline", never as an error. Dropping the monitor stops the sampler.
pub struct ConnectivityMonitor {
    online: Arc<AtomicBool>,
    client: reqwest::Client,
    probe_url: String,
    probe_timeout: Duration,
    sample_interval: Duration,
    sampler: Option<JoinHandle<()>>,
}

impl ConnectivityMonitor {
    /// Create a monitor; sampling does not begin until [`start`](Self::start).
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(false)),
            client: reqwest::Client::new(),
            probe_url: config.probe_url.clone(),
            probe_timeout: config.probe_timeout(),
            sample_interval: config.sample_interval(),
            sampler: None,
        }
    }

    /// Spawn the background sampler. Idempotent.
    pub fn start(&mut self) {
        if self.sampler.is_some() {
            return;
        }
        let online = Arc::clone(&self.online);
        let client = self.client.clone();
        let url = self.probe_url.clone();
        let timeout = self.probe_timeout;
        let interval = self.sample_interval;
        self.sampler = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let status = probe(&client, &url, timeout).await;
                online.store(status, Ordering::Relaxed);
            }
        }));
    }

    /// Stop the background sampler. The cached flag keeps its last value.
    pub fn stop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Connectivity for ConnectivityMonitor {
    fn current_status(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    async fn check_now(&self) -> bool {
        probe(&self.client, &self.probe_url, self.probe_timeout).await
    }
}

/// One reachability probe. Any failure reads as unreachable.
async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.head(url).timeout(timeout).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flag_starts_offline() {
        let monitor = ConnectivityMonitor::new(&MonitorConfig::default());
        assert!(!monitor.current_status());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_a_noop() {
        let mut monitor = ConnectivityMonitor::new(&MonitorConfig::default());
        monitor.stop();
        monitor.stop();
        assert!(!monitor.current_status());
    }

    #[tokio::test]
    async fn test_probe_failure_reads_as_offline() {
        // nothing listens on this port, so the probe must come back false
        // without surfacing an error
        let config = MonitorConfig::default().with_probe_url("http://127.0.0.1:9/generate_204");
        let monitor = ConnectivityMonitor::new(&config);
        assert!(!monitor.check_now().await);
    }
}
