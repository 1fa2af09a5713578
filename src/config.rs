//! Monitor configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Archive the measurement tool is fetched from when the binary is missing.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://install.speedtest.net/app/cli/ookla-speedtest-1.2.0-linux-x86_64.tgz";

/// Endpoint answering cheap no-content responses, used for reachability probes.
pub const DEFAULT_PROBE_URL: &str = "http://clients3.google.com/generate_204";

/// File name of the measurement executable, inside the archive and on disk.
#[cfg(not(windows))]
pub const SPEEDTEST_BINARY: &str = "speedtest";
/// File name of the measurement executable, inside the archive and on disk.
#[cfg(windows)]
pub const SPEEDTEST_BINARY: &str = "speedtest.exe";

/// Configuration for the monitoring loop and its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Directory the measurement tool runs in; the binary is kept in
    /// `binaries/` below it
    pub data_dir: PathBuf,
    /// Archive to download when the binary is missing
    pub download_url: String,
    /// URL probed to decide whether the internet is reachable
    pub probe_url: String,
    /// Connectivity sampling period in milliseconds
    pub sample_interval_ms: u64,
    /// Sleep after a successful measurement in milliseconds
    pub success_interval_ms: u64,
    /// Sleep after a failed cycle in milliseconds
    pub retry_delay_ms: u64,
    /// Sleep between provisioning attempts in milliseconds
    pub provision_retry_delay_ms: u64,
    /// Reachability probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Upper bound on a single measurement run in milliseconds
    pub tool_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            probe_url: DEFAULT_PROBE_URL.to_string(),
            sample_interval_ms: crate::DEFAULT_SAMPLE_INTERVAL_MS,
            success_interval_ms: crate::DEFAULT_SUCCESS_INTERVAL_MS,
            retry_delay_ms: crate::DEFAULT_RETRY_DELAY_MS,
            provision_retry_delay_ms: crate::DEFAULT_PROVISION_RETRY_DELAY_MS,
            probe_timeout_ms: 5_000,
            tool_timeout_ms: 120_000,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration rooted at the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set the archive download URL.
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    /// Set the reachability probe URL.
    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Set the connectivity sampling period.
    pub fn with_sample_interval_ms(mut self, ms: u64) -> Self {
        self.sample_interval_ms = ms;
        self
    }

    /// Set the pause after a successful measurement.
    pub fn with_success_interval_ms(mut self, ms: u64) -> Self {
        self.success_interval_ms = ms;
        self
    }

    /// Set the pause after a failed cycle.
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Set the pause between provisioning attempts.
    pub fn with_provision_retry_delay_ms(mut self, ms: u64) -> Self {
        self.provision_retry_delay_ms = ms;
        self
    }

    /// Set the upper bound on a single measurement run.
    pub fn with_tool_timeout_ms(mut self, ms: u64) -> Self {
        self.tool_timeout_ms = ms;
        self
    }

    /// Directory the measurement binary is stored in.
    pub fn binary_dir(&self) -> PathBuf {
        self.data_dir.join("binaries")
    }

    /// Full path of the measurement binary.
    pub fn binary_path(&self) -> PathBuf {
        self.binary_dir().join(SPEEDTEST_BINARY)
    }

    /// Connectivity sampling period.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Pause after a successful measurement.
    pub fn success_interval(&self) -> Duration {
        Duration::from_millis(self.success_interval_ms)
    }

    /// Pause after a failed cycle.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Pause between provisioning attempts.
    pub fn provision_retry_delay(&self) -> Duration {
        Duration::from_millis(self.provision_retry_delay_ms)
    }

    /// Reachability probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Upper bound on a single measurement run.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }
}
