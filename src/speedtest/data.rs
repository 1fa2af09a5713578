//! Data structures for speed measurements.

use serde::{Deserialize, Serialize};

/// Sentinel shown for every string field while no measurement exists.
pub const UNMEASURED: &str = "-";

/// The latest connection quality reading, replaced wholesale each cycle.
///
/// There is no partially-filled state: a record is either a full successful
/// measurement or the placeholder produced by [`Measurement::placeholder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Whether this record comes from a successful measurement
    pub connected: bool,
    /// External IP of the client as reported by the tool
    pub client: String,
    /// Round-trip latency in milliseconds
    pub ping_ms: f64,
    /// Latency jitter in milliseconds
    pub jitter_ms: f64,
    /// Download throughput in whole MB/s
    pub download_mbps: u64,
    /// Upload throughput in whole MB/s
    pub upload_mbps: u64,
    /// Internet service provider name
    pub isp: String,
    /// Name of the measurement server used
    pub server: String,
    /// When the measurement was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
}

impl Measurement {
    /// The unmeasured state: every string field is `"-"`, `connected` is
    /// false. This is the initial state and the state after a failed
    /// reachability re-check.
    pub fn placeholder() -> Self {
        Self {
            connected: false,
            client: UNMEASURED.to_string(),
            ping_ms: 0.0,
            jitter_ms: 0.0,
            download_mbps: 0,
            upload_mbps: 0,
            isp: UNMEASURED.to_string(),
            server: UNMEASURED.to_string(),
            timestamp: 0,
        }
    }

    /// Normalize a raw tool report into a measurement record.
    pub fn from_report(report: &SpeedtestReport) -> Self {
        Self {
            connected: true,
            client: report.interface.external_ip.clone(),
            ping_ms: report.ping.latency,
            jitter_ms: report.ping.jitter,
            download_mbps: whole_mebibytes(report.download.bytes),
            upload_mbps: whole_mebibytes(report.upload.bytes),
            isp: report.isp.clone(),
            server: report.server.name.clone(),
            timestamp: now_millis(),
        }
    }

    /// Latency for display, always with two fraction digits ("12.30").
    pub fn ping_display(&self) -> String {
        if self.connected {
            format!("{:.2}", self.ping_ms)
        } else {
            UNMEASURED.to_string()
        }
    }

    /// Jitter for display, always with two fraction digits.
    pub fn jitter_display(&self) -> String {
        if self.connected {
            format!("{:.2}", self.jitter_ms)
        } else {
            UNMEASURED.to_string()
        }
    }

    /// Download throughput for display, whole MB/s.
    pub fn download_display(&self) -> String {
        if self.connected {
            self.download_mbps.to_string()
        } else {
            UNMEASURED.to_string()
        }
    }

    /// Upload throughput for display, whole MB/s.
    pub fn upload_display(&self) -> String {
        if self.connected {
            self.upload_mbps.to_string()
        } else {
            UNMEASURED.to_string()
        }
    }
}

impl Default for Measurement {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Byte count as whole mebibytes, rounded to the nearest whole number.
pub fn whole_mebibytes(bytes: u64) -> u64 {
    (bytes as f64 / (1024.0 * 1024.0) + 0.5).floor() as u64
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Raw report emitted by `speedtest -f json`. Only the fields the monitor
/// consumes are modeled; everything else in the report is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeedtestReport {
    pub interface: InterfaceReport,
    pub ping: PingReport,
    pub download: TransferReport,
    pub upload: TransferReport,
    pub isp: String,
    pub server: ServerReport,
}

/// Network interface section of the tool report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceReport {
    pub external_ip: String,
}

/// Latency section of the tool report.
#[derive(Debug, Clone, Deserialize)]
pub struct PingReport {
    pub latency: f64,
    pub jitter: f64,
}

/// Transfer section of the tool report, shared by download and upload.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferReport {
    pub bytes: u64,
}

/// Server section of the tool report.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerReport {
    pub name: String,
}
