//! Subprocess invocation of the measurement tool and report parsing.

use crate::config::MonitorConfig;
use crate::error::{Result, SpeedwatchError};
use crate::speedtest::data::SpeedtestReport;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Fixed tool arguments: JSON output, no progress rendering, licence
/// pre-accepted so the first run cannot stall on a prompt.
const SPEEDTEST_ARGS: [&str; 5] = ["-f", "json", "-p", "no", "--accept-license"];

/// Anything that can produce a raw measurement report.
pub trait MeasurementSource {
    /// Run one measurement to completion.
    fn measure(&mut self) -> impl Future<Output = Result<SpeedtestReport>> + Send;
}

/// Drives the speedtest CLI as a subprocess and parses its JSON report.
pub struct SpeedtestRunner {
    binary: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl SpeedtestRunner {
    /// Create a runner for the configured binary and working directory.
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            binary: config.binary_path(),
            working_dir: config.data_dir.clone(),
            timeout: config.tool_timeout(),
        }
    }

    /// Invoke the tool once, capture its full stdout and parse the report.
    ///
    /// A run that exceeds the configured timeout is abandoned; the child is
    /// killed when the in-flight invocation is dropped.
    pub async fn run(&self) -> Result<SpeedtestReport> {
        debug!(
            "running {} {}",
            self.binary.display(),
            SPEEDTEST_ARGS.join(" ")
        );
        let invocation = Command::new(&self.binary)
            .args(SPEEDTEST_ARGS)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, invocation)
            .await
            .map_err(|_| {
                SpeedwatchError::subprocess_error(format!(
                    "speedtest timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|err| {
                SpeedwatchError::subprocess_error(format!(
                    "failed to spawn {}: {}",
                    self.binary.display(),
                    err
                ))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeedwatchError::subprocess_error(format!(
                "speedtest exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        parse_report(&String::from_utf8_lossy(&output.stdout))
    }
}

impl MeasurementSource for SpeedtestRunner {
    async fn measure(&mut self) -> Result<SpeedtestReport> {
        self.run().await
    }
}

/// Parse the tool's JSON report. Malformed output is a parse failure, never
/// coerced into an empty measurement.
pub fn parse_report(json: &str) -> Result<SpeedtestReport> {
    serde_json::from_str(json).map_err(|err| SpeedwatchError::parse_error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = r#"{
        "type": "result",
        "timestamp": "2025-11-02T17:15:40Z",
        "ping": {"jitter": 1.5, "latency": 12.3, "low": 10.1, "high": 14.9},
        "download": {"bandwidth": 11674089, "bytes": 104857600, "elapsed": 8984},
        "upload": {"bandwidth": 5242880, "bytes": 52428800, "elapsed": 8203},
        "isp": "Example Fiber",
        "interface": {"internalIp": "192.168.1.20", "name": "eth0", "isVpn": false, "externalIp": "203.0.113.7"},
        "server": {"id": 12345, "host": "speedtest.example.net", "port": 8080, "name": "Example City", "country": "Examplestan"},
        "result": {"id": "abc", "url": "https://www.speedtest.net/result/c/abc", "persisted": true}
    }"#;

    #[test]
    fn test_parse_full_report() {
        let report = parse_report(SAMPLE_REPORT).unwrap();
        assert_eq!(report.interface.external_ip, "203.0.113.7");
        assert_eq!(report.ping.latency, 12.3);
        assert_eq!(report.ping.jitter, 1.5);
        assert_eq!(report.download.bytes, 104_857_600);
        assert_eq!(report.upload.bytes, 52_428_800);
        assert_eq!(report.isp, "Example Fiber");
        assert_eq!(report.server.name, "Example City");
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        let err = parse_report("[ERROR] Cannot open socket").unwrap_err();
        assert!(matches!(err, SpeedwatchError::Parse(_)));

        let err = parse_report(r#"{"ping": {"latency": 1.0}}"#).unwrap_err();
        assert!(matches!(err, SpeedwatchError::Parse(_)));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use crate::config::MonitorConfig;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        fn stub_tool(name: &str, script: &str) -> (PathBuf, MonitorConfig) {
            let dir = std::env::temp_dir().join(format!(
                "speedwatch-runner-{}-{}",
                name,
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&dir);
            let config = MonitorConfig::new(&dir);
            fs::create_dir_all(config.binary_dir()).unwrap();
            fs::write(config.binary_path(), script).unwrap();
            fs::set_permissions(config.binary_path(), fs::Permissions::from_mode(0o755)).unwrap();
            (dir, config)
        }

        fn write_report(dir: &Path) -> PathBuf {
            let path = dir.join("report.json");
            fs::write(&path, SAMPLE_REPORT).unwrap();
            path
        }

        #[tokio::test]
        async fn test_run_captures_and_parses_stdout() {
            let (dir, config) = stub_tool("ok", "");
            let report_path = write_report(&dir);
            fs::write(
                config.binary_path(),
                format!("#!/bin/sh\ncat {}\n", report_path.display()),
            )
            .unwrap();

            let runner = SpeedtestRunner::new(&config);
            let report = runner.run().await.unwrap();
            assert_eq!(report.interface.external_ip, "203.0.113.7");

            fs::remove_dir_all(&dir).unwrap();
        }

        #[tokio::test]
        async fn test_run_maps_nonzero_exit_to_subprocess_error() {
            let (dir, config) = stub_tool("fail", "#!/bin/sh\necho doomed >&2\nexit 3\n");

            let runner = SpeedtestRunner::new(&config);
            let err = runner.run().await.unwrap_err();
            assert!(matches!(err, SpeedwatchError::Subprocess(_)));
            assert!(err.to_string().contains("doomed"));

            fs::remove_dir_all(&dir).unwrap();
        }

        #[tokio::test]
        async fn test_run_maps_missing_binary_to_subprocess_error() {
            let (dir, config) = stub_tool("absent", "");
            fs::remove_file(config.binary_path()).unwrap();

            let runner = SpeedtestRunner::new(&config);
            let err = runner.run().await.unwrap_err();
            assert!(matches!(err, SpeedwatchError::Subprocess(_)));

            fs::remove_dir_all(&dir).unwrap();
        }

        #[tokio::test]
        async fn test_run_times_out_hung_tool() {
            let (dir, config) = stub_tool("hang", "#!/bin/sh\nsleep 30\n");
            let config = config.with_tool_timeout_ms(100);

            let runner = SpeedtestRunner::new(&config);
            let err = runner.run().await.unwrap_err();
            assert!(matches!(err, SpeedwatchError::Subprocess(_)));
            assert!(err.to_string().contains("timed out"));

            fs::remove_dir_all(&dir).unwrap();
        }
    }
}
