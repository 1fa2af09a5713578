//! Acquisition of the measurement tool binary.
//!
//! The tool ships as a gzipped tarball; only the single `speedtest`
//! executable inside it is of interest. Once the binary exists on disk it is
//! never fetched again unless someone deletes it.

use crate::config::{MonitorConfig, SPEEDTEST_BINARY};
use crate::error::{Result, SpeedwatchError};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::{error, info};

/// Keeps a runnable measurement binary available on disk.
pub struct Provisioner {
    binary_dir: PathBuf,
    download_url: String,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl Provisioner {
    /// Create a provisioner for the configured binary directory.
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            binary_dir: config.binary_dir(),
            download_url: config.download_url.clone(),
            retry_delay: config.provision_retry_delay(),
            client: reqwest::Client::new(),
        }
    }

    /// Full path of the measurement binary.
    pub fn binary_path(&self) -> PathBuf {
        self.binary_dir.join(SPEEDTEST_BINARY)
    }

    /// Make sure the binary exists and is executable. Idempotent: returns
    /// immediately when the binary is already present.
    pub async fn ensure_binary(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.binary_dir)?;
        let binary = self.binary_path();
        if binary.exists() {
            return Ok(binary);
        }
        info!("measurement binary not found, downloading");
        let archive = self.download_archive().await?;
        info!("archive downloaded, extracting");
        self.install_from_archive(&archive)?;
        info!("measurement binary ready at {}", binary.display());
        Ok(binary)
    }

    /// Like [`ensure_binary`](Self::ensure_binary), but never gives up:
    /// failures are logged and retried after a fixed short delay until the
    /// binary is available. There is no other path forward for the monitor,
    /// so eventual availability wins over fast failure.
    pub async fn ensure_with_retry(&self) -> PathBuf {
        loop {
            match self.ensure_binary().await {
                Ok(path) => return path,
                Err(err) => {
                    error!("provisioning failed: {}", err);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    fn archive_path(&self) -> PathBuf {
        let name = self
            .download_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("speedtest.tgz");
        self.binary_dir.join(name)
    }

    /// Stream the tool archive to disk, replacing any stale partial download.
    async fn download_archive(&self) -> Result<PathBuf> {
        let archive = self.archive_path();
        if archive.exists() {
            fs::remove_file(&archive)?;
        }
        let response = self
            .client
            .get(&self.download_url)
            .send()
            .await?
            .error_for_status()?;
        let mut file = fs::File::create(&archive)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?)?;
        }
        Ok(archive)
    }

    /// Extract the tool from a downloaded archive, mark it executable and
    /// delete the archive.
    pub fn install_from_archive(&self, archive: &Path) -> Result<PathBuf> {
        let binary = self.binary_path();
        extract_tool(archive, &binary)?;
        set_executable(&binary)?;
        fs::remove_file(archive).ok();
        Ok(binary)
    }
}

/// Unpack only the archive entry named `speedtest` (or `speedtest.exe`),
/// discarding everything else the tarball carries.
fn extract_tool(archive: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut tarball = Archive::new(GzDecoder::new(file));
    for entry in tarball.entries()? {
        let mut entry = entry?;
        let is_tool = entry
            .path()?
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name == "speedtest" || name == "speedtest.exe")
            .unwrap_or(false);
        if is_tool {
            entry.unpack(dest)?;
            return Ok(());
        }
    }
    Err(SpeedwatchError::archive_error(
        "no speedtest executable in archive",
    ))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "speedwatch-provision-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_provisioner(dir: &Path) -> Provisioner {
        let config = MonitorConfig::new(dir);
        Provisioner::new(&config)
    }

    /// Build a tarball shaped like the vendor one: the executable plus
    /// sibling files that must be discarded.
    fn write_fixture_archive(dir: &Path) -> PathBuf {
        let archive = dir.join("ookla-speedtest-1.2.0-linux-x86_64.tgz");
        let encoder = GzEncoder::new(fs::File::create(&archive).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in [
            ("ookla-speedtest-1.2.0/speedtest.5", "manpage"),
            ("ookla-speedtest-1.2.0/speedtest.md", "license text"),
            ("ookla-speedtest-1.2.0/speedtest", "#!/bin/sh\necho fake\n"),
        ] {
            let data = contents.as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        archive
    }

    #[test]
    fn test_install_extracts_only_the_tool() {
        let dir = test_dir("install");
        let provisioner = test_provisioner(&dir);
        fs::create_dir_all(provisioner.binary_path().parent().unwrap()).unwrap();
        let archive = write_fixture_archive(&dir.join("binaries"));

        let binary = provisioner.install_from_archive(&archive).unwrap();
        assert!(binary.exists());
        assert_eq!(
            fs::read_to_string(&binary).unwrap(),
            "#!/bin/sh\necho fake\n"
        );
        // siblings discarded, archive cleaned up
        assert!(!dir.join("binaries/speedtest.5").exists());
        assert!(!dir.join("binaries/speedtest.md").exists());
        assert!(!archive.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_install_sets_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = test_dir("chmod");
        let provisioner = test_provisioner(&dir);
        fs::create_dir_all(provisioner.binary_path().parent().unwrap()).unwrap();
        let archive = write_fixture_archive(&dir.join("binaries"));

        let binary = provisioner.install_from_archive(&archive).unwrap();
        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_install_rejects_archive_without_tool() {
        let dir = test_dir("missing");
        let provisioner = test_provisioner(&dir);
        fs::create_dir_all(provisioner.binary_path().parent().unwrap()).unwrap();

        let archive = dir.join("binaries/empty.tgz");
        let encoder = GzEncoder::new(fs::File::create(&archive).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let data = b"not the tool";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "ookla-speedtest-1.2.0/readme.txt", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let err = provisioner.install_from_archive(&archive).unwrap_err();
        assert!(matches!(err, SpeedwatchError::Archive(_)));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_ensure_binary_short_circuits_when_present() {
        let dir = test_dir("present");
        let provisioner = test_provisioner(&dir);
        fs::create_dir_all(provisioner.binary_path().parent().unwrap()).unwrap();
        fs::write(provisioner.binary_path(), "present").unwrap();

        // no download URL is reachable from here, so this only passes if the
        // existing file short-circuits the whole download path
        let binary = provisioner.ensure_binary().await.unwrap();
        assert_eq!(binary, provisioner.binary_path());

        fs::remove_dir_all(&dir).unwrap();
    }
}
