use crate::enumerate::{scan_devices, UdevQuery, UsbDevice};
use crate::retry::{retry_bounded, RetryOutcome, RetryPolicy};
use crate::DeviceError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Summary of one roster generation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterReport {
    pub info_path: PathBuf,
    pub names_path: PathBuf,
    /// Scan-and-write cycles it took for both files to be present.
    pub attempts: u32,
    /// Devices written on the successful cycle.
    pub device_count: usize,
}

/// Writes the info and names roster files from one fresh device scan per
/// attempt, so the two files always describe the same devices.
///
/// Device nodes can show up late after boot, so the cycle is retried until
/// both files are present. A file that never appears is fatal: an absent
/// roster must never turn into an empty grant set.
#[derive(Debug, Clone)]
pub struct RosterWriter {
    sysfs_root: PathBuf,
    policy: RetryPolicy,
}

impl RosterWriter {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn write(
        &self,
        udev: &dyn UdevQuery,
        info_path: &Path,
        names_path: &Path,
    ) -> Result<RosterReport, DeviceError> {
        // The file that failed on the latest attempt, reported on exhaustion.
        let mut failing = info_path;
        let outcome = retry_bounded(self.policy, |attempt| {
            let devices: Vec<UsbDevice> = scan_devices(&self.sysfs_root, udev).collect();
            for (path, project) in [
                (info_path, UsbDevice::info_line as fn(&UsbDevice) -> String),
                (names_path, UsbDevice::name_line),
            ] {
                failing = path;
                let lines: Vec<String> = devices.iter().map(project).collect();
                write_lines(path, &lines)?;
                if !path.exists() {
                    return Err(DeviceError::RosterMissing(path.to_path_buf()));
                }
            }
            debug!("rosters present after attempt {attempt}");
            Ok(devices.len())
        });

        match outcome {
            RetryOutcome::Succeeded {
                value: device_count,
                attempts,
            } => {
                info!(
                    "roster written: {device_count} devices ({})",
                    names_path.display()
                );
                Ok(RosterReport {
                    info_path: info_path.to_path_buf(),
                    names_path: names_path.to_path_buf(),
                    attempts,
                    device_count,
                })
            }
            RetryOutcome::Exhausted { attempts, .. } => Err(DeviceError::RosterExhausted {
                path: failing.to_path_buf(),
                attempts,
            }),
        }
    }
}

/// Replace `path` with one line per entry, via a temp file in the same dir.
fn write_lines(path: &Path, lines: &[String]) -> Result<(), DeviceError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    for line in lines {
        writeln!(tmp, "{line}")?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| DeviceError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::tests::{fake_sysfs, FakeUdev};
    use std::time::Duration;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 10,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn writes_both_projections() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let paths = fake_sysfs(sys.path(), &["1-1/ttyUSB0", "1-2/ttyACM1"]);
        let mut udev = FakeUdev::default();
        udev.device(&paths[0], "ttyUSB0", &[("ID_SERIAL", "u-blox_ZED-F9P")])
            .device(&paths[1], "ttyACM1", &[("ID_SERIAL", "CubePilot_CubeOrange")]);

        let info = scratch.path().join("devices.txt");
        let names = scratch.path().join("device_names.txt");
        let report = RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(&udev, &info, &names)
            .unwrap();

        assert_eq!(report.device_count, 2);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            std::fs::read_to_string(&info).unwrap(),
            "/dev/ttyUSB0 - u-blox_ZED-F9P\n/dev/ttyACM1 - CubePilot_CubeOrange\n"
        );
        assert_eq!(
            std::fs::read_to_string(&names).unwrap(),
            "/dev/ttyUSB0\n/dev/ttyACM1\n"
        );
    }

    #[test]
    fn zero_devices_still_produces_files() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let udev = FakeUdev::default();

        let info = scratch.path().join("devices.txt");
        let names = scratch.path().join("device_names.txt");
        let report = RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(&udev, &info, &names)
            .unwrap();

        assert_eq!(report.device_count, 0);
        assert_eq!(report.attempts, 1);
        assert!(names.exists());
        assert_eq!(std::fs::read_to_string(&names).unwrap(), "");
    }

    #[test]
    fn unwritable_location_exhausts_after_ten_attempts() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let udev = FakeUdev::default();

        let info = scratch.path().join("missing-dir/devices.txt");
        let names = scratch.path().join("missing-dir/device_names.txt");
        let err = RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(&udev, &info, &names)
            .unwrap_err();

        match err {
            DeviceError::RosterExhausted { path, attempts } => {
                assert_eq!(path, info);
                assert_eq!(attempts, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!names.exists());
    }

    #[test]
    fn both_rosters_come_from_one_scan() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let paths = fake_sysfs(sys.path(), &["1-1/ttyUSB0", "1-2/ttyACM1"]);
        let mut udev = FakeUdev::default();
        udev.device(&paths[0], "ttyUSB0", &[("ID_SERIAL", "FTDI_A1")])
            .device(&paths[1], "ttyACM1", &[("ID_SERIAL", "u-blox_GNSS")]);

        let info = scratch.path().join("devices.txt");
        let names = scratch.path().join("device_names.txt");
        RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(&udev, &info, &names)
            .unwrap();

        assert_eq!(*udev.queries.lock().unwrap(), 2);
        let info = std::fs::read_to_string(&info).unwrap();
        let names = std::fs::read_to_string(&names).unwrap();
        assert_eq!(info.lines().count(), names.lines().count());
        for (info_line, name) in info.lines().zip(names.lines()) {
            assert!(info_line.starts_with(&format!("{name} - ")), "{info_line}");
        }
    }

    #[test]
    fn names_failure_is_reported_against_its_own_file() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let info = scratch.path().join("devices.txt");
        let names = scratch.path().join("missing-dir/device_names.txt");
        let err = RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(&FakeUdev::default(), &info, &names)
            .unwrap_err();
        assert!(matches!(
            err,
            DeviceError::RosterExhausted { ref path, attempts: 10 } if *path == names
        ));
    }

    #[test]
    fn rewrite_replaces_stale_content() {
        let sys = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let names = scratch.path().join("device_names.txt");
        std::fs::write(&names, "/dev/ttyUSB9\n").unwrap();

        RosterWriter::new(sys.path())
            .with_policy(quick())
            .write(
                &FakeUdev::default(),
                &scratch.path().join("devices.txt"),
                &names,
            )
            .unwrap();
        assert_eq!(std::fs::read_to_string(&names).unwrap(), "");
    }
}
