use crate::DeviceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single device-passthrough authorization for a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGrant {
    pub path: PathBuf,
}

impl DeviceGrant {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn to_arg(&self) -> String {
        format!("--device={}", self.path.display())
    }
}

/// Read the names roster into grants, one per non-empty line, in file order.
///
/// Duplicate lines produce duplicate grants. An empty file is a valid, empty
/// grant set; a missing file is an error.
pub fn provision(names_path: &Path) -> Result<Vec<DeviceGrant>, DeviceError> {
    let content = match std::fs::read_to_string(names_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DeviceError::RosterMissing(names_path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(DeviceGrant::new)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_grant_per_line_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("device_names.txt");
        std::fs::write(&names, "/dev/ttyUSB0\n/dev/ttyACM1\n").unwrap();

        let grants = provision(&names).unwrap();
        assert_eq!(
            grants,
            vec![
                DeviceGrant::new("/dev/ttyUSB0"),
                DeviceGrant::new("/dev/ttyACM1")
            ]
        );
        assert_eq!(grants[0].to_arg(), "--device=/dev/ttyUSB0");
    }

    #[test]
    fn empty_roster_yields_no_grants() {
        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("device_names.txt");
        std::fs::write(&names, "").unwrap();
        assert!(provision(&names).unwrap().is_empty());
    }

    #[test]
    fn blank_lines_skipped_and_duplicates_kept() {
        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("device_names.txt");
        std::fs::write(&names, "/dev/ttyUSB0\n\n  \n/dev/ttyUSB0\n").unwrap();

        let grants = provision(&names).unwrap();
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0], grants[1]);
    }

    #[test]
    fn missing_roster_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = provision(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, DeviceError::RosterMissing(_)));
    }
}
