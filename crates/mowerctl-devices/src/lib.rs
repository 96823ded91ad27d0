//! USB peripheral discovery and device provisioning for mowerctl.
//!
//! This crate implements the leaf of the launch pipeline: scanning the sysfs
//! USB topology for serial-capable peripherals (`scan_devices`), persisting the
//! result as the two roster files with bounded retry (`RosterWriter`), and
//! turning the names roster into device-passthrough grants (`provision`).

pub mod enumerate;
pub mod provision;
pub mod retry;
pub mod roster;

pub use enumerate::{scan_devices, UdevQuery, Udevadm, UsbDevice, BUS_NAME_PREFIX};
pub use provision::{provision, DeviceGrant};
pub use retry::{retry_bounded, RetryOutcome, RetryPolicy};
pub use roster::{RosterReport, RosterWriter};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("udev query failed for {syspath}: {reason}")]
    Query { syspath: String, reason: String },
    #[error("roster file {path} still missing after {attempts} attempts")]
    RosterExhausted { path: PathBuf, attempts: u32 },
    #[error("roster file not found: {0}")]
    RosterMissing(PathBuf),
}
