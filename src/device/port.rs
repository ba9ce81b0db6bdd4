// src/device/port.rs
//! Opening serial devices with the right line discipline

use crate::error::{GpsError, Result};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

/// Reject paths that cannot be a serial device on this platform.
pub fn validate_device_path(path: &str) -> Result<()> {
    #[cfg(windows)]
    let valid = path.to_ascii_uppercase().starts_with("COM")
        || path.starts_with(r"\\.\COM");

    #[cfg(not(windows))]
    let valid = path.starts_with("/dev/");

    if valid {
        Ok(())
    } else {
        Err(GpsError::InvalidDevice(format!("invalid device path: {}", path)))
    }
}

/// Open `path` as a raw 8N1 serial stream at `baud_rate`, without echo or
/// flow control.
pub fn open_device(path: &str, baud_rate: u32) -> Result<SerialStream> {
    validate_device_path(path)?;
    debug!(path, baud_rate, "opening serial device");

    tokio_serial::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(1000))
        .open_native_async()
        .map_err(|e| GpsError::DeviceAccess(format!("failed to open {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_validate_device_path() {
        assert!(validate_device_path("/dev/ttyUSB0").is_ok());
        assert!(validate_device_path("/dev/pts/3").is_ok());
        assert!(matches!(
            validate_device_path("ttyUSB0"),
            Err(GpsError::InvalidDevice(_))
        ));
        assert!(validate_device_path("COM3").is_err());
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_open_missing_device_is_device_access() {
        let err = open_device("/dev/gps-timesync-does-not-exist", 9600).unwrap_err();
        assert!(matches!(err, GpsError::DeviceAccess(_)), "{:?}", err);
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_open_invalid_path_is_rejected_before_open() {
        let err = open_device("relative/path", 9600).unwrap_err();
        assert!(matches!(err, GpsError::InvalidDevice(_)));
    }
}
