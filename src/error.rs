// src/error.rs
//! Error types for GPS time synchronization

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug)]
pub enum GpsError {
    /// Line is not a framed NMEA sentence. Recoverable, skip the line.
    MalformedSentence(String),
    /// Sentence framed correctly but a field failed validation. Recoverable.
    InvalidNmeaData(String),
    /// Timeout elapsed without an actionable sentence.
    NoValidData,
    DeviceAccess(String),
    InvalidDevice(String),
    NoGpsDevices,
    UnsupportedOs(String),
    SystemTimeUpdate(String),
    PermissionDenied(String),
    Cancelled,
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    Config(String),
    Other(String),
}

impl GpsError {
    /// Per-line errors the read loops skip past instead of returning.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GpsError::MalformedSentence(_) | GpsError::InvalidNmeaData(_)
        )
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        GpsError::MalformedSentence(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        GpsError::InvalidNmeaData(msg.into())
    }
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::MalformedSentence(msg) => write!(f, "Malformed sentence: {}", msg),
            GpsError::InvalidNmeaData(msg) => write!(f, "Invalid NMEA data: {}", msg),
            GpsError::NoValidData => write!(f, "No valid GPS data received"),
            GpsError::DeviceAccess(msg) => write!(f, "Cannot access device: {}", msg),
            GpsError::InvalidDevice(msg) => write!(f, "Invalid device: {}", msg),
            GpsError::NoGpsDevices => write!(f, "No GPS devices found"),
            GpsError::UnsupportedOs(os) => write!(f, "Unsupported operating system: {}", os),
            GpsError::SystemTimeUpdate(msg) => write!(f, "Failed to update system time: {}", msg),
            GpsError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            GpsError::Cancelled => write!(f, "Operation cancelled"),
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "Serial error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpsError::Io(e) => Some(e),
            GpsError::Serial(e) => Some(e),
            GpsError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(GpsError::malformed("no $").is_recoverable());
        assert!(GpsError::invalid("bad date").is_recoverable());
        assert!(!GpsError::NoValidData.is_recoverable());
        assert!(!GpsError::Cancelled.is_recoverable());
        assert!(!GpsError::DeviceAccess("/dev/ttyUSB0".into()).is_recoverable());
    }

    #[test]
    fn test_io_source_preserved() {
        let err: GpsError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "device closed").into();
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "IO error: device closed");
    }

    #[test]
    fn test_serial_listing_error_kept() {
        let serial = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "no ports");
        let err: GpsError = serial.into();
        assert!(matches!(err, GpsError::Serial(_)));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Serial error: no ports");
    }
}
