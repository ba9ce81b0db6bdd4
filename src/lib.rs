// src/lib.rs
//! GPS time synchronization library
//!
//! Reads NMEA-0183 sentences from a serial GPS receiver, sets the system
//! clock from the first valid RMC fix, and can display live traffic or
//! watch for devices being plugged in.

pub mod cancel;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod gps;
pub mod logging;
pub mod monitor;
pub mod sync;
pub mod system;

// Re-export main types for convenience
pub use cancel::CancelToken;
pub use config::{SessionConfig, TimesyncConfig};
pub use device::{DeviceEvent, DeviceSession};
pub use display::{MonitorDisplay, TerminalDisplay};
pub use error::{GpsError, Result};
pub use monitor::{MonitorEvent, MonitorState};
pub use sync::SyncOutcome;
pub use system::{ClockSetter, DryRunClock, SystemClock};
