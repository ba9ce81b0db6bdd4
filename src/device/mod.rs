// src/device/mod.rs
//! Serial devices: opening, probing, scanning and sessions

pub mod port;
pub mod probe;
pub mod scan;
pub mod session;

pub use port::{open_device, validate_device_path};
pub use probe::{probe_device, probe_path};
pub use scan::{enumerate_candidate_devices, find_gps_device, watch_devices, DeviceEvent};
pub use session::DeviceSession;
