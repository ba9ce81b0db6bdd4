// src/device/scan.rs
//! Finding serial devices that might be GPS receivers, and watching for
//! them to come and go

use super::probe::probe_path;
use crate::{
    cancel::CancelToken,
    config::SessionConfig,
    error::{GpsError, Result},
};
use std::{
    collections::BTreeSet,
    fmt,
    future::Future,
    time::Duration,
};
use tokio::task::JoinSet;
use tokio_serial::{SerialPortInfo, SerialPortType};
use tracing::{debug, info, warn};

const USB_PREFIXES: [&str; 2] = ["/dev/ttyUSB", "/dev/ttyACM"];
const ONBOARD_PREFIX: &str = "/dev/ttyS";

/// What the watcher noticed about a device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A path appeared; a probe has been started.
    Detected(String),
    /// The probe saw NMEA traffic.
    Confirmed(String),
    /// The probe ran out of time without seeing NMEA traffic.
    NotGps(String),
    /// The device could not be opened or read.
    ProbeFailed { path: String, error: String },
    /// A previously seen path is gone.
    Removed(String),
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEvent::Detected(path) => write!(f, "detected {}", path),
            DeviceEvent::Confirmed(path) => write!(f, "GPS device confirmed on {}", path),
            DeviceEvent::NotGps(path) => write!(f, "{} is not sending NMEA data", path),
            DeviceEvent::ProbeFailed { path, error } => {
                write!(f, "probe of {} failed: {}", path, error)
            }
            DeviceEvent::Removed(path) => write!(f, "{} removed", path),
        }
    }
}

/// Serial ports worth probing, best candidates first.
///
/// Fails with [`GpsError::NoGpsDevices`] when nothing qualifies.
pub fn enumerate_candidate_devices() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()?;
    debug!(count = ports.len(), "serial ports listed");

    #[cfg(windows)]
    let candidates = windows_candidates(&ports);

    #[cfg(unix)]
    let candidates = unix_candidates(&ports);

    #[cfg(not(any(unix, windows)))]
    let candidates: Vec<String> = {
        let _ = &ports;
        return Err(GpsError::UnsupportedOs(std::env::consts::OS.to_string()));
    };

    if candidates.is_empty() {
        Err(GpsError::NoGpsDevices)
    } else {
        Ok(candidates)
    }
}

/// USB and ACM adapters; onboard `ttyS*` ports only when no adapter exists
/// and the port reports itself as a GPS.
#[cfg_attr(windows, allow(dead_code))]
fn unix_candidates(ports: &[SerialPortInfo]) -> Vec<String> {
    let mut usb: Vec<String> = ports
        .iter()
        .map(|p| p.port_name.clone())
        .filter(|name| USB_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
        .collect();

    if usb.is_empty() {
        usb = ports
            .iter()
            .filter(|p| p.port_name.starts_with(ONBOARD_PREFIX) && looks_like_gps(&p.port_type))
            .map(|p| p.port_name.clone())
            .collect();
    }

    sort_ports(&mut usb);
    usb
}

/// `COM*` ports in numeric order, so COM3 comes before COM10.
#[cfg_attr(unix, allow(dead_code))]
fn windows_candidates(ports: &[SerialPortInfo]) -> Vec<String> {
    let mut com: Vec<String> = ports
        .iter()
        .map(|p| p.port_name.clone())
        .filter(|name| name.to_ascii_uppercase().starts_with("COM"))
        .collect();
    sort_ports(&mut com);
    com
}

fn looks_like_gps(port_type: &SerialPortType) -> bool {
    match port_type {
        SerialPortType::UsbPort(usb) => [&usb.manufacturer, &usb.product]
            .into_iter()
            .flatten()
            .any(|text| text.to_ascii_lowercase().contains("gps")),
        _ => false,
    }
}

fn sort_ports(names: &mut [String]) {
    names.sort_by(|a, b| split_number(a).cmp(&split_number(b)));
}

/// `"/dev/ttyUSB10"` → `("/dev/ttyUSB", Some(10))`.
fn split_number(name: &str) -> (&str, Option<u32>) {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    (stem, name[stem.len()..].parse().ok())
}

/// Probe candidates in order and return the first that carries NMEA data.
pub async fn find_gps_device(config: &SessionConfig, cancel: &CancelToken) -> Result<String> {
    for path in enumerate_candidate_devices()? {
        match probe_path(&path, config, cancel).await {
            Ok(true) => {
                info!(path = %path, "using GPS device");
                return Ok(path);
            }
            Ok(false) => debug!(path = %path, "no NMEA traffic"),
            Err(GpsError::Cancelled) => return Err(GpsError::Cancelled),
            Err(e) => debug!(path = %path, error = %e, "probe failed"),
        }
    }
    Err(GpsError::NoGpsDevices)
}

/// Poll the candidate list every `interval` and probe paths as they appear.
///
/// Runs until `cancel` fires, then returns `Ok(())`.
pub async fn watch_devices<F>(
    interval: Duration,
    config: &SessionConfig,
    cancel: &CancelToken,
    on_event: F,
) -> Result<()>
where
    F: FnMut(DeviceEvent),
{
    let probe_config = config.clone();
    let probe_cancel = cancel.clone();
    let probe = move |path: String| {
        let config = probe_config.clone();
        let cancel = probe_cancel.clone();
        async move { probe_path(&path, &config, &cancel).await }
    };
    watch_loop(interval, cancel, enumerate_candidate_devices, probe, on_event).await
}

async fn watch_loop<L, P, Fut, F>(
    interval: Duration,
    cancel: &CancelToken,
    mut list: L,
    probe: P,
    mut on_event: F,
) -> Result<()>
where
    L: FnMut() -> Result<Vec<String>>,
    P: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool>> + Send + 'static,
    F: FnMut(DeviceEvent),
{
    let mut known: BTreeSet<String> = BTreeSet::new();

    while !cancel.is_cancelled() {
        let current: BTreeSet<String> = match list() {
            Ok(paths) => paths.into_iter().collect(),
            Err(GpsError::NoGpsDevices) => BTreeSet::new(),
            Err(e @ GpsError::UnsupportedOs(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "listing serial ports failed");
                known.clone()
            }
        };

        for gone in known.difference(&current) {
            info!(path = %gone, "device removed");
            on_event(DeviceEvent::Removed(gone.clone()));
        }

        let mut probes = JoinSet::new();
        for path in current.difference(&known) {
            info!(path = %path, "device detected");
            on_event(DeviceEvent::Detected(path.clone()));
            let fut = probe(path.clone());
            let path = path.clone();
            probes.spawn(async move { (path, fut.await) });
        }
        known = current;

        while let Some(joined) = probes.join_next().await {
            let (path, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "probe task failed");
                    continue;
                }
            };
            match result {
                Ok(true) => on_event(DeviceEvent::Confirmed(path)),
                Ok(false) => on_event(DeviceEvent::NotGps(path)),
                Err(GpsError::Cancelled) => return Ok(()),
                Err(e) => on_event(DeviceEvent::ProbeFailed {
                    path,
                    error: e.to_string(),
                }),
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!("device watch stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };
    use tokio_serial::UsbPortInfo;

    fn port(name: &str, port_type: SerialPortType) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type,
        }
    }

    fn usb(product: &str) -> SerialPortType {
        SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x1546,
            pid: 0x01a7,
            serial_number: None,
            manufacturer: Some("u-blox AG".to_string()),
            product: Some(product.to_string()),
        })
    }

    #[test]
    fn test_usb_ports_first_and_sorted() {
        let ports = vec![
            port("/dev/ttyS0", SerialPortType::Unknown),
            port("/dev/ttyUSB10", usb("serial")),
            port("/dev/ttyACM0", usb("u-blox 7 - GPS/GNSS Receiver")),
            port("/dev/ttyUSB2", usb("serial")),
        ];
        assert_eq!(
            unix_candidates(&ports),
            vec!["/dev/ttyACM0", "/dev/ttyUSB2", "/dev/ttyUSB10"]
        );
    }

    #[test]
    fn test_onboard_ports_need_gps_description() {
        let ports = vec![
            port("/dev/ttyS1", usb("USB GPS Mouse")),
            port("/dev/ttyS0", SerialPortType::Unknown),
            port("/dev/ttyS2", usb("modem")),
        ];
        assert_eq!(unix_candidates(&ports), vec!["/dev/ttyS1"]);

        let ports = vec![port("/dev/ttyS0", SerialPortType::Unknown)];
        assert!(unix_candidates(&ports).is_empty());
    }

    #[test]
    fn test_com_ports_numeric_order() {
        let ports = vec![
            port("COM10", SerialPortType::Unknown),
            port("COM3", SerialPortType::Unknown),
            port("LPT1", SerialPortType::Unknown),
            port("COM1", SerialPortType::Unknown),
        ];
        assert_eq!(windows_candidates(&ports), vec!["COM1", "COM3", "COM10"]);
    }

    #[test]
    fn test_split_number() {
        assert_eq!(split_number("/dev/ttyUSB10"), ("/dev/ttyUSB", Some(10)));
        assert_eq!(split_number("COM"), ("COM", None));
    }

    #[tokio::test]
    async fn test_watch_reports_changes_then_stops() {
        let rounds = Arc::new(Mutex::new(VecDeque::from(vec![
            vec!["/dev/ttyUSB0".to_string(), "/dev/ttyACM0".to_string()],
            vec!["/dev/ttyACM0".to_string(), "/dev/ttyUSB1".to_string()],
        ])));
        let cancel = CancelToken::new();

        let list = {
            let rounds = Arc::clone(&rounds);
            let cancel = cancel.clone();
            move || {
                let next = rounds.lock().unwrap().pop_front();
                match next {
                    Some(paths) => Ok(paths),
                    None => {
                        cancel.cancel();
                        Err(GpsError::NoGpsDevices)
                    }
                }
            }
        };
        let probe = |path: String| async move {
            match path.as_str() {
                "/dev/ttyACM0" => Ok(true),
                "/dev/ttyUSB0" => Ok(false),
                _ => Err(GpsError::DeviceAccess(format!("failed to open {}", path))),
            }
        };

        let mut events = Vec::new();
        watch_loop(Duration::from_millis(10), &cancel, list, probe, |e| events.push(e))
            .await
            .unwrap();

        let (detected, rest): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|e| matches!(e, DeviceEvent::Detected(_)));
        assert_eq!(
            detected,
            vec![
                DeviceEvent::Detected("/dev/ttyACM0".into()),
                DeviceEvent::Detected("/dev/ttyUSB0".into()),
                DeviceEvent::Detected("/dev/ttyUSB1".into()),
            ]
        );
        assert!(rest.contains(&DeviceEvent::Confirmed("/dev/ttyACM0".into())));
        assert!(rest.contains(&DeviceEvent::NotGps("/dev/ttyUSB0".into())));
        assert!(rest.contains(&DeviceEvent::Removed("/dev/ttyUSB0".into())));
        assert!(rest.iter().any(|e| matches!(
            e,
            DeviceEvent::ProbeFailed { path, .. } if path == "/dev/ttyUSB1"
        )));
        // The final empty round removes what was left.
        assert!(rest.contains(&DeviceEvent::Removed("/dev/ttyUSB1".into())));
    }

    #[tokio::test]
    async fn test_watch_returns_when_already_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut events = Vec::new();
        watch_loop(
            Duration::from_secs(60),
            &cancel,
            || Ok(vec!["/dev/ttyUSB0".to_string()]),
            |_path: String| async { Ok::<_, GpsError>(true) },
            |e| events.push(e),
        )
        .await
        .unwrap();
        assert!(events.is_empty());
    }
}
