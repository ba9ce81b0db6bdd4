// src/device/session.rs
//! One open device and the operations that consume it

use super::{port::open_device, probe::probe_device};
use crate::{
    cancel::CancelToken,
    config::SessionConfig,
    display::MonitorDisplay,
    error::Result,
    monitor,
    sync::{self, SyncOutcome},
    system::ClockSetter,
};
use tokio::io::AsyncRead;
use tokio_serial::SerialStream;
use tracing::info;

/// A byte stream from a GPS device plus the settings and cancel token the
/// operations on it share. Each operation takes the session by value, so the
/// stream is closed when it returns.
pub struct DeviceSession<S> {
    name: String,
    stream: S,
    config: SessionConfig,
    cancel: CancelToken,
}

impl DeviceSession<SerialStream> {
    /// Open the serial device at `path` with the configured baud rate.
    pub fn open(path: &str, config: SessionConfig, cancel: CancelToken) -> Result<Self> {
        let stream = open_device(path, config.baud_rate)?;
        info!(path, baud_rate = config.baud_rate, "device opened");
        Ok(Self {
            name: path.to_string(),
            stream,
            config,
            cancel,
        })
    }
}

impl<S: AsyncRead + Unpin> DeviceSession<S> {
    /// Wrap an already open stream.
    pub fn new(stream: S, config: SessionConfig, cancel: CancelToken) -> Self {
        Self {
            name: "stream".to_string(),
            stream,
            config,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn probe(self) -> Result<bool> {
        let found = probe_device(
            self.stream,
            self.config.probe_timeout,
            &self.config.talkers,
            &self.cancel,
        )
        .await?;
        info!(device = %self.name, found, "probe finished");
        Ok(found)
    }

    pub async fn sync_once<C: ClockSetter + ?Sized>(self, clock: &mut C) -> Result<SyncOutcome> {
        sync::sync_once(self.stream, clock, &self.config, &self.cancel).await
    }

    pub async fn monitor<D: MonitorDisplay + ?Sized>(self, display: &mut D) -> Result<()> {
        monitor::monitor(self.stream, display, &self.config, &self.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::GpsError, gps::codec::encode, monitor::MonitorEvent};
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn quick_config() -> SessionConfig {
        SessionConfig {
            probe_timeout: Duration::from_millis(100),
            sync_timeout: Duration::from_millis(200),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_session_sync() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        tx.write_all(b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n")
            .await
            .unwrap();

        let mut applied = Vec::new();
        let mut clock = |t: DateTime<Utc>| -> Result<()> {
            applied.push(t);
            Ok(())
        };
        let session = DeviceSession::new(rx, quick_config(), CancelToken::new());
        let outcome = session.sync_once(&mut clock).await.unwrap();
        drop(clock);

        let expected = Utc.with_ymd_and_hms(2094, 3, 23, 12, 35, 19).unwrap();
        assert_eq!(outcome.time, expected);
        assert_eq!(applied, vec![expected]);
    }

    #[tokio::test]
    async fn test_session_probe() {
        let (mut tx, rx) = tokio::io::duplex(256);
        tx.write_all(encode("GLGSV,1,1,00").as_bytes()).await.unwrap();
        let session = DeviceSession::new(rx, quick_config(), CancelToken::new());
        assert_eq!(session.name(), "stream");
        assert!(session.probe().await.unwrap());

        let (_tx, rx) = tokio::io::duplex(256);
        let session = DeviceSession::new(rx, quick_config(), CancelToken::new());
        assert!(!session.probe().await.unwrap());
    }

    #[tokio::test]
    async fn test_session_monitor_cancelled() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        tx.write_all(encode("GPGSV,1,1,01,07,45,120,33").as_bytes()).await.unwrap();

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let mut shown: Vec<MonitorEvent> = Vec::new();
        let session = DeviceSession::new(rx, quick_config(), cancel);
        let err = session.monitor(&mut shown).await.unwrap_err();
        assert!(matches!(err, GpsError::Cancelled));
        assert!(matches!(shown.last(), Some(MonitorEvent::SkyView(view)) if view.tracked() == 1));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_open_rejects_bad_path() {
        let result = DeviceSession::open("ttyUSB0", SessionConfig::default(), CancelToken::new());
        assert!(matches!(result, Err(GpsError::InvalidDevice(_))));
    }
}
