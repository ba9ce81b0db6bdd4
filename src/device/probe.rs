// src/device/probe.rs
//! Liveness check: does a stream carry GPS sentences?

use super::port::open_device;
use crate::{
    cancel::CancelToken,
    config::SessionConfig,
    error::{GpsError, Result},
    gps::{codec::TalkerSet, NmeaReader, ReadEvent},
};
use std::time::Duration;
use tokio::{io::AsyncRead, time::Instant};
use tracing::{debug, info};

/// Read lines until one starts with a recognized talker and sentence type,
/// or until `timeout` runs out.
///
/// Silence, noise and a closed stream all give `Ok(false)`. Only I/O
/// failures are errors. Checksums are not checked.
pub async fn probe_device<R: AsyncRead + Unpin>(
    stream: R,
    timeout: Duration,
    talkers: &TalkerSet,
    cancel: &CancelToken,
) -> Result<bool> {
    let mut reader = NmeaReader::new(stream);
    let deadline = Instant::now() + timeout;

    loop {
        match reader.next_event(Some(deadline), cancel).await? {
            ReadEvent::Line(line) => {
                if talkers.matches_line(&line) {
                    info!(line = %line, "detected NMEA traffic");
                    return Ok(true);
                }
                debug!(line = %line, "not a GPS sentence");
            }
            ReadEvent::TimedOut => return Ok(false),
            ReadEvent::Closed => {
                debug!("stream closed while probing");
                return Ok(false);
            }
            ReadEvent::Cancelled => return Err(GpsError::Cancelled),
        }
    }
}

/// Open `path`, probe it and close it again. The port is released on every
/// return path.
pub async fn probe_path(path: &str, config: &SessionConfig, cancel: &CancelToken) -> Result<bool> {
    let stream = open_device(path, config.baud_rate)?;
    probe_device(stream, config.probe_timeout, &config.talkers, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const SHORT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_silent_stream_is_not_gps() {
        let (_tx, rx) = tokio::io::duplex(64);
        let found = probe_device(rx, SHORT, &TalkerSet::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_bad_checksum_still_detected() {
        let (mut tx, rx) = tokio::io::duplex(256);
        tx.write_all(b"$GPGGA,...*XX\r\n").await.unwrap();
        let found = probe_device(rx, SHORT, &TalkerSet::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(found);
    }

    #[tokio::test]
    async fn test_noise_before_sentence() {
        let (mut tx, rx) = tokio::io::duplex(256);
        tx.write_all(b"\xff\xfe\x00garbage\r\nAT+OK\r\n$GNRMC,0*00\r\n").await.unwrap();
        let found = probe_device(rx, SHORT, &TalkerSet::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(found);
    }

    #[tokio::test]
    async fn test_unknown_talker_only_times_out() {
        let (mut tx, rx) = tokio::io::duplex(256);
        tx.write_all(b"$BDGSV,1,1,00*68\r\n$PUBX,00*33\r\n").await.unwrap();
        let found = probe_device(rx, SHORT, &TalkerSet::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_closed_stream_is_not_gps() {
        let (tx, rx) = tokio::io::duplex(64);
        drop(tx);
        let found = probe_device(rx, SHORT, &TalkerSet::default(), &CancelToken::new())
            .await
            .unwrap();
        assert!(!found);
    }

    #[tokio::test]
    async fn test_cancelled_probe() {
        let (_tx, rx) = tokio::io::duplex(64);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = probe_device(rx, Duration::from_secs(5), &TalkerSet::default(), &cancel).await;
        assert!(matches!(result, Err(GpsError::Cancelled)));
    }
}
