// src/gps/reader.rs
//! Line reading over an async byte stream, raced against a deadline and
//! cancellation

use crate::{cancel::CancelToken, error::Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    time::{sleep_until, Instant},
};

/// Longest line kept; a stream of binary noise without newlines is cut here.
pub const MAX_LINE_LEN: u64 = 1024;

/// What the next read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Line(String),
    TimedOut,
    Cancelled,
    /// End of stream, e.g. the device was unplugged.
    Closed,
}

pub struct NmeaReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> NmeaReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            reader: BufReader::new(stream),
            buf: Vec::with_capacity(MAX_LINE_LEN as usize),
        }
    }

    /// Wait for the next non-blank line, the deadline, or cancellation,
    /// whichever comes first. Cancellation wins ties.
    pub async fn next_event(
        &mut self,
        deadline: Option<Instant>,
        cancel: &CancelToken,
    ) -> Result<ReadEvent> {
        loop {
            if cancel.is_cancelled() {
                return Ok(ReadEvent::Cancelled);
            }

            self.buf.clear();
            let read = async {
                (&mut self.reader)
                    .take(MAX_LINE_LEN)
                    .read_until(b'\n', &mut self.buf)
                    .await
            };
            let timeout = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(ReadEvent::Cancelled),
                _ = timeout => return Ok(ReadEvent::TimedOut),
                n = read => n?,
            };

            if n == 0 {
                return Ok(ReadEvent::Closed);
            }

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.trim().is_empty() {
                return Ok(ReadEvent::Line(line.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_reads_lines_and_skips_blanks() {
        let (mut tx, rx) = tokio::io::duplex(256);
        tx.write_all(b"$GPGGA,1*00\r\n\r\n\n$GPRMC,2*00\n").await.unwrap();
        drop(tx);

        let cancel = CancelToken::new();
        let mut reader = NmeaReader::new(rx);
        assert_eq!(
            reader.next_event(None, &cancel).await.unwrap(),
            ReadEvent::Line("$GPGGA,1*00".into())
        );
        assert_eq!(
            reader.next_event(None, &cancel).await.unwrap(),
            ReadEvent::Line("$GPRMC,2*00".into())
        );
        assert_eq!(reader.next_event(None, &cancel).await.unwrap(), ReadEvent::Closed);
    }

    #[tokio::test]
    async fn test_deadline_fires_on_silent_stream() {
        let (_tx, rx) = tokio::io::duplex(64);
        let cancel = CancelToken::new();
        let mut reader = NmeaReader::new(rx);
        let deadline = Instant::now() + Duration::from_millis(50);
        assert_eq!(
            reader.next_event(Some(deadline), &cancel).await.unwrap(),
            ReadEvent::TimedOut
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_blocked_read() {
        let (_tx, rx) = tokio::io::duplex(64);
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut reader = NmeaReader::new(rx);
        let event = tokio::time::timeout(Duration::from_secs(1), reader.next_event(None, &cancel))
            .await
            .expect("read should be interrupted");
        assert_eq!(event.unwrap(), ReadEvent::Cancelled);
    }

    #[tokio::test]
    async fn test_binary_noise_is_cut_into_bounded_lines() {
        let (mut tx, rx) = tokio::io::duplex(4096);
        tx.write_all(&[0xffu8; 1500]).await.unwrap();
        tx.write_all(b"\n").await.unwrap();
        drop(tx);

        let cancel = CancelToken::new();
        let mut reader = NmeaReader::new(rx);
        match reader.next_event(None, &cancel).await.unwrap() {
            ReadEvent::Line(line) => assert_eq!(line.chars().count(), MAX_LINE_LEN as usize),
            other => panic!("unexpected {:?}", other),
        }
    }
}
