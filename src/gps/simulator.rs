// src/gps/simulator.rs
//! Simulated GPS receiver emitting RMC, GGA and GSV sentences once a second

use super::codec::{encode, DEFAULT_TALKERS};
use super::nmea::{encode_latitude, encode_longitude};
use crate::{
    cancel::CancelToken,
    error::{GpsError, Result},
};
use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

const MAX_SATELLITES_IN_USE: u8 = 12;
const MAX_IN_VIEW: usize = 20;
const WRITE_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub talker: String,
    pub satellites_in_use: u8,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees per second along `bearing_deg`; zero keeps the receiver still.
    pub speed_deg_per_sec: f64,
    pub bearing_deg: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            talker: "GP".to_string(),
            satellites_in_use: 7,
            latitude: 51.1173,
            longitude: -2.5166,
            speed_deg_per_sec: 0.0,
            bearing_deg: 0.0,
        }
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    position: (f64, f64),
}

impl Simulator {
    pub fn new(mut config: SimulatorConfig) -> Result<Self> {
        config.talker = config.talker.to_ascii_uppercase();
        if !DEFAULT_TALKERS.contains(&config.talker.as_str()) {
            return Err(GpsError::Config(format!(
                "invalid talker ID {:?}, expected one of {:?}",
                config.talker, DEFAULT_TALKERS
            )));
        }
        if config.satellites_in_use > MAX_SATELLITES_IN_USE {
            warn!(
                requested = config.satellites_in_use,
                "satellites in use above {}, clamping", MAX_SATELLITES_IN_USE
            );
            config.satellites_in_use = MAX_SATELLITES_IN_USE;
        }
        let position = (config.latitude, config.longitude);
        Ok(Self { config, position })
    }

    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Move along the configured bearing for `elapsed` (great-circle step).
    pub fn advance(&mut self, elapsed: Duration) {
        if self.config.speed_deg_per_sec == 0.0 {
            return;
        }
        let angular = (self.config.speed_deg_per_sec * elapsed.as_secs_f64()).to_radians();
        let bearing = self.config.bearing_deg.to_radians();
        let lat1 = self.position.0.to_radians();
        let lon1 = self.position.1.to_radians();

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        self.position = (lat2.to_degrees(), lon2.to_degrees());
    }

    /// One cadence of framed sentences for `now`: RMC, GGA, then GSV 1..=M.
    pub fn sentences<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> Vec<String> {
        let talker = &self.config.talker;
        let time = now.format("%H%M%S.00");
        let date = now.format("%d%m%y");
        let (lat, ns) = encode_latitude(self.position.0);
        let (lon, ew) = encode_longitude(self.position.1);

        let mut sentences = Vec::new();
        sentences.push(encode(&format!(
            "{talker}RMC,{time},A,{lat},{ns},{lon},{ew},0.1,0.0,{date},,,A"
        )));

        let hdop = 1.0 + rng.gen::<f64>();
        let altitude = 123.4 + (rng.gen::<f64>() - 0.5) * 10.0;
        sentences.push(encode(&format!(
            "{talker}GGA,{time},{lat},{ns},{lon},{ew},1,{:02},{:.1},{:.1},M,0.0,M,,0000",
            self.config.satellites_in_use, hdop, altitude
        )));

        sentences.extend(self.gsv_sentences(rng));
        sentences
    }

    fn gsv_sentences<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        let talker = &self.config.talker;
        let gps: Vec<u16> = (1..=32).collect();
        let glonass: Vec<u16> = (65..=96).collect();
        let mut prns = match talker.as_str() {
            "GN" => [gps, glonass].concat(),
            "GL" => glonass,
            "GA" => (211..=246).collect(),
            _ => gps,
        };
        prns.shuffle(rng);

        let in_use = usize::from(self.config.satellites_in_use);
        let in_view = (in_use + rng.gen_range(0..5)).min(MAX_IN_VIEW);
        let selected = &prns[..in_view];
        let total_messages = in_view.div_ceil(4).max(1);

        (0..total_messages)
            .map(|i| {
                let mut body = format!("{talker}GSV,{},{},{:02}", total_messages, i + 1, in_view);
                for prn in selected.iter().skip(i * 4).take(4) {
                    body.push_str(&format!(
                        ",{:02},{:02},{:03},{:02}",
                        prn,
                        rng.gen_range(0..90),
                        rng.gen_range(0..360),
                        rng.gen_range(20..70)
                    ));
                }
                encode(&body)
            })
            .collect()
    }

    /// Write a batch every second until cancelled. A failed write is retried
    /// a few times before giving up.
    pub async fn run<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut last = tokio::time::Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let now = tokio::time::Instant::now();
            self.advance(now - last);
            last = now;

            let batch = self.sentences(Utc::now(), &mut rand::thread_rng());
            for sentence in batch {
                write_with_retry(writer, sentence.as_bytes(), cancel).await?;
                debug!(sentence = sentence.trim_end(), "sent");
            }
        }
    }
}

async fn write_with_retry<W: AsyncWrite + Unpin>(
    writer: &mut W,
    bytes: &[u8],
    cancel: &CancelToken,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        let result = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < WRITE_RETRIES => {
                warn!(attempt, max = WRITE_RETRIES, error = %e, "error writing NMEA sentence");
                attempt += 1;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(GpsError::Cancelled),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
            Err(e) => return Err(GpsError::Io(e)),
        }
    }
}
