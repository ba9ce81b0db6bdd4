// src/monitor.rs
//! Continuous display of live GPS traffic

use crate::{
    cancel::CancelToken,
    config::SessionConfig,
    display::MonitorDisplay,
    error::{GpsError, Result},
    gps::{
        codec, Fix, Gga, GsvAssembler, GsvMessage, NmeaReader, ReadEvent, Rmc, SatelliteView,
        Sentence, SentenceType,
    },
};
use std::{collections::HashMap, io};
use tokio::io::AsyncRead;
use tracing::{debug, trace};

/// Something worth showing, derived from one sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Active RMC: time, date and position when present.
    Time { talker: String, fix: Fix },
    /// GGA: position and satellites in use.
    Position { talker: String, gga: Gga },
    /// One GSV message.
    SatellitesInView { talker: String, message: GsvMessage },
    /// All messages of a GSV batch arrived.
    SkyView(SatelliteView),
}

/// What the monitor remembers between sentences, per talker.
#[derive(Debug, Default)]
pub struct MonitorState {
    assembler: GsvAssembler,
    last_gga: HashMap<String, Gga>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Turn one decoded sentence into display events.
///
/// Void RMC and unsupported types give nothing. An RMC is completed with the
/// talker's last GGA when both carry the same UTC time. Every GSV message is
/// shown even when it cannot join a batch. Field problems are errors for the
/// caller to log and skip.
pub fn dispatch_sentence(
    sentence: &Sentence,
    state: &mut MonitorState,
) -> Result<Vec<MonitorEvent>> {
    let talker = sentence.talker.clone();
    match sentence.sentence_type {
        SentenceType::Rmc => {
            let rmc = Rmc::from_sentence(sentence)?;
            let Some(fix) = Fix::from_rmc(&rmc)? else {
                return Ok(Vec::new());
            };
            let fix = match state.last_gga.get(&talker) {
                Some(gga) if gga.time == rmc.time => fix.with_gga(gga),
                _ => fix,
            };
            Ok(vec![MonitorEvent::Time { talker, fix }])
        }
        SentenceType::Gga => {
            let gga = Gga::from_sentence(sentence)?;
            state.last_gga.insert(talker.clone(), gga.clone());
            Ok(vec![MonitorEvent::Position { talker, gga }])
        }
        SentenceType::Gsv => {
            let message = GsvMessage::from_sentence(sentence)?;
            let mut events = vec![MonitorEvent::SatellitesInView {
                talker,
                message: message.clone(),
            }];
            match state.assembler.push(message) {
                Ok(Some(view)) => events.push(MonitorEvent::SkyView(view)),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "GSV message left out of sky view"),
            }
            Ok(events)
        }
        SentenceType::Other(_) => Ok(Vec::new()),
    }
}

/// Show every structurally valid sentence from `stream` until cancelled.
///
/// Checksums are not required; display is best effort. Decode and parse
/// failures are skipped. Only cancellation ([`GpsError::Cancelled`]), an
/// I/O failure (a closed stream counts as one) or a display error end the
/// loop, so this never returns `Ok`.
pub async fn monitor<R, D>(
    stream: R,
    display: &mut D,
    config: &SessionConfig,
    cancel: &CancelToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    D: MonitorDisplay + ?Sized,
{
    let mut reader = NmeaReader::new(stream);
    let mut state = MonitorState::new();

    loop {
        let line = match reader.next_event(None, cancel).await? {
            ReadEvent::Line(line) => line,
            ReadEvent::Cancelled => return Err(GpsError::Cancelled),
            ReadEvent::Closed => {
                return Err(GpsError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device stream closed",
                )))
            }
            ReadEvent::TimedOut => continue,
        };

        let events = codec::decode(&line).and_then(|sentence| {
            if !sentence.checksum_valid {
                trace!(line = %line, "checksum mismatch, displaying anyway");
            }
            dispatch_sentence(&sentence, &mut state)
        });

        match events {
            Ok(events) => {
                for event in &events {
                    display.show(event)?;
                }
            }
            Err(e) if e.is_recoverable() => {
                if config.debug {
                    debug!(error = %e, line = %line, "skipping line");
                }
            }
            Err(e) => return Err(e),
        }
    }
}
