// src/sync.rs
//! One-shot clock synchronization from the first active RMC sentence

use crate::{
    cancel::CancelToken,
    config::SessionConfig,
    error::{GpsError, Result},
    gps::{codec, Rmc, NmeaReader, ReadEvent, SentenceType},
    system::ClockSetter,
};
use chrono::{DateTime, Utc};
use std::io;
use tokio::{io::AsyncRead, time::Instant};
use tracing::{debug, info, trace};

/// Where a sync run is. Terminal states are `Done`, `TimedOut`,
/// `Cancelled` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Reading,
    Applying,
    Skipping,
    Done,
    TimedOut,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    UnknownTalker,
    NotRmc,
    /// RMC with status `V`.
    Void,
    BadRmc,
    BadTimestamp,
}

/// Result of feeding one line to the sync policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Applied(DateTime<Utc>),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub time: DateTime<Utc>,
    pub state: SyncState,
    pub lines_read: usize,
    pub lines_skipped: usize,
}

/// Apply the sync policy to one line.
///
/// Per-line problems come back as `Ok(LineAction::Skipped)`; only a clock
/// failure is an error. The clock is called at most once per line and only
/// for an active RMC with a valid time and date.
pub fn handle_sync_line<C: ClockSetter + ?Sized>(
    line: &str,
    clock: &mut C,
    config: &SessionConfig,
) -> Result<LineAction> {
    let skip = |reason: SkipReason, detail: &dyn std::fmt::Display| -> Result<LineAction> {
        if config.debug {
            debug!(?reason, %detail, line, "skipping line");
        } else {
            trace!(?reason, %detail, line, "skipping line");
        }
        Ok(LineAction::Skipped(reason))
    };

    let sentence = match codec::decode(line) {
        Ok(sentence) => sentence,
        Err(e) => return skip(SkipReason::Malformed, &e),
    };
    if !config.talkers.contains(&sentence.talker) {
        return skip(SkipReason::UnknownTalker, &sentence.talker);
    }
    if sentence.sentence_type != SentenceType::Rmc {
        return skip(SkipReason::NotRmc, &sentence.sentence_type);
    }

    let rmc = match Rmc::from_sentence(&sentence) {
        Ok(rmc) => rmc,
        Err(e) => return skip(SkipReason::BadRmc, &e),
    };
    if !rmc.is_active() {
        return skip(SkipReason::Void, &"status V");
    }

    let time = match rmc.timestamp() {
        Ok(time) => time,
        Err(e) => return skip(SkipReason::BadTimestamp, &e),
    };

    if !sentence.checksum_valid {
        // Acted on anyway; RMC checksums are advisory here.
        debug!(line, "applying RMC with bad checksum");
    }

    clock.set_time(time)?;
    Ok(LineAction::Applied(time))
}

/// Read `stream` until an active RMC sets the clock, the sync timeout runs
/// out ([`GpsError::NoValidData`]) or `cancel` fires ([`GpsError::Cancelled`]).
///
/// Malformed or unusable lines only delay success. A closed stream is an
/// I/O error.
pub async fn sync_once<R, C>(
    stream: R,
    clock: &mut C,
    config: &SessionConfig,
    cancel: &CancelToken,
) -> Result<SyncOutcome>
where
    R: AsyncRead + Unpin,
    C: ClockSetter + ?Sized,
{
    let mut reader = NmeaReader::new(stream);
    let deadline = Instant::now() + config.sync_timeout;
    let mut state = SyncState::Idle;
    let mut lines_read = 0;
    let mut lines_skipped = 0;

    loop {
        transition(&mut state, SyncState::Reading);

        let line = match reader.next_event(Some(deadline), cancel).await {
            Ok(ReadEvent::Line(line)) => line,
            Ok(ReadEvent::TimedOut) => {
                transition(&mut state, SyncState::TimedOut);
                return Err(GpsError::NoValidData);
            }
            Ok(ReadEvent::Cancelled) => {
                transition(&mut state, SyncState::Cancelled);
                return Err(GpsError::Cancelled);
            }
            Ok(ReadEvent::Closed) => {
                transition(&mut state, SyncState::Failed);
                return Err(GpsError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device stream closed",
                )));
            }
            Err(e) => {
                transition(&mut state, SyncState::Failed);
                return Err(e);
            }
        };
        lines_read += 1;

        match handle_sync_line(&line, &mut *clock, config) {
            Ok(LineAction::Applied(time)) => {
                transition(&mut state, SyncState::Applying);
                transition(&mut state, SyncState::Done);
                info!(time = %time.to_rfc3339(), "time synchronized");
                return Ok(SyncOutcome {
                    time,
                    state,
                    lines_read,
                    lines_skipped,
                });
            }
            Ok(LineAction::Skipped(_)) => {
                lines_skipped += 1;
                transition(&mut state, SyncState::Skipping);
            }
            Err(e) => {
                transition(&mut state, SyncState::Failed);
                return Err(e);
            }
        }
    }
}

fn transition(state: &mut SyncState, next: SyncState) {
    if *state != next {
        debug!(from = ?*state, to = ?next, "sync state");
        *state = next;
    }
}
