// src/gps/nmea.rs
//! NMEA field parsing: timestamps, coordinates, satellite groups, and typed
//! views over RMC, GGA and GSV sentences

use super::codec::{Sentence, SentenceType};
use super::data::{Fix, SatelliteRecord, SatelliteView};
use crate::error::{GpsError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::collections::HashMap;
use tracing::debug;

/// GSV fields before the first satellite group: total messages, message
/// number, satellites in view.
const GSV_HEADER_FIELDS: usize = 3;
const GSV_GROUP_FIELDS: usize = 4;
const GSV_GROUPS_PER_MESSAGE: usize = 4;

/// Parse an `HHMMSS[.ss]` time and a `DDMMYY` date into a UTC instant.
///
/// Fractional seconds are ignored. Two-digit years always map to `20YY`.
pub fn parse_timestamp(time: &str, date: &str) -> Result<DateTime<Utc>> {
    if time.len() < 6 {
        return Err(GpsError::invalid(format!("time field {:?} too short", time)));
    }
    if date.len() != 6 {
        return Err(GpsError::invalid(format!("date field {:?} must be DDMMYY", date)));
    }
    let time_digits = two_digit_groups(&time.as_bytes()[..6])
        .ok_or_else(|| GpsError::invalid(format!("time field {:?} is not numeric", time)))?;
    let date_digits = two_digit_groups(date.as_bytes())
        .ok_or_else(|| GpsError::invalid(format!("date field {:?} is not numeric", date)))?;

    let [hour, minute, second] = time_digits;
    let [day, month, year] = date_digits;

    let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| GpsError::invalid(format!("no such date {:?}", date)))?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| GpsError::invalid(format!("no such time {:?}", time)))?;

    Ok(Utc.from_utc_datetime(&NaiveDateTime::new(date, time)))
}

fn two_digit_groups(bytes: &[u8]) -> Option<[u32; 3]> {
    if bytes.len() != 6 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let pair = |i: usize| u32::from(bytes[i] - b'0') * 10 + u32::from(bytes[i + 1] - b'0');
    Some([pair(0), pair(2), pair(4)])
}

/// Parse `DDMM.MMMM` latitude and `DDDMM.MMMM` longitude with their
/// hemisphere letters into signed decimal degrees.
pub fn parse_position(lat: &str, lat_hemi: &str, lon: &str, lon_hemi: &str) -> Result<(f64, f64)> {
    let latitude = parse_coordinate(lat, 90.0)?;
    let longitude = parse_coordinate(lon, 180.0)?;

    let latitude = match lat_hemi {
        "N" => latitude,
        "S" => -latitude,
        other => return Err(GpsError::invalid(format!("latitude hemisphere {:?}", other))),
    };
    let longitude = match lon_hemi {
        "E" => longitude,
        "W" => -longitude,
        other => return Err(GpsError::invalid(format!("longitude hemisphere {:?}", other))),
    };

    Ok((latitude, longitude))
}

fn parse_coordinate(text: &str, limit: f64) -> Result<f64> {
    let value: f64 = text
        .parse()
        .map_err(|_| GpsError::invalid(format!("coordinate {:?} is not a number", text)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(GpsError::invalid(format!("coordinate {:?} out of range", text)));
    }

    let degrees = (value / 100.0).trunc();
    let minutes = value % 100.0;
    if minutes >= 60.0 {
        return Err(GpsError::invalid(format!("coordinate {:?} has {} minutes", text, minutes)));
    }

    let decimal = degrees + minutes / 60.0;
    if decimal > limit {
        return Err(GpsError::invalid(format!("coordinate {:?} exceeds {}°", text, limit)));
    }
    Ok(decimal)
}

/// Format decimal degrees as an NMEA latitude field and hemisphere.
pub fn encode_latitude(degrees: f64) -> (String, char) {
    let hemisphere = if degrees < 0.0 { 'S' } else { 'N' };
    let (d, m) = degrees_minutes(degrees.abs());
    (format!("{:02}{:07.4}", d, m), hemisphere)
}

/// Format decimal degrees as an NMEA longitude field and hemisphere.
pub fn encode_longitude(degrees: f64) -> (String, char) {
    let hemisphere = if degrees < 0.0 { 'W' } else { 'E' };
    let (d, m) = degrees_minutes(degrees.abs());
    (format!("{:03}{:07.4}", d, m), hemisphere)
}

fn degrees_minutes(abs_degrees: f64) -> (u32, f64) {
    let mut d = abs_degrees.trunc() as u32;
    // Round to the printed precision first so 59.99999 does not print as 60.0000.
    let mut m = ((abs_degrees - abs_degrees.trunc()) * 60.0 * 10_000.0).round() / 10_000.0;
    if m >= 60.0 {
        d += 1;
        m -= 60.0;
    }
    (d, m)
}

/// Satellite groups of a GSV message.
///
/// `fields` are the sentence fields after the address, header included.
/// An incomplete trailing group is dropped. When the header is readable it
/// bounds how many groups this message may carry; records with missing or
/// out-of-range values are skipped.
pub fn parse_satellite_batch<S: AsRef<str>>(fields: &[S]) -> Vec<SatelliteRecord> {
    let groups = fields.get(GSV_HEADER_FIELDS..).unwrap_or_default();
    let mut limit = groups.len() / GSV_GROUP_FIELDS;

    if let Some(expected) = expected_groups(fields) {
        limit = limit.min(expected);
    }

    groups
        .chunks_exact(GSV_GROUP_FIELDS)
        .take(limit)
        .filter_map(|group| {
            let record = parse_satellite_group(group);
            if record.is_none() {
                debug!(
                    group = ?group.iter().map(|f| f.as_ref()).collect::<Vec<&str>>(),
                    "skipping satellite group"
                );
            }
            record
        })
        .collect()
}

/// Groups the header says this message should hold.
fn expected_groups<S: AsRef<str>>(fields: &[S]) -> Option<usize> {
    let message_number: usize = fields.get(1)?.as_ref().parse().ok()?;
    let in_view: usize = fields.get(2)?.as_ref().parse().ok()?;
    let before = message_number.checked_sub(1)? * GSV_GROUPS_PER_MESSAGE;
    Some(in_view.saturating_sub(before).min(GSV_GROUPS_PER_MESSAGE))
}

fn parse_satellite_group<S: AsRef<str>>(group: &[S]) -> Option<SatelliteRecord> {
    let prn: u16 = group[0].as_ref().parse().ok()?;
    let elevation_deg: u8 = group[1].as_ref().parse().ok().filter(|e| *e <= 89)?;
    let azimuth_deg: u16 = group[2].as_ref().parse().ok().filter(|a| *a <= 359)?;
    let snr = match group[3].as_ref() {
        "" => None,
        text => Some(text.parse::<u8>().ok().filter(|s| *s <= 99)?),
    };
    Some(SatelliteRecord {
        prn,
        elevation_deg,
        azimuth_deg,
        snr,
    })
}

fn expect_type(sentence: &Sentence, expected: SentenceType, min_fields: usize) -> Result<()> {
    if sentence.sentence_type != expected {
        return Err(GpsError::invalid(format!(
            "expected {} sentence, got {}",
            expected, sentence.sentence_type
        )));
    }
    if sentence.fields.len() < min_fields {
        return Err(GpsError::invalid(format!(
            "{} needs {} fields, got {}",
            expected,
            min_fields,
            sentence.fields.len()
        )));
    }
    Ok(())
}

fn optional<T: std::str::FromStr>(text: Option<&str>) -> Option<T> {
    text.filter(|t| !t.is_empty()).and_then(|t| t.parse().ok())
}

fn optional_position(sentence: &Sentence, first: usize) -> Option<(f64, f64)> {
    let lat = sentence.field(first)?;
    let lat_hemi = sentence.field(first + 1)?;
    let lon = sentence.field(first + 2)?;
    let lon_hemi = sentence.field(first + 3)?;
    if lat.is_empty() || lon.is_empty() {
        return None;
    }
    match parse_position(lat, lat_hemi, lon, lon_hemi) {
        Ok(position) => Some(position),
        Err(e) => {
            debug!(error = %e, "ignoring position");
            None
        }
    }
}

/// RMC status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixStatus {
    Active,
    Void,
}

/// Recommended minimum data.
/// `$--RMC,hhmmss.ss,A|V,ddmm.mmmm,N|S,dddmm.mmmm,E|W,speed,course,ddmmyy,...`
#[derive(Debug, Clone, PartialEq)]
pub struct Rmc {
    pub talker: String,
    pub time: String,
    pub status: FixStatus,
    pub position: Option<(f64, f64)>,
    pub speed_knots: Option<f64>,
    pub course_deg: Option<f64>,
    pub date: String,
}

impl Rmc {
    pub fn from_sentence(sentence: &Sentence) -> Result<Self> {
        expect_type(sentence, SentenceType::Rmc, 9)?;

        let status = match sentence.field(2) {
            Some("A") => FixStatus::Active,
            Some("V") => FixStatus::Void,
            other => return Err(GpsError::invalid(format!("RMC status {:?}", other))),
        };

        Ok(Self {
            talker: sentence.talker.clone(),
            time: sentence.field(1).unwrap_or_default().to_string(),
            status,
            position: optional_position(sentence, 3),
            speed_knots: optional(sentence.field(7)),
            course_deg: optional(sentence.field(8)),
            date: sentence.field(9).unwrap_or_default().to_string(),
        })
    }

    /// Only an `A` status carries usable time; `V` means no data this cycle.
    pub fn is_active(&self) -> bool {
        self.status == FixStatus::Active
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.time, &self.date)
    }
}

/// Fix data.
/// `$--GGA,hhmmss.ss,lat,N|S,lon,E|W,fixQuality,numSat,hdop,alt,M,...`
#[derive(Debug, Clone, PartialEq)]
pub struct Gga {
    pub talker: String,
    pub time: String,
    pub position: Option<(f64, f64)>,
    pub fix_quality: Option<u8>,
    pub satellites_in_use: Option<u8>,
    pub hdop: Option<f64>,
    pub altitude_m: Option<f64>,
}

impl Gga {
    pub fn from_sentence(sentence: &Sentence) -> Result<Self> {
        expect_type(sentence, SentenceType::Gga, 7)?;

        Ok(Self {
            talker: sentence.talker.clone(),
            time: sentence.field(1).unwrap_or_default().to_string(),
            position: optional_position(sentence, 2),
            fix_quality: optional(sentence.field(6)),
            satellites_in_use: optional(sentence.field(7)),
            hdop: optional(sentence.field(8)),
            altitude_m: optional(sentence.field(9)),
        })
    }
}

/// One message of a satellites-in-view batch.
/// `$--GSV,totalMsgs,msgNum,totalSVs,[prn,elev,azim,snr]x(0..4)`
#[derive(Debug, Clone, PartialEq)]
pub struct GsvMessage {
    pub talker: String,
    pub total_messages: u8,
    pub message_number: u8,
    pub satellites_in_view: u8,
    pub satellites: Vec<SatelliteRecord>,
}

impl GsvMessage {
    pub fn from_sentence(sentence: &Sentence) -> Result<Self> {
        expect_type(sentence, SentenceType::Gsv, GSV_HEADER_FIELDS)?;

        let header = |position: usize, name: &str| -> Result<u8> {
            sentence
                .field(position)
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| {
                    GpsError::invalid(format!("GSV {} {:?}", name, sentence.field(position)))
                })
        };
        let total_messages = header(1, "message count")?;
        let message_number = header(2, "message number")?;
        let satellites_in_view = header(3, "satellites in view")?;

        if message_number == 0 || message_number > total_messages {
            return Err(GpsError::invalid(format!(
                "GSV message {} of {}",
                message_number, total_messages
            )));
        }

        Ok(Self {
            talker: sentence.talker.clone(),
            total_messages,
            message_number,
            satellites_in_view,
            satellites: parse_satellite_batch(&sentence.fields),
        })
    }
}

#[derive(Debug)]
struct PendingBatch {
    total_messages: u8,
    satellites_in_view: u8,
    next_message: u8,
    satellites: Vec<SatelliteRecord>,
}

/// Joins GSV messages `1..=M` into a [`SatelliteView`], one batch per talker.
///
/// Every message of a batch must carry the same message count and in-view
/// total and arrive in order; anything else drops the batch.
#[derive(Debug, Default)]
pub struct GsvAssembler {
    pending: HashMap<String, PendingBatch>,
}

impl GsvAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: GsvMessage) -> Result<Option<SatelliteView>> {
        let talker = message.talker.clone();

        if message.message_number == 1 {
            self.pending.insert(
                talker.clone(),
                PendingBatch {
                    total_messages: message.total_messages,
                    satellites_in_view: message.satellites_in_view,
                    next_message: 1,
                    satellites: Vec::new(),
                },
            );
        }

        let Some(batch) = self.pending.get_mut(&talker) else {
            return Err(GpsError::invalid(format!(
                "GSV message {} of {} without a first message",
                message.message_number, message.total_messages
            )));
        };

        if batch.next_message != message.message_number
            || batch.total_messages != message.total_messages
            || batch.satellites_in_view != message.satellites_in_view
        {
            let expected = (batch.next_message, batch.total_messages, batch.satellites_in_view);
            self.pending.remove(&talker);
            return Err(GpsError::invalid(format!(
                "GSV batch inconsistent: expected message {} of {} with {} in view, \
                 got {} of {} with {}",
                expected.0,
                expected.1,
                expected.2,
                message.message_number,
                message.total_messages,
                message.satellites_in_view
            )));
        }

        batch.satellites.extend(message.satellites);

        if message.message_number < message.total_messages {
            // Below `total_messages`, so this cannot pass u8::MAX.
            batch.next_message = message.message_number + 1;
            return Ok(None);
        }

        let batch = self.pending.remove(&talker).map(|b| SatelliteView {
            talker,
            satellites_in_view: b.satellites_in_view,
            satellites: b.satellites,
        });
        Ok(batch)
    }
}

impl Fix {
    /// Fix from an RMC sentence; `None` when the receiver reports void data.
    pub fn from_rmc(rmc: &Rmc) -> Result<Option<Self>> {
        if !rmc.is_active() {
            return Ok(None);
        }
        let timestamp = rmc.timestamp()?;
        Ok(Some(Self {
            timestamp,
            position_valid: rmc.position.is_some(),
            latitude: rmc.position.map(|(lat, _)| lat),
            longitude: rmc.position.map(|(_, lon)| lon),
            satellites_in_use: None,
        }))
    }

    /// Complete the fix with satellites in use, and position if RMC lacked it.
    pub fn with_gga(mut self, gga: &Gga) -> Self {
        self.satellites_in_use = gga.satellites_in_use.or(self.satellites_in_use);
        if !self.position_valid {
            if let Some((lat, lon)) = gga.position {
                self.latitude = Some(lat);
                self.longitude = Some(lon);
                self.position_valid = gga.fix_quality.map_or(false, |q| q > 0);
            }
        }
        self
    }
}
