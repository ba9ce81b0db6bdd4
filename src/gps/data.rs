// src/gps/data.rs
//! GPS data structures derived from parsed sentences

use chrono::{DateTime, Utc};

/// One satellite entry from a GSV message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatelliteRecord {
    pub prn: u16,
    pub elevation_deg: u8,  // 0..=89
    pub azimuth_deg: u16,   // 0..=359
    pub snr: Option<u8>,    // dB-Hz, None when not tracked
}

impl SatelliteRecord {
    pub fn constellation(&self) -> &'static str {
        match self.prn {
            1..=32 => "GPS",
            33..=64 => "SBAS",
            65..=96 => "GLONASS",
            120..=163 => "BEIDOU",
            193..=197 => "QZSS",
            211..=246 => "GALILEO",
            _ => "UNKNOWN",
        }
    }

    pub fn signal_strength_description(&self) -> &'static str {
        match self.snr {
            Some(snr) if snr >= 40 => "Excellent",
            Some(snr) if snr >= 35 => "Good",
            Some(snr) if snr >= 25 => "Fair",
            Some(snr) if snr >= 15 => "Poor",
            Some(_) => "Very Poor",
            None => "Not tracked",
        }
    }
}

/// A complete satellites-in-view report assembled from every message of a
/// GSV batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteView {
    pub talker: String,
    pub satellites_in_view: u8,
    pub satellites: Vec<SatelliteRecord>,
}

impl SatelliteView {
    pub fn tracked(&self) -> usize {
        self.satellites.iter().filter(|sat| sat.snr.is_some()).count()
    }
}

/// Time and position from an active RMC, optionally completed by GGA.
///
/// Built per sentence and consumed straight away; nothing keeps fixes around.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    pub timestamp: DateTime<Utc>,
    pub position_valid: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub satellites_in_use: Option<u8>,
}

impl Fix {
    pub fn has_position(&self) -> bool {
        self.position_valid && self.latitude.is_some() && self.longitude.is_some()
    }

    /// Format coordinate for display
    pub fn format_coordinate(coord: Option<f64>) -> String {
        match coord {
            Some(val) => format!("{:>12.6}°", val),
            None => "No fix".to_string(),
        }
    }

    /// Format value with unit for display
    pub fn format_value<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
        match value {
            Some(val) => format!("{:>12} {}", val, unit),
            None => "Unknown".to_string(),
        }
    }
}

/// Human-readable GGA fix quality.
pub fn fix_quality_description(quality: u8) -> String {
    match quality {
        0 => "No fix".to_string(),
        1 => "GPS".to_string(),
        2 => "DGPS".to_string(),
        3 => "PPS".to_string(),
        4 => "RTK".to_string(),
        5 => "Float RTK".to_string(),
        6 => "Estimated".to_string(),
        7 => "Manual".to_string(),
        8 => "Simulation".to_string(),
        _ => format!("Unknown ({})", quality),
    }
}
