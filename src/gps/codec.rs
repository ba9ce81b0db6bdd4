// src/gps/codec.rs
//! NMEA-0183 sentence framing and checksums
//!
//! Wire format: `$<talker><type>,<field>,...*<CS>\r\n` where `CS` is the
//! XOR of every byte between `$` and `*`, as two hex digits.

use crate::error::{GpsError, Result};
use std::fmt;

/// Talker IDs recognized when none are configured.
pub const DEFAULT_TALKERS: [&str; 4] = ["GP", "GN", "GL", "GA"];

/// Sentence types this crate interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceType {
    Rmc,
    Gga,
    Gsv,
    Other(String),
}

impl SentenceType {
    fn from_code(code: &str) -> Self {
        match code {
            "RMC" => SentenceType::Rmc,
            "GGA" => SentenceType::Gga,
            "GSV" => SentenceType::Gsv,
            other => SentenceType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            SentenceType::Rmc => "RMC",
            SentenceType::Gga => "GGA",
            SentenceType::Gsv => "GSV",
            SentenceType::Other(code) => code,
        }
    }
}

impl fmt::Display for SentenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A framed sentence. Fields are everything after the address field.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub talker: String,
    pub sentence_type: SentenceType,
    pub fields: Vec<String>,
    pub checksum: u8,
    pub checksum_valid: bool,
}

impl Sentence {
    /// Field by its NMEA position, where the address field is position 0.
    pub fn field(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
    }

    /// Text between `$` and `*`.
    pub fn body(&self) -> String {
        let mut body = format!("{}{}", self.talker, self.sentence_type);
        for field in &self.fields {
            body.push(',');
            body.push_str(field);
        }
        body
    }
}

/// Read-only set of talker IDs accepted as GPS traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkerSet {
    ids: Vec<String>,
}

impl TalkerSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, talker: &str) -> bool {
        self.ids.iter().any(|id| id == talker)
    }

    /// Liveness check used when probing: `$`, a known talker, then a
    /// three-letter type. The checksum is not looked at.
    pub fn matches_line(&self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix('$') else {
            return false;
        };
        if rest.len() < 5 || !rest.is_char_boundary(2) || !rest.is_char_boundary(5) {
            return false;
        }
        self.contains(&rest[..2]) && rest[2..5].bytes().all(|b| b.is_ascii_alphabetic())
    }
}

impl Default for TalkerSet {
    fn default() -> Self {
        Self::new(DEFAULT_TALKERS)
    }
}

/// XOR of every byte in `body`.
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Frame `body` as a complete sentence including the trailing CRLF.
pub fn encode(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, checksum(body))
}

/// Parse a line into a [`Sentence`].
///
/// Shape problems are reported as [`GpsError::MalformedSentence`]; a bad
/// checksum is not an error and only clears `checksum_valid`.
pub fn decode(line: &str) -> Result<Sentence> {
    let line = line.trim_end_matches(['\r', '\n']);

    let rest = line
        .strip_prefix('$')
        .ok_or_else(|| GpsError::malformed("missing leading '$'"))?;
    let (body, cs_text) = rest
        .split_once('*')
        .ok_or_else(|| GpsError::malformed("missing '*' checksum delimiter"))?;

    if cs_text.len() != 2 || !cs_text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GpsError::malformed(format!(
            "checksum must be two hex digits, got {:?}",
            cs_text
        )));
    }
    let expected = u8::from_str_radix(cs_text, 16)
        .map_err(|e| GpsError::malformed(format!("checksum {:?}: {}", cs_text, e)))?;

    let mut parts = body.split(',');
    let address = parts.next().unwrap_or_default();
    if address.len() < 5 || !address.is_ascii() {
        return Err(GpsError::malformed(format!(
            "address field {:?} too short",
            address
        )));
    }

    Ok(Sentence {
        talker: address[..2].to_string(),
        sentence_type: SentenceType::from_code(&address[2..5]),
        fields: parts.map(str::to_string).collect(),
        checksum: expected,
        checksum_valid: checksum(body) == expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    #[test]
    fn test_checksum_known_sentence() {
        let body = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        assert_eq!(checksum(body), 0x6A);
        assert_eq!(checksum(""), 0);
    }

    #[test]
    fn test_encode_format() {
        assert_eq!(
            encode("GNTXT,01,01,02,upcounting timer is at 1"),
            "$GNTXT,01,01,02,upcounting timer is at 1*0C\r\n"
        );
    }

    #[test]
    fn test_decode_known_sentence() {
        let sentence = decode(RMC).unwrap();
        assert_eq!(sentence.talker, "GP");
        assert_eq!(sentence.sentence_type, SentenceType::Rmc);
        assert_eq!(sentence.checksum, 0x6A);
        assert!(sentence.checksum_valid);
        assert_eq!(sentence.field(1), Some("123519"));
        assert_eq!(sentence.field(2), Some("A"));
        assert_eq!(sentence.field(9), Some("230394"));
        assert_eq!(sentence.field(0), None);
        assert_eq!(sentence.fields.len(), 11);
    }

    #[test]
    fn test_encoded_bodies_decode_valid() {
        let bodies = [
            "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,",
            "GNRMC,000000.00,V,,,,,,,010100,,,N",
            "GLGSV,1,1,00",
            "GAXYZ",
        ];
        for body in bodies {
            let sentence = decode(&encode(body)).unwrap();
            assert!(sentence.checksum_valid, "{}", body);
            assert_eq!(sentence.body(), body);
        }
    }

    #[test]
    fn test_bad_checksum_is_flagged_not_rejected() {
        let sentence = decode("$GPGGA,123519,4807.038,N*00").unwrap();
        assert_eq!(sentence.sentence_type, SentenceType::Gga);
        assert!(!sentence.checksum_valid);
    }

    #[test]
    fn test_lowercase_checksum_accepted() {
        let line = RMC.replace("*6A", "*6a");
        assert!(decode(&line).unwrap().checksum_valid);
    }

    #[test]
    fn test_malformed_lines() {
        let lines = [
            "",
            "GPRMC,123519,A*6A",
            "\u{0}\u{ff}garbage",
            "$GPRMC,123519,A",
            "$GPRMC,123519,A*6",
            "$GPRMC,123519,A*6AB",
            "$GPRMC,123519,A*ZZ",
            "$GPR,1*00",
            " $GPRMC,123519,A*6A",
        ];
        for line in lines {
            match decode(line) {
                Err(GpsError::MalformedSentence(_)) => {}
                other => panic!("{:?} should be malformed, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_other_sentence_type() {
        let sentence = decode(&encode("GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1")).unwrap();
        assert_eq!(sentence.sentence_type, SentenceType::Other("GSA".to_string()));
    }

    #[test]
    fn test_talker_set_matches_line() {
        let talkers = TalkerSet::default();
        assert!(talkers.matches_line("$GPGGA,...*XX"));
        assert!(talkers.matches_line("$GNRMC"));
        assert!(talkers.matches_line("$GAGSV,1,1,00*7B"));
        assert!(!talkers.matches_line("$BDGSV,1,1,00"));
        assert!(!talkers.matches_line("GPGGA,123"));
        assert!(!talkers.matches_line("$GP"));
        assert!(!talkers.matches_line("$GP1,2,3"));

        let only_gn = TalkerSet::new(["GN"]);
        assert!(!only_gn.matches_line("$GPGGA,1"));
        assert!(only_gn.matches_line("$GNGGA,1"));
    }
}
