// src/gps/mod.rs
//! NMEA protocol layer: framing, field parsing and stream reading

pub mod codec;
pub mod data;
pub mod nmea;
pub mod reader;
pub mod simulator;

pub use codec::{decode, encode, Sentence, SentenceType, TalkerSet};
pub use data::{Fix, SatelliteRecord, SatelliteView};
pub use nmea::{GsvAssembler, GsvMessage, Gga, Rmc};
pub use reader::{NmeaReader, ReadEvent};
