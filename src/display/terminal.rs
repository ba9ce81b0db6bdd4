// src/display/terminal.rs
//! Terminal-based display implementation

use super::MonitorDisplay;
use crate::{
    error::Result,
    gps::{
        data::{fix_quality_description, Fix},
        Gga, SatelliteView,
    },
    monitor::MonitorEvent,
};
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Stdout, Write};

/// Prints one colored block per event, scrolling like a log.
pub struct TerminalDisplay<W: Write = Stdout> {
    out: W,
}

impl TerminalDisplay<Stdout> {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for TerminalDisplay<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn label(&mut self, color: Color, text: &str) -> Result<()> {
        queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)?;
        Ok(())
    }

    fn render_time(&mut self, talker: &str, fix: &Fix) -> Result<()> {
        self.label(Color::Green, "TIME ")?;
        queue!(
            self.out,
            Print(format!(
                "[{}] {}\n",
                talker,
                fix.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ))
        )?;
        if fix.has_position() {
            queue!(
                self.out,
                Print(format!(
                    "     Latitude: {}  Longitude: {}\n",
                    Fix::format_coordinate(fix.latitude).trim(),
                    Fix::format_coordinate(fix.longitude).trim()
                ))
            )?;
        }
        Ok(())
    }

    fn render_position(&mut self, talker: &str, gga: &Gga) -> Result<()> {
        self.label(Color::Yellow, "POSITION ")?;
        let (lat, lon) = match gga.position {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        queue!(
            self.out,
            Print(format!(
                "[{}] Latitude: {}  Longitude: {}  Satellites: {}\n",
                talker,
                Fix::format_coordinate(lat).trim(),
                Fix::format_coordinate(lon).trim(),
                Fix::format_value(gga.satellites_in_use, "").trim()
            ))
        )?;
        let quality = gga
            .fix_quality
            .map(fix_quality_description)
            .unwrap_or_else(|| "Unknown".to_string());
        queue!(
            self.out,
            Print(format!(
                "     Fix: {}  HDOP: {}  Altitude: {}\n",
                quality,
                Fix::format_value(gga.hdop, "").trim(),
                Fix::format_value(gga.altitude_m, "m").trim()
            ))
        )?;
        Ok(())
    }

    fn render_sky(&mut self, view: &SatelliteView) -> Result<()> {
        self.label(Color::Magenta, "SKY ")?;
        queue!(
            self.out,
            Print(format!(
                "[{}] {} in view, {} tracked\n",
                view.talker,
                view.satellites_in_view,
                view.tracked()
            ))
        )?;
        for sat in &view.satellites {
            let snr = sat
                .snr
                .map(|s| format!("{:>2} dB", s))
                .unwrap_or_else(|| "   --".to_string());
            queue!(
                self.out,
                Print(format!(
                    "     PRN {:>3} {:<8} el {:>2}° az {:>3}° {} {}\n",
                    sat.prn,
                    sat.constellation(),
                    sat.elevation_deg,
                    sat.azimuth_deg,
                    snr,
                    sat.signal_strength_description()
                ))
            )?;
        }
        Ok(())
    }
}

impl<W: Write> MonitorDisplay for TerminalDisplay<W> {
    fn show(&mut self, event: &MonitorEvent) -> Result<()> {
        match event {
            MonitorEvent::Time { talker, fix } => self.render_time(talker, fix)?,
            MonitorEvent::Position { talker, gga } => self.render_position(talker, gga)?,
            MonitorEvent::SatellitesInView { talker, message } => {
                self.label(Color::Cyan, "GSV ")?;
                queue!(
                    self.out,
                    Print(format!(
                        "[{}] message {}/{}, satellites in view: {}\n",
                        talker,
                        message.message_number,
                        message.total_messages,
                        message.satellites_in_view
                    ))
                )?;
            }
            MonitorEvent::SkyView(view) => self.render_sky(view)?,
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{codec::decode, Gga, SatelliteRecord};
    use chrono::{TimeZone, Utc};

    fn rendered(events: &[MonitorEvent]) -> String {
        let mut display = TerminalDisplay::with_writer(Vec::new());
        for event in events {
            display.show(event).unwrap();
        }
        String::from_utf8(display.into_inner()).unwrap()
    }

    #[test]
    fn test_time_and_position_rendering() {
        let fix = Fix {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 23, 12, 35, 19).unwrap(),
            position_valid: true,
            latitude: Some(48.1173),
            longitude: Some(11.516667),
            satellites_in_use: None,
        };
        let gga = Gga::from_sentence(
            &decode("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47").unwrap(),
        )
        .unwrap();

        let text = rendered(&[
            MonitorEvent::Time { talker: "GP".into(), fix },
            MonitorEvent::Position { talker: "GP".into(), gga },
        ]);
        assert!(text.contains("2024-03-23 12:35:19 UTC"));
        assert!(text.contains("48.117300°"));
        assert!(text.contains("Satellites: 8"));
        assert!(text.contains("Fix: GPS"));
        assert!(text.contains("Altitude: 545.4 m"));
    }

    #[test]
    fn test_sky_view_rendering() {
        let view = SatelliteView {
            talker: "GP".into(),
            satellites_in_view: 2,
            satellites: vec![
                SatelliteRecord { prn: 7, elevation_deg: 45, azimuth_deg: 120, snr: Some(33) },
                SatelliteRecord { prn: 70, elevation_deg: 5, azimuth_deg: 300, snr: None },
            ],
        };
        let text = rendered(&[MonitorEvent::SkyView(view)]);
        assert!(text.contains("2 in view, 1 tracked"));
        assert!(text.contains("PRN   7"));
        assert!(text.contains("--"));
    }
}
