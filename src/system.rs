// src/system.rs
//! Setting the host clock through platform utilities

use crate::error::{GpsError, Result};
use chrono::{DateTime, Utc};
use std::process::Command;
use tracing::{debug, info};

/// Something that can set the clock to a UTC instant.
pub trait ClockSetter {
    fn set_time(&mut self, time: DateTime<Utc>) -> Result<()>;
}

impl<F: FnMut(DateTime<Utc>) -> Result<()>> ClockSetter for F {
    fn set_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        self(time)
    }
}

/// Fails with [`GpsError::UnsupportedOs`] on platforms without a known way
/// to set the clock.
pub fn ensure_supported_platform() -> Result<()> {
    if cfg!(any(
        windows,
        target_os = "linux",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        Ok(())
    } else {
        Err(GpsError::UnsupportedOs(std::env::consts::OS.to_string()))
    }
}

/// Fails with [`GpsError::PermissionDenied`] unless the effective user is
/// root. Windows is left to the clock command itself.
pub fn ensure_root() -> Result<()> {
    #[cfg(unix)]
    {
        let output = Command::new("id")
            .arg("-u")
            .output()
            .map_err(|e| GpsError::PermissionDenied(format!("cannot run id: {}", e)))?;
        check_effective_uid(&String::from_utf8_lossy(&output.stdout))?;
    }
    Ok(())
}

#[cfg_attr(not(unix), allow(dead_code))]
fn check_effective_uid(id_output: &str) -> Result<()> {
    match id_output.trim() {
        "0" => Ok(()),
        uid => Err(GpsError::PermissionDenied(format!(
            "setting the clock needs root (effective uid {}); use --dry-run or --no-root",
            if uid.is_empty() { "unknown" } else { uid }
        ))),
    }
}

/// Sets the real system clock. Needs root or administrator rights.
#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockSetter for SystemClock {
    fn set_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        ensure_supported_platform()?;

        #[cfg(windows)]
        {
            // `time` and `date` are cmd.exe builtins and take local time.
            let local = time.with_timezone(&chrono::Local);
            run("cmd", &["/C", "time", &local.format("%H:%M:%S").to_string()])?;
            run("cmd", &["/C", "date", &local.format("%m/%d/%Y").to_string()])?;
        }

        #[cfg(not(windows))]
        {
            run("date", &["-u", "-s", &time.format("%Y-%m-%d %H:%M:%S").to_string()])?;
        }

        info!(time = %time.to_rfc3339(), "system time updated");
        Ok(())
    }
}

fn run(program: &str, args: &[&str]) -> Result<()> {
    debug!(program, ?args, "running clock command");
    let output = Command::new(program)
        .args(args)
        .env("TZ", "UTC")
        .output()
        .map_err(|e| GpsError::SystemTimeUpdate(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        return Err(GpsError::SystemTimeUpdate(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Logs the instant instead of touching the clock.
#[derive(Debug, Default)]
pub struct DryRunClock {
    pub last: Option<DateTime<Utc>>,
}

impl ClockSetter for DryRunClock {
    fn set_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        info!(time = %time.to_rfc3339(), "dry run, system time left unchanged");
        self.last = Some(time);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dry_run_records_time() {
        let mut clock = DryRunClock::default();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap();
        clock.set_time(t).unwrap();
        assert_eq!(clock.last, Some(t));
    }

    #[test]
    fn test_closure_is_a_clock() {
        let mut seen = Vec::new();
        let mut clock = |t: DateTime<Utc>| -> Result<()> {
            seen.push(t);
            Ok(())
        };
        let t = Utc.with_ymd_and_hms(2030, 5, 6, 7, 8, 9).unwrap();
        clock.set_time(t).unwrap();
        drop(clock);
        assert_eq!(seen, vec![t]);
    }

    #[test]
    fn test_effective_uid_check() {
        assert!(check_effective_uid("0\n").is_ok());
        let err = check_effective_uid("1000\n").unwrap_err();
        assert!(matches!(err, GpsError::PermissionDenied(_)));
        assert!(err.to_string().contains("1000"));
        assert!(check_effective_uid("").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_command_is_system_time_update() {
        let err = run("false", &[]).unwrap_err();
        assert!(matches!(err, GpsError::SystemTimeUpdate(_)));
        let err = run("/nonexistent/gps-timesync-date", &[]).unwrap_err();
        assert!(matches!(err, GpsError::SystemTimeUpdate(_)));
    }
}
