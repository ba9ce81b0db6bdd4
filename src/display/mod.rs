// src/display/mod.rs
//! Display modules for monitor output

pub mod terminal;

pub use terminal::TerminalDisplay;

use crate::{error::Result, monitor::MonitorEvent};

/// Somewhere to show monitor events as they arrive.
pub trait MonitorDisplay {
    fn show(&mut self, event: &MonitorEvent) -> Result<()>;
}

impl<D: MonitorDisplay + ?Sized> MonitorDisplay for Box<D> {
    fn show(&mut self, event: &MonitorEvent) -> Result<()> {
        (**self).show(event)
    }
}
