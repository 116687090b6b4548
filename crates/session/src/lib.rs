//! One scan, from opening the device to handing over the pages.
//!
//! [`SessionMachine`] is the pure state machine; [`ScanSession`] drives it
//! against a real [`DeviceHandle`](quire_device::DeviceHandle), asks a
//! [`BatchPrompt`] between pages in batch mode and passes the finished pages
//! to a [`PageSink`].

pub mod error;
mod prompt;
mod run;
mod settings;
mod state;

pub use crate::prompt::{BatchDecision, BatchPrompt, LinePrompt};
pub use crate::run::{PageSink, ScanSession, SessionReport};
pub use crate::settings::{ScanPreferences, negotiate};
pub use crate::state::{Command, SessionEvent, SessionMachine, SessionState};
