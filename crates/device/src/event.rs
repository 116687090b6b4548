use crate::models::FunctionalUnit;
use crate::raster::RasterBand;
use derive_more::{Display, Error};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// An error reported by the device itself, as opposed to one raised locally.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("{message}")]
pub struct DeviceFault {
    #[error(not(source))]
    pub message: String,
}
impl DeviceFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Everything a device can tell the session, in delivery order.
///
/// Payloads that the platform may omit are `Option`s: a unit confirmation
/// without a unit is a real (if malformed) message and must not be assumed
/// away.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    /// Reply to an open-session request.
    SessionOpened(Option<DeviceFault>),
    /// The device has finished initialising and accepts unit selection.
    DeviceReady,
    /// Free-form status chatter; informational only.
    Status(String),
    /// Reply to a unit-selection request.
    UnitSelected { unit: Option<FunctionalUnit>, error: Option<DeviceFault> },
    /// A page written to disk (file-based transfer).
    PageReceived(PathBuf),
    /// A slice of page data (memory-based transfer).
    BandReceived(RasterBand),
    /// A scan request finished, successfully or not.
    PageCompleted(Option<DeviceFault>),
    /// The device hit an error outside of any specific request.
    Error(DeviceFault),
    /// The session with the device is over.
    SessionClosed(Option<DeviceFault>),
    /// The device disappeared.
    Removed,
}

pub type EventSender = mpsc::UnboundedSender<DeviceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DeviceEvent>;

/// Channel a device uses to deliver [`DeviceEvent`]s.
///
/// Unbounded: sending never blocks the device side. Events are still
/// consumed strictly one at a time.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
