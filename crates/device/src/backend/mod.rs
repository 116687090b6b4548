//! Device discovery and session traits, and their implementations.
//!
//! A [`DeviceDiscovery`] is the platform's device browser; a
//! [`ScannerDevice`] is one opened device. Requests issued on a device only
//! *start* work: the outcome of every request arrives later as a
//! [`DeviceEvent`](crate::DeviceEvent) on the receiver returned by
//! [`ScannerDevice::take_events`].

mod folder;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::folder::{FolderDiscovery, FolderScanner};
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockDevice, MockDiscovery, MockPage, Request, RequestLog};
use crate::error::Result;
use crate::event::EventReceiver;
use crate::models::{DeviceInfo, ScanSettings, TransferMode, UnitKind};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub type DeviceStream<'a> = Pin<Box<dyn Stream<Item = Result<DeviceInfo>> + Send + 'a>>;
pub type DiscoveryHandle = Arc<dyn DeviceDiscovery + Send + Sync>;
/// Exclusive handle to one opened device; dropping it releases the device.
pub type DeviceHandle = Box<dyn ScannerDevice>;

/// The platform's device browser.
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Starts listening for devices.
    ///
    /// Devices are yielded as they appear. The stream ends if the platform
    /// knows enumeration is complete; otherwise it stays pending until
    /// dropped. Dropping the stream stops listening.
    fn discover(&self) -> DeviceStream<'_>;

    /// Opens a handle to a device previously yielded by [`discover`](Self::discover).
    async fn connect(&self, device: &DeviceInfo) -> Result<DeviceHandle>;
}

/// One opened scanner.
///
/// Every method returning `Err` means the request could not be issued at
/// all; failures *reported by the device* arrive as events instead.
#[async_trait]
pub trait ScannerDevice: Send {
    fn info(&self) -> &DeviceInfo;

    /// The transfer mode this device is driven in. Not user-configurable.
    fn transfer_mode(&self) -> TransferMode;

    /// Hands over the event receiver. Returns `None` on every call after the
    /// first.
    fn take_events(&mut self) -> Option<EventReceiver>;

    async fn open_session(&mut self) -> Result<()>;

    async fn select_unit(&mut self, kind: UnitKind) -> Result<()>;

    async fn configure(&mut self, settings: &ScanSettings) -> Result<()>;

    async fn request_scan(&mut self) -> Result<()>;

    async fn close_session(&mut self) -> Result<()>;
}
