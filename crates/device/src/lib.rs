//! Scanner devices: discovery, the request/event seam, and raster assembly.
//!
//! A platform (or test) provides a [`DeviceDiscovery`] that streams
//! [`DeviceInfo`]s and connects to one of them, producing a [`DeviceHandle`].
//! The handle accepts requests ([`ScannerDevice`]) and reports progress as
//! [`DeviceEvent`]s on a channel, one at a time, in the order the device
//! produced them.
//!
//! [`DeviceBrowser`] bounds discovery with a timeout and applies the
//! selection policy. [`BandAssembler`] turns memory-transfer bands back into
//! whole pages.

pub mod backend;
mod band;
mod browser;
pub mod error;
mod event;
mod models;
mod raster;

pub use crate::backend::{DeviceDiscovery, DeviceHandle, DiscoveryHandle, ScannerDevice};
pub use crate::band::{Assembly, BandAssembler};
pub use crate::browser::{Browse, BrowseMode, BrowseOutcome, DeviceBrowser, Selector};
pub use crate::event::{DeviceEvent, DeviceFault, EventReceiver, EventSender, event_channel};
pub use crate::models::{
    DeviceInfo, DocumentFormat, FunctionalUnit, Geometry, PageArtifact, ScanArea, ScanSettings, Size, TransferMode,
    UnitDetails, UnitKind,
};
pub use crate::raster::{PixelFormat, RasterBand, RasterImage, RasterLayout};
