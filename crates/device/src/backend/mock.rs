//! Scripted devices for testing.

use crate::backend::{DeviceDiscovery, DeviceHandle, DeviceStream, ScannerDevice};
use crate::error::{ErrorKind, Result};
use crate::event::{DeviceEvent, DeviceFault, EventReceiver, EventSender, event_channel};
use crate::models::{DeviceInfo, FunctionalUnit, ScanSettings, Size, TransferMode, UnitDetails, UnitKind};
use crate::raster::{PixelFormat, RasterBand, RasterImage};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A request received by a [`MockDevice`], in the order it arrived.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    OpenSession,
    SelectUnit(UnitKind),
    Configure(Box<ScanSettings>),
    RequestScan,
    CloseSession,
}

/// Shared view of the requests a [`MockDevice`] has received, usable after
/// the device itself has been moved into a session.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Request>>>);
impl RequestLog {
    fn push(&self, request: Request) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(request);
    }

    pub fn snapshot(&self) -> Vec<Request> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, matches: impl Fn(&Request) -> bool) -> usize {
        self.snapshot().iter().filter(|r| matches(r)).count()
    }
}

/// One page delivered by a [`MockDevice`] scan.
#[derive(Clone, Debug)]
pub enum MockPage {
    /// Reported as already written to this path.
    File(PathBuf),
    /// Split into bands of `rows_per_band` rows.
    Raster { image: RasterImage, rows_per_band: u32 },
    /// Delivered verbatim, for malformed band sequences.
    Band(RasterBand),
}

/// A device that answers requests from a script instead of hardware.
///
/// Each [`with_scan`](Self::with_scan) call queues the pages returned by one
/// `request_scan`. Running out of queued scans completes the next scan with a
/// device fault.
pub struct MockDevice {
    info: DeviceInfo,
    transfer: TransferMode,
    sender: EventSender,
    receiver: Option<EventReceiver>,
    confirmations: Vec<Option<FunctionalUnit>>,
    scans: VecDeque<Vec<MockPage>>,
    open_fault: Option<DeviceFault>,
    scan_fault: Option<DeviceFault>,
    silent: bool,
    log: RequestLog,
}
impl MockDevice {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, receiver) = event_channel();
        Self {
            info: DeviceInfo::new(name.clone(), format!("mock:{name}"), "mock"),
            transfer: TransferMode::File,
            sender,
            receiver: Some(receiver),
            confirmations: Vec::new(),
            scans: VecDeque::new(),
            open_fault: None,
            scan_fault: None,
            silent: false,
            log: RequestLog::default(),
        }
    }

    /// Capabilities of the default document feeder.
    pub fn feeder_unit() -> FunctionalUnit {
        FunctionalUnit {
            details: UnitDetails::DocumentFeeder { duplex: true },
            resolutions: vec![75, 150, 300, 600],
            resolution: 75,
            pixel_formats: vec![PixelFormat::Mono1, PixelFormat::Rgb8],
        }
    }

    /// Capabilities of the default flatbed.
    pub fn flatbed_unit() -> FunctionalUnit {
        FunctionalUnit {
            details: UnitDetails::Flatbed { physical_size: Size { width: 8.5, height: 11.7 } },
            resolutions: vec![100, 200, 400],
            resolution: 100,
            pixel_formats: vec![PixelFormat::Rgb8],
        }
    }

    pub fn request_log(&self) -> RequestLog {
        self.log.clone()
    }

    pub fn with_transfer(mut self, transfer: TransferMode) -> Self {
        self.transfer = transfer;
        self
    }

    /// Queues the pages returned by the next unanswered `request_scan`.
    pub fn with_scan(mut self, pages: impl IntoIterator<Item = MockPage>) -> Self {
        self.scans.push_back(pages.into_iter().collect());
        self
    }

    /// Sends an extra unit confirmation ahead of the correct one.
    pub fn with_unit_confirmation(mut self, unit: Option<FunctionalUnit>) -> Self {
        self.confirmations.push(unit);
        self
    }

    pub fn with_open_fault(mut self, message: impl Into<String>) -> Self {
        self.open_fault = Some(DeviceFault::new(message));
        self
    }

    pub fn with_scan_fault(mut self, message: impl Into<String>) -> Self {
        self.scan_fault = Some(DeviceFault::new(message));
        self
    }

    /// Accepts every request but never sends an event.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Sends an event as if the device had produced it unprompted.
    pub fn inject(&self, event: DeviceEvent) {
        self.send(event);
    }

    fn send(&self, event: DeviceEvent) {
        if !self.silent {
            // A dropped receiver means the session is gone; nobody to tell.
            _ = self.sender.send(event);
        }
    }
}

#[async_trait]
impl ScannerDevice for MockDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn transfer_mode(&self) -> TransferMode {
        self.transfer
    }

    fn take_events(&mut self) -> Option<EventReceiver> {
        self.receiver.take()
    }

    async fn open_session(&mut self) -> Result<()> {
        self.log.push(Request::OpenSession);
        match self.open_fault.clone() {
            Some(fault) => self.send(DeviceEvent::SessionOpened(Some(fault))),
            None => {
                self.send(DeviceEvent::SessionOpened(None));
                self.send(DeviceEvent::DeviceReady);
            },
        }
        Ok(())
    }

    async fn select_unit(&mut self, kind: UnitKind) -> Result<()> {
        self.log.push(Request::SelectUnit(kind));
        for unit in std::mem::take(&mut self.confirmations) {
            self.send(DeviceEvent::UnitSelected { unit, error: None });
        }
        let unit = match kind {
            UnitKind::DocumentFeeder => Self::feeder_unit(),
            UnitKind::Flatbed => Self::flatbed_unit(),
        };
        self.send(DeviceEvent::UnitSelected { unit: Some(unit), error: None });
        Ok(())
    }

    async fn configure(&mut self, settings: &ScanSettings) -> Result<()> {
        self.log.push(Request::Configure(Box::new(settings.clone())));
        Ok(())
    }

    async fn request_scan(&mut self) -> Result<()> {
        self.log.push(Request::RequestScan);
        if let Some(fault) = self.scan_fault.clone() {
            self.send(DeviceEvent::PageCompleted(Some(fault)));
            return Ok(());
        }
        let Some(pages) = self.scans.pop_front() else {
            self.send(DeviceEvent::PageCompleted(Some(DeviceFault::new("no document loaded"))));
            return Ok(());
        };
        for page in pages {
            match page {
                MockPage::File(path) => self.send(DeviceEvent::PageReceived(path)),
                MockPage::Raster { image, rows_per_band } => {
                    for band in image.into_bands(rows_per_band) {
                        self.send(DeviceEvent::BandReceived(band));
                    }
                },
                MockPage::Band(band) => self.send(DeviceEvent::BandReceived(band)),
            }
        }
        self.send(DeviceEvent::PageCompleted(None));
        Ok(())
    }

    async fn close_session(&mut self) -> Result<()> {
        self.log.push(Request::CloseSession);
        self.send(DeviceEvent::SessionClosed(None));
        Ok(())
    }
}

/// Discovery that announces devices on a fixed schedule.
///
/// Unless [`finite`](Self::finite) is set, the stream stays pending after the
/// last device, like a platform browser that never declares enumeration
/// complete.
#[derive(Default)]
pub struct MockDiscovery {
    schedule: Vec<(Duration, DeviceInfo)>,
    connectable: Mutex<HashMap<String, MockDevice>>,
    finite: bool,
}
impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces `device` after `delay` (measured from the previous device).
    pub fn with_device(mut self, delay: Duration, device: DeviceInfo) -> Self {
        self.schedule.push((delay, device));
        self
    }

    /// Announces `device` after `delay` and lets it be connected to, once.
    pub fn with_connectable(mut self, delay: Duration, device: MockDevice) -> Self {
        self.schedule.push((delay, device.info.clone()));
        self.connectable.get_mut().unwrap_or_else(PoisonError::into_inner).insert(device.info.id.clone(), device);
        self
    }

    pub fn finite(mut self) -> Self {
        self.finite = true;
        self
    }
}

#[async_trait]
impl DeviceDiscovery for MockDiscovery {
    fn discover(&self) -> DeviceStream<'_> {
        Box::pin(stream! {
            for (delay, device) in &self.schedule {
                tokio::time::sleep(*delay).await;
                yield Ok(device.clone());
            }
            if !self.finite {
                futures::future::pending::<()>().await;
            }
        })
    }

    async fn connect(&self, device: &DeviceInfo) -> Result<DeviceHandle> {
        let found = self.connectable.lock().unwrap_or_else(PoisonError::into_inner).remove(&device.id);
        match found {
            Some(mock) => Ok(Box::new(mock)),
            None => exn::bail!(ErrorKind::Connect(device.name.clone())),
        }
    }
}
