//! Directories of page images exposed as scanners.
//!
//! Each configured folder is one device. Its pages are the image files in the
//! directory, taken in name order when the session opens. The feeder delivers
//! every remaining page per scan request; the flatbed delivers one.

use crate::backend::{DeviceDiscovery, DeviceHandle, DeviceStream, ScannerDevice};
use crate::error::{ErrorKind, Result};
use crate::event::{DeviceEvent, DeviceFault, EventReceiver, EventSender, event_channel};
use crate::models::{DeviceInfo, FunctionalUnit, ScanSettings, Size, TransferMode, UnitDetails, UnitKind};
use crate::raster::{PixelFormat, RasterImage};
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use quire_config::FolderDevice;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];
const RESOLUTIONS: &[u32] = &[75, 100, 150, 200, 300, 600];
const ROWS_PER_BAND: u32 = 64;
const GLASS: Size = Size { width: 8.5, height: 11.69 };

pub struct FolderDiscovery {
    devices: Vec<FolderDevice>,
}
impl FolderDiscovery {
    pub fn new(devices: &[FolderDevice]) -> Self {
        Self { devices: devices.to_vec() }
    }
}

fn device_info(device: &FolderDevice) -> DeviceInfo {
    DeviceInfo::new(&device.name, device.path.display().to_string(), "folder")
}

#[async_trait]
impl DeviceDiscovery for FolderDiscovery {
    fn discover(&self) -> DeviceStream<'_> {
        Box::pin(stream! {
            for device in &self.devices {
                yield Ok(device_info(device));
            }
        })
    }

    async fn connect(&self, device: &DeviceInfo) -> Result<DeviceHandle> {
        let folder = self
            .devices
            .iter()
            .find(|d| device_info(d) == *device)
            .ok_or_raise(|| ErrorKind::Connect(device.name.clone()))?;
        Ok(Box::new(FolderScanner::new(folder.clone())))
    }
}

pub struct FolderScanner {
    info: DeviceInfo,
    path: PathBuf,
    transfer: TransferMode,
    sender: EventSender,
    receiver: Option<EventReceiver>,
    pages: VecDeque<PathBuf>,
    unit: Option<UnitKind>,
    settings: Option<ScanSettings>,
    written: usize,
}
impl FolderScanner {
    pub fn new(device: FolderDevice) -> Self {
        let (sender, receiver) = event_channel();
        Self {
            info: device_info(&device),
            transfer: if device.memory { TransferMode::Memory } else { TransferMode::File },
            path: device.path,
            sender,
            receiver: Some(receiver),
            pages: VecDeque::new(),
            unit: None,
            settings: None,
            written: 0,
        }
    }

    fn unit(kind: UnitKind) -> FunctionalUnit {
        FunctionalUnit {
            details: match kind {
                UnitKind::DocumentFeeder => UnitDetails::DocumentFeeder { duplex: true },
                UnitKind::Flatbed => UnitDetails::Flatbed { physical_size: GLASS },
            },
            resolutions: RESOLUTIONS.to_vec(),
            resolution: 150,
            pixel_formats: vec![PixelFormat::Mono1, PixelFormat::Gray8, PixelFormat::Rgb8],
        }
    }

    fn send(&self, event: DeviceEvent) {
        // A dropped receiver means the session is gone; nobody to tell.
        _ = self.sender.send(event);
    }

    async fn deliver(&mut self, page: PathBuf, settings: &ScanSettings) -> Result<()> {
        let pixel = settings.pixel;
        let resolution = settings.resolution;
        let raster = tokio::task::spawn_blocking(move || load_page(&page, pixel, resolution))
            .await
            .or_raise(|| ErrorKind::Io)??;
        match settings.transfer {
            TransferMode::Memory => {
                for band in raster.into_bands(ROWS_PER_BAND) {
                    self.send(DeviceEvent::BandReceived(band));
                }
            },
            TransferMode::File => {
                let dir = settings.download_dir.clone().ok_or_raise(|| ErrorKind::Request("configure"))?;
                self.written += 1;
                let target = dir.join(format!(
                    "{} {}.{}",
                    settings.document_name,
                    self.written,
                    settings.format.extension()
                ));
                let format = settings.format.image_format();
                let written = target.clone();
                tokio::task::spawn_blocking(move || -> Result<()> {
                    raster.to_image()?.save_with_format(&written, format).or_raise(|| ErrorKind::Image)
                })
                .await
                .or_raise(|| ErrorKind::Io)??;
                self.send(DeviceEvent::PageReceived(target));
            },
        }
        Ok(())
    }
}

/// Decodes one page and converts it to the negotiated pixel format.
fn load_page(path: &Path, pixel: PixelFormat, resolution: u32) -> Result<RasterImage> {
    let image = image::open(path).or_raise(|| ErrorKind::Image)?;
    Ok(RasterImage::from_image(&image, pixel, resolution))
}

fn is_page(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

async fn list_pages(dir: &Path) -> std::io::Result<VecDeque<PathBuf>> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_page(&path) {
            pages.push(path);
        }
    }
    pages.sort();
    Ok(pages.into())
}

#[async_trait]
impl ScannerDevice for FolderScanner {
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
        match list_pages(&self.path).await {
            Ok(pages) => {
                tracing::debug!(path = %self.path.display(), pages = pages.len(), "Opened folder scanner");
                self.pages = pages;
                self.send(DeviceEvent::SessionOpened(None));
                self.send(DeviceEvent::DeviceReady);
            },
            Err(e) => {
                let fault = DeviceFault::new(format!("cannot read {}: {e}", self.path.display()));
                self.send(DeviceEvent::SessionOpened(Some(fault)));
            },
        }
        Ok(())
    }

    async fn select_unit(&mut self, kind: UnitKind) -> Result<()> {
        self.unit = Some(kind);
        self.send(DeviceEvent::UnitSelected { unit: Some(Self::unit(kind)), error: None });
        Ok(())
    }

    async fn configure(&mut self, settings: &ScanSettings) -> Result<()> {
        if Some(settings.unit) != self.unit {
            exn::bail!(ErrorKind::Request("configure"));
        }
        self.settings = Some(settings.clone());
        Ok(())
    }

    async fn request_scan(&mut self) -> Result<()> {
        let settings = self.settings.clone().ok_or_raise(|| ErrorKind::Request("scan"))?;
        let batch: Vec<PathBuf> = match settings.unit {
            UnitKind::DocumentFeeder => self.pages.drain(..).collect(),
            UnitKind::Flatbed => self.pages.pop_front().into_iter().collect(),
        };
        if batch.is_empty() {
            let message = match settings.unit {
                UnitKind::DocumentFeeder => "no document loaded in the feeder",
                UnitKind::Flatbed => "nothing on the glass",
            };
            self.send(DeviceEvent::PageCompleted(Some(DeviceFault::new(message))));
            return Ok(());
        }
        for page in batch {
            tracing::trace!(page = %page.display(), "Delivering page");
            if let Err(e) = self.deliver(page.clone(), &settings).await {
                let fault = DeviceFault::new(format!("cannot read {}: {}", page.display(), *e));
                self.send(DeviceEvent::PageCompleted(Some(fault)));
                return Ok(());
            }
        }
        self.send(DeviceEvent::PageCompleted(None));
        Ok(())
    }

    async fn close_session(&mut self) -> Result<()> {
        self.pages.clear();
        self.send(DeviceEvent::SessionClosed(None));
        Ok(())
    }
}
