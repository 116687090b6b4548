//! Device models.
//!
//! Capability descriptors reported by a device, and the settings negotiated
//! against them for one session.

use crate::raster::{PixelFormat, RasterImage};
use derive_more::Display;
use image::ImageFormat;
use quire_config::PaperSize;
use std::path::PathBuf;

/// A device found during discovery.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("{name}")]
pub struct DeviceInfo {
    /// Human-readable name, used for selection.
    pub name: String,
    /// Backend-specific identifier, stable for the lifetime of discovery.
    pub id: String,
    /// How the device is reached (`usb`, `network`, `folder`, ...).
    pub transport: String,
}
impl DeviceInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>, transport: impl Into<String>) -> Self {
        Self { name: name.into(), id: id.into(), transport: transport.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum UnitKind {
    #[display("document feeder")]
    DocumentFeeder,
    #[display("flatbed")]
    Flatbed,
}

/// Width and height in inches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnitDetails {
    DocumentFeeder { duplex: bool },
    Flatbed { physical_size: Size },
}

/// A scan mode of a device, as reported when it is selected.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionalUnit {
    pub details: UnitDetails,
    /// Supported resolutions in dpi, in any order.
    pub resolutions: Vec<u32>,
    /// Resolution the unit is currently set to.
    pub resolution: u32,
    pub pixel_formats: Vec<PixelFormat>,
}
impl FunctionalUnit {
    pub fn kind(&self) -> UnitKind {
        match self.details {
            UnitDetails::DocumentFeeder { .. } => UnitKind::DocumentFeeder,
            UnitDetails::Flatbed { .. } => UnitKind::Flatbed,
        }
    }

    /// The smallest supported resolution that is at least `dpi`.
    pub fn resolution_at_least(&self, dpi: u32) -> Option<u32> {
        self.resolutions.iter().copied().filter(|r| *r >= dpi).min()
    }

    pub fn supports_duplex(&self) -> bool {
        matches!(self.details, UnitDetails::DocumentFeeder { duplex: true })
    }

    pub fn supports(&self, pixel: PixelFormat) -> bool {
        self.pixel_formats.contains(&pixel)
    }
}

/// Region of the flatbed to scan, in inches from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}
impl ScanArea {
    /// The whole glass.
    pub fn full(size: Size) -> Self {
        Self { x: 0.0, y: 0.0, width: size.width, height: size.height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    Feeder { paper: PaperSize, duplex: bool },
    Flatbed { area: ScanArea },
}

/// How scanned pages travel from the device to us.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum TransferMode {
    /// The device writes each page as a file into a download directory.
    #[display("file")]
    File,
    /// The device streams raster bands which are assembled in memory.
    #[display("memory")]
    Memory,
}

/// File format the device uses for file-based transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum DocumentFormat {
    #[display("TIFF")]
    Tiff,
    #[display("JPEG")]
    Jpeg,
}
impl DocumentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tiff => "tif",
            Self::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Tiff => ImageFormat::Tiff,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Everything a device needs to know before `request_scan`.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanSettings {
    pub unit: UnitKind,
    pub resolution: u32,
    pub pixel: PixelFormat,
    pub geometry: Geometry,
    pub transfer: TransferMode,
    /// Where file-based transfers are written. `None` for memory transfer.
    pub download_dir: Option<PathBuf>,
    pub format: DocumentFormat,
    pub document_name: String,
}

/// One scanned page, in scan order.
#[derive(Clone, Debug, PartialEq)]
pub enum PageArtifact {
    /// A page the device wrote to disk.
    File { index: usize, path: PathBuf, resolution: u32 },
    /// A page assembled from raster bands.
    Raster { index: usize, image: RasterImage },
}
impl PageArtifact {
    pub fn index(&self) -> usize {
        match self {
            Self::File { index, .. } | Self::Raster { index, .. } => *index,
        }
    }

    pub fn resolution(&self) -> u32 {
        match self {
            Self::File { resolution, .. } => *resolution,
            Self::Raster { image, .. } => image.layout.resolution,
        }
    }
}
