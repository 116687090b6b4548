//! Choosing scan settings from what was asked for and what the unit offers.

use quire_config::{Configuration, OutputFormat, PaperSize};
use quire_device::{
    DocumentFormat, FunctionalUnit, Geometry, PixelFormat, ScanArea, ScanSettings, TransferMode, UnitDetails, UnitKind,
};
use std::path::PathBuf;

const DOCUMENT_NAME: &str = "Scan";

/// The parts of the configuration that shape a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanPreferences {
    pub unit: UnitKind,
    /// Requested resolution in dpi; `None` picks a default for the transfer mode.
    pub resolution: Option<u32>,
    pub mono: bool,
    pub duplex: bool,
    pub paper: PaperSize,
    pub format: DocumentFormat,
    pub batch: bool,
}
impl ScanPreferences {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            unit: if config.flatbed { UnitKind::Flatbed } else { UnitKind::DocumentFeeder },
            resolution: config.resolution,
            mono: config.mono,
            duplex: config.duplex,
            paper: config.paper,
            format: match config.format {
                OutputFormat::Tiff => DocumentFormat::Tiff,
                OutputFormat::Jpeg | OutputFormat::Pdf => DocumentFormat::Jpeg,
            },
            batch: config.batch,
        }
    }
}

fn default_resolution(transfer: TransferMode) -> u32 {
    match transfer {
        TransferMode::File => 150,
        TransferMode::Memory => 200,
    }
}

/// Settles every scan parameter against `unit`'s capabilities.
///
/// Never fails: anything the unit cannot do falls back to something it can,
/// with a warning.
pub fn negotiate(
    preferences: &ScanPreferences,
    unit: &FunctionalUnit,
    transfer: TransferMode,
    download_dir: Option<PathBuf>,
) -> ScanSettings {
    let wanted = preferences.resolution.unwrap_or_else(|| default_resolution(transfer));
    let resolution = match unit.resolution_at_least(wanted) {
        Some(resolution) => resolution,
        None => {
            tracing::warn!(
                wanted,
                current = unit.resolution,
                "Scanner supports no resolution this high; keeping its current resolution"
            );
            unit.resolution
        },
    };

    let pixel = match preferences.mono {
        true if unit.supports(PixelFormat::Mono1) => PixelFormat::Mono1,
        true => {
            tracing::warn!("Scanner cannot scan in black & white; scanning in color");
            PixelFormat::Rgb8
        },
        false => PixelFormat::Rgb8,
    };

    let geometry = match unit.details {
        UnitDetails::DocumentFeeder { .. } => {
            let duplex = preferences.duplex && unit.supports_duplex();
            if preferences.duplex && !duplex {
                tracing::warn!("Document feeder cannot scan both sides; scanning one side");
            }
            Geometry::Feeder { paper: preferences.paper, duplex }
        },
        UnitDetails::Flatbed { physical_size } => {
            if preferences.duplex {
                tracing::debug!("Duplex ignored on the flatbed");
            }
            Geometry::Flatbed { area: ScanArea::full(physical_size) }
        },
    };

    let settings = ScanSettings {
        unit: unit.kind(),
        resolution,
        pixel,
        geometry,
        transfer,
        download_dir: match transfer {
            TransferMode::File => download_dir,
            TransferMode::Memory => None,
        },
        format: preferences.format,
        document_name: DOCUMENT_NAME.to_string(),
    };
    tracing::debug!(
        unit = %settings.unit,
        resolution = settings.resolution,
        pixel = %settings.pixel,
        transfer = %settings.transfer,
        format = %settings.format,
        "Negotiated scan settings"
    );
    settings
}
