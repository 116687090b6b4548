//! Raw raster pages and the bands they are delivered in.

use crate::error::{AssemblyFault, ErrorKind, Result};
use derive_more::Display;
use exn::OptionExt;
use image::{DynamicImage, GrayImage, RgbImage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum PixelFormat {
    /// 1 bit per pixel, most significant bit first. A set bit is white.
    #[display("1-bit black & white")]
    Mono1,
    #[display("8-bit grayscale")]
    Gray8,
    #[display("8-bit RGB")]
    Rgb8,
}
impl PixelFormat {
    pub fn bits_per_pixel(&self) -> u32 {
        match self {
            Self::Mono1 => 1,
            Self::Gray8 => 8,
            Self::Rgb8 => 24,
        }
    }
}

/// Declared dimensions of a whole page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterLayout {
    pub width: u32,
    pub height: u32,
    pub pixel: PixelFormat,
    /// Bytes per row including any padding the device adds.
    pub bytes_per_row: u32,
    /// Resolution in dpi; used to give the page a physical size.
    pub resolution: u32,
}
impl RasterLayout {
    /// A layout with no row padding.
    pub fn packed(width: u32, height: u32, pixel: PixelFormat, resolution: u32) -> Self {
        let bytes_per_row = (u64::from(width) * u64::from(pixel.bits_per_pixel())).div_ceil(8);
        Self {
            width,
            height,
            pixel,
            // Saturates rather than wraps; `is_valid` rejects the result.
            bytes_per_row: u32::try_from(bytes_per_row).unwrap_or(0),
            resolution,
        }
    }

    /// Bytes needed to hold one row without padding.
    pub fn min_bytes_per_row(&self) -> u64 {
        (u64::from(self.width) * u64::from(self.pixel.bits_per_pixel())).div_ceil(8)
    }

    /// Total bytes of the full image, padding included.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.bytes_per_row) * u64::from(self.height)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.resolution > 0
            && u64::from(self.bytes_per_row) >= self.min_bytes_per_row()
    }
}

/// A horizontal slice of a page delivered during memory transfer.
///
/// `start_row == 0` marks the first band of a new page; there is no explicit
/// end-of-page marker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBand {
    pub layout: RasterLayout,
    pub start_row: u32,
    pub rows: u32,
    pub data: Vec<u8>,
}
impl RasterBand {
    pub fn declared_size(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.layout.bytes_per_row)
    }
}

/// A complete page held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub layout: RasterLayout,
    pub data: Vec<u8>,
}
impl RasterImage {
    /// Converts a decoded image into a packed raster of the given format.
    ///
    /// Mono conversion thresholds luminance at the midpoint.
    pub fn from_image(image: &DynamicImage, pixel: PixelFormat, resolution: u32) -> Self {
        let layout = RasterLayout::packed(image.width(), image.height(), pixel, resolution);
        let data = match pixel {
            PixelFormat::Rgb8 => image.to_rgb8().into_raw(),
            PixelFormat::Gray8 => image.to_luma8().into_raw(),
            PixelFormat::Mono1 => {
                let gray = image.to_luma8();
                let stride = layout.bytes_per_row as usize;
                let mut data = vec![0u8; stride * gray.height() as usize];
                for (x, y, pixel) in gray.enumerate_pixels() {
                    if pixel.0[0] >= 128 {
                        data[y as usize * stride + x as usize / 8] |= 0x80 >> (x % 8);
                    }
                }
                data
            },
        };
        Self { layout, data }
    }

    /// Splits the page into bands of at most `rows_per_band` rows.
    pub fn into_bands(self, rows_per_band: u32) -> Vec<RasterBand> {
        let rows_per_band = rows_per_band.max(1);
        let stride = self.layout.bytes_per_row as usize;
        let mut bands = Vec::new();
        let mut start_row = 0;
        for chunk in self.data.chunks(stride * rows_per_band as usize) {
            // Infallible: a chunk never holds more than `rows_per_band` rows.
            let rows = u32::try_from(chunk.len() / stride).unwrap_or(rows_per_band);
            bands.push(RasterBand { layout: self.layout, start_row, rows, data: chunk.to_vec() });
            start_row += rows;
        }
        bands
    }

    /// Unpacks the raster into an [`image`] buffer, dropping row padding.
    pub fn to_image(&self) -> Result<DynamicImage> {
        let layout = &self.layout;
        if !layout.is_valid() || self.data.len() as u64 != layout.byte_size() {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::InvalidLayout));
        }
        let stride = layout.bytes_per_row as usize;
        let packed = layout.min_bytes_per_row() as usize;
        let rows = self.data.chunks_exact(stride);
        let image = match layout.pixel {
            PixelFormat::Rgb8 => {
                let raw = rows.flat_map(|row| &row[..packed]).copied().collect();
                DynamicImage::ImageRgb8(
                    RgbImage::from_raw(layout.width, layout.height, raw).ok_or_raise(|| ErrorKind::Image)?,
                )
            },
            PixelFormat::Gray8 => {
                let raw = rows.flat_map(|row| &row[..packed]).copied().collect();
                DynamicImage::ImageLuma8(
                    GrayImage::from_raw(layout.width, layout.height, raw).ok_or_raise(|| ErrorKind::Image)?,
                )
            },
            PixelFormat::Mono1 => {
                let width = layout.width as usize;
                let raw = rows
                    .flat_map(|row| (0..width).map(move |x| if row[x / 8] & (0x80 >> (x % 8)) != 0 { 255 } else { 0 }))
                    .collect();
                DynamicImage::ImageLuma8(
                    GrayImage::from_raw(layout.width, layout.height, raw).ok_or_raise(|| ErrorKind::Image)?,
                )
            },
        };
        Ok(image)
    }
}
