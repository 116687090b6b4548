//! Page images to encoded bytes.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use quire_config::OutputFormat;
use quire_device::PageArtifact;
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

const JPEG_QUALITY: u8 = 90;

pub(crate) fn decode(page: &PageArtifact) -> Result<DynamicImage> {
    let index = page.index();
    let image = match page {
        PageArtifact::File { path, .. } => image::open(path).or_raise(|| ErrorKind::Encode(index))?,
        PageArtifact::Raster { image, .. } => image.to_image().or_raise(|| ErrorKind::Encode(index))?,
    };
    Ok(flatten(image))
}

/// Reduces any decoded image to 8-bit gray or 8-bit RGB.
fn flatten(image: DynamicImage) -> DynamicImage {
    match image.color().has_color() {
        true => DynamicImage::ImageRgb8(image.to_rgb8()),
        false => DynamicImage::ImageLuma8(image.to_luma8()),
    }
}

pub(crate) fn jpeg(image: &DynamicImage, index: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY)
        .encode_image(image)
        .or_raise(|| ErrorKind::Encode(index))?;
    Ok(data)
}

/// Encodes one page as a standalone TIFF or JPEG in a temporary file.
pub(crate) fn to_temp_file(page: &PageArtifact, format: OutputFormat) -> Result<NamedTempFile> {
    let index = page.index();
    let image = decode(page)?;
    let data = match format {
        OutputFormat::Jpeg => jpeg(&image, index)?,
        OutputFormat::Tiff | OutputFormat::Pdf => {
            let mut data = Vec::new();
            image.write_to(&mut Cursor::new(&mut data), ImageFormat::Tiff).or_raise(|| ErrorKind::Encode(index))?;
            data
        },
    };
    let mut file = tempfile::Builder::new()
        .prefix("quire-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()
        .or_raise(|| ErrorKind::Io)?;
    file.write_all(&data).or_raise(|| ErrorKind::Io)?;
    tracing::trace!(page = index, bytes = data.len(), path = %file.path().display(), "Encoded page");
    Ok(file)
}
