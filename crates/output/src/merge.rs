//! Combining pages into one PDF.
//!
//! Every page becomes one PDF page holding a single JPEG image XObject that
//! fills the page. The page's physical size comes from the image's pixel
//! dimensions and scan resolution.

use crate::encode;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use quire_device::PageArtifact;
use tempfile::NamedTempFile;

const POINTS_PER_INCH: u64 = 72;

/// Pixels to PDF points at `dpi`, rounded, never zero.
fn points(pixels: u32, dpi: u32) -> i64 {
    let dpi = u64::from(dpi.max(1));
    let points = (u64::from(pixels) * POINTS_PER_INCH + dpi / 2) / dpi;
    i64::try_from(points.max(1)).unwrap_or(i64::MAX)
}

/// Builds a PDF with one page per artifact, in the given order.
///
/// All or nothing: the first page that fails to encode aborts the merge and
/// no document is produced.
pub(crate) fn merge(pages: &[PageArtifact]) -> Result<NamedTempFile> {
    if pages.is_empty() {
        exn::bail!(ErrorKind::NoPages);
    }
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        kids.push(Object::Reference(add_page(&mut doc, pages_id, page)?));
    }
    let count = i64::try_from(kids.len()).or_raise(|| ErrorKind::Merge)?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut file = tempfile::Builder::new().prefix("quire-").suffix(".pdf").tempfile().or_raise(|| ErrorKind::Io)?;
    doc.save_to(&mut file).or_raise(|| ErrorKind::Merge)?;
    tracing::debug!(pages = pages.len(), path = %file.path().display(), "Merged pages into PDF");
    Ok(file)
}

fn add_page(doc: &mut Document, parent: ObjectId, page: &PageArtifact) -> Result<ObjectId> {
    let index = page.index();
    let image = encode::decode(page)?;
    let (width, height) = (image.width(), image.height());
    let color_space = if image.color().has_color() { "DeviceRGB" } else { "DeviceGray" };
    let data = encode::jpeg(&image, index)?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        data,
    ));

    let (page_width, page_height) = (points(width, page.resolution()), points(height, page.resolution()));
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![page_width.into(), 0i64.into(), 0i64.into(), page_height.into(), 0i64.into(), 0i64.into()],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().or_raise(|| ErrorKind::Merge)?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), page_width.into(), page_height.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use quire_device::{PixelFormat, RasterImage};
    use rstest::rstest;

    fn page(index: usize, width: u32, height: u32, dpi: u32) -> PageArtifact {
        let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        PageArtifact::Raster { index, image: RasterImage::from_image(&image, PixelFormat::Rgb8, dpi) }
    }

    fn media_box(doc: &Document, page_id: ObjectId) -> Vec<i64> {
        let page = doc.get_dictionary(page_id).unwrap();
        page.get(b"MediaBox").unwrap().as_array().unwrap().iter().map(|o| o.as_i64().unwrap()).collect()
    }

    #[rstest]
    #[case(150, 150, 72)]
    #[case(1275, 150, 612)]
    #[case(1, 600, 1)]
    #[case(100, 0, 7200)]
    fn test_points(#[case] pixels: u32, #[case] dpi: u32, #[case] expected: i64) {
        assert_eq!(points(pixels, dpi), expected);
    }

    #[test]
    fn test_page_count_and_order() {
        let pages = [page(0, 150, 300, 150), page(1, 300, 150, 150), page(2, 75, 75, 75)];
        let file = merge(&pages).unwrap();
        let doc = Document::load(file.path()).unwrap();
        let ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(media_box(&doc, ids[0]), [0, 0, 72, 144]);
        assert_eq!(media_box(&doc, ids[1]), [0, 0, 144, 72]);
        assert_eq!(media_box(&doc, ids[2]), [0, 0, 72, 72]);
    }

    #[test]
    fn test_bad_page_aborts_merge() {
        let missing = PageArtifact::File { index: 1, path: "/definitely/not/here.tif".into(), resolution: 150 };
        let err = merge(&[page(0, 10, 10, 150), missing]).unwrap_err();
        assert_eq!(*err, ErrorKind::Encode(1));
    }

    #[test]
    fn test_empty_merge() {
        assert_eq!(*merge(&[]).unwrap_err(), ErrorKind::NoPages);
    }
}
