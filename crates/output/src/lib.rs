//! Filing scanned pages on disk.
//!
//! [`OutputPipeline`] takes the pages of one scan, in scan order, and writes
//! them as a merged PDF or as one TIFF/JPEG per page. Outputs are named by
//! [`OutputDescriptor`] and never overwrite existing files. Additional tags
//! become symbolic links to the primary output.

mod encode;
pub mod error;
mod merge;
mod open;
mod path;
mod pipeline;

pub use crate::path::{OutputDescriptor, default_stem, resolve_free_path};
pub use crate::pipeline::{Materialized, OutputPipeline};
