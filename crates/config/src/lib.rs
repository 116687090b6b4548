//! Configuration for quire.
//!
//! A [`Configuration`] is the immutable option set every other crate reads:
//! device selection, scan-unit preferences, output format and location, and
//! the ordered tag list (the first tag is the primary storage location, the
//! rest become aliases). It is assembled by [`load`] from layered sources and
//! validated once; nothing downstream mutates it.

pub mod error;
mod load;
mod model;

pub use crate::load::{Overrides, default_config_file, load};
pub use crate::model::{Configuration, FolderDevice, OutputFormat, PaperSize, validate_segment};
