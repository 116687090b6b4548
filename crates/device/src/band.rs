//! Reassembly of memory-transfer bands into whole pages.
//!
//! Bands are accepted strictly in order. A band that does not start exactly
//! where the previous one ended (a gap, a duplicate or a reordering) is an
//! error; nothing is reordered or patched over.

use crate::error::{AssemblyFault, ErrorKind, Result};
use crate::raster::{RasterBand, RasterImage, RasterLayout};
use exn::{OptionExt, ResultExt};

/// Largest page buffer a device may ask for.
const MAX_PAGE_BYTES: usize = 1 << 31;

/// Result of feeding one band.
#[derive(Debug, PartialEq, Eq)]
pub enum Assembly {
    InProgress { received: u64, expected: u64 },
    Complete(RasterImage),
}

struct PartialPage {
    layout: RasterLayout,
    data: Vec<u8>,
    next_row: u32,
}

/// Accumulates [`RasterBand`]s until a page's declared byte size is reached.
#[derive(Default)]
pub struct BandAssembler {
    page: Option<PartialPage>,
}
impl BandAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no page is partially assembled.
    pub fn is_idle(&self) -> bool {
        self.page.is_none()
    }

    /// Folds a band into the current page.
    ///
    /// A band with `start_row == 0` opens a new page sized from its declared
    /// layout. Any error discards the page in progress.
    pub fn feed(&mut self, band: RasterBand) -> Result<Assembly> {
        let result = self.feed_inner(band);
        if result.is_err() {
            self.page = None;
        }
        result
    }

    fn feed_inner(&mut self, band: RasterBand) -> Result<Assembly> {
        if band.start_row == 0 {
            if let Some(page) = &self.page {
                exn::bail!(ErrorKind::Assembly(AssemblyFault::Truncated {
                    received: page.data.len() as u64,
                    expected: page.layout.byte_size(),
                }));
            }
            if !band.layout.is_valid() {
                exn::bail!(ErrorKind::Assembly(AssemblyFault::InvalidLayout));
            }
            let capacity = usize::try_from(band.layout.byte_size())
                .ok()
                .filter(|bytes| *bytes <= MAX_PAGE_BYTES)
                .ok_or_raise(|| ErrorKind::Assembly(AssemblyFault::InvalidLayout))?;
            let mut data = Vec::new();
            data.try_reserve_exact(capacity).or_raise(|| ErrorKind::Assembly(AssemblyFault::InvalidLayout))?;
            tracing::trace!(width = band.layout.width, height = band.layout.height, "Starting new page");
            self.page = Some(PartialPage { layout: band.layout, data, next_row: 0 });
        }
        let Some(page) = self.page.as_mut() else {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::NoActivePage { row: band.start_row }));
        };
        if band.layout != page.layout {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::LayoutMismatch));
        }
        if band.start_row != page.next_row {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::OutOfOrder {
                expected: page.next_row,
                found: band.start_row,
            }));
        }
        let actual = band.data.len() as u64;
        if actual != band.declared_size() {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::BandSize { declared: band.declared_size(), actual }));
        }
        let expected = page.layout.byte_size();
        if page.data.len() as u64 + actual > expected {
            exn::bail!(ErrorKind::Assembly(AssemblyFault::Overflow { bytes: actual }));
        }

        page.data.extend_from_slice(&band.data);
        page.next_row += band.rows;
        let received = page.data.len() as u64;
        if received < expected {
            return Ok(Assembly::InProgress { received, expected });
        }
        // Infallible: the page was just borrowed from `self.page`.
        let page = self.page.take().ok_or_raise(|| ErrorKind::Assembly(AssemblyFault::InvalidLayout))?;
        Ok(Assembly::Complete(RasterImage { layout: page.layout, data: page.data }))
    }

    /// Called when the device reports the scan is over.
    ///
    /// There is no end-of-page marker, so a page still in progress at this
    /// point can only be truncated.
    pub fn finish(&mut self) -> Result<()> {
        match self.page.take() {
            None => Ok(()),
            Some(page) => exn::bail!(ErrorKind::Assembly(AssemblyFault::Truncated {
                received: page.data.len() as u64,
                expected: page.layout.byte_size(),
            })),
        }
    }
}
