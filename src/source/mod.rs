//! Page-structured access to the manual.
//!
//! The table parser does not care where the text comes from. It only sees
//! pages of positioned text runs, provided by a `Document`. The real manual is
//! read through `PdfDocument`, tests use `MemoryDocument`.

mod pdf;

pub use self::pdf::PdfDocument;

use crate::error::Error;

/// A run of text drawn with a single font size at a single position.
///
/// Coordinates are in PDF user space: `x` grows to the right, `y` grows
/// upwards, and `(x, y)` is the start of the run's baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    /// Font size in user space units.
    pub size: f64,
    pub x: f64,
    pub y: f64,
    /// Advance width of the whole run.
    pub w: f64,
    pub s: String,
}

impl Text {
    /// Creates a run with an estimated width, for synthetic pages.
    pub fn new(x: f64, y: f64, s: &str) -> Self {
        let size = 9.0;
        Text {
            size,
            x,
            y,
            w: s.chars().count() as f64 * size * 0.5,
            s: s.to_string(),
        }
    }

    /// Sets the font size, rescaling the estimated width.
    pub fn with_size(mut self, size: f64) -> Self {
        self.w = self.w / self.size * size;
        self.size = size;
        self
    }

    /// The x coordinate where the run ends.
    pub fn end(&self) -> f64 {
        self.x + self.w
    }
}

/// A single page of the manual.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub texts: Vec<Text>,
}

/// A source of manual pages.
pub trait Document {
    /// Returns the number of pages. Pages are numbered `1..=page_count()`.
    fn page_count(&self) -> u32;

    /// Loads the text content of a page.
    ///
    /// An error only affects this page; the caller may continue with the next
    /// one.
    fn page(&self, number: u32) -> Result<Page, Error>;
}

/// A `Document` backed by pages held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<Page>,
}

impl MemoryDocument {
    /// Creates a document from a list of pages. The pages are renumbered
    /// sequentially, starting at 1.
    pub fn new(pages: Vec<Page>) -> Self {
        let pages = pages.into_iter()
            .enumerate()
            .map(|(i, page)| Page { number: i as u32 + 1, ..page })
            .collect();
        MemoryDocument { pages }
    }
}

impl Document for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page(&self, number: u32) -> Result<Page, Error> {
        number.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .ok_or_else(|| Error::Unrecognized(format!("no page {}", number)))
    }
}
