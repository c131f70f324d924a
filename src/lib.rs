//! Extracts the x86 instruction encoding table from Intel's *64 and IA-32
//! Architectures Software Developer's Manual*.
//!
//! The manual's instruction reference describes every encoding form in a
//! table at the top of each instruction's section. This crate reads those
//! tables out of the PDF, repairs the manual's known mistakes, derives a few
//! secondary fields (Go and GNU assembler syntax, per-operand read/write
//! actions, operand size information) and writes the result as a quoted CSV
//! table that can be used to generate assemblers, disassemblers and
//! instruction set validators.
//!
//! The pipeline is:
//!
//! 1. `fetch::acquire` downloads the manual unless it is already present.
//! 2. `parse::parse` walks the pages of a `source::Document` and turns table
//!    rows into raw `Instruction` records.
//! 3. `fix::correct` applies the correction rules.
//! 4. `format::format` fills in the derived fields.
//! 5. `sort::sort` orders the records, and `Table::write_csv` emits them.
//!
//! `load` runs steps 1 to 5 on the real manual, `load_document` runs steps 2
//! to 5 on any `Document`.

#![doc(html_root_url = "https://docs.rs/x86spec/0.1.0")]
#![warn(missing_debug_implementations)]

#[macro_use] extern crate log;

pub mod error;
pub mod fetch;
pub mod fix;
pub mod format;
pub mod inst;
pub mod operand;
pub mod parse;
pub mod source;
pub mod sort;
pub mod emit;
mod load;

pub use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, Error};
pub use crate::inst::{Action, Instruction, Tags, Validity};
pub use crate::load::{load, load_document};

use std::io;
use std::path::PathBuf;

/// Location of the manual if none is configured.
pub const DEFAULT_URL: &str = "https://golang.org/s/x86manual";

/// Local file name of the manual if none is configured.
pub const DEFAULT_FILE: &str = "x86manual.pdf";

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Only parse these pages (all pages if empty).
    ///
    /// This is a debugging aid for working on the parser. It enables verbose
    /// logging of the page layout but changes nothing else.
    pub debug_pages: Vec<u32>,
    /// Where to download the manual from.
    pub url: String,
    /// Where the manual is (or will be) stored locally.
    pub file: PathBuf,
    /// Add the manual's compatibility notes as an extra output column.
    pub compat: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug_pages: Vec::new(),
            url: DEFAULT_URL.to_string(),
            file: PathBuf::from(DEFAULT_FILE),
            compat: false,
        }
    }
}

impl Config {
    /// Whether processing is restricted to a set of debug pages.
    pub fn is_debug(&self) -> bool {
        !self.debug_pages.is_empty()
    }

    /// Whether page `number` should be parsed.
    pub fn wants_page(&self, number: u32) -> bool {
        self.debug_pages.is_empty() || self.debug_pages.contains(&number)
    }
}

/// The finished instruction table.
#[derive(Debug, Clone)]
pub struct Table {
    /// All records in output order, including the ones tagged `pseudo` and
    /// `pseudo64` that are not emitted.
    pub insts: Vec<Instruction>,
    /// Everything that went wrong without stopping the run.
    pub diagnostics: Diagnostics,
    compat: bool,
}

impl Table {
    /// Returns the records that will be emitted.
    pub fn emitted(&self) -> impl Iterator<Item = &Instruction> {
        self.insts.iter().filter(|inst| !inst.is_pseudo())
    }

    /// Writes the table in CSV form.
    pub fn write_csv<W: io::Write>(&self, w: W) -> io::Result<()> {
        emit::write(w, &self.insts, self.compat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_pages() {
        let config = Config::default();
        assert!(!config.is_debug());
        assert!(config.wants_page(1));
        assert!(config.wants_page(1234));

        let config = Config { debug_pages: vec![3, 5], ..Config::default() };
        assert!(config.is_debug());
        assert!(config.wants_page(5));
        assert!(!config.wants_page(4));
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.url, "https://golang.org/s/x86manual");
        assert_eq!(config.file, PathBuf::from("x86manual.pdf"));
        assert!(!config.compat);
    }
}
