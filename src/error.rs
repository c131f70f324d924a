//! Fatal errors and the recoverable diagnostics log.
//!
//! The pipeline distinguishes exactly two severities. An `Error` stops the run
//! and no table is produced. A `Diagnostic` is recorded (and logged) while
//! processing continues, so that quality regressions in the output can be
//! traced back to the offending rows.

use std::error::Error as StdError;
use std::{fmt, io};

/// Unrecoverable error returned by the pipeline.
#[derive(Debug)]
pub enum Error {
    /// The manual could not be downloaded.
    Fetch {
        url: String,
        reason: String,
    },
    /// I/O error while reading or persisting the manual.
    Io(io::Error),
    /// The manual is not a readable PDF document.
    Pdf(lopdf::Error),
    /// The document was read, but does not look like the instruction reference
    /// (for example, not a single table row was found).
    Unrecognized(String),
}

impl Error {
    #[cold]
    pub(crate) fn fetch<S: ToString>(url: &str, reason: S) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Pdf(e) => Some(e),
            Error::Fetch { .. } | Error::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Fetch { url, reason } => write!(f, "failed to download {}: {}", url, reason),
            Error::Io(e) => e.fmt(f),
            Error::Pdf(e) => write!(f, "failed to read manual: {}", e),
            Error::Unrecognized(why) => write!(f, "unrecognized manual layout: {}", why),
        }
    }
}

impl From<io::Error> for Error {
    #[cold]
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<lopdf::Error> for Error {
    #[cold]
    fn from(e: lopdf::Error) -> Self {
        Error::Pdf(e)
    }
}

/// The category of a recoverable problem.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// A page's content stream could not be decoded. The page is skipped.
    BadPage,
    /// A table row lacks one of the required columns. The row is skipped.
    MalformedRow,
    /// A correction rule matched a record but the record did not have the
    /// expected shape. The record passes through uncorrected.
    RuleMismatch,
    /// An operand token is not part of the operand grammar. Its action falls
    /// back to `r`.
    UnknownOperand,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::BadPage => "bad page",
            DiagnosticKind::MalformedRow => "malformed row",
            DiagnosticKind::RuleMismatch => "rule mismatch",
            DiagnosticKind::UnknownOperand => "unknown operand",
        })
    }
}

/// A recoverable problem encountered while building the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Manual page the problem was found on, if it can be attributed to one.
    pub page: Option<u32>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {}: {}: {}", page, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Log of all recoverable problems of a run.
///
/// Every diagnostic is also forwarded to the `log` facade as a warning when it
/// is recorded.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn push<S: Into<String>>(&mut self, page: Option<u32>, kind: DiagnosticKind, message: S) {
        let diag = Diagnostic {
            page,
            kind,
            message: message.into(),
        };
        warn!("{}", diag);
        self.entries.push(diag);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of recorded diagnostics of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut diags = Diagnostics::new();
        diags.push(Some(3), DiagnosticKind::MalformedRow, "missing opcode");
        diags.push(None, DiagnosticKind::UnknownOperand, "zmm1");
        diags.push(Some(9), DiagnosticKind::MalformedRow, "missing syntax");

        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(DiagnosticKind::MalformedRow), 2);
        assert_eq!(diags.count(DiagnosticKind::RuleMismatch), 0);
        assert_eq!(
            diags.iter().next().unwrap().to_string(),
            "page 3: malformed row: missing opcode"
        );
    }

    #[test]
    fn fetch_error_display() {
        let e = Error::fetch("https://example.com/x.pdf", "status 404");
        assert_eq!(e.to_string(), "failed to download https://example.com/x.pdf: status 404");
    }
}
