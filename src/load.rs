use crate::error::Error;
use crate::source::{Document, PdfDocument};
use crate::{fetch, fix, format, parse, sort, Config, Table};

/// Builds the instruction table from the manual described by `config`.
///
/// The manual is downloaded first if `config.file` does not exist yet.
pub fn load(config: &Config) -> Result<Table, Error> {
    fetch::acquire(&config.url, &config.file)?;

    info!("reading {}", config.file.display());
    let doc = PdfDocument::open(&config.file)?;
    load_document(&doc, config)
}

/// Builds the instruction table from an already opened document.
///
/// Fails if the document does not contain a single instruction table row.
/// All other problems are collected in `Table::diagnostics`.
pub fn load_document<D: Document>(doc: &D, config: &Config) -> Result<Table, Error> {
    let (insts, mut diagnostics) = parse::parse(doc, config);
    if insts.is_empty() {
        return Err(Error::Unrecognized(format!(
            "no instruction table rows found in {} pages", doc.page_count()
        )));
    }

    let mut insts = fix::correct(insts, &mut diagnostics);
    format::format(&mut insts, &mut diagnostics);
    sort::sort(&mut insts);

    info!("{} records, {} diagnostics", insts.iter().filter(|i| !i.is_pseudo()).count(), diagnostics.len());
    Ok(Table {
        insts,
        diagnostics,
        compat: config.compat,
    })
}
