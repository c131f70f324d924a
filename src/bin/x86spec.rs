extern crate x86spec;
extern crate env_logger;
extern crate tempfile;
#[macro_use] extern crate log;
#[macro_use] extern crate structopt;

use x86spec::{Config, DiagnosticKind, Table};

use structopt::StructOpt;
use tempfile::NamedTempFile;
use std::error::Error;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Debug, StructOpt)]
#[structopt(name = "x86spec", about = "Extracts the x86 instruction table from the Intel manual.")]
struct Opt {
    /// Local copy of the manual. Downloaded from `--url` if it doesn't exist.
    #[structopt(short = "f", long = "file", parse(from_os_str), raw(default_value = "x86spec::DEFAULT_FILE"))]
    file: PathBuf,
    /// Where to download the manual from.
    #[structopt(short = "u", long = "url", raw(default_value = "x86spec::DEFAULT_URL"))]
    url: String,
    /// Only parse the given pages, and log how they are laid out. Can be
    /// given multiple times or as a comma-separated list.
    #[structopt(long = "debugpage", raw(use_delimiter = "true"))]
    debug_pages: Vec<u32>,
    /// Add the compatibility notes of the manual as a 12th column.
    #[structopt(long = "compat")]
    compat: bool,
    /// Write the table to this file instead of stdout. The file is only
    /// replaced once the whole table has been written.
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,
}

/// Writes the table to `path` through a temporary file in the same
/// directory, so that `path` is never left half-written.
fn write_file(table: &Table, path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    table.write_csv(BufWriter::new(&mut tmp))?;
    tmp.persist(path)?;
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();
    let config = Config {
        debug_pages: opt.debug_pages,
        url: opt.url,
        file: opt.file,
        compat: opt.compat,
    };

    let table = x86spec::load(&config)?;

    match &opt.output {
        Some(path) => {
            write_file(&table, path)?;
            info!("wrote {} instructions to {}", table.emitted().count(), path.display());
        }
        None => {
            let stdout = io::stdout();
            table.write_csv(BufWriter::new(stdout.lock()))?;
        }
    }

    if !table.diagnostics.is_empty() {
        let kinds = [
            DiagnosticKind::BadPage,
            DiagnosticKind::MalformedRow,
            DiagnosticKind::RuleMismatch,
            DiagnosticKind::UnknownOperand,
        ];
        for kind in &kinds {
            let count = table.diagnostics.count(*kind);
            if count != 0 {
                warn!("{} diagnostics of kind '{}'", count, kind);
            }
        }
    }
    Ok(())
}

fn main() {
    // By default, log all `info!` messages and higher
    env_logger::Builder::from_default_env()
        .filter(None, log::LevelFilter::Info)
        .init();

    match run() {
        Ok(()) => {},
        Err(e) => {
            eprintln!("exiting due to error: {}", e);
            process::exit(1);
        },
    }
}
