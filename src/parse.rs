//! Instruction table parser.
//!
//! Turns pages of positioned text into raw `Instruction` records, one per row
//! of the "Opcode / Instruction / ..." tables at the start of every
//! instruction's reference page. Only the fields printed in the manual are
//! filled in; no interpretation beyond cleaning up cell text happens here.
//!
//! The parser works line by line. Text runs are grouped into lines by their
//! baseline, then assigned to table columns by their x coordinate, using the
//! positions of the column titles in the table header. Cells can span several
//! lines, so a new row only starts when the opcode column holds something that
//! looks like the start of an opcode.

use crate::error::{DiagnosticKind, Diagnostics};
use crate::inst::{split_syntax, Instruction, Validity};
use crate::source::{Document, Page, Text};
use crate::Config;

use regex::Regex;

use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Runs whose baselines differ by less than this belong to the same line.
const LINE_SLACK: f64 = 2.0;
/// Runs may start this far left of their column title.
const COLUMN_SLACK: f64 = 3.0;
/// Font size from which a line containing an em dash is a section heading.
const HEADING_SIZE: f64 = 11.0;

/// Parses all instruction tables in `doc`.
///
/// Rows that can't be turned into a record are skipped and reported in the
/// returned diagnostics, as are pages that fail to load.
pub fn parse<D: Document>(doc: &D, config: &Config) -> (Vec<Instruction>, Diagnostics) {
    let mut parser = Parser::new();
    let mut insts = Vec::new();

    for number in 1..=doc.page_count() {
        if !config.wants_page(number) {
            continue;
        }
        match doc.page(number) {
            Ok(page) => insts.extend(parser.parse_page(&page, config.is_debug())),
            Err(e) => parser.diags.push(Some(number), DiagnosticKind::BadPage, e.to_string()),
        }
    }

    info!("parsed {} rows from {} pages", insts.len(), doc.page_count());
    (insts, parser.diags)
}

/// Parser state carried across pages.
#[derive(Debug, Default)]
struct Parser {
    /// Family name from the last section heading.
    name: String,
    seq: usize,
    diags: Diagnostics,
}

/// What a table column holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Column {
    Opcode,
    Instruction,
    /// Opcode on the first line of the cell, syntax on the following ones.
    OpcodeInstruction,
    OpEn,
    Valid64,
    Valid32,
    /// `V/V`-style cell, 64-bit mode first.
    Valid6432,
    Cpuid,
    Desc,
    Other,
}

impl Column {
    fn from_title(title: &str) -> Column {
        let t: String = title.chars()
            .filter(|c| !c.is_whitespace() && *c != '*')
            .collect::<String>()
            .to_ascii_lowercase();
        match () {
            () if t.contains("opcode") && t.contains("instruction") => Column::OpcodeInstruction,
            () if t.starts_with("opcode") => Column::Opcode,
            () if t.starts_with("instruction") => Column::Instruction,
            () if t.starts_with("op/en") || t.starts_with("openc") => Column::OpEn,
            () if t.contains("64/32") => Column::Valid6432,
            () if t.starts_with("64-bit") || t.starts_with("64bit") => Column::Valid64,
            () if t.starts_with("compat") => Column::Valid32,
            () if t.starts_with("cpuid") => Column::Cpuid,
            () if t.starts_with("description") => Column::Desc,
            () => Column::Other,
        }
    }
}

/// Column layout of the table currently being parsed.
#[derive(Debug)]
struct Table {
    xs: Vec<f64>,
    titles: Vec<String>,
    kinds: Vec<Column>,
    /// Still reading (multi-line) column titles.
    in_header: bool,
}

impl Table {
    fn new(cells: Vec<(f64, String)>) -> Self {
        let (xs, titles): (Vec<_>, Vec<_>) = cells.into_iter().unzip();
        let mut table = Table { xs, titles, kinds: Vec::new(), in_header: true };
        table.classify();
        table
    }

    fn classify(&mut self) {
        self.kinds = self.titles.iter().map(|t| Column::from_title(t)).collect();
    }

    /// Returns the index of the column a run starting at `x` belongs to.
    fn column_of(&self, x: f64) -> usize {
        self.xs.iter()
            .rposition(|&col| col <= x + COLUMN_SLACK)
            .unwrap_or(0)
    }

    fn index(&self, kind: Column) -> Option<usize> {
        self.kinds.iter().position(|&k| k == kind)
    }

    fn is_combined(&self) -> bool {
        self.index(Column::OpcodeInstruction).is_some()
    }

    /// Whether the header has the columns needed to build records.
    fn is_usable(&self) -> bool {
        let opcode = self.is_combined()
            || (self.index(Column::Opcode).is_some() && self.index(Column::Instruction).is_some());
        let valid = self.index(Column::Valid6432).is_some()
            || (self.index(Column::Valid64).is_some() && self.index(Column::Valid32).is_some());
        opcode && valid
    }

    /// Appends a continuation line of the column titles.
    fn extend_header(&mut self, cells: Vec<(f64, String)>) {
        for (x, text) in cells {
            let col = self.column_of(x);
            let title = &mut self.titles[col];
            if !title.ends_with('/') && !title.ends_with('-') {
                title.push(' ');
            }
            title.push_str(&text);
        }
        self.classify();
    }

    /// Splits a data line into per-column cell text.
    fn cells(&self, line: &[Text]) -> Vec<String> {
        let mut cells = vec![String::new(); self.xs.len()];
        let mut last_end: Vec<Option<f64>> = vec![None; self.xs.len()];
        for text in line {
            let col = self.column_of(text.x);
            if let Some(end) = last_end[col] {
                if text.x - end > text.size * 0.2 {
                    cells[col].push(' ');
                }
            }
            cells[col].push_str(&text.s);
            last_end[col] = Some(text.end());
        }
        cells.iter().map(|c| c.trim().to_string()).collect()
    }
}

/// Cell text of a row under construction.
#[derive(Debug, Default)]
struct Row {
    page: u32,
    opcode: String,
    syntax: String,
    op_en: String,
    valid64: String,
    valid32: String,
    valid6432: String,
    cpuid: String,
    desc: String,
}

/// Appends a continuation line to a multi-line cell.
fn append(cell: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !cell.is_empty() && !cell.ends_with('/') {
        cell.push(' ');
    }
    cell.push_str(text);
}

impl Row {
    fn field(&mut self, kind: Column) -> Option<&mut String> {
        Some(match kind {
            Column::Opcode => &mut self.opcode,
            Column::Instruction => &mut self.syntax,
            Column::OpEn => &mut self.op_en,
            Column::Valid64 => &mut self.valid64,
            Column::Valid32 => &mut self.valid32,
            Column::Valid6432 => &mut self.valid6432,
            Column::Cpuid => &mut self.cpuid,
            Column::Desc => &mut self.desc,
            Column::OpcodeInstruction | Column::Other => return None,
        })
    }
}

fn regex(cell: &'static OnceLock<Regex>, re: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(re).unwrap())
}

/// Whether `s` begins like an opcode column entry.
fn starts_opcode(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?:REX(?:\.[WRXB]+)?\s*\+|VEX\.|EVEX\.|XOP\.|NP\s|NFx\s|[0-9A-F]{2}(?:\s|\+|\*|$))")
        .is_match(s)
}

/// Whether every word of `s` is an opcode fragment (for wrapped opcodes in the
/// combined opcode/instruction column).
fn is_opcode_text(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r"^(?:[0-9A-F]{2}(?:\+(?:r[bwdo]|i))?|/[0-7r]|/is4|i[bwdo]|c[bwdpot]|\+|\+r[bwdo]|\+i|REX(?:\.W)?|m?ib)\**$");
    !s.is_empty() && s.split_whitespace().all(|w| re.is_match(w))
}

/// Whether `s` begins with an instruction mnemonic.
fn starts_mnemonic(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[A-Z][A-Z0-9]*(?:\s|\*|$)").is_match(s)
}

fn is_running_header(s: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^(?:INSTRUCTION SET REFERENCE|Vol\.\s*\d|\d+-\d+\s+Vol\.)").is_match(s)
}

/// Whether the line ends the current table.
fn is_terminator(s: &str) -> bool {
    s.starts_with("NOTES") || s.starts_with("NOTE:") || s.starts_with("Instruction Operand Encoding")
        || s == "Description" || s == "Operation" || s == "Flags Affected"
}

fn is_header(cells: &[(f64, String)]) -> bool {
    cells.first().map_or(false, |(_, t)| t.starts_with("Opcode"))
        && cells.iter().any(|(_, t)| t.starts_with("Description"))
}

/// Whether all cells are words used in multi-line column titles.
fn is_header_continuation(cells: &[(f64, String)]) -> bool {
    const WORDS: &[&str] = &[
        "mode", "legmode", "bitmode", "64bitmode", "instruction", "support", "modesupport",
        "featureflag", "feature", "flag", "cpuid", "en", "leg", "compat",
    ];
    !cells.is_empty() && cells.iter().all(|(_, t)| {
        let norm: String = t.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        WORDS.contains(&&*norm)
    })
}

/// Splits a line into cells, by merging runs that are close to each other.
fn chunks(line: &[Text]) -> Vec<(f64, String)> {
    let mut chunks: Vec<(f64, String)> = Vec::new();
    let mut last: Option<&Text> = None;
    for text in line {
        match (last, chunks.last_mut()) {
            (Some(prev), Some((_, chunk))) if text.x - prev.end() <= text.size * 0.4 => {
                if text.x - prev.end() > text.size * 0.2 {
                    chunk.push(' ');
                }
                chunk.push_str(&text.s);
            }
            _ => chunks.push((text.x, text.s.clone())),
        }
        last = Some(text);
    }
    for chunk in &mut chunks {
        chunk.1 = chunk.1.trim().to_string();
    }
    chunks
}

/// Groups the runs of a page into lines, top to bottom, each sorted by x.
fn lines(page: &Page) -> Vec<Vec<Text>> {
    let mut texts = page.texts.clone();
    texts.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<(f64, Vec<Text>)> = Vec::new();
    for text in texts {
        match lines.last_mut() {
            Some((y, line)) if (*y - text.y).abs() < LINE_SLACK => line.push(text),
            _ => lines.push((text.y, vec![text])),
        }
    }
    lines.into_iter()
        .map(|(_, mut line)| {
            line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            line
        })
        .collect()
}

/// Collapses runs of whitespace and puts a single space after commas.
fn clean_syntax(s: &str) -> String {
    static COMMA: OnceLock<Regex> = OnceLock::new();
    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
    regex(&COMMA, r"\s*,\s*").replace_all(&s, ", ").into_owned()
}

/// Normalizes the spacing in an opcode (`B8+ rd` → `B8+rd`, `REX.W+` → `REX.W +`).
fn clean_opcode(s: &str) -> String {
    static PLUS_REG: OnceLock<Regex> = OnceLock::new();
    static REX: OnceLock<Regex> = OnceLock::new();
    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let s = regex(&PLUS_REG, r"([0-9A-F]{2})\s*\+\s*(r[bwdo]|i)\b").replace_all(&s, "$1+$2");
    regex(&REX, r"(REX(?:\.W)?)\s*\+\s*").replace_all(&s, "$1 + ").into_owned()
}

/// Joins the words of a CPUID cell with `+`.
fn clean_cpuid(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|w| !w.is_empty() && *w != "AND" && *w != "&&" && *w != "NA")
        .collect::<Vec<_>>()
        .join("+")
}

/// Removes footnote markers, returning the cleaned text and the longest run of
/// asterisks that was found.
fn strip_markers(s: &str) -> (String, usize) {
    let mut longest = 0;
    let mut run = 0;
    for c in s.chars() {
        if c == '*' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    (s.replace('*', "").trim().to_string(), longest)
}

impl Parser {
    fn new() -> Self {
        Parser::default()
    }

    fn parse_page(&mut self, page: &Page, trace: bool) -> Vec<Instruction> {
        let mut table: Option<Table> = None;
        let mut row: Option<Row> = None;
        let mut rows: Vec<Row> = Vec::new();
        let mut notes: BTreeMap<usize, String> = BTreeMap::new();
        let mut note: Option<usize> = None;

        for line in lines(page) {
            let cells = chunks(&line);
            let first = match cells.first() {
                Some((_, first)) => first.clone(),
                None => continue,
            };
            if trace {
                trace!("page {} line: {:?}", page.number, cells);
            }
            if is_running_header(&first) {
                continue;
            }

            let max_size = line.iter().map(|t| t.size).fold(0.0, f64::max);
            if max_size >= HEADING_SIZE && first.contains('—') {
                rows.extend(row.take());
                table = None;
                note = None;
                self.name = first.split('—').next().unwrap_or("").trim().to_string();
                debug!("page {}: section {}", page.number, self.name);
                continue;
            }

            if is_header(&cells) {
                rows.extend(row.take());
                note = None;
                // usability is checked once multi-line titles are complete
                table = Some(Table::new(cells));
                continue;
            }

            if let Some(t) = &mut table {
                if t.in_header {
                    if is_header_continuation(&cells) {
                        t.extend_header(cells);
                        continue;
                    }
                    t.in_header = false;
                    if !t.is_usable() {
                        debug!("page {}: ignoring table with columns {:?}", page.number, t.titles);
                        table = None;
                    }
                }
            }

            if first.starts_with('*') {
                rows.extend(row.take());
                table = None;
                let count = first.chars().take_while(|&c| c == '*').count();
                let text = first[count..].trim().to_string();
                let rest: Vec<_> = cells[1..].iter().map(|(_, t)| t.as_str()).collect();
                let mut text = text;
                append(&mut text, &rest.join(" "));
                notes.insert(count, text);
                note = Some(count);
                continue;
            }

            if is_terminator(&first) {
                rows.extend(row.take());
                table = None;
                note = None;
                continue;
            }

            match &table {
                Some(t) => self.data_line(t, &line, &mut row, &mut rows, page.number),
                None => {
                    // footnotes can wrap onto several lines
                    if let Some(n) = note {
                        let text: Vec<_> = cells.iter().map(|(_, t)| t.as_str()).collect();
                        if let Some(existing) = notes.get_mut(&n) {
                            append(existing, &text.join(" "));
                        }
                    }
                }
            }
        }
        rows.extend(row.take());

        rows.into_iter()
            .filter_map(|row| self.finish(row, &notes))
            .collect()
    }

    /// Feeds one line of a table body into the row under construction.
    fn data_line(&mut self, t: &Table, line: &[Text], row: &mut Option<Row>, rows: &mut Vec<Row>, page: u32) {
        let cells = t.cells(line);

        if let Some(oc) = t.index(Column::OpcodeInstruction) {
            let text = &cells[oc];
            let has_syntax = row.as_ref().map_or(true, |r| !r.syntax.is_empty());
            if starts_opcode(text) && has_syntax {
                rows.extend(row.take());
                *row = Some(Row { page, opcode: text.clone(), ..Row::default() });
            } else if let Some(r) = row.as_mut() {
                if r.syntax.is_empty() && is_opcode_text(text) {
                    append(&mut r.opcode, text);
                } else {
                    append(&mut r.syntax, text);
                }
            }
        } else if let (Some(oc), Some(ic)) = (t.index(Column::Opcode), t.index(Column::Instruction)) {
            let has_syntax = row.as_ref().map_or(true, |r| !r.syntax.is_empty());
            if starts_opcode(&cells[oc]) && starts_mnemonic(&cells[ic]) && has_syntax {
                rows.extend(row.take());
                *row = Some(Row { page, ..Row::default() });
            }
        }

        let r = match row.as_mut() {
            Some(r) => r,
            None => {
                debug!("page {}: text outside of a row: {:?}", page, cells);
                return;
            }
        };
        for (kind, text) in t.kinds.iter().zip(&cells) {
            if let Some(field) = r.field(*kind) {
                append(field, text);
            }
        }
    }

    /// Turns the collected cell text into a record.
    fn finish(&mut self, row: Row, notes: &BTreeMap<usize, String>) -> Option<Instruction> {
        let page = Some(row.page);
        let (opcode, m1) = strip_markers(&row.opcode);
        let (syntax, m2) = strip_markers(&row.syntax);
        let opcode = clean_opcode(&opcode);
        let syntax = clean_syntax(&syntax);

        if opcode.is_empty() || syntax.is_empty() {
            self.diags.push(page, DiagnosticKind::MalformedRow,
                format!("row without opcode or instruction: '{}' '{}'", opcode, syntax));
            return None;
        }

        let (v64, v32) = if row.valid6432.is_empty() {
            (row.valid64.clone(), row.valid32.clone())
        } else {
            let mut parts = row.valid6432.splitn(2, '/');
            let v64 = parts.next().unwrap_or("").to_string();
            let v32 = parts.next().unwrap_or("").to_string();
            (v64, v32)
        };
        let (v64, m3) = strip_markers(&v64);
        let (v32, m4) = strip_markers(&v32);
        let (valid64, valid32) = match (v64.parse::<Validity>(), v32.parse::<Validity>()) {
            (Ok(v64), Ok(v32)) => (v64, v32),
            (Err(e), _) | (_, Err(e)) => {
                self.diags.push(page, DiagnosticKind::MalformedRow, format!("{}: {}", syntax, e));
                return None;
            }
        };

        let marker = m1.max(m2).max(m3).max(m4);
        let (_, args) = split_syntax(&syntax);
        let inst = Instruction {
            page,
            seq: self.seq,
            name: self.name.clone(),
            opcode,
            syntax,
            args,
            op_en: strip_markers(&row.op_en).0,
            valid32,
            valid64,
            cpuid: clean_cpuid(&strip_markers(&row.cpuid).0),
            desc: row.desc.split_whitespace().collect::<Vec<_>>().join(" "),
            compat: if marker > 0 { notes.get(&marker).cloned().unwrap_or_default() } else { String::new() },
            ..Instruction::new("", "")
        };
        self.seq += 1;
        debug!("page {}: {} | {}", row.page, inst.opcode, inst.syntax);
        Some(inst)
    }
}
