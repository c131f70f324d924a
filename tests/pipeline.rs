extern crate x86spec;

mod common;

use x86spec::inst::split_syntax;
use x86spec::source::{MemoryDocument, Page};
use x86spec::{load_document, Config, Error, Table};

fn table(config: &Config) -> Table {
    load_document(&common::manual(), config).unwrap()
}

fn csv(table: &Table) -> String {
    let mut out = Vec::new();
    table.write_csv(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

/// Splits an emitted line into its fields, undoing the quoting.
fn fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        assert_eq!(chars.next(), Some('"'), "unquoted field in {}", line);
        let mut field = String::new();
        loop {
            match chars.next() {
                Some('"') if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                Some('"') => break,
                Some(c) => field.push(c),
                None => panic!("unterminated field in {}", line),
            }
        }
        fields.push(field);
        match chars.next() {
            Some(',') => continue,
            None => return fields,
            Some(c) => panic!("unexpected {:?} after a field in {}", c, line),
        }
    }
}

fn rows(csv: &str) -> Vec<Vec<String>> {
    csv.lines().map(fields).collect()
}

#[test]
fn shift_example() {
    let table = table(&Config::default());
    assert!(table.diagnostics.is_empty(), "{:?}", table.diagnostics);
    let out = csv(&table);
    assert!(
        out.lines().any(|l| l == r#""SHR r/m32, imm8","SHRL imm8, r/m32","shrl imm8, r/m32","C1 /5 ib","V","V","","operand32","rw,r","Y","32""#),
        "{}", out
    );
}

#[test]
fn deterministic() {
    let config = Config::default();
    assert_eq!(csv(&table(&config)), csv(&table(&config)));
}

#[test]
fn column_invariant() {
    let out = csv(&table(&Config::default()));
    assert!(!out.is_empty());
    for line in out.lines() {
        assert_eq!(fields(line).len(), 11, "{}", line);
        assert!(line.ends_with('"'), "{}", line);
    }
}

#[test]
fn actions_align_with_operands() {
    for row in rows(&csv(&table(&Config::default()))) {
        let operands = split_syntax(&row[0]).1.len();
        let actions = if row[8].is_empty() { 0 } else { row[8].split(',').count() };
        assert_eq!(operands, actions, "{:?}", row);
    }
}

#[test]
fn validity_vocabulary() {
    const CODES: &[&str] = &["V", "I", "N.E.", "N.P.", "N.S.", "N.I."];
    for row in rows(&csv(&table(&Config::default()))) {
        assert!(CODES.contains(&&*row[4]), "{:?}", row);
        assert!(CODES.contains(&&*row[5]), "{:?}", row);
    }
}

#[test]
fn pseudo_records_are_not_emitted() {
    let table = table(&Config::default());
    assert!(table.insts.iter().any(|i| i.tags.contains("pseudo64")));
    for row in rows(&csv(&table)) {
        assert!(!row[7].split(',').any(|t| t == "pseudo" || t == "pseudo64"), "{:?}", row);
    }
    // the REX form of SHR r/m8 is redundant
    let shr8: Vec<_> = rows(&csv(&table)).into_iter().filter(|r| r[0] == "SHR r/m8, 1").collect();
    assert_eq!(shr8.len(), 1);
    assert_eq!(shr8[0][3], "D0 /5");
}

#[test]
fn repeat_prefix_collapses() {
    let rows = rows(&csv(&table(&Config::default())));
    assert!(rows.iter().all(|r| !r[0].starts_with("REP")));
    let movsb: Vec<_> = rows.iter().filter(|r| r[0] == "MOVSB").collect();
    assert_eq!(movsb.len(), 1);
    assert_eq!(movsb[0][3], "A4");
    assert_eq!(movsb[0][10], "8");
    assert!(rows.iter().all(|r| !r[0].starts_with("MOVS ")));

    // only listed with the prefix, and with a register instead of m8
    let lodsb: Vec<_> = rows.iter().filter(|r| r[0].starts_with("LODS")).collect();
    assert_eq!(lodsb.len(), 1);
    assert_eq!((&*lodsb[0][0], &*lodsb[0][3], &*lodsb[0][10]), ("LODSB", "AC", "8"));
}

#[test]
fn sorted_by_syntax() {
    let rows = rows(&csv(&table(&Config::default())));
    let syntaxes: Vec<_> = rows.iter().map(|r| r[0].as_bytes()).collect();
    let mut sorted = syntaxes.clone();
    sorted.sort();
    assert_eq!(syntaxes, sorted);
}

#[test]
fn unset_datasize_is_empty() {
    let rows = rows(&csv(&table(&Config::default())));
    let hlt = rows.iter().find(|r| r[0] == "HLT").unwrap();
    assert_eq!(hlt[10], "");
    assert_eq!(hlt[9], "");
}

#[test]
fn compat_column() {
    let config = Config { compat: true, ..Config::default() };
    let rows = rows(&csv(&table(&config)));
    assert!(rows.iter().all(|r| r.len() == 12));
    let hlt = rows.iter().find(|r| r[0] == "HLT").unwrap();
    assert_eq!(hlt[11], "Halts the \"processor\".");
}

#[test]
fn undocumented_opcodes_are_added() {
    let rows = rows(&csv(&table(&Config::default())));
    let salc = rows.iter().find(|r| r[0] == "SALC").unwrap();
    assert_eq!((&*salc[3], &*salc[4], &*salc[5]), ("D6", "V", "I"));
}

#[test]
fn debug_pages_restrict_parsing() {
    let config = Config { debug_pages: vec![1], ..Config::default() };
    let rows = rows(&csv(&table(&config)));
    assert!(rows.iter().any(|r| r[0] == "SHR r/m32, imm8"));
    assert!(rows.iter().all(|r| r[0] != "MOVSB" && r[0] != "HLT"));
}

#[test]
fn empty_document_is_fatal() {
    let doc = MemoryDocument::new(vec![Page::default(), Page::default()]);
    match load_document(&doc, &Config::default()) {
        Err(Error::Unrecognized(_)) => {}
        other => panic!("unexpected result: {:?}", other.map(|t| t.insts.len())),
    }
}
