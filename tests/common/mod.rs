//! Synthetic manual pages in the layout of the instruction reference.

use x86spec::source::{MemoryDocument, Page, Text};

/// Left edges of the opcode, instruction, op/en, 64-bit mode, compat/legacy
/// mode and description columns.
const COLUMNS: [f64; 6] = [20.0, 130.0, 260.0, 300.0, 360.0, 450.0];

const HEADER: Row = ["Opcode", "Instruction", "Op/En", "64-Bit Mode", "Compat/Leg Mode", "Description"];

/// Cell text of one table row, in column order.
pub type Row = [&'static str; 6];

fn line(y: f64, row: &Row) -> Vec<Text> {
    COLUMNS.iter()
        .zip(row.iter())
        .filter(|(_, s)| !s.is_empty())
        .map(|(&x, s)| Text::new(x, y, s))
        .collect()
}

/// Builds the first page of an instruction's section: the heading, the
/// encoding table and optional footnotes below it.
pub fn page(heading: &str, rows: &[Row], notes: &[&str]) -> Page {
    let mut texts = vec![
        Text::new(20.0, 760.0, "INSTRUCTION SET REFERENCE, A-L"),
        Text::new(20.0, 730.0, heading).with_size(14.0),
    ];
    texts.extend(line(700.0, &HEADER));
    let mut y = 680.0;
    for row in rows {
        texts.extend(line(y, row));
        y -= 12.0;
    }
    for note in notes {
        y -= 12.0;
        texts.push(Text::new(20.0, y, note));
    }
    texts.push(Text::new(20.0, 20.0, "Vol. 2A 3-123"));
    Page { number: 0, texts }
}

/// A small manual covering shifts, string moves, the repeat prefixes and HLT.
pub fn manual() -> MemoryDocument {
    MemoryDocument::new(vec![
        page("SAL/SAR/SHL/SHR—Shift", &[
            ["D0 /4", "SHR r/m8, 1", "M1", "Valid", "Valid", "Unsigned divide r/m8 by 2, once."],
            ["REX + D0 /4", "SHR r/m8, 1", "M1", "Valid", "N.E.", "Unsigned divide r/m8 by 2, once."],
            ["C1 /4 ib", "SHR r/m16, imm8", "MI", "Valid", "Valid", "Unsigned divide r/m16 by 2, imm8 times."],
            ["C1 /4 ib", "SHR r/m32, imm8", "MI", "Valid", "Valid", "Unsigned divide r/m32 by 2, imm8 times."],
            ["REX.W + C1 /4 ib", "SHR r/m64, imm8", "MI", "Valid", "N.E.", "Unsigned divide r/m64 by 2, imm8 times."],
        ], &[]),
        page("MOVS/MOVSB/MOVSW/MOVSD/MOVSQ—Move Data from String to String", &[
            ["A4", "MOVS m8, m8", "ZO", "Valid", "Valid", "Move byte from address DS:(E)SI to ES:(E)DI."],
            ["A4", "MOVSB", "ZO", "Valid", "Valid", "Move byte from address DS:(E)SI to ES:(E)DI."],
        ], &[]),
        page("REP/REPE/REPZ/REPNE/REPNZ—Repeat String Operation Prefix", &[
            ["F3 A4", "REP MOVS m8, m8", "ZO", "Valid", "Valid", "Move (E)CX bytes from DS:[(E)SI] to ES:[(E)DI]."],
            ["F3 AC", "REP LODS AL", "ZO", "Valid", "Valid", "Load (E)CX bytes from DS:[(E)SI] to AL."],
        ], &[]),
        page("HLT—Halt", &[
            ["F4", "HLT*", "ZO", "Valid", "Valid", "Halt"],
        ], &["* Halts the \"processor\"."]),
    ])
}
