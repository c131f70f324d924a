//! Serialization of the final table.
//!
//! Every record becomes one line of comma-separated, always-quoted fields:
//!
//! ```text
//! "SHR r/m32, imm8","SHRL imm8, r/m32","shrl imm8, r/m32","C1 /5 ib","V","V","","operand32","rw,r","Y","32"
//! ```
//!
//! The columns are Intel syntax, Go syntax, GNU syntax, opcode, 32-bit and
//! 64-bit validity, CPUID feature flags, tags, actions, multisize and data
//! size. There is no header line.

use crate::inst::Instruction;

use std::io::{self, Write};

/// Appends `s` as a quoted field, doubling embedded quotes.
fn quote(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Formats a single record as a line (without the trailing newline).
///
/// With `compat` set, the compatibility note is added as a 12th column.
pub fn line(inst: &Instruction, compat: bool) -> String {
    let actions: Vec<_> = inst.action.iter().map(|a| a.as_str()).collect();
    let datasize = match inst.datasize {
        0 => String::new(),
        n => n.to_string(),
    };

    let mut fields = vec![
        inst.syntax.clone(),
        inst.go_syntax.clone(),
        inst.gnu_syntax.clone(),
        inst.opcode.clone(),
        inst.valid32.to_string(),
        inst.valid64.to_string(),
        inst.cpuid.clone(),
        inst.tags.to_string(),
        actions.join(","),
        if inst.multisize { "Y" } else { "" }.to_string(),
        datasize,
    ];
    if compat {
        fields.push(inst.compat.clone());
    }

    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i != 0 {
            out.push(',');
        }
        quote(&mut out, field);
    }
    out
}

/// Writes all records not tagged `pseudo` or `pseudo64`, one per line.
pub fn write<W: Write>(mut w: W, insts: &[Instruction], compat: bool) -> io::Result<()> {
    for inst in insts.iter().filter(|i| !i.is_pseudo()) {
        writeln!(w, "{}", line(inst, compat))?;
    }
    w.flush()
}
