//! Alternate assembler spellings.
//!
//! Both the Go assembler and GNU `as` (in AT&T mode) write operands in the
//! opposite order from the Intel syntax and spell the operand size in the
//! mnemonic instead of in the operands. They differ in a handful of naming
//! conventions, which are the hooks of the `Dialect` trait.

use super::size::{gp_width, is_integer};
use crate::inst::Instruction;
use crate::operand::{Kind, MemType, Operand};

/// Intel condition code suffixes and their Go spellings.
const CONDITIONS: &[(&str, &str)] = &[
    ("A", "HI"), ("AE", "CC"), ("B", "CS"), ("BE", "LS"), ("C", "CS"), ("E", "EQ"),
    ("G", "GT"), ("GE", "GE"), ("L", "LT"), ("LE", "LE"), ("NA", "LS"), ("NAE", "CS"),
    ("NB", "CC"), ("NBE", "HI"), ("NC", "CC"), ("NE", "NE"), ("NG", "LE"), ("NGE", "LT"),
    ("NL", "GE"), ("NLE", "GT"), ("NO", "OC"), ("NP", "PC"), ("NS", "PL"), ("NZ", "NE"),
    ("O", "OS"), ("P", "PS"), ("PE", "PS"), ("PO", "PC"), ("S", "MI"), ("Z", "EQ"),
];

fn go_condition(cc: &str) -> Option<&'static str> {
    CONDITIONS.iter().find(|(intel, _)| *intel == cc).map(|(_, go)| *go)
}

/// Operand-free string and stack instructions using a `D` suffix for 32-bit
/// operands, which both dialects spell with `L`.
const D_SUFFIXED: &[&str] = &[
    "MOVS", "CMPS", "INS", "OUTS", "LODS", "STOS", "SCAS", "IRET", "PUSHA", "POPA", "PUSHF", "POPF",
];

fn size_letter(bits: u32) -> Option<&'static str> {
    Some(match bits {
        8 => "B",
        16 => "W",
        32 => "L",
        64 => "Q",
        _ => return None,
    })
}

/// Naming conventions of an assembler.
pub trait Dialect {
    /// Spells a mnemonic that needs no renaming.
    fn word(&self, s: &str) -> String;

    /// Spells a known Intel condition code.
    fn condition(&self, cc: &str) -> String;

    /// Spells `CMOVcc` with the given size letter.
    fn cmov(&self, size: &str, cc: &str) -> String;

    /// Spells `MOVZX`/`MOVSX`/`MOVSXD`.
    fn extend(&self, src: &str, dst: &str, signed: bool) -> String;

    /// Spells the accumulator conversions (`CBW`, `CDQ`, ...).
    fn convert(&self, mnemonic: &str) -> String;

    /// Suffix for an x87 memory operand type.
    fn x87(&self, mem: MemType, bits: u32) -> Option<&'static str>;

    /// Spells the far return.
    fn far_return(&self) -> String;

    /// Spells a far `CALL` or `JMP`.
    fn far(&self, base: &str) -> String {
        self.word(&format!("L{}", base))
    }

    /// Renders the complete instruction.
    fn render(&self, inst: &Instruction, ops: &[Operand]) -> String {
        let mnemonic = inst.mnemonic();
        let (prefix, base) = match mnemonic.rfind(' ') {
            Some(i) => (&mnemonic[..i + 1], &mnemonic[i + 1..]),
            None => ("", mnemonic),
        };

        let mut out = self.word(prefix);
        out.push_str(&rename(self, base, inst, ops));
        if !inst.args.is_empty() {
            out.push(' ');
            let args: Vec<_> = inst.args.iter().rev().map(|a| a.as_str()).collect();
            out.push_str(&args.join(", "));
        }
        out
    }
}

/// Whether the operand size is appended to the mnemonic.
fn takes_suffix(base: &str, ops: &[Operand]) -> bool {
    let branch = ["J", "CALL", "LOOP", "SET", "RET"].iter().any(|p| base.starts_with(p));
    !branch && is_integer(ops) && gp_width(ops) != 0
}

fn rename<D: Dialect + ?Sized>(d: &D, base: &str, inst: &Instruction, ops: &[Operand]) -> String {
    let far = ops.iter().any(|op| op.kind == Kind::FarPtr || op.kind == Kind::Mem(MemType::Far));
    if far && (base == "CALL" || base == "JMP") {
        return d.far(base);
    }
    if base == "RETF" {
        return d.far_return();
    }

    if base != "JMP" && base.starts_with('J') && go_condition(&base[1..]).is_some() {
        return format!("{}{}", d.word("J"), d.condition(&base[1..]));
    }
    if let Some(cc) = base.strip_prefix("SET") {
        if go_condition(cc).is_some() {
            return format!("{}{}", d.word("SET"), d.condition(cc));
        }
    }
    if let Some(cc) = base.strip_prefix("CMOV") {
        if let (Some(_), Some(size)) = (go_condition(cc), size_letter(gp_width(ops))) {
            return d.cmov(size, cc);
        }
    }

    match (base, ops) {
        ("MOVZX", [dst, src]) | ("MOVSX", [dst, src]) | ("MOVSXD", [dst, src]) => {
            if let (Some(dst), Some(src)) = (size_letter(dst.bits), size_letter(src.bits)) {
                return d.extend(src, dst, base != "MOVZX");
            }
        }
        ("CBW", []) | ("CWDE", []) | ("CDQE", []) | ("CWD", []) | ("CDQ", []) | ("CQO", []) => {
            return d.convert(base);
        }
        _ => {}
    }

    if inst.args.is_empty() {
        if let Some(stem) = base.strip_suffix('D') {
            if D_SUFFIXED.contains(&stem) {
                return d.word(&format!("{}L", stem));
            }
        }
        return d.word(base);
    }

    for op in ops {
        if let Kind::Mem(mem) = op.kind {
            if let Some(suffix) = d.x87(mem, op.bits) {
                return format!("{}{}", d.word(base), suffix);
            }
        }
    }

    match size_letter(gp_width(ops)) {
        Some(size) if takes_suffix(base, ops) => format!("{}{}", d.word(base), d.word(size)),
        _ => d.word(base),
    }
}

/// The Go assembler.
#[derive(Debug, Copy, Clone)]
pub struct Go;

impl Dialect for Go {
    fn word(&self, s: &str) -> String {
        s.to_string()
    }

    fn condition(&self, cc: &str) -> String {
        go_condition(cc).unwrap_or(cc).to_string()
    }

    fn cmov(&self, size: &str, cc: &str) -> String {
        format!("CMOV{}{}", size, self.condition(cc))
    }

    fn extend(&self, src: &str, dst: &str, signed: bool) -> String {
        format!("MOV{}{}{}", src, dst, if signed { "SX" } else { "ZX" })
    }

    fn convert(&self, mnemonic: &str) -> String {
        mnemonic.to_string()
    }

    fn x87(&self, mem: MemType, bits: u32) -> Option<&'static str> {
        match (mem, bits) {
            (MemType::Float, 32) => Some("F"),
            (MemType::Float, 64) => Some("D"),
            (MemType::Float, 80) => Some("X"),
            (MemType::Int, 16) => Some("W"),
            (MemType::Int, 32) => Some("L"),
            (MemType::Int, 64) => Some("Q"),
            _ => None,
        }
    }

    fn far_return(&self) -> String {
        "RETF".to_string()
    }
}

/// GNU `as` in AT&T mode.
#[derive(Debug, Copy, Clone)]
pub struct Gnu;

impl Dialect for Gnu {
    fn word(&self, s: &str) -> String {
        s.to_ascii_lowercase()
    }

    fn condition(&self, cc: &str) -> String {
        cc.to_ascii_lowercase()
    }

    fn cmov(&self, size: &str, cc: &str) -> String {
        format!("cmov{}{}", self.condition(cc), self.word(size))
    }

    fn extend(&self, src: &str, dst: &str, signed: bool) -> String {
        format!("mov{}{}{}", if signed { "s" } else { "z" }, self.word(src), self.word(dst))
    }

    fn convert(&self, mnemonic: &str) -> String {
        let att = match mnemonic {
            "CBW" => "cbtw",
            "CWDE" => "cwtl",
            "CDQE" => "cltq",
            "CWD" => "cwtd",
            "CDQ" => "cltd",
            "CQO" => "cqto",
            other => return other.to_ascii_lowercase(),
        };
        att.to_string()
    }

    fn x87(&self, mem: MemType, bits: u32) -> Option<&'static str> {
        match (mem, bits) {
            (MemType::Float, 32) => Some("s"),
            (MemType::Float, 64) => Some("l"),
            (MemType::Float, 80) => Some("t"),
            (MemType::Int, 16) => Some("s"),
            (MemType::Int, 32) => Some("l"),
            (MemType::Int, 64) => Some("ll"),
            _ => None,
        }
    }

    fn far_return(&self) -> String {
        "lret".to_string()
    }
}
