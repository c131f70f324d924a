//! Corrections that need to see the whole table.

use crate::error::{DiagnosticKind, Diagnostics};
use crate::inst::{Instruction, Validity};
use crate::operand::{Kind, MemType, Operand, Select};

use std::collections::HashSet;

/// String instructions, whose memory operands are addressed implicitly.
const FIXED_ADDRESSING: &[&str] = &["MOVS", "CMPS", "STOS", "LODS", "SCAS", "INS", "OUTS"];

fn width_suffix(bits: u32) -> Option<&'static str> {
    Some(match bits {
        8 => "B",
        16 => "W",
        32 => "D",
        64 => "Q",
        _ => return None,
    })
}

/// Operand width of a string instruction: taken from its memory operand, or
/// from the accumulator or `r/m` operand the manual writes in its place
/// (`LODS AL`, `OUTS DX, r/m8`).
fn string_width(ops: &[Operand]) -> Option<u32> {
    let mem = ops.iter().find(|op| op.kind == Kind::Mem(MemType::Plain) && op.bits != 0);
    let reg = || ops.iter().find(|op| {
        op.kind == Kind::Accumulator || (op.kind == Kind::Gpr && op.select == Select::RegOrMem)
    });
    mem.or_else(reg).map(|op| op.bits)
}

/// Returns the operand-free spelling of a fixed addressing form, or `None` if
/// `inst` isn't one.
pub(crate) fn canonical_form(inst: &Instruction) -> Option<Result<String, String>> {
    let mnemonic = inst.mnemonic();
    if mnemonic == "XLAT" && !inst.args.is_empty() {
        return Some(Ok("XLATB".to_string()));
    }
    if !FIXED_ADDRESSING.contains(&mnemonic) || inst.args.is_empty() {
        return None;
    }
    let ops: Vec<_> = inst.args.iter().filter_map(|a| Operand::parse(a)).collect();
    Some(match string_width(&ops).and_then(width_suffix) {
        Some(suffix) => Ok(format!("{}{}", mnemonic, suffix)),
        None => Err(format!("unknown operand width in {}", inst.syntax)),
    })
}

/// Replaces the explicit-operand spellings of string instructions (`MOVS m8,
/// m8`) by the operand-free ones (`MOVSB`).
///
/// If the table has no operand-free form for a width, one is synthesized from
/// the explicit form.
pub fn collapse_fixed_addressing(insts: Vec<Instruction>, diags: &mut Diagnostics) -> Vec<Instruction> {
    let mut present: HashSet<(String, String)> = insts.iter()
        .filter(|i| i.args.is_empty())
        .map(|i| (i.syntax.clone(), i.opcode.clone()))
        .collect();

    let mut out = Vec::with_capacity(insts.len());
    for inst in insts {
        match canonical_form(&inst) {
            None => out.push(inst),
            Some(Err(why)) => {
                diags.push(inst.page, DiagnosticKind::RuleMismatch, format!("fixed-addressing: {}", why));
                out.push(inst);
            }
            Some(Ok(syntax)) => {
                if present.insert((syntax.clone(), inst.opcode.clone())) {
                    debug!("synthesized {} ({}) from {}", syntax, inst.opcode, inst.syntax);
                    let mut new = inst;
                    new.set_syntax(syntax);
                    out.push(new);
                } else {
                    trace!("dropped {} ({})", inst.syntax, inst.opcode);
                }
            }
        }
    }
    out
}

macro_rules! undocumented {
    ( $( $opcode:literal $syntax:literal $v32:ident $v64:ident $desc:literal; )* ) => {
        &[ $( ($opcode, $syntax, Validity::$v32, Validity::$v64, $desc), )* ]
    };
}

/// Encodings that processors implement but the manual doesn't list (or lists
/// in prose only).
static UNDOCUMENTED: &[(&str, &str, Validity, Validity, &str)] = undocumented! {
    "F1"        "INT1"              Valid Valid     "Generate debug trap.";
    "D6"        "SALC"              Valid Invalid   "Set AL to CF.";
    "DF C0+i"   "FFREEP ST(i)"      Valid Valid     "Free ST(i) and pop the register stack.";
    "0F FF /r"  "UD0 r32, r/m32"    Valid Valid     "Raise invalid opcode exception.";
    "0F B9 /r"  "UD1 r32, r/m32"    Valid Valid     "Raise invalid opcode exception.";
};

/// Adds the undocumented encodings the table doesn't already contain.
pub fn inject_undocumented(mut insts: Vec<Instruction>) -> Vec<Instruction> {
    let mut seq = insts.iter().map(|i| i.seq).max().map_or(0, |max| max + 1);
    for &(opcode, syntax, valid32, valid64, desc) in UNDOCUMENTED {
        if insts.iter().any(|i| i.syntax == syntax) {
            continue;
        }
        let mut inst = Instruction::new(opcode, syntax);
        inst.seq = seq;
        inst.name = inst.mnemonic().to_string();
        inst.valid32 = valid32;
        inst.valid64 = valid64;
        inst.desc = desc.to_string();
        debug!("adding undocumented {} ({})", syntax, opcode);
        insts.push(inst);
        seq += 1;
    }
    insts
}

/// Tags records that must not be emitted.
///
/// A record is `pseudo` if an earlier record has the same syntax, opcode,
/// validity and feature flags. A `REX + ` form is `pseudo64` if the same
/// syntax is also encodable without the REX prefix (which only exists to
/// reach the new byte registers).
pub fn mark_duplicates(mut insts: Vec<Instruction>) -> Vec<Instruction> {
    let mut seen = HashSet::new();
    for inst in &mut insts {
        if inst.is_pseudo() {
            continue;
        }
        let key = (inst.syntax.clone(), inst.opcode.clone(), inst.valid32, inst.valid64, inst.cpuid.clone());
        if !seen.insert(key) {
            trace!("duplicate {} ({})", inst.syntax, inst.opcode);
            inst.tags.insert("pseudo");
        }
    }

    let plain: HashSet<(String, String)> = insts.iter()
        .filter(|i| !i.is_pseudo() && !i.has_rex())
        .map(|i| (i.syntax.clone(), i.opcode.clone()))
        .collect();
    for inst in &mut insts {
        if inst.is_pseudo() {
            continue;
        }
        if let Some(rest) = inst.opcode.strip_prefix("REX + ") {
            if plain.contains(&(inst.syntax.clone(), rest.to_string())) {
                inst.tags.insert("pseudo64");
            }
        }
    }
    insts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(insts: &[Instruction]) -> Vec<(&str, &str)> {
        insts.iter()
            .filter(|i| !i.is_pseudo())
            .map(|i| (i.syntax.as_str(), i.opcode.as_str()))
            .collect()
    }

    #[test]
    fn collapse_string_forms() {
        let mut diags = Diagnostics::new();
        let insts = vec![
            Instruction::new("A4", "MOVS m8, m8"),
            Instruction::new("A5", "MOVS m16, m16"),
            Instruction::new("A5", "MOVSW"),
            Instruction::new("D7", "XLAT m8"),
            Instruction::new("D7", "XLATB"),
            Instruction::new("AC", "LODS m8"),
            Instruction::new("AC", "LODS m8"),
        ];
        let out = collapse_fixed_addressing(insts, &mut diags);
        assert!(diags.is_empty());
        let syntaxes: Vec<_> = out.iter().map(|i| i.syntax.as_str()).collect();
        assert_eq!(syntaxes, vec!["MOVSB", "MOVSW", "XLATB", "LODSB"]);
        assert!(out[0].args.is_empty());
    }

    #[test]
    fn collapse_register_spellings() {
        let mut diags = Diagnostics::new();
        let insts = vec![
            Instruction::new("AC", "LODS m8"),
            Instruction::new("AC", "LODS AL"),
            Instruction::new("6D", "INS m32, DX"),
            Instruction::new("6D", "INS r/m32, DX"),
            Instruction::new("6F", "OUTS DX, r/m16"),
        ];
        let out = collapse_fixed_addressing(insts, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        let syntaxes: Vec<_> = out.iter().map(|i| i.syntax.as_str()).collect();
        assert_eq!(syntaxes, vec!["LODSB", "INSD", "OUTSW"]);
    }

    #[test]
    fn collapse_unknown_width() {
        let mut diags = Diagnostics::new();
        let out = collapse_fixed_addressing(vec![Instruction::new("6E", "OUTS DX, m")], &mut diags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].syntax, "OUTS DX, m");
        assert_eq!(diags.count(DiagnosticKind::RuleMismatch), 1);
    }

    #[test]
    fn undocumented_added_once() {
        let mut salc = Instruction::new("D6", "SALC");
        salc.seq = 7;
        let out = inject_undocumented(vec![salc]);
        assert_eq!(out.iter().filter(|i| i.syntax == "SALC").count(), 1);
        let int1 = out.iter().find(|i| i.syntax == "INT1").unwrap();
        assert_eq!(int1.page, None);
        assert!(int1.seq > 7);
        let ffreep = out.iter().find(|i| i.opcode == "DF C0+i").unwrap();
        assert_eq!(ffreep.args, vec!["ST(i)"]);
    }

    #[test]
    fn duplicates() {
        let mut rex = Instruction::new("REX + 88 /r", "MOV r/m8, r8");
        rex.valid32 = Validity::Invalid;
        let mut rex_only = Instruction::new("REX + 0F B6 /r", "MOVZX r32, r/m8");
        rex_only.valid32 = Validity::Invalid;
        let insts = vec![
            Instruction::new("88 /r", "MOV r/m8, r8"),
            rex,
            Instruction::new("AC", "LODSB"),
            Instruction::new("AC", "LODSB"),
            rex_only,
        ];
        let out = mark_duplicates(insts);
        assert_eq!(emitted(&out), vec![
            ("MOV r/m8, r8", "88 /r"),
            ("LODSB", "AC"),
            ("MOVZX r32, r/m8", "REX + 0F B6 /r"),
        ]);
        assert!(out[1].tags.contains("pseudo64"));
        assert!(out[3].tags.contains("pseudo"));
    }
}
