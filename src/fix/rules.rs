//! Per-record corrections.

use super::tables::canonical_form;
use super::{Fix, Mismatch, Rule};
use crate::inst::{Instruction, Validity};
use crate::operand::{Kind, Operand, Select};

/// All per-record rules, in the order they are applied.
pub static RULES: &[&dyn Rule] = &[
    &StripRepeatPrefix,
    &EvexUnsupported,
    &FarReturn,
    &VexOperands,
    &GroupDigit,
    &CompleteModrm,
    &CompleteImmediate,
    &RexValid32,
    &ArchGeneration,
];

/// Opcode parts that come before the primary opcode byte.
fn is_prefix_part(part: &str) -> bool {
    match part {
        "+" | "66" | "F0" | "F2" | "F3" | "NP" | "NFx" | "9B" => true,
        _ => part.starts_with("REX"),
    }
}

/// Returns the first opcode byte that is not a prefix.
fn primary_byte(inst: &Instruction) -> Option<&str> {
    inst.opcode.split_whitespace().find(|part| !is_prefix_part(part))
}

/// Parts following the ModR/M specifier that encode immediates.
fn is_trailing_part(part: &str) -> bool {
    match part {
        "ib" | "iw" | "id" | "io" | "cb" | "cw" | "cd" | "cp" | "co" | "ct" | "/is4" => true,
        _ => false,
    }
}

fn replaced(inst: &Instruction, f: impl FnOnce(&mut Instruction)) -> Fix {
    let mut new = inst.clone();
    f(&mut new);
    Fix::Replace(vec![new])
}

/// `REP`/`REPE`/`REPNE` forms are written as prefixed copies of the plain
/// string instructions. They are reduced to the plain form, which makes them
/// duplicates that are dropped later. A form that doesn't reduce to a string
/// instruction of known width is dropped right away.
struct StripRepeatPrefix;

const REPEAT_WORDS: &[&str] = &["REP", "REPE", "REPZ", "REPNE", "REPNZ"];

impl Rule for StripRepeatPrefix {
    fn name(&self) -> &'static str { "strip-repeat-prefix" }

    fn matches(&self, inst: &Instruction) -> bool {
        inst.syntax.split_whitespace()
            .next()
            .map_or(false, |word| REPEAT_WORDS.contains(&word))
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let mut parts = inst.opcode_parts();
        let prefix = parts.iter().position(|p| *p == "F3" || *p == "F2")
            .ok_or_else(|| Mismatch::new("no F2/F3 byte in opcode"))?;
        parts.remove(prefix);
        let mut opcode = parts.join(" ");
        // `F3 REX.W AD` leaves a bare `REX.W`
        if opcode.starts_with("REX.W ") && !opcode.starts_with("REX.W +") {
            opcode.insert_str("REX.W".len(), " +");
        }

        let syntax = inst.syntax.trim_start();
        let syntax = syntax[syntax.find(' ').unwrap_or(syntax.len())..].trim_start().to_string();
        if syntax.is_empty() {
            return Err(Mismatch::new("nothing follows the prefix"));
        }
        let mut new = inst.clone();
        new.opcode = opcode;
        new.set_syntax(syntax);
        match canonical_form(&new) {
            Some(Ok(_)) => Ok(Fix::Replace(vec![new])),
            _ => Ok(Fix::Drop),
        }
    }
}

/// EVEX forms use operands (`zmm`, opmasks, broadcasts) that the table does
/// not describe.
struct EvexUnsupported;

impl Rule for EvexUnsupported {
    fn name(&self) -> &'static str { "evex-unsupported" }

    fn matches(&self, inst: &Instruction) -> bool {
        inst.opcode.starts_with("EVEX")
    }

    fn apply(&self, _: &Instruction) -> Result<Fix, Mismatch> {
        Ok(Fix::Drop)
    }
}

/// Far returns are listed as plain `RET`, only the description tells them
/// apart.
struct FarReturn;

impl Rule for FarReturn {
    fn name(&self) -> &'static str { "far-return" }

    fn matches(&self, inst: &Instruction) -> bool {
        inst.mnemonic() == "RET" && match primary_byte(inst) {
            Some("CB") | Some("CA") => true,
            _ => false,
        }
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let syntax = match inst.args.len() {
            0 => "RETF".to_string(),
            _ => format!("RETF {}", inst.args.join(", ")),
        };
        Ok(replaced(inst, |new| new.set_syntax(syntax)))
    }
}

/// Renames VEX operands to say which field encodes them: the `vvvv` register
/// becomes `xmmV` (or `r32V`), the register in bits 7:4 of the immediate
/// becomes `xmmI`, and the ModR/M register operand is renumbered to `2`.
struct VexOperands;

fn is_gp_vex_token(arg: &str) -> bool {
    match arg {
        "r32a" | "r32b" | "r64a" | "r64b" => true,
        _ => false,
    }
}

fn has_vector_reg(arg: &str, n: char) -> bool {
    (arg.starts_with("xmm") || arg.starts_with("ymm")) && arg[3..].starts_with(n)
}

impl Rule for VexOperands {
    fn name(&self) -> &'static str { "vex-operands" }

    fn matches(&self, inst: &Instruction) -> bool {
        if !(inst.opcode.starts_with("VEX") || inst.opcode.starts_with("XOP")) {
            return false;
        }
        inst.args.iter().any(|a| is_gp_vex_token(a))
            || (inst.args.len() >= 3
                && inst.args.iter().any(|a| has_vector_reg(a, '3') || has_vector_reg(a, '4')))
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let mut args = inst.args.clone();
        if args.iter().any(|a| is_gp_vex_token(a)) {
            for arg in &mut args {
                match &**arg {
                    "r32a" => *arg = "r32".to_string(),
                    "r64a" => *arg = "r64".to_string(),
                    "r32b" => *arg = "r32V".to_string(),
                    "r64b" => *arg = "r64V".to_string(),
                    _ => {}
                }
            }
        } else {
            match args.get(1).map(|a| &**a) {
                Some("xmm2") => args[1] = "xmmV".to_string(),
                Some("ymm2") => args[1] = "ymmV".to_string(),
                _ => return Err(Mismatch::new("second operand is not a vvvv register")),
            }
            for arg in args.iter_mut().skip(2) {
                if has_vector_reg(arg, '3') {
                    arg.replace_range(3..4, "2");
                } else if has_vector_reg(arg, '4') && arg.len() == 4 {
                    arg.replace_range(3..4, "I");
                }
            }
        }

        let (mnemonic, _) = crate::inst::split_syntax(&inst.syntax);
        let syntax = format!("{} {}", mnemonic, args.join(", "));
        Ok(replaced(inst, |new| new.set_syntax(syntax)))
    }
}

/// Instruction groups sharing an opcode byte, told apart by the ModR/M `reg`
/// field. The manual has several of these digits wrong.
struct GroupDigit;

const ALU: &[(&str, u8)] = &[
    ("ADD", 0), ("OR", 1), ("ADC", 2), ("SBB", 3), ("AND", 4), ("SUB", 5), ("XOR", 6), ("CMP", 7),
];

// SAL is an alias of SHL
const SHIFT: &[(&str, u8)] = &[
    ("ROL", 0), ("ROR", 1), ("RCL", 2), ("RCR", 3), ("SHL", 4), ("SAL", 4), ("SHR", 5), ("SAR", 7),
];

const UNARY: &[(&str, u8)] = &[
    ("TEST", 0), ("NOT", 2), ("NEG", 3), ("MUL", 4), ("IMUL", 5), ("DIV", 6), ("IDIV", 7),
];

const INC_DEC: &[(&str, u8)] = &[("INC", 0), ("DEC", 1)];

const INC_DEC_PUSH: &[(&str, u8)] = &[("INC", 0), ("DEC", 1), ("PUSH", 6)];

fn group_of(byte: &str) -> Option<&'static [(&'static str, u8)]> {
    Some(match byte {
        "80" | "81" | "83" => ALU,
        "C0" | "C1" | "D0" | "D1" | "D2" | "D3" => SHIFT,
        "F6" | "F7" => UNARY,
        "FE" => INC_DEC,
        "FF" => INC_DEC_PUSH,
        _ => return None,
    })
}

fn expected_digit(inst: &Instruction) -> Option<u8> {
    let group = group_of(primary_byte(inst)?)?;
    let mnemonic = inst.mnemonic().trim_start_matches("LOCK ");
    group.iter().find(|(name, _)| *name == mnemonic).map(|(_, digit)| *digit)
}

fn digit_of(part: &str) -> Option<u8> {
    let b = part.strip_prefix('/')?.as_bytes();
    match b {
        [d @ b'0'..=b'7'] => Some(d - b'0'),
        _ => None,
    }
}

impl Rule for GroupDigit {
    fn name(&self) -> &'static str { "group-digit" }

    fn matches(&self, inst: &Instruction) -> bool {
        expected_digit(inst).is_some()
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let expected = expected_digit(inst).ok_or_else(|| Mismatch::new("not a group opcode"))?;
        let mut parts = inst.opcode_parts();
        let pos = parts.iter().position(|p| digit_of(p).is_some() || *p == "/r")
            .ok_or_else(|| Mismatch::new("no ModR/M specifier"))?;
        if digit_of(parts[pos]) == Some(expected) {
            return Ok(Fix::Keep);
        }
        let digit = format!("/{}", expected);
        parts[pos] = &digit;
        let opcode = parts.join(" ");
        Ok(replaced(inst, |new| new.opcode = opcode))
    }
}

/// Some forms that take a ModR/M operand are missing the `/r` in their
/// opcode.
struct CompleteModrm;

/// Instructions whose memory operands are addressed implicitly.
const FIXED_ADDRESSING: &[&str] = &["MOVS", "CMPS", "STOS", "LODS", "SCAS", "INS", "OUTS", "XLAT"];

fn is_modrm_operand(op: &Operand) -> bool {
    match op.select {
        Select::Rm | Select::RegOrMem => true,
        _ => match op.kind {
            Kind::Mem(_) | Kind::Vsib => true,
            _ => false,
        },
    }
}

impl Rule for CompleteModrm {
    fn name(&self) -> &'static str { "complete-modrm" }

    fn matches(&self, inst: &Instruction) -> bool {
        if FIXED_ADDRESSING.contains(&inst.mnemonic()) {
            return false;
        }
        let parts = inst.opcode_parts();
        if parts.iter().any(|p| (p.starts_with('/') && *p != "/is4") || (p.contains('+') && *p != "+")) {
            return false;
        }
        inst.args.iter()
            .filter_map(|a| Operand::parse(a))
            .any(|op| is_modrm_operand(&op))
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let has_reg = inst.args.iter()
            .filter_map(|a| Operand::parse(a))
            .any(|op| op.select == Select::Reg);
        if !has_reg {
            return Err(Mismatch::new("no register operand, needs a /digit"));
        }

        let mut parts = inst.opcode_parts();
        let mut pos = parts.len();
        while pos > 0 && is_trailing_part(parts[pos - 1]) {
            pos -= 1;
        }
        parts.insert(pos, "/r");
        let opcode = parts.join(" ");
        Ok(replaced(inst, |new| new.opcode = opcode))
    }
}

/// Some forms with immediate operands are missing the `ib`/`iw`/`id` in
/// their opcode.
struct CompleteImmediate;

fn is_immediate_part(part: &str) -> bool {
    match part {
        "ib" | "iw" | "id" | "io" => true,
        _ => false,
    }
}

fn immediate_widths(inst: &Instruction) -> Vec<u32> {
    inst.args.iter()
        .filter_map(|a| Operand::parse(a))
        .filter(|op| op.kind == Kind::Imm)
        .map(|op| op.bits)
        .collect()
}

impl Rule for CompleteImmediate {
    fn name(&self) -> &'static str { "complete-immediate" }

    fn matches(&self, inst: &Instruction) -> bool {
        !inst.opcode_parts().iter().any(|p| is_immediate_part(p)) && !immediate_widths(inst).is_empty()
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let mut parts = inst.opcode_parts();
        for bits in immediate_widths(inst) {
            parts.push(match bits {
                8 => "ib",
                16 => "iw",
                32 => "id",
                64 => "io",
                _ => return Err(Mismatch::new(format!("no immediate code for {} bits", bits))),
            });
        }
        let opcode = parts.join(" ");
        Ok(replaced(inst, |new| new.opcode = opcode))
    }
}

/// A REX prefix is a 64-bit mode only encoding, regardless of what the
/// manual's 32-bit column claims.
struct RexValid32;

impl Rule for RexValid32 {
    fn name(&self) -> &'static str { "rex-valid32" }

    fn matches(&self, inst: &Instruction) -> bool {
        inst.has_rex()
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        if inst.valid32 == Validity::Invalid {
            return Ok(Fix::Keep);
        }
        Ok(replaced(inst, |new| new.valid32 = Validity::Invalid))
    }
}

/// Fills in the processor generation for instructions that predate CPUID
/// feature flags.
struct ArchGeneration;

const GENERATIONS: &[(&str, &[&str])] = &[
    ("486", &["BSWAP", "CMPXCHG", "XADD", "INVD", "WBINVD", "INVLPG"]),
    ("Pentium", &["CMPXCHG8B", "RDMSR", "WRMSR", "CPUID", "RSM"]),
    ("PentiumII", &["SYSENTER", "SYSEXIT"]),
    ("P6", &["FCOMI", "FCOMIP", "FUCOMI", "FUCOMIP", "UD2", "RDPMC"]),
];

fn generation_of(mnemonic: &str) -> Option<&'static str> {
    let mnemonic = mnemonic.trim_start_matches("LOCK ");
    if mnemonic.starts_with("CMOV") || mnemonic.starts_with("FCMOV") {
        return Some("P6");
    }
    GENERATIONS.iter()
        .find(|(_, names)| names.contains(&mnemonic))
        .map(|(arch, _)| *arch)
}

impl Rule for ArchGeneration {
    fn name(&self) -> &'static str { "arch-generation" }

    fn matches(&self, inst: &Instruction) -> bool {
        inst.cpuid.is_empty() && generation_of(inst.mnemonic()).is_some()
    }

    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch> {
        let arch = generation_of(inst.mnemonic()).ok_or_else(|| Mismatch::new("unknown generation"))?;
        Ok(replaced(inst, |new| new.cpuid = arch.to_string()))
    }
}
