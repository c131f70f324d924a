//! Operand sizes and the tags derived from them.

use crate::inst::{Instruction, Validity};
use crate::operand::{Kind, MemType, Operand};

/// Parses all operands of `inst`, skipping tokens outside the grammar.
pub fn operands(inst: &Instruction) -> Vec<Operand> {
    inst.args.iter().filter_map(|a| Operand::parse(a)).collect()
}

/// Width of the general purpose register operands, or 0.
///
/// Fixed registers like `CL` or `DX` only count if there is no other general
/// purpose operand, since they are usually counts or port numbers.
pub fn gp_width(ops: &[Operand]) -> u32 {
    let sized = |kinds: &[Kind]| {
        ops.iter()
            .find(|op| kinds.contains(&op.kind) && op.bits != 0)
            .map(|op| op.bits)
    };
    sized(&[Kind::Gpr, Kind::Accumulator, Kind::Moffs])
        .or_else(|| sized(&[Kind::FixedGpr]))
        .unwrap_or(0)
}

/// Whether the instruction operates on integer registers only.
///
/// Instructions with vector or x87 operands carry their size in the mnemonic
/// and never get operand size suffixes or tags.
pub fn is_integer(ops: &[Operand]) -> bool {
    ops.iter().all(|op| match op.kind {
        Kind::Mmx | Kind::Xmm | Kind::Ymm | Kind::Bnd | Kind::Vsib | Kind::X87 => false,
        Kind::Mem(MemType::Float) | Kind::Mem(MemType::Int) | Kind::Mem(MemType::Bcd) => false,
        _ => true,
    })
}

/// String and stack instructions whose size is given by a suffix letter
/// (`MOVSB`, `IRETQ`, ...).
const SUFFIXED: &[&str] = &[
    "MOVS", "CMPS", "STOS", "LODS", "SCAS", "INS", "OUTS", "IRET", "PUSHF", "POPF", "PUSHA", "POPA",
];

/// Operand size of an operand-free string, stack or conversion instruction.
pub fn suffix_width(mnemonic: &str) -> u32 {
    match mnemonic {
        "CBW" | "CWD" => return 16,
        "CWDE" | "CDQ" => return 32,
        "CDQE" | "CQO" => return 64,
        "IRET" | "PUSHF" | "POPF" | "PUSHA" | "POPA" => return 16,
        _ => {}
    }
    for base in SUFFIXED {
        if let Some(suffix) = mnemonic.strip_prefix(base) {
            return match suffix {
                "B" => 8,
                "W" => 16,
                "D" => 32,
                "Q" => 64,
                _ => continue,
            };
        }
    }
    0
}

/// Computes the data size of the operation in bits (0 if the operation is
/// not size dependent).
pub fn datasize(inst: &Instruction, ops: &[Operand]) -> u32 {
    let gp = gp_width(ops);
    if gp != 0 {
        return gp;
    }
    for op in ops {
        match op.kind {
            Kind::FarPtr | Kind::Mem(MemType::Far) => return op.bits,
            Kind::Mem(MemType::Float) | Kind::Mem(MemType::Int) | Kind::Mem(MemType::Bcd) => return op.bits,
            _ => {}
        }
    }
    if inst.args.is_empty() {
        return suffix_width(inst.mnemonic());
    }
    0
}

/// Adds the operand size, address size and ModR/M tags of `inst`.
///
/// Expects `inst.datasize` to be set already.
pub fn add_tags(inst: &mut Instruction, ops: &[Operand]) {
    let size = inst.datasize;
    if is_integer(ops) && (size == 16 || size == 32 || size == 64) {
        inst.tags.insert(&format!("operand{}", size));
        // forms defaulting to 64 bits in long mode are also picked with a
        // 32-bit operand size
        if size == 64 && !inst.opcode.contains("REX.W") && inst.valid64 == Validity::Valid {
            inst.tags.insert("operand32");
        }
    }

    let address = match inst.mnemonic() {
        "JCXZ" => Some("address16"),
        "JECXZ" => Some("address32"),
        "JRCXZ" => Some("address64"),
        _ => None,
    };
    if let Some(tag) = address {
        inst.tags.insert(tag);
    }

    let has_modrm = inst.opcode.split_whitespace().any(|part| {
        part == "/r" || (part.len() == 2 && part.starts_with('/') && part.as_bytes()[1].is_ascii_digit())
    });
    if ops.iter().any(|op| op.is_rm_register()) {
        inst.tags.insert("modrm_regonly");
    } else if has_modrm && ops.iter().any(|op| op.is_memory()) {
        inst.tags.insert("modrm_memonly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(opcode: &str, syntax: &str) -> Instruction {
        let mut inst = Instruction::new(opcode, syntax);
        let ops = operands(&inst);
        inst.datasize = datasize(&inst, &ops);
        add_tags(&mut inst, &ops);
        inst
    }

    #[test]
    fn datasizes() {
        assert_eq!(sized("C1 /5 ib", "SHR r/m32, imm8").datasize, 32);
        assert_eq!(sized("D2 /4", "SHL r/m8, CL").datasize, 8);
        assert_eq!(sized("EE", "OUT DX, AL").datasize, 8);
        assert_eq!(sized("0F B6 /r", "MOVZX r32, r/m8").datasize, 32);
        assert_eq!(sized("FF /3", "CALL m16:32").datasize, 32);
        assert_eq!(sized("DD /0", "FLD m64fp").datasize, 64);
        assert_eq!(sized("DF /5", "FILD m64int").datasize, 64);
        assert_eq!(sized("A5", "MOVSD").datasize, 32);
        assert_eq!(sized("REX.W + 98", "CDQE").datasize, 64);
        assert_eq!(sized("0F 58 /r", "ADDPS xmm1, xmm2/m128").datasize, 0);
        assert_eq!(sized("F4", "HLT").datasize, 0);
        assert_eq!(sized("EB cb", "JMP rel8").datasize, 0);
    }

    #[test]
    fn operand_tags() {
        assert_eq!(sized("C1 /5 ib", "SHR r/m32, imm8").tags.to_string(), "operand32");
        assert_eq!(sized("REX.W + C1 /5 ib", "SHR r/m64, imm8").tags.to_string(), "operand64");
        assert_eq!(sized("50+rd", "PUSH r64").tags.to_string(), "operand32,operand64");
        assert_eq!(sized("A5", "MOVSW").tags.to_string(), "operand16");
        assert_eq!(sized("88 /r", "MOV r/m8, r8").tags.to_string(), "");
        assert_eq!(sized("66 0F 6E /r", "MOVD xmm1, r/m32").tags.to_string(), "");

        let mut inst = Instruction::new("50+rd", "PUSH r64");
        inst.valid64 = Validity::NotEncodable;
        let ops = operands(&inst);
        inst.datasize = datasize(&inst, &ops);
        add_tags(&mut inst, &ops);
        assert_eq!(inst.tags.to_string(), "operand64");
    }

    #[test]
    fn address_and_modrm_tags() {
        assert_eq!(sized("E3 cb", "JECXZ rel8").tags.to_string(), "address32");
        assert_eq!(sized("0F 12 /r", "MOVHLPS xmm1, xmm2").tags.to_string(), "modrm_regonly");
        assert_eq!(sized("0F C3 /r", "MOVNTI m32, r32").tags.to_string(), "modrm_memonly,operand32");
        assert_eq!(sized("8D /r", "LEA r16, m").tags.to_string(), "modrm_memonly,operand16");
        assert_eq!(sized("A0", "MOV AL, moffs8").tags.to_string(), "");
    }
}
