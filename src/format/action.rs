//! Per-operand read/write classification.

use crate::error::{DiagnosticKind, Diagnostics};
use crate::inst::{Action, Instruction};
use crate::operand::{Kind, Operand, Select};

/// How an instruction uses its first operand(s).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Class {
    /// Only reads its operands (`CMP`, `PUSH`, `JMP`, ...).
    ReadOnly,
    /// Overwrites the first operand without reading it (`MOV`, `LEA`, ...).
    Load,
    /// Reads and writes the first operand (`ADD`, `SHR`, ...).
    Update,
    /// Reads and writes the first two operands (`XCHG`, `XADD`).
    Exchange,
}

/// Actions an operand kind takes in each position.
struct Roles {
    /// Destination of an updating instruction.
    update: Action,
    /// Destination of a loading instruction.
    load: Action,
    /// Any other position.
    source: Action,
}

const WRITABLE: Roles = Roles { update: Action::ReadWrite, load: Action::Write, source: Action::Read };
const READ: Roles = Roles { update: Action::Read, load: Action::Read, source: Action::Read };

fn roles(kind: Kind) -> Roles {
    match kind {
        Kind::Imm | Kind::Rel | Kind::FarPtr | Kind::Literal | Kind::Vsib => READ,
        Kind::Moffs | Kind::Mem(_) => WRITABLE,
        Kind::Gpr | Kind::Accumulator | Kind::FixedGpr => WRITABLE,
        Kind::Mmx | Kind::Xmm | Kind::Ymm | Kind::Bnd => WRITABLE,
        Kind::Segment | Kind::Control | Kind::Debug | Kind::X87 => WRITABLE,
    }
}

const EXCHANGE: &[&str] = &["XCHG", "XADD", "FXCH"];

const READ_ONLY: &[&str] = &[
    "CMP", "TEST", "BT", "PUSH", "CALL", "LCALL", "RET", "RETF", "INT", "BOUND", "OUT", "ENTER",
    "COMISS", "COMISD", "UCOMISS", "UCOMISD", "VCOMISS", "VCOMISD", "VUCOMISS", "VUCOMISD",
    "PTEST", "VPTEST", "VTESTPS", "VTESTPD",
    "FCOM", "FCOMP", "FCOMI", "FCOMIP", "FUCOM", "FUCOMP", "FUCOMI", "FUCOMIP", "FICOM", "FICOMP",
    "FLD", "FILD", "FBLD", "FLDCW", "FLDENV", "FRSTOR", "FXRSTOR", "FXRSTOR64", "XRSTOR", "XRSTOR64",
    "LGDT", "LIDT", "LLDT", "LMSW", "LTR", "LDMXCSR", "VLDMXCSR", "VERR", "VERW",
    "INVLPG", "CLFLUSH", "CLFLUSHOPT", "CLWB", "MONITOR", "BNDCL", "BNDCU", "BNDCN",
];

const LOAD: &[&str] = &[
    "LEA", "POP", "IN", "LDS", "LES", "LFS", "LGS", "LSS", "LAR", "LSL", "BSF", "BSR",
    "LZCNT", "TZCNT", "POPCNT", "SGDT", "SIDT", "SLDT", "STR", "SMSW", "STMXCSR", "VSTMXCSR",
    "FXSAVE", "FXSAVE64", "XSAVE", "XSAVE64", "XSAVEOPT", "RDRAND", "RDSEED", "PMOVMSKB",
    "PSHUFD", "PSHUFHW", "PSHUFLW", "LDDQU", "SQRTPS", "SQRTPD", "RCPPS", "RSQRTPS", "EXTRACTPS",
    "MOVBE", "BNDMK",
];

/// Mnemonic prefixes of loading instruction families.
const LOAD_PREFIXES: &[&str] = &[
    "MOV", "VMOV", "CVT", "VCVT", "SET", "PEXTR", "VPEXTR", "PMOVSX", "PMOVZX", "VPMOVSX",
    "VPMOVZX", "PABS", "VPABS", "VBROADCAST", "VPBROADCAST",
];

/// x87 instructions storing to their memory operand.
const X87_STORES: &[&str] = &[
    "FST", "FSTP", "FIST", "FISTP", "FISTTP", "FBSTP", "FNSTSW", "FSTSW", "FNSTCW", "FSTCW",
    "FNSTENV", "FSTENV", "FNSAVE", "FSAVE",
];

fn is_fma(mnemonic: &str) -> bool {
    ["VFMADD", "VFMSUB", "VFNMADD", "VFNMSUB"].iter().any(|p| mnemonic.starts_with(p))
}

fn is_x87(inst: &Instruction) -> bool {
    inst.mnemonic().starts_with('F') && match inst.opcode.split_whitespace().next() {
        Some(b) => matches!(b, "9B" | "D8" | "D9" | "DA" | "DB" | "DC" | "DD" | "DE" | "DF"),
        None => false,
    }
}

/// Classifies the instruction by how it uses its destination.
pub fn class_of(inst: &Instruction, ops: &[Option<Operand>]) -> Class {
    let mnemonic = inst.mnemonic().trim_start_matches("LOCK ");

    if EXCHANGE.contains(&mnemonic) {
        return Class::Exchange;
    }

    let vex = inst.opcode.starts_with("VEX") || inst.opcode.starts_with("XOP");
    let vvvv_second = match ops.get(1) {
        Some(Some(op)) => op.select == Select::Vvvv,
        _ => false,
    };
    if vex && ops.len() >= 3 && vvvv_second && !is_fma(mnemonic) {
        return Class::Load;
    }

    if mnemonic == "IMUL" && ops.len() == 3 {
        return Class::Load;
    }

    if is_x87(inst) && ops.len() == 1 {
        if X87_STORES.contains(&mnemonic) {
            return Class::Load;
        }
        if let Some(Some(op)) = ops.first() {
            if op.is_memory() {
                return Class::ReadOnly;
            }
        }
    }

    if READ_ONLY.contains(&mnemonic) || mnemonic.starts_with('J') || mnemonic.starts_with("LOOP")
        || mnemonic.starts_with("PREFETCH") || (mnemonic.starts_with("CMPS") && ops.is_empty())
    {
        return Class::ReadOnly;
    }
    if LOAD.contains(&mnemonic) || LOAD_PREFIXES.iter().any(|p| mnemonic.starts_with(p)) {
        return Class::Load;
    }
    Class::Update
}

/// Computes the action of every operand of `inst`, in `args` order.
///
/// Tokens outside the operand grammar are assumed to be read and reported as
/// `UnknownOperand` diagnostics.
pub fn actions(inst: &Instruction, diags: &mut Diagnostics) -> Vec<Action> {
    let ops: Vec<_> = inst.args.iter().map(|a| Operand::parse(a)).collect();
    let class = class_of(inst, &ops);

    ops.iter().zip(&inst.args).enumerate().map(|(i, (op, arg))| {
        let op = match op {
            Some(op) => op,
            None => {
                diags.push(inst.page, DiagnosticKind::UnknownOperand,
                    format!("'{}' in {}", arg, inst.syntax));
                return Action::Read;
            }
        };
        let roles = roles(op.kind);
        match (class, i) {
            (Class::ReadOnly, _) => roles.source,
            (Class::Load, 0) => roles.load,
            (Class::Update, 0) | (Class::Exchange, 0) | (Class::Exchange, 1) => roles.update,
            _ => roles.source,
        }
    }).collect()
}
