//! The manual's operand-syntax grammar.
//!
//! Every token that may appear in `Instruction::args` is classified into a
//! `Kind`, together with its width and the encoding field that selects it.

/// Broad operand category.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `imm8`, `imm16u`, ...
    Imm,
    /// `rel8`, `rel16`, `rel32`
    Rel,
    /// `ptr16:16`, `ptr16:32`
    FarPtr,
    /// `moffs8` .. `moffs64`
    Moffs,
    /// Any memory-only token.
    Mem(MemType),
    /// General purpose register (`r32`, `rmr32`, `r/m32`, `r32V`, ...).
    Gpr,
    /// `AL`, `AX`, `EAX`, `RAX`
    Accumulator,
    /// `CL`, `DX` and other fixed general purpose registers.
    FixedGpr,
    /// `mm1`, `mm2/m64`, ...
    Mmx,
    /// `xmm1`, `xmmV`, `xmm2/m128`, `<XMM0>`, ...
    Xmm,
    /// `ymm1`, `ymmV`, `ymm2/m256`, ...
    Ymm,
    /// `bnd1`, `bnd2/m64`, ...
    Bnd,
    /// `vm32x`, `vm64y`, ...
    Vsib,
    /// `Sreg` or a named segment register.
    Segment,
    /// `CR0-CR7`, `CR8`
    Control,
    /// `DR0-DR7`
    Debug,
    /// `ST(0)`, `ST(i)`
    X87,
    /// The literal shift count `1` or interrupt number `3`.
    Literal,
}

/// Shape of a memory-only operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemType {
    /// `m`, `m8` .. `m512`
    Plain,
    /// `m32fp`, `m64fp`, `m80fp`
    Float,
    /// `m16int`, `m32int`, `m64int`
    Int,
    /// `m80bcd`, `m80dec`
    Bcd,
    /// `m16:16`, `m16:32`, `m16:64` (far pointer in memory)
    Far,
    /// `m16&16`, `m16&32`, `m32&32`, `m16&64` (operand pairs)
    Pair,
    /// `m2byte`, `m14/28byte`, `m512byte`, ... (state areas)
    Bytes,
}

/// Which part of the encoding selects a register operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Select {
    /// ModR/M `reg` field.
    Reg,
    /// ModR/M `r/m` field, register only (`mod == 11`).
    Rm,
    /// ModR/M `r/m` field, register or memory.
    RegOrMem,
    /// VEX `vvvv` field.
    Vvvv,
    /// Bits 7:4 of an immediate byte.
    Imm8Hi,
    /// Low bits of the opcode byte (`+rb`, `+i`, ...) or not encoded at all.
    Implicit,
    /// Not a register.
    None,
}

/// A classified operand token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Operand {
    pub kind: Kind,
    /// Width in bits, or 0 if not applicable (e.g. `m`, `Sreg`).
    pub bits: u32,
    pub select: Select,
}

impl Operand {
    fn new(kind: Kind, bits: u32, select: Select) -> Self {
        Operand { kind, bits, select }
    }

    /// Classifies a single operand token.
    ///
    /// Returns `None` for tokens outside the operand grammar.
    pub fn parse(token: &str) -> Option<Operand> {
        use self::Kind::*;
        use self::Select::*;

        let op = |kind, bits, select| Some(Operand::new(kind, bits, select));
        match token {
            "AL" => return op(Accumulator, 8, Implicit),
            "AX" => return op(Accumulator, 16, Implicit),
            "EAX" => return op(Accumulator, 32, Implicit),
            "RAX" => return op(Accumulator, 64, Implicit),
            "CL" => return op(FixedGpr, 8, Implicit),
            "DX" => return op(FixedGpr, 16, Implicit),
            "CS" | "DS" | "ES" | "FS" | "GS" | "SS" => return op(Segment, 16, Implicit),
            "Sreg" => return op(Segment, 16, Reg),
            "CR0-CR7" | "CR8" => return op(Control, 0, Reg),
            "DR0-DR7" => return op(Debug, 0, Reg),
            "ST(0)" | "ST" => return op(X87, 80, Implicit),
            "ST(i)" => return op(X87, 80, Implicit),
            "1" | "3" => return op(Literal, 8, None),
            "<XMM0>" => return op(Xmm, 128, Implicit),
            "m" => return op(Mem(MemType::Plain), 0, None),
            "ptr16:16" => return op(FarPtr, 16, None),
            "ptr16:32" => return op(FarPtr, 32, None),
            "m16:16" => return op(Mem(MemType::Far), 16, None),
            "m16:32" => return op(Mem(MemType::Far), 32, None),
            "m16:64" => return op(Mem(MemType::Far), 64, None),
            "m16&16" | "m16&32" | "m32&32" | "m16&64" => return op(Mem(MemType::Pair), 0, None),
            "m80bcd" | "m80dec" => return op(Mem(MemType::Bcd), 80, None),
            "vm32x" | "vm32y" => return op(Vsib, 32, None),
            "vm64x" | "vm64y" => return op(Vsib, 64, None),
            _ => {}
        }

        if let Some(rest) = token.strip_prefix("imm") {
            // `imm8u` is an unsigned `imm8`
            let bits = rest.strip_suffix('u').unwrap_or(rest);
            return op(Imm, width(bits, &[8, 16, 32, 64])?, None);
        }
        if let Some(bits) = token.strip_prefix("rel") {
            return op(Rel, width(bits, &[8, 16, 32])?, None);
        }
        if let Some(bits) = token.strip_prefix("moffs") {
            return op(Moffs, width(bits, &[8, 16, 32, 64])?, None);
        }
        if let Some(bits) = token.strip_prefix("r/m") {
            return op(Gpr, width(bits, &[8, 16, 32, 64])?, RegOrMem);
        }
        if let Some(bits) = token.strip_prefix("rmr") {
            return op(Gpr, width(bits, &[8, 16, 32, 64])?, Rm);
        }
        if token.ends_with("byte") && token.starts_with('m') {
            return op(Mem(MemType::Bytes), 0, None);
        }
        if let Some(bits) = token.strip_prefix('m').and_then(|t| t.strip_suffix("fp")) {
            return op(Mem(MemType::Float), width(bits, &[32, 64, 80])?, None);
        }
        if let Some(bits) = token.strip_prefix('m').and_then(|t| t.strip_suffix("int")) {
            return op(Mem(MemType::Int), width(bits, &[16, 32, 64])?, None);
        }
        if token.starts_with("mm") {
            return vector(Mmx, 64, &token[2..]);
        }
        if token.starts_with("xmm") {
            return vector(Xmm, 128, &token[3..]);
        }
        if token.starts_with("ymm") {
            return vector(Ymm, 256, &token[3..]);
        }
        if token.starts_with("bnd") {
            return vector(Bnd, 128, &token[3..]);
        }
        if let Some(bits) = token.strip_prefix('m') {
            return op(Mem(MemType::Plain), width(bits, &[8, 16, 32, 64, 80, 128, 256, 384, 512])?, None);
        }
        if let Some(rest) = token.strip_prefix('r') {
            // `r32`, `r32V` or `r32/m16`
            if let Some(bits) = rest.strip_suffix('V') {
                return op(Gpr, width(bits, &[32, 64])?, Vvvv);
            }
            if let Some(slash) = rest.find("/m") {
                let bits = width(&rest[..slash], &[16, 32, 64])?;
                width(&rest[slash + 2..], &[8, 16, 32, 64])?;
                return op(Gpr, bits, RegOrMem);
            }
            return op(Gpr, width(rest, &[8, 16, 32, 64])?, Reg);
        }

        Option::None
    }

    /// Whether this operand can only be a memory reference.
    pub fn is_memory(&self) -> bool {
        match self.kind {
            Kind::Mem(_) | Kind::Moffs | Kind::Vsib => true,
            _ => false,
        }
    }

    /// Whether this is a register selected through the ModR/M byte's r/m field
    /// without a memory alternative.
    pub fn is_rm_register(&self) -> bool {
        self.select == Select::Rm
    }
}

/// Parses a decimal width and checks it against the allowed set.
fn width(s: &str, allowed: &[u32]) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let bits = s.parse().ok()?;
    if allowed.contains(&bits) {
        Some(bits)
    } else {
        None
    }
}

/// Classifies the part of a vector register token after the register file
/// prefix (`1`, `2`, `V`, `I`, `2/m128`, ...).
fn vector(kind: Kind, bits: u32, rest: &str) -> Option<Operand> {
    let (reg, mem) = match rest.find("/m") {
        Some(slash) => (&rest[..slash], Some(&rest[slash + 2..])),
        None => (rest, None),
    };
    if let Some(mem) = mem {
        width(mem, &[8, 16, 32, 64, 128, 256])?;
    }
    let select = match (reg, mem) {
        ("V", None) => Select::Vvvv,
        ("I", None) => Select::Imm8Hi,
        ("1", None) | ("", None) => Select::Reg,
        ("2", None) => Select::Rm,
        ("1", Some(_)) | ("2", Some(_)) | ("", Some(_)) => Select::RegOrMem,
        _ => return None,
    };
    Some(Operand::new(kind, bits, select))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parses_as(token: &str, kind: Kind, bits: u32, select: Select) {
        let op = Operand::parse(token).unwrap_or_else(|| panic!("'{}' did not parse", token));
        assert_eq!((op.kind, op.bits, op.select), (kind, bits, select), "{}", token);
    }

    #[test]
    fn grammar() {
        parses_as("imm8", Kind::Imm, 8, Select::None);
        parses_as("imm16u", Kind::Imm, 16, Select::None);
        parses_as("rel32", Kind::Rel, 32, Select::None);
        parses_as("ptr16:32", Kind::FarPtr, 32, Select::None);
        parses_as("moffs64", Kind::Moffs, 64, Select::None);
        parses_as("m", Kind::Mem(MemType::Plain), 0, Select::None);
        parses_as("m128", Kind::Mem(MemType::Plain), 128, Select::None);
        parses_as("m16&32", Kind::Mem(MemType::Pair), 0, Select::None);
        parses_as("m16:32", Kind::Mem(MemType::Far), 32, Select::None);
        parses_as("m32fp", Kind::Mem(MemType::Float), 32, Select::None);
        parses_as("m64int", Kind::Mem(MemType::Int), 64, Select::None);
        parses_as("m14/28byte", Kind::Mem(MemType::Bytes), 0, Select::None);
        parses_as("r8", Kind::Gpr, 8, Select::Reg);
        parses_as("r64", Kind::Gpr, 64, Select::Reg);
        parses_as("rmr16", Kind::Gpr, 16, Select::Rm);
        parses_as("r/m32", Kind::Gpr, 32, Select::RegOrMem);
        parses_as("r32V", Kind::Gpr, 32, Select::Vvvv);
        parses_as("r32/m16", Kind::Gpr, 32, Select::RegOrMem);
        parses_as("mm1", Kind::Mmx, 64, Select::Reg);
        parses_as("mm2/m64", Kind::Mmx, 64, Select::RegOrMem);
        parses_as("xmm2", Kind::Xmm, 128, Select::Rm);
        parses_as("xmmV", Kind::Xmm, 128, Select::Vvvv);
        parses_as("xmmI", Kind::Xmm, 128, Select::Imm8Hi);
        parses_as("xmm2/m64", Kind::Xmm, 128, Select::RegOrMem);
        parses_as("ymm1", Kind::Ymm, 256, Select::Reg);
        parses_as("ymm2/m256", Kind::Ymm, 256, Select::RegOrMem);
        parses_as("bnd1/m64", Kind::Bnd, 128, Select::RegOrMem);
        parses_as("vm32y", Kind::Vsib, 32, Select::None);
        parses_as("EAX", Kind::Accumulator, 32, Select::Implicit);
        parses_as("Sreg", Kind::Segment, 16, Select::Reg);
        parses_as("ST(i)", Kind::X87, 80, Select::Implicit);
        parses_as("1", Kind::Literal, 8, Select::None);
    }

    #[test]
    fn rejects_unknown_tokens() {
        for token in &["zmm1", "imm12", "r128", "m7", "xmm9", "r/m", "k1", ""] {
            assert_eq!(Operand::parse(token), None, "{}", token);
        }
    }

    #[test]
    fn unsigned_immediates() {
        assert_eq!(Operand::parse("imm8u"), Operand::parse("imm8"));
        assert_eq!(Operand::parse("imm16u").map(|op| op.bits), Some(16));
        assert_eq!(Operand::parse("imm8s"), None);
    }

    #[test]
    fn memory_shapes() {
        assert!(Operand::parse("m64").unwrap().is_memory());
        assert!(Operand::parse("vm64x").unwrap().is_memory());
        assert!(!Operand::parse("r/m64").unwrap().is_memory());
        assert!(Operand::parse("rmr32").unwrap().is_rm_register());
        assert!(Operand::parse("xmm2").unwrap().is_rm_register());
    }
}
