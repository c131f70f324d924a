//! Corrections for known defects of the manual.
//!
//! The raw records produced by the parser are faithful to the manual, and the
//! manual is not always right. This module turns them into a consistent table
//! in two steps:
//!
//! * A registry of independent `Rule`s is applied to every record on its own.
//!   Each rule has a predicate that recognizes the defect and a transformation
//!   that fixes it. Since no rule looks at other records, records can be
//!   processed in any order.
//! * Table passes that need to see all records at once (collapsing fixed
//!   addressing forms, adding undocumented opcodes, removing duplicates) run
//!   afterwards, in a fixed order.
//!
//! Corrections are best-effort. When a rule recognizes a record but the record
//! doesn't have the shape the rule expects, the record is passed through
//! unchanged and a `RuleMismatch` diagnostic is recorded.
//!
//! ## Adding a new correction
//!
//! Define a type implementing `Rule` in `fix/rules.rs` and add it to `RULES`.
//! The position in `RULES` matters only relative to other rules that touch the
//! same fields. Every rule should come with a test in that module.

mod rules;
mod tables;

pub use self::rules::RULES;

use crate::error::{DiagnosticKind, Diagnostics};
use crate::inst::Instruction;

use std::fmt;

/// Outcome of applying a rule to a record.
#[derive(Debug, PartialEq)]
pub enum Fix {
    /// The record is fine as it is.
    Keep,
    /// The record must be removed.
    Drop,
    /// The record is replaced by these records (usually a single fixed copy).
    Replace(Vec<Instruction>),
}

/// A record matched a rule's predicate, but the rule could not fix it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch(pub String);

impl Mismatch {
    #[cold]
    pub(crate) fn new<S: Into<String>>(why: S) -> Self {
        Mismatch(why.into())
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named correction for one kind of defect.
pub trait Rule: Sync {
    /// Short kebab-case name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `inst` looks like it has the defect this rule corrects.
    fn matches(&self, inst: &Instruction) -> bool;

    /// Corrects `inst`. Only called when `matches` returned `true`.
    fn apply(&self, inst: &Instruction) -> Result<Fix, Mismatch>;
}

/// Runs all rules of `rules` over a single record.
///
/// Returns the records replacing `inst` (none if it was dropped).
pub fn apply_rules(inst: Instruction, rules: &[&dyn Rule], diags: &mut Diagnostics) -> Vec<Instruction> {
    let mut current = vec![inst];
    for rule in rules {
        let mut next = Vec::with_capacity(current.len());
        for inst in current {
            if !rule.matches(&inst) {
                next.push(inst);
                continue;
            }
            match rule.apply(&inst) {
                Ok(Fix::Keep) => next.push(inst),
                Ok(Fix::Drop) => {
                    debug!("{}: dropped {} ({})", rule.name(), inst.syntax, inst.opcode);
                }
                Ok(Fix::Replace(insts)) => {
                    for new in &insts {
                        debug!("{}: {} ({}) -> {} ({})", rule.name(), inst.syntax, inst.opcode, new.syntax, new.opcode);
                    }
                    next.extend(insts);
                }
                Err(why) => {
                    diags.push(inst.page, DiagnosticKind::RuleMismatch,
                        format!("{}: {} ({}): {}", rule.name(), inst.syntax, inst.opcode, why));
                    next.push(inst);
                }
            }
        }
        current = next;
    }
    current
}

/// Applies all corrections to the raw parser output.
pub fn correct(insts: Vec<Instruction>, diags: &mut Diagnostics) -> Vec<Instruction> {
    let before = insts.len();
    let mut out = Vec::with_capacity(insts.len());
    for inst in insts {
        out.extend(apply_rules(inst, RULES, diags));
    }

    let out = tables::collapse_fixed_addressing(out, diags);
    let out = tables::inject_undocumented(out);
    let out = tables::mark_duplicates(out);

    info!("corrected {} rows into {} records", before, out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::Validity;

    struct DropNops;

    impl Rule for DropNops {
        fn name(&self) -> &'static str { "drop-nops" }
        fn matches(&self, inst: &Instruction) -> bool { inst.mnemonic() == "NOP" }
        fn apply(&self, _: &Instruction) -> Result<Fix, Mismatch> { Ok(Fix::Drop) }
    }

    struct Broken;

    impl Rule for Broken {
        fn name(&self) -> &'static str { "broken" }
        fn matches(&self, _: &Instruction) -> bool { true }
        fn apply(&self, _: &Instruction) -> Result<Fix, Mismatch> { Err(Mismatch::new("unexpected shape")) }
    }

    #[test]
    fn mismatch_passes_through() {
        let mut diags = Diagnostics::new();
        let inst = Instruction::new("90", "XCHG EAX, EAX");
        let out = apply_rules(inst.clone(), &[&Broken, &DropNops], &mut diags);
        assert_eq!(out, vec![inst]);
        assert_eq!(diags.count(DiagnosticKind::RuleMismatch), 1);
    }

    #[test]
    fn drop() {
        let mut diags = Diagnostics::new();
        let out = apply_rules(Instruction::new("90", "NOP"), &[&DropNops], &mut diags);
        assert!(out.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn full_correction() {
        let mut diags = Diagnostics::new();
        let mut rex = Instruction::new("REX.W + C1 /4 ib", "SHR r/m64, imm8");
        rex.valid32 = Validity::NotEncodable;
        let insts = vec![
            Instruction::new("C1 /4 ib", "SHR r/m32, imm8"),
            rex,
            Instruction::new("F3 A4", "REP MOVS m8, m8"),
            Instruction::new("A4", "MOVS m8, m8"),
            Instruction::new("A4", "MOVSB"),
        ];
        let out = correct(insts, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);

        let emitted: Vec<_> = out.iter()
            .filter(|i| !i.is_pseudo())
            .map(|i| (i.syntax.as_str(), i.opcode.as_str(), i.valid32))
            .collect();
        assert!(emitted.contains(&("SHR r/m32, imm8", "C1 /5 ib", Validity::Valid)));
        assert!(emitted.contains(&("SHR r/m64, imm8", "REX.W + C1 /5 ib", Validity::Invalid)));
        assert_eq!(emitted.iter().filter(|e| e.0 == "MOVSB").count(), 1);
        assert!(!emitted.iter().any(|e| e.0.starts_with("REP") || e.0.starts_with("MOVS m")));
        // undocumented opcodes are present
        assert!(emitted.iter().any(|e| e.0 == "SALC"));
    }

    #[test]
    fn missing_immediate_code() {
        let mut diags = Diagnostics::new();
        let out = correct(vec![Instruction::new("66 0F 3A 0F /r", "PALIGNR xmm1, xmm2/m128, imm8")], &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        let palignr = out.iter().find(|i| i.mnemonic() == "PALIGNR").unwrap();
        assert_eq!(palignr.opcode, "66 0F 3A 0F /r ib");
    }

    #[test]
    fn repeat_forms_without_memory_operand() {
        let mut diags = Diagnostics::new();
        let insts = vec![
            Instruction::new("AC", "LODS m8"),
            Instruction::new("F3 AC", "REP LODS AL"),
            Instruction::new("6D", "INS m32, DX"),
            Instruction::new("F3 6D", "REP INS r/m32, DX"),
            Instruction::new("F3 6E", "REP OUTS DX, m"),
        ];
        let out = correct(insts, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);

        // leave out the undocumented opcodes added by `correct`
        let emitted: Vec<_> = out.iter()
            .filter(|i| !i.is_pseudo() && ["AC", "6D", "6E"].contains(&&*i.opcode))
            .map(|i| (i.syntax.as_str(), i.opcode.as_str()))
            .collect();
        assert_eq!(emitted, vec![("LODSB", "AC"), ("INSD", "6D")]);
    }
}
