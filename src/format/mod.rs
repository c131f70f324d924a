//! Derived fields of the corrected records.

mod action;
mod dialect;
mod size;

pub use self::action::{actions, class_of, Class};
pub use self::dialect::{Dialect, Gnu, Go};

use crate::error::Diagnostics;
use crate::inst::Instruction;

use std::collections::{BTreeSet, HashMap};

/// Fills in the alternate syntaxes, actions, data size and tags of every
/// record, then computes the `multisize` flags.
pub fn format(insts: &mut [Instruction], diags: &mut Diagnostics) {
    for inst in insts.iter_mut() {
        format_one(inst, diags);
    }
    mark_multisize(insts);
    info!("formatted {} records", insts.len());
}

/// Derives the per-record fields of a single instruction.
pub fn format_one(inst: &mut Instruction, diags: &mut Diagnostics) {
    let ops = size::operands(inst);
    inst.go_syntax = Go.render(inst, &ops);
    inst.gnu_syntax = Gnu.render(inst, &ops);
    inst.action = actions(inst, diags);
    inst.datasize = size::datasize(inst, &ops);
    size::add_tags(inst, &ops);
}

/// The opcode shared by all operand size variants of an encoding.
fn size_family(opcode: &str) -> String {
    let mut parts = Vec::new();
    let mut after_rex_w = false;
    for part in opcode.split_whitespace() {
        match part {
            "REX.W" => after_rex_w = true,
            "+" if after_rex_w => after_rex_w = false,
            _ => {
                after_rex_w = false;
                parts.push(part);
            }
        }
    }
    parts.join(" ")
}

/// Sets `multisize` on every record whose encoding has siblings differing
/// only in operand size.
pub fn mark_multisize(insts: &mut [Instruction]) {
    let mut groups: HashMap<String, BTreeSet<u32>> = HashMap::new();
    for inst in insts.iter().filter(|i| !i.is_pseudo() && i.datasize != 0) {
        groups.entry(size_family(&inst.opcode)).or_default().insert(inst.datasize);
    }
    for inst in insts.iter_mut() {
        inst.multisize = groups.get(&size_family(&inst.opcode)).map_or(false, |sizes| sizes.len() > 1);
    }
}
