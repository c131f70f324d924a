//! Output order.

use crate::inst::Instruction;

/// Sorts records by their Intel syntax (byte-wise), keeping parse order for
/// equal syntaxes.
pub fn sort(insts: &mut [Instruction]) {
    insts.sort_by(|a, b| {
        a.syntax.as_bytes().cmp(b.syntax.as_bytes())
            .then(a.seq.cmp(&b.seq))
    });
}
