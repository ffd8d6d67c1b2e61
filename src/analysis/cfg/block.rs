//! Basic block representation.

use std::fmt;

use crate::ir::{Instr, OpId, Terminator};

/// A straight-line sequence of instructions with a single terminator.
///
/// Blocks are produced by lowering a function's statement tree; see
/// [`Cfg::build`](crate::analysis::Cfg::build). Control enters at the first
/// instruction and leaves only through the terminator, so a transfer function
/// can walk `instrs` in order and then consult the terminator.
///
/// Instructions keep the [`OpId`] of the source operation they were lowered
/// from. Several instructions may share one id (a short-circuit operator
/// lowers into copies on both arms) and compiler-introduced temporaries
/// reuse the id of the operation that needed them.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) instrs: Vec<Instr>,
    pub(crate) terminator: Terminator,
}

impl BasicBlock {
    /// The instructions of this block, in execution order.
    #[must_use]
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// The terminator that ends this block.
    #[must_use]
    pub fn terminator(&self) -> &Terminator {
        &self.terminator
    }

    /// Number of instructions, excluding the terminator.
    #[must_use]
    pub fn instr_count(&self) -> usize {
        self.instrs.len()
    }

    /// Iterates over the source operation ids of this block's instructions.
    pub fn op_ids(&self) -> impl Iterator<Item = OpId> + '_ {
        self.instrs.iter().map(|i| i.op)
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instrs {
            writeln!(f, "{instr}")?;
        }
        write!(f, "{}", self.terminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Operand, Place, Rvalue, VarId};

    #[test]
    fn test_block_display() {
        let block = BasicBlock {
            instrs: vec![Instr {
                op: OpId::new(0),
                dst: Place::Var(VarId::new(0)),
                rvalue: Rvalue::Use(Operand::Var(VarId::new(1))),
            }],
            terminator: Terminator::Return(Some(Operand::Var(VarId::new(0)))),
        };
        let text = block.to_string();
        assert!(text.contains("v0 = v1"));
        assert!(text.contains("return v0"));
    }

    #[test]
    fn test_block_op_ids() {
        let block = BasicBlock {
            instrs: vec![
                Instr {
                    op: OpId::new(3),
                    dst: Place::Var(VarId::new(0)),
                    rvalue: Rvalue::Use(Operand::Var(VarId::new(1))),
                },
                Instr {
                    op: OpId::new(5),
                    dst: Place::Var(VarId::new(1)),
                    rvalue: Rvalue::Use(Operand::Var(VarId::new(0))),
                },
            ],
            terminator: Terminator::Return(None),
        };
        let ids: Vec<_> = block.op_ids().collect();
        assert_eq!(ids, vec![OpId::new(3), OpId::new(5)]);
    }
}
