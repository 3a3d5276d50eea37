//! Stack manipulation operations.

use bsv_core_primitives::bignum::BigNumber;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::spend::Spend;
use super::stack::as_bool;

impl<'a> Spend<'a> {
    pub(crate) fn op_to_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let data = self.stack.pop()?;
        self.alt_stack.push(data);
        Ok(())
    }

    pub(crate) fn op_from_alt_stack(&mut self) -> Result<(), InterpreterError> {
        let data = self.alt_stack.pop()?;
        self.stack.push(data);
        Ok(())
    }

    pub(crate) fn op_ifdup(&mut self) -> Result<(), InterpreterError> {
        let top = self.stack.peek(0)?;
        if as_bool(top) {
            let copy = top.to_vec();
            self.stack.push(copy);
        }
        Ok(())
    }

    pub(crate) fn op_depth(&mut self) {
        let depth = BigNumber::from(self.stack.depth());
        self.stack.push_num(&depth);
    }

    /// Pop an index for `OP_PICK`/`OP_ROLL` and check it against the
    /// remaining depth. The index can be any script number, so the range
    /// check happens before narrowing.
    fn pop_stack_index(&mut self) -> Result<usize, InterpreterError> {
        let n = self.stack.pop_num()?;
        let depth = self.stack.depth();
        if n.is_negative() || n >= depth {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidStackOperation,
                format!("index {} is invalid for stack size {}", n, depth),
            ));
        }
        n.to_usize().ok_or_else(|| {
            InterpreterError::new(
                InterpreterErrorCode::InvalidStackOperation,
                format!("index {} is invalid for stack size {}", n, depth),
            )
        })
    }

    pub(crate) fn op_pick(&mut self) -> Result<(), InterpreterError> {
        let idx = self.pop_stack_index()?;
        self.stack.pick(idx)
    }

    pub(crate) fn op_roll(&mut self) -> Result<(), InterpreterError> {
        let idx = self.pop_stack_index()?;
        self.stack.roll(idx)
    }
}
