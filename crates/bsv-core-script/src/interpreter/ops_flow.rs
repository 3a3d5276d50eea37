//! Flow control and lock-time operations.

use crate::opcodes::*;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::flags::ScriptFlags;
use super::spend::{Flow, Spend};

/// Lock time threshold (block height below, timestamp at or above).
const LOCK_TIME_THRESHOLD: i64 = 500_000_000;

const MAX_TX_IN_SEQUENCE_NUM: u32 = 0xffff_ffff;
const SEQUENCE_LOCK_TIME_DISABLED: i64 = 1 << 31;
const SEQUENCE_LOCK_TIME_IS_SECONDS: i64 = 1 << 22;
const SEQUENCE_LOCK_TIME_MASK: i64 = 0x0000_ffff;

/// Lock-time operands are allowed one more byte than ordinary numbers.
const LOCK_TIME_NUM_LEN: usize = 5;

fn unbalanced(op: u8) -> InterpreterError {
    InterpreterError::new(
        InterpreterErrorCode::UnbalancedConditional,
        format!(
            "encountered opcode {} with no matching opcode to begin conditional execution",
            opcode_to_string(op)
        ),
    )
}

impl<'a> Spend<'a> {
    fn pop_if_bool(&mut self) -> Result<bool, InterpreterError> {
        if !self.has_flag(ScriptFlags::VERIFY_MINIMAL_IF) {
            return self.stack.pop_bool();
        }
        let b = self.stack.pop()?;
        match b.as_slice() {
            [] => Ok(false),
            [1] => Ok(true),
            [_] => Err(InterpreterError::new(
                InterpreterErrorCode::MinimalIf,
                "conditional argument must be empty or 0x01",
            )),
            _ => Err(InterpreterError::new(
                InterpreterErrorCode::MinimalIf,
                format!("conditional has data of length {}", b.len()),
            )),
        }
    }

    /// `OP_IF`, or `OP_NOTIF` when `negate` is set. In a branch that is not
    /// executing the condition is not consumed and the new branch is skipped.
    pub(crate) fn op_if(&mut self, negate: bool) -> Result<(), InterpreterError> {
        let taken = if self.should_exec() {
            self.pop_if_bool()? != negate
        } else {
            false
        };
        self.if_stack.push(taken);
        self.else_seen.push(false);
        Ok(())
    }

    pub(crate) fn op_else(&mut self) -> Result<(), InterpreterError> {
        let (Some(taken), Some(seen)) = (self.if_stack.last_mut(), self.else_seen.last_mut()) else {
            return Err(unbalanced(OP_ELSE));
        };
        if *seen {
            return Err(unbalanced(OP_ELSE));
        }
        *taken = !*taken;
        *seen = true;
        Ok(())
    }

    pub(crate) fn op_endif(&mut self) -> Result<(), InterpreterError> {
        if self.if_stack.pop().is_none() {
            return Err(unbalanced(OP_ENDIF));
        }
        self.else_seen.pop();
        Ok(())
    }

    pub(crate) fn abstract_verify(
        &mut self,
        op: u8,
        code: InterpreterErrorCode,
    ) -> Result<(), InterpreterError> {
        if !self.stack.pop_bool()? {
            return Err(InterpreterError::new(code, format!("{} failed", opcode_to_string(op))));
        }
        Ok(())
    }

    pub(crate) fn op_return(&mut self) -> Result<Flow, InterpreterError> {
        if !self.after_genesis() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::EarlyReturn,
                "script returned early",
            ));
        }
        self.early_return = true;
        if self.if_stack.is_empty() {
            return Ok(Flow::Return);
        }
        Ok(Flow::Continue)
    }

    /// Read a lock-time operand from the top of the stack without popping it.
    fn peek_lock_time(&self, what: &str) -> Result<i64, InterpreterError> {
        let top = self.stack.peek(0)?;
        let n = self.stack.decode_num(top, LOCK_TIME_NUM_LEN)?;
        if n.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NegativeLockTime,
                format!("negative {}: {}", what, n),
            ));
        }
        // five bytes always fit
        n.to_i64().ok_or_else(|| {
            InterpreterError::new(InterpreterErrorCode::NumberTooBig, format!("{} out of range", what))
        })
    }

    pub(crate) fn op_check_locktime_verify(&mut self) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::VERIFY_CHECKLOCKTIMEVERIFY) || self.after_genesis() {
            return self.discourage_upgradable_nop(OP_NOP2);
        }
        let ctx = self.tx_context.ok_or_else(|| {
            InterpreterError::new(
                InterpreterErrorCode::InvalidParams,
                "no transaction context for OP_CHECKLOCKTIMEVERIFY",
            )
        })?;

        let lock_time = self.peek_lock_time("lock time")?;
        verify_lock_time(ctx.lock_time() as i64, LOCK_TIME_THRESHOLD, lock_time)?;

        if ctx.input_sequence(self.input_index) == MAX_TX_IN_SEQUENCE_NUM {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                "transaction input is finalized",
            ));
        }
        Ok(())
    }

    pub(crate) fn op_check_sequence_verify(&mut self) -> Result<(), InterpreterError> {
        if !self.has_flag(ScriptFlags::VERIFY_CHECKSEQUENCEVERIFY) || self.after_genesis() {
            return self.discourage_upgradable_nop(OP_NOP3);
        }
        let ctx = self.tx_context.ok_or_else(|| {
            InterpreterError::new(
                InterpreterErrorCode::InvalidParams,
                "no transaction context for OP_CHECKSEQUENCEVERIFY",
            )
        })?;

        let sequence = self.peek_lock_time("sequence")?;
        if sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Ok(());
        }
        if ctx.tx_version() < 2 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                format!("invalid transaction version: {}", ctx.tx_version()),
            ));
        }
        let tx_sequence = ctx.input_sequence(self.input_index) as i64;
        if tx_sequence & SEQUENCE_LOCK_TIME_DISABLED != 0 {
            return Err(InterpreterError::new(
                InterpreterErrorCode::UnsatisfiedLockTime,
                format!(
                    "transaction sequence has sequence locktime disabled bit set: {:#x}",
                    tx_sequence
                ),
            ));
        }
        let mask = SEQUENCE_LOCK_TIME_IS_SECONDS | SEQUENCE_LOCK_TIME_MASK;
        verify_lock_time(tx_sequence & mask, SEQUENCE_LOCK_TIME_IS_SECONDS, sequence & mask)
    }
}

/// Both values must be of the same kind (height or time) and the required
/// value must not exceed the transaction's.
fn verify_lock_time(tx_lock_time: i64, threshold: i64, lock_time: i64) -> Result<(), InterpreterError> {
    if (tx_lock_time < threshold) != (lock_time < threshold) {
        return Err(InterpreterError::new(
            InterpreterErrorCode::UnsatisfiedLockTime,
            format!(
                "mismatched locktime types -- tx locktime {}, stack locktime {}",
                tx_lock_time, lock_time
            ),
        ));
    }
    if lock_time > tx_lock_time {
        return Err(InterpreterError::new(
            InterpreterErrorCode::UnsatisfiedLockTime,
            format!(
                "locktime requirement not satisfied -- locktime is greater than the transaction locktime: {} > {}",
                lock_time, tx_lock_time
            ),
        ));
    }
    Ok(())
}
