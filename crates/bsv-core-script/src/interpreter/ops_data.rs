//! Splice and bitwise operations.

use bsv_core_primitives::bignum::{minimally_encode, BigNumber};

use super::error::{InterpreterError, InterpreterErrorCode};
use super::spend::Spend;

impl<'a> Spend<'a> {
    pub(crate) fn op_cat(&mut self) -> Result<(), InterpreterError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let len = a.len() + b.len();
        if len > self.cfg.max_script_element_size() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ElementTooBig,
                format!(
                    "concatenated size {} exceeds max allowed size {}",
                    len,
                    self.cfg.max_script_element_size()
                ),
            ));
        }
        let mut c = a;
        c.extend_from_slice(&b);
        self.stack.push(c);
        Ok(())
    }

    pub(crate) fn op_split(&mut self) -> Result<(), InterpreterError> {
        let n = self.stack.pop_num()?;
        let mut c = self.stack.pop()?;
        if n.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooSmall,
                "n is negative",
            ));
        }
        let pos = match n.to_usize() {
            Some(pos) if pos <= c.len() => pos,
            _ => {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::NumberTooBig,
                    format!("n {} is larger than length of array {}", n, c.len()),
                ))
            }
        };
        let tail = c.split_off(pos);
        self.stack.push(c);
        self.stack.push(tail);
        Ok(())
    }

    /// `OP_NUM2BIN`: re-encode a number into exactly `size` bytes, keeping
    /// the sign bit in the final byte.
    pub(crate) fn op_num2bin(&mut self) -> Result<(), InterpreterError> {
        let size = self.stack.pop_num()?;
        let a = self.stack.pop()?;

        if size.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooSmall,
                format!("requested size {} is negative", size),
            ));
        }
        let max = self.cfg.max_script_element_size();
        let size = match size.to_usize() {
            Some(s) if s <= max => s,
            _ => {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::ElementTooBig,
                    format!("n {} is larger than the max of {}", size, max),
                ))
            }
        };
        let in_use = self.stack.mem() + self.alt_stack.mem();
        if in_use + size > self.memory_limit {
            return Err(InterpreterError::new(
                InterpreterErrorCode::MemoryLimitExceeded,
                format!(
                    "{} byte result would exceed the memory limit {}",
                    size, self.memory_limit
                ),
            ));
        }

        let mut b = minimally_encode(&a);
        if b.len() > size {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooSmall,
                format!("cannot fit {} bytes into {} sized array", b.len(), size),
            ));
        }
        if b.len() == size {
            self.stack.push(b);
            return Ok(());
        }

        let mut sign_bit = 0x00;
        if let Some(last) = b.last_mut() {
            sign_bit = *last & 0x80;
            *last &= 0x7f;
        }
        b.resize(size - 1, 0x00);
        b.push(sign_bit);
        self.stack.push(b);
        Ok(())
    }

    pub(crate) fn op_bin2num(&mut self) -> Result<(), InterpreterError> {
        let a = self.stack.pop()?;
        let b = minimally_encode(&a);
        if b.len() > self.cfg.max_script_number_length() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooBig,
                format!(
                    "script numbers are limited to {} bytes",
                    self.cfg.max_script_number_length()
                ),
            ));
        }
        self.stack.push(b);
        Ok(())
    }

    pub(crate) fn op_size(&mut self) -> Result<(), InterpreterError> {
        let len = BigNumber::from(self.stack.peek(0)?.len());
        self.stack.push_num(&len);
        Ok(())
    }

    pub(crate) fn op_invert(&mut self) -> Result<(), InterpreterError> {
        let mut a = self.stack.pop()?;
        a.iter_mut().for_each(|b| *b = !*b);
        self.stack.push(a);
        Ok(())
    }

    pub(crate) fn op_bitwise(&mut self, f: fn(u8, u8) -> u8) -> Result<(), InterpreterError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        if a.len() != b.len() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::InvalidInputLength,
                "byte arrays are not the same length",
            ));
        }
        let c = a.iter().zip(&b).map(|(&x, &y)| f(x, y)).collect();
        self.stack.push(c);
        Ok(())
    }

    pub(crate) fn op_equal(&mut self) -> Result<(), InterpreterError> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        self.stack.push_bool(a == b);
        Ok(())
    }
}
