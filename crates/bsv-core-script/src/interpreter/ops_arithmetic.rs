//! Numeric operations. Operands are arbitrary-precision script numbers,
//! bounded only by the configured maximum number length.

use bsv_core_primitives::bignum::BigNumber;

use super::error::{InterpreterError, InterpreterErrorCode};
use super::spend::Spend;

impl<'a> Spend<'a> {
    pub(crate) fn op_unary_num(
        &mut self,
        f: impl FnOnce(BigNumber) -> BigNumber,
    ) -> Result<(), InterpreterError> {
        let m = self.stack.pop_num()?;
        self.stack.push_num(&f(m));
        Ok(())
    }

    /// Pops `b` (top) then `a` and pushes `f(a, b)`.
    pub(crate) fn op_binary_num(
        &mut self,
        f: impl FnOnce(BigNumber, BigNumber) -> Result<BigNumber, InterpreterError>,
    ) -> Result<(), InterpreterError> {
        let b = self.stack.pop_num()?;
        let a = self.stack.pop_num()?;
        let result = f(a, b)?;
        self.stack.push_num(&result);
        Ok(())
    }

    pub(crate) fn op_num_predicate(
        &mut self,
        f: impl FnOnce(&BigNumber, &BigNumber) -> bool,
    ) -> Result<(), InterpreterError> {
        let b = self.stack.pop_num()?;
        let a = self.stack.pop_num()?;
        self.stack.push_bool(f(&a, &b));
        Ok(())
    }

    pub(crate) fn op_div_mod(&mut self, is_div: bool) -> Result<(), InterpreterError> {
        self.op_binary_num(|a, b| {
            if b.is_zero() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::DivideByZero,
                    "division by zero",
                ));
            }
            Ok(if is_div { a / b } else { a % b })
        })
    }

    /// `x min max OP_WITHIN`: true when `min <= x < max`.
    pub(crate) fn op_within(&mut self) -> Result<(), InterpreterError> {
        let max = self.stack.pop_num()?;
        let min = self.stack.pop_num()?;
        let x = self.stack.pop_num()?;
        self.stack.push_bool(min <= x && x < max);
        Ok(())
    }

    /// Bit shift of the whole byte string, which is treated as big-endian.
    /// The result keeps the input's length; bits shifted out are lost.
    pub(crate) fn op_shift(&mut self, left: bool) -> Result<(), InterpreterError> {
        let n = self.stack.pop_num()?;
        let x = self.stack.pop()?;
        if n.is_negative() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::NumberTooSmall,
                "n less than 0",
            ));
        }
        let total_bits = x.len() * 8;
        let n = match n.to_usize() {
            Some(n) if n < total_bits => n,
            _ => {
                self.stack.push(vec![0u8; x.len()]);
                return Ok(());
            }
        };
        let result = if left { lshift(&x, n) } else { rshift(&x, n) };
        self.stack.push(result);
        Ok(())
    }
}

fn lshift(x: &[u8], n: usize) -> Vec<u8> {
    const MASKS: [u8; 8] = [0xff, 0x7f, 0x3f, 0x1f, 0x0f, 0x07, 0x03, 0x01];
    let bit_shift = n % 8;
    let byte_shift = n / 8;
    let mask = MASKS[bit_shift];
    let overflow_mask = !mask;

    let mut result = vec![0u8; x.len()];
    for i in (byte_shift..x.len()).rev() {
        let k = i - byte_shift;
        result[k] |= (x[i] & mask) << bit_shift;
        if k >= 1 && bit_shift > 0 {
            result[k - 1] |= (x[i] & overflow_mask) >> (8 - bit_shift);
        }
    }
    result
}

fn rshift(x: &[u8], n: usize) -> Vec<u8> {
    const MASKS: [u8; 8] = [0xff, 0xfe, 0xfc, 0xf8, 0xf0, 0xe0, 0xc0, 0x80];
    let bit_shift = n % 8;
    let byte_shift = n / 8;
    let mask = MASKS[bit_shift];
    let overflow_mask = !mask;

    let mut result = vec![0u8; x.len()];
    for (i, &b) in x.iter().enumerate() {
        let k = i + byte_shift;
        if k < x.len() {
            result[k] |= (b & mask) >> bit_shift;
        }
        if k + 1 < x.len() && bit_shift > 0 {
            result[k + 1] |= (b & overflow_mask) << (8 - bit_shift);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_across_byte_boundary() {
        assert_eq!(rshift(&[0x01, 0x00], 1), vec![0x00, 0x80]);
        assert_eq!(lshift(&[0x00, 0x80], 1), vec![0x01, 0x00]);
        assert_eq!(lshift(&[0x12, 0x34], 8), vec![0x34, 0x00]);
        assert_eq!(rshift(&[0x12, 0x34], 8), vec![0x00, 0x12]);
        assert_eq!(lshift(&[0x81], 0), vec![0x81]);
        assert_eq!(rshift(&[0xff, 0xff], 4), vec![0x0f, 0xff]);
    }
}
