//! Script execution stack.

use bsv_core_primitives::bignum::BigNumber;

use super::error::{InterpreterError, InterpreterErrorCode};

/// Convert a stack item to a boolean. Any non-zero byte is true, except that
/// a lone sign bit in the last byte is negative zero and therefore false.
pub fn as_bool(t: &[u8]) -> bool {
    match t.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|b| *b != 0) || (last & 0x7f) != 0,
    }
}

pub fn from_bool(v: bool) -> Vec<u8> {
    if v {
        vec![1]
    } else {
        vec![]
    }
}

/// A byte-vector stack (top at the end) that tracks the bytes it holds.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    items: Vec<Vec<u8>>,
    mem: usize,
    max_num_length: usize,
    require_minimal: bool,
}

fn invalid_index(idx: usize, depth: usize) -> InterpreterError {
    InterpreterError::new(
        InterpreterErrorCode::InvalidStackOperation,
        format!("index {} is invalid for stack size {}", idx, depth),
    )
}

impl Stack {
    pub fn new(max_num_length: usize, require_minimal: bool) -> Self {
        Stack {
            items: Vec::new(),
            mem: 0,
            max_num_length,
            require_minimal,
        }
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    /// Total bytes across all items.
    pub fn mem(&self) -> usize {
        self.mem
    }

    /// Items, bottom first.
    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    pub fn push(&mut self, data: Vec<u8>) {
        self.mem += data.len();
        self.items.push(data);
    }

    pub fn push_num(&mut self, n: &BigNumber) {
        self.push(n.to_script_num());
    }

    pub fn push_bool(&mut self, val: bool) {
        self.push(from_bool(val));
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, InterpreterError> {
        self.nip(0)
    }

    /// Pop a script number, enforcing the length limit and, when configured,
    /// minimal encoding.
    pub fn pop_num(&mut self) -> Result<BigNumber, InterpreterError> {
        let data = self.pop()?;
        self.decode_num(&data, self.max_num_length)
    }

    pub fn pop_bool(&mut self) -> Result<bool, InterpreterError> {
        Ok(as_bool(&self.pop()?))
    }

    /// Decode `data` as a script number no longer than `max_len` bytes.
    pub fn decode_num(&self, data: &[u8], max_len: usize) -> Result<BigNumber, InterpreterError> {
        Ok(BigNumber::from_script_num_checked(data, max_len, self.require_minimal)?)
    }

    /// The item `idx` positions below the top.
    pub fn peek(&self, idx: usize) -> Result<&[u8], InterpreterError> {
        let depth = self.items.len();
        if idx >= depth {
            return Err(invalid_index(idx, depth));
        }
        Ok(&self.items[depth - idx - 1])
    }

    /// Remove and return the item `idx` positions below the top.
    pub fn nip(&mut self, idx: usize) -> Result<Vec<u8>, InterpreterError> {
        let depth = self.items.len();
        if idx >= depth {
            return Err(invalid_index(idx, depth));
        }
        let item = self.items.remove(depth - idx - 1);
        self.mem -= item.len();
        Ok(item)
    }

    pub fn tuck(&mut self) -> Result<(), InterpreterError> {
        let so2 = self.pop()?;
        let so1 = self.pop()?;
        self.push(so2.clone());
        self.push(so1);
        self.push(so2);
        Ok(())
    }

    pub fn drop_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        if n > self.depth() {
            return Err(invalid_index(n - 1, self.depth()));
        }
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    /// Duplicate the top `n` items, preserving order.
    pub fn dup_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        for _ in 0..n {
            let so = self.peek(n - 1)?.to_vec();
            self.push(so);
        }
        Ok(())
    }

    /// Move the `n` items starting `2n` below the top to the top.
    pub fn rot_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        let entry = 3 * n - 1;
        for _ in 0..n {
            let so = self.nip(entry)?;
            self.push(so);
        }
        Ok(())
    }

    /// Swap the top `n` items with the `n` below them.
    pub fn swap_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        let entry = 2 * n - 1;
        for _ in 0..n {
            let so = self.nip(entry)?;
            self.push(so);
        }
        Ok(())
    }

    /// Copy the `n` items below the top `n` to the top.
    pub fn over_n(&mut self, n: usize) -> Result<(), InterpreterError> {
        let entry = 2 * n - 1;
        for _ in 0..n {
            let so = self.peek(entry)?.to_vec();
            self.push(so);
        }
        Ok(())
    }

    pub fn pick(&mut self, idx: usize) -> Result<(), InterpreterError> {
        let so = self.peek(idx)?.to_vec();
        self.push(so);
        Ok(())
    }

    pub fn roll(&mut self, idx: usize) -> Result<(), InterpreterError> {
        let so = self.nip(idx)?;
        self.push(so);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_of(items: &[&[u8]]) -> Stack {
        let mut s = Stack::new(4, false);
        for item in items {
            s.push(item.to_vec());
        }
        s
    }

    #[test]
    fn test_as_bool() {
        assert!(!as_bool(&[]));
        assert!(!as_bool(&[0x00]));
        assert!(!as_bool(&[0x80]));
        assert!(as_bool(&[0x01]));
        assert!(as_bool(&[0x00, 0x01]));
        assert!(!as_bool(&[0x00, 0x00]));
        assert!(!as_bool(&[0x00, 0x80]));
        assert!(as_bool(&[0x80, 0x00]));
        assert!(as_bool(&[0x81]));
    }

    #[test]
    fn test_memory_tracking() {
        let mut s = stack_of(&[&[1, 2, 3], &[4, 5]]);
        assert_eq!(s.mem(), 5);
        s.dup_n(2).unwrap();
        assert_eq!(s.mem(), 10);
        assert_eq!(s.pop().unwrap(), vec![4, 5]);
        assert_eq!(s.mem(), 8);
        assert_eq!(s.nip(1).unwrap(), vec![4, 5]);
        assert_eq!(s.mem(), 6);
        assert_eq!(s.items(), &[vec![1, 2, 3], vec![1, 2, 3]]);
    }

    #[test]
    fn test_rot_swap_over() {
        let mut s = stack_of(&[&[1], &[2], &[3]]);
        s.rot_n(1).unwrap();
        assert_eq!(s.items(), &[vec![2], vec![3], vec![1]]);
        s.swap_n(1).unwrap();
        assert_eq!(s.items(), &[vec![2], vec![1], vec![3]]);
        s.over_n(1).unwrap();
        assert_eq!(s.items(), &[vec![2], vec![1], vec![3], vec![1]]);
    }

    #[test]
    fn test_out_of_range() {
        let mut s = stack_of(&[&[1]]);
        assert!(s.peek(1).is_err());
        assert!(s.drop_n(2).is_err());
        assert!(s.swap_n(1).is_err());
        let err = s.roll(5).unwrap_err();
        assert_eq!(err.code, InterpreterErrorCode::InvalidStackOperation);
    }

    #[test]
    fn test_pop_num_limits() {
        let mut s = stack_of(&[&[1, 2, 3, 4, 5]]);
        assert_eq!(s.pop_num().unwrap_err().code, InterpreterErrorCode::NumberTooBig);

        let mut strict = Stack::new(4, true);
        strict.push(vec![0x05, 0x00]);
        assert_eq!(strict.pop_num().unwrap_err().code, InterpreterErrorCode::MinimalData);
        strict.push(vec![0x05]);
        assert_eq!(strict.pop_num().unwrap(), BigNumber::from(5));
    }
}
