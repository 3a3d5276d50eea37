//! Interpreter limits, selected by whether the spent output is post-genesis.

pub const MAX_OPS_BEFORE_GENESIS: usize = 500;
pub const MAX_STACK_SIZE_BEFORE_GENESIS: usize = 1000;
pub const MAX_SCRIPT_SIZE_BEFORE_GENESIS: usize = 10_000;
pub const MAX_SCRIPT_ELEMENT_SIZE_BEFORE_GENESIS: usize = 520;
pub const MAX_SCRIPT_NUMBER_LENGTH_BEFORE_GENESIS: usize = 4;
pub const MAX_PUB_KEYS_PER_MULTISIG_BEFORE_GENESIS: usize = 20;

pub const MAX_SCRIPT_ELEMENT_SIZE_AFTER_GENESIS: usize = 1_073_741_824;
pub const MAX_SCRIPT_NUMBER_LENGTH_AFTER_GENESIS: usize = 750_000;

/// Default cap on the bytes held by both stacks during one evaluation.
pub const DEFAULT_MEMORY_LIMIT: usize = 32_000_000;

const UNBOUNDED: usize = i32::MAX as usize;

/// Script configuration limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub after_genesis: bool,
}

impl Config {
    pub const fn before_genesis() -> Self {
        Config { after_genesis: false }
    }

    pub const fn after_genesis() -> Self {
        Config { after_genesis: true }
    }

    pub fn max_ops(&self) -> usize {
        if self.after_genesis { UNBOUNDED } else { MAX_OPS_BEFORE_GENESIS }
    }

    pub fn max_stack_size(&self) -> usize {
        if self.after_genesis { UNBOUNDED } else { MAX_STACK_SIZE_BEFORE_GENESIS }
    }

    pub fn max_script_size(&self) -> usize {
        if self.after_genesis { UNBOUNDED } else { MAX_SCRIPT_SIZE_BEFORE_GENESIS }
    }

    pub fn max_script_element_size(&self) -> usize {
        if self.after_genesis {
            MAX_SCRIPT_ELEMENT_SIZE_AFTER_GENESIS
        } else {
            MAX_SCRIPT_ELEMENT_SIZE_BEFORE_GENESIS
        }
    }

    pub fn max_script_number_length(&self) -> usize {
        if self.after_genesis {
            MAX_SCRIPT_NUMBER_LENGTH_AFTER_GENESIS
        } else {
            MAX_SCRIPT_NUMBER_LENGTH_BEFORE_GENESIS
        }
    }

    pub fn max_pub_keys_per_multisig(&self) -> usize {
        if self.after_genesis { UNBOUNDED } else { MAX_PUB_KEYS_PER_MULTISIG_BEFORE_GENESIS }
    }
}
