//! The `Spend` evaluator: runs an unlocking script followed by the locking
//! script it spends.

use bsv_core_primitives::bignum::BigNumber;
use bsv_core_primitives::chainhash::Hash;

use crate::chunk::ScriptChunk;
use crate::opcodes::*;
use crate::script::{LockingScript, UnlockingScript};

use super::config::{Config, DEFAULT_MEMORY_LIMIT};
use super::error::{ExecutionContext, InterpreterError, InterpreterErrorCode, SpendError};
use super::flags::ScriptFlags;
use super::ops_crypto::HashType;
use super::stack::{as_bool, Stack};
use super::TxContext;

/// Inputs to one evaluation.
#[derive(Clone, Copy)]
pub struct SpendParams<'a> {
    /// Txid of the transaction whose output is being spent. Only reported in
    /// errors.
    pub source_txid: Hash,
    pub source_output_index: u32,
    pub unlocking_script: &'a UnlockingScript,
    pub locking_script: &'a LockingScript,
    /// Required by the signature and lock-time opcodes.
    pub tx_context: Option<&'a dyn TxContext>,
    pub input_index: usize,
    pub flags: ScriptFlags,
    /// Upper bound on the bytes held by both stacks.
    pub memory_limit: usize,
}

impl<'a> SpendParams<'a> {
    /// Parameters with standard flags, the default memory limit and no
    /// transaction context.
    pub fn new(unlocking_script: &'a UnlockingScript, locking_script: &'a LockingScript) -> Self {
        SpendParams {
            source_txid: Hash::default(),
            source_output_index: 0,
            unlocking_script,
            locking_script,
            tx_context: None,
            input_index: 0,
            flags: ScriptFlags::STANDARD,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

/// Outcome of executing one chunk.
pub(crate) enum Flow {
    Continue,
    /// Post-genesis `OP_RETURN` outside any conditional: the current script
    /// ends successfully.
    Return,
}

/// The evaluation state of one (unlocking, locking) pair.
///
/// The unlocking script runs first against an empty stack. Its final main and
/// alt stacks carry into the locking script, which starts at program counter
/// zero. The spend is valid when the locking script finishes with a truthy
/// item on top of the stack.
pub struct Spend<'a> {
    pub(crate) source_txid: Hash,
    pub(crate) source_output_index: u32,
    pub(crate) unlocking: Vec<ScriptChunk>,
    pub(crate) locking: Vec<ScriptChunk>,
    pub(crate) tx_context: Option<&'a dyn TxContext>,
    pub(crate) input_index: usize,
    pub(crate) flags: ScriptFlags,
    pub(crate) memory_limit: usize,
    pub(crate) cfg: Config,
    pub(crate) stack: Stack,
    pub(crate) alt_stack: Stack,
    pub(crate) if_stack: Vec<bool>,
    /// Parallel to `if_stack`: whether that conditional has seen its `OP_ELSE`.
    pub(crate) else_seen: Vec<bool>,
    pub(crate) context: ExecutionContext,
    pub(crate) program_counter: usize,
    pub(crate) last_code_separator: Option<usize>,
    pub(crate) num_ops: usize,
    pub(crate) early_return: bool,
}

impl<'a> Spend<'a> {
    /// Parse both scripts and prepare an evaluation.
    ///
    /// Fails when either script is too large or contains a truncated push,
    /// or when `VERIFY_SIG_PUSH_ONLY` is set and the unlocking script holds a
    /// non-push opcode.
    pub fn new(params: SpendParams<'a>) -> Result<Self, SpendError> {
        let after_genesis = params.flags.has_flag(ScriptFlags::UTXO_AFTER_GENESIS);
        let cfg = if after_genesis {
            Config::after_genesis()
        } else {
            Config::before_genesis()
        };

        let mut flags = params.flags;
        if flags.has_flag(ScriptFlags::ENABLE_SIGHASH_FORKID) {
            flags.add_flag(ScriptFlags::VERIFY_STRICT_ENCODING);
        }
        let require_minimal = flags.has_flag(ScriptFlags::VERIFY_MINIMAL_DATA);
        let max_num_len = cfg.max_script_number_length();

        let mut spend = Spend {
            source_txid: params.source_txid,
            source_output_index: params.source_output_index,
            unlocking: Vec::new(),
            locking: Vec::new(),
            tx_context: params.tx_context,
            input_index: params.input_index,
            flags,
            memory_limit: params.memory_limit,
            cfg,
            stack: Stack::new(max_num_len, require_minimal),
            alt_stack: Stack::new(max_num_len, require_minimal),
            if_stack: Vec::new(),
            else_seen: Vec::new(),
            context: ExecutionContext::UnlockingScript,
            program_counter: 0,
            last_code_separator: None,
            num_ops: 0,
            early_return: false,
        };

        for (context, script) in [
            (ExecutionContext::UnlockingScript, params.unlocking_script.as_script()),
            (ExecutionContext::LockingScript, params.locking_script.as_script()),
        ] {
            spend.context = context;
            if script.len() > cfg.max_script_size() {
                return Err(spend.fail(InterpreterError::new(
                    InterpreterErrorCode::ScriptTooBig,
                    format!(
                        "{} size {} is larger than the max allowed size {}",
                        context,
                        script.len(),
                        cfg.max_script_size()
                    ),
                )));
            }
            let chunks = script.chunks().map_err(|e| {
                spend.fail(InterpreterError::new(
                    InterpreterErrorCode::MalformedPush,
                    e.to_string(),
                ))
            })?;
            match context {
                ExecutionContext::UnlockingScript => spend.unlocking = chunks,
                ExecutionContext::LockingScript => spend.locking = chunks,
            }
        }
        spend.context = ExecutionContext::UnlockingScript;

        if flags.has_flag(ScriptFlags::VERIFY_SIG_PUSH_ONLY)
            && !spend.unlocking.iter().all(ScriptChunk::is_push)
        {
            return Err(spend.fail(InterpreterError::new(
                InterpreterErrorCode::NotPushOnly,
                "unlocking script is not push only",
            )));
        }

        Ok(spend)
    }

    // -----------------------------------------------------------------------
    // State accessors
    // -----------------------------------------------------------------------

    /// Main stack, bottom first.
    pub fn stack(&self) -> &[Vec<u8>] {
        self.stack.items()
    }

    pub fn alt_stack(&self) -> &[Vec<u8>] {
        self.alt_stack.items()
    }

    pub fn if_stack(&self) -> &[bool] {
        &self.if_stack
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    /// True once the locking script has run to its end.
    pub fn is_finished(&self) -> bool {
        self.context == ExecutionContext::LockingScript && self.program_counter >= self.locking.len()
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run to completion and check the final stack.
    pub fn validate(&mut self) -> Result<(), SpendError> {
        let result = self.run();
        if let Err(e) = &result {
            log::debug!(
                "spend of {}:{} failed in {} at {}: {}",
                e.source_txid,
                e.source_output_index,
                e.context,
                e.program_counter,
                e.message
            );
        }
        result
    }

    fn run(&mut self) -> Result<(), SpendError> {
        while !self.is_finished() {
            self.step()?;
        }
        if !self.if_stack.is_empty() {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::UnbalancedConditional,
                "end of script reached in conditional execution",
            )));
        }
        if self.stack.depth() == 0 {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::EmptyStack,
                "stack empty at end of script execution",
            )));
        }
        if self.flags.has_flag(ScriptFlags::VERIFY_CLEAN_STACK) && self.stack.depth() != 1 {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::CleanStack,
                format!("stack contains {} unexpected items", self.stack.depth() - 1),
            )));
        }
        let top = self.stack.peek(0).map(as_bool).unwrap_or(false);
        if !top {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::EvalFalse,
                "false stack entry at end of script execution",
            )));
        }
        Ok(())
    }

    /// Execute a single chunk, moving from the unlocking to the locking
    /// script when the former is exhausted. Does nothing once finished.
    pub fn step(&mut self) -> Result<(), SpendError> {
        if self.context == ExecutionContext::UnlockingScript
            && self.program_counter >= self.unlocking.len()
        {
            self.enter_locking_script()?;
        }
        if self.is_finished() {
            return Ok(());
        }

        let chunk = self.current_script()[self.program_counter].clone();
        log::trace!(
            "{} pc={} op={}",
            self.context,
            self.program_counter,
            opcode_to_string(chunk.op)
        );

        match self.execute_chunk(&chunk) {
            Ok(Flow::Continue) => self.program_counter += 1,
            Ok(Flow::Return) => self.program_counter = self.current_script().len(),
            Err(e) => return Err(self.fail(e)),
        }

        let combined = self.stack.depth() + self.alt_stack.depth();
        if combined > self.cfg.max_stack_size() {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::StackOverflow,
                format!(
                    "combined stack size {} > max allowed {}",
                    combined,
                    self.cfg.max_stack_size()
                ),
            )));
        }
        let mem = self.stack.mem() + self.alt_stack.mem();
        if mem > self.memory_limit {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::MemoryLimitExceeded,
                format!("stack memory {} exceeds limit {}", mem, self.memory_limit),
            )));
        }
        Ok(())
    }

    fn enter_locking_script(&mut self) -> Result<(), SpendError> {
        if !self.if_stack.is_empty() {
            return Err(self.fail(InterpreterError::new(
                InterpreterErrorCode::UnbalancedConditional,
                "end of unlocking script reached in conditional execution",
            )));
        }
        self.context = ExecutionContext::LockingScript;
        self.program_counter = 0;
        self.last_code_separator = None;
        self.num_ops = 0;
        self.early_return = false;
        Ok(())
    }

    pub(crate) fn current_script(&self) -> &[ScriptChunk] {
        match self.context {
            ExecutionContext::UnlockingScript => &self.unlocking,
            ExecutionContext::LockingScript => &self.locking,
        }
    }

    /// Wrap an opcode failure with a snapshot of the current state.
    pub(crate) fn fail(&self, err: InterpreterError) -> SpendError {
        SpendError {
            code: err.code,
            message: err.description,
            source_txid: self.source_txid,
            source_output_index: self.source_output_index,
            context: self.context,
            program_counter: self.program_counter,
            stack: self.stack.items().to_vec(),
            alt_stack: self.alt_stack.items().to_vec(),
            if_stack: self.if_stack.clone(),
            stack_mem: self.stack.mem(),
            alt_stack_mem: self.alt_stack.mem(),
        }
    }

    pub(crate) fn has_flag(&self, flag: ScriptFlags) -> bool {
        self.flags.has_flag(flag)
    }

    pub(crate) fn has_any(&self, flags: &[ScriptFlags]) -> bool {
        self.flags.has_any(flags)
    }

    pub(crate) fn after_genesis(&self) -> bool {
        self.cfg.after_genesis
    }

    /// True when every enclosing conditional branch is taken.
    pub(crate) fn is_branch_executing(&self) -> bool {
        self.if_stack.iter().all(|taken| *taken)
    }

    /// Whether a non-conditional opcode should run right now.
    pub(crate) fn should_exec(&self) -> bool {
        self.is_branch_executing() && !(self.after_genesis() && self.early_return)
    }

    fn execute_chunk(&mut self, chunk: &ScriptChunk) -> Result<Flow, InterpreterError> {
        let op = chunk.op;
        let data_len = chunk.data.as_ref().map_or(0, Vec::len);
        if op <= OP_PUSHDATA4 && data_len > self.cfg.max_script_element_size() {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ElementTooBig,
                format!(
                    "element size {} exceeds max allowed size {}",
                    data_len,
                    self.cfg.max_script_element_size()
                ),
            ));
        }

        let exec = self.should_exec();

        if matches!(op, OP_2MUL | OP_2DIV) && (!self.after_genesis() || exec) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DisabledOpcode,
                format!("attempt to execute disabled opcode {}", opcode_to_string(op)),
            ));
        }
        if matches!(op, OP_VERIF | OP_VERNOTIF) && (!self.after_genesis() || exec) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::ReservedOpcode,
                format!("attempt to execute reserved opcode {}", opcode_to_string(op)),
            ));
        }

        if op > OP_16 {
            self.num_ops += 1;
            if self.num_ops > self.cfg.max_ops() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::TooManyOperations,
                    format!("exceeded max operation limit of {}", self.cfg.max_ops()),
                ));
            }
        }

        let conditional = matches!(op, OP_IF | OP_NOTIF | OP_ELSE | OP_ENDIF);
        if !exec && !conditional {
            return Ok(Flow::Continue);
        }

        if op <= OP_16 && op != OP_RESERVED {
            if self.has_flag(ScriptFlags::VERIFY_MINIMAL_DATA) && !chunk.is_minimal_push() {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::MinimalData,
                    format!(
                        "data push of {} bytes not minimally encoded with {}",
                        data_len,
                        opcode_to_string(op)
                    ),
                ));
            }
            if let Some(value) = chunk.push_value() {
                self.stack.push(value);
            }
            return Ok(Flow::Continue);
        }

        self.dispatch_opcode(op)
    }

    fn dispatch_opcode(&mut self, op: u8) -> Result<Flow, InterpreterError> {
        match op {
            OP_NOP => {}
            OP_IF => self.op_if(false)?,
            OP_NOTIF => self.op_if(true)?,
            OP_ELSE => self.op_else()?,
            OP_ENDIF => self.op_endif()?,
            OP_VERIFY => self.abstract_verify(op, InterpreterErrorCode::Verify)?,
            OP_RETURN => return self.op_return(),

            OP_CHECKLOCKTIMEVERIFY => self.op_check_locktime_verify()?,
            OP_CHECKSEQUENCEVERIFY => self.op_check_sequence_verify()?,

            OP_TOALTSTACK => self.op_to_alt_stack()?,
            OP_FROMALTSTACK => self.op_from_alt_stack()?,
            OP_2DROP => self.stack.drop_n(2)?,
            OP_2DUP => self.stack.dup_n(2)?,
            OP_3DUP => self.stack.dup_n(3)?,
            OP_2OVER => self.stack.over_n(2)?,
            OP_2ROT => self.stack.rot_n(2)?,
            OP_2SWAP => self.stack.swap_n(2)?,
            OP_IFDUP => self.op_ifdup()?,
            OP_DEPTH => self.op_depth(),
            OP_DROP => self.stack.drop_n(1)?,
            OP_DUP => self.stack.dup_n(1)?,
            OP_NIP => {
                self.stack.nip(1)?;
            }
            OP_OVER => self.stack.over_n(1)?,
            OP_PICK => self.op_pick()?,
            OP_ROLL => self.op_roll()?,
            OP_ROT => self.stack.rot_n(1)?,
            OP_SWAP => self.stack.swap_n(1)?,
            OP_TUCK => self.stack.tuck()?,

            OP_CAT => self.op_cat()?,
            OP_SPLIT => self.op_split()?,
            OP_NUM2BIN => self.op_num2bin()?,
            OP_BIN2NUM => self.op_bin2num()?,
            OP_SIZE => self.op_size()?,

            OP_INVERT => self.op_invert()?,
            OP_AND => self.op_bitwise(|a, b| a & b)?,
            OP_OR => self.op_bitwise(|a, b| a | b)?,
            OP_XOR => self.op_bitwise(|a, b| a ^ b)?,
            OP_EQUAL => self.op_equal()?,
            OP_EQUALVERIFY => {
                self.op_equal()?;
                self.abstract_verify(op, InterpreterErrorCode::EqualVerify)?;
            }

            OP_1ADD => self.op_unary_num(|m| m + BigNumber::one())?,
            OP_1SUB => self.op_unary_num(|m| m - BigNumber::one())?,
            OP_NEGATE => self.op_unary_num(|m| -m)?,
            OP_ABS => self.op_unary_num(|m| m.abs())?,
            OP_NOT => self.op_unary_num(|m| (m.is_zero() as i32).into())?,
            OP_0NOTEQUAL => self.op_unary_num(|m| (!m.is_zero() as i32).into())?,
            OP_ADD => self.op_binary_num(|a, b| Ok(a + b))?,
            OP_SUB => self.op_binary_num(|a, b| Ok(a - b))?,
            OP_MUL => self.op_binary_num(|a, b| Ok(a * b))?,
            OP_DIV => self.op_div_mod(true)?,
            OP_MOD => self.op_div_mod(false)?,
            OP_LSHIFT => self.op_shift(true)?,
            OP_RSHIFT => self.op_shift(false)?,
            OP_BOOLAND => self.op_num_predicate(|a, b| !a.is_zero() && !b.is_zero())?,
            OP_BOOLOR => self.op_num_predicate(|a, b| !a.is_zero() || !b.is_zero())?,
            OP_NUMEQUAL => self.op_num_predicate(|a, b| a == b)?,
            OP_NUMEQUALVERIFY => {
                self.op_num_predicate(|a, b| a == b)?;
                self.abstract_verify(op, InterpreterErrorCode::NumEqualVerify)?;
            }
            OP_NUMNOTEQUAL => self.op_num_predicate(|a, b| a != b)?,
            OP_LESSTHAN => self.op_num_predicate(|a, b| a < b)?,
            OP_GREATERTHAN => self.op_num_predicate(|a, b| a > b)?,
            OP_LESSTHANOREQUAL => self.op_num_predicate(|a, b| a <= b)?,
            OP_GREATERTHANOREQUAL => self.op_num_predicate(|a, b| a >= b)?,
            OP_MIN => self.op_binary_num(|a, b| Ok(if a < b { a } else { b }))?,
            OP_MAX => self.op_binary_num(|a, b| Ok(if a > b { a } else { b }))?,
            OP_WITHIN => self.op_within()?,

            OP_RIPEMD160 => self.op_hash(HashType::Ripemd160)?,
            OP_SHA1 => self.op_hash(HashType::Sha1)?,
            OP_SHA256 => self.op_hash(HashType::Sha256)?,
            OP_HASH160 => self.op_hash(HashType::Hash160)?,
            OP_HASH256 => self.op_hash(HashType::Hash256)?,
            OP_CODESEPARATOR => self.last_code_separator = Some(self.program_counter),
            OP_CHECKSIG => self.op_checksig()?,
            OP_CHECKSIGVERIFY => {
                self.op_checksig()?;
                self.abstract_verify(op, InterpreterErrorCode::CheckSigVerify)?;
            }
            OP_CHECKMULTISIG => self.op_checkmultisig()?,
            OP_CHECKMULTISIGVERIFY => {
                self.op_checkmultisig()?;
                self.abstract_verify(op, InterpreterErrorCode::CheckMultiSigVerify)?;
            }

            OP_NOP1 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9 | OP_NOP10 => {
                self.discourage_upgradable_nop(op)?
            }

            OP_RESERVED | OP_VER | OP_VERIF | OP_VERNOTIF | OP_RESERVED1 | OP_RESERVED2 => {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::ReservedOpcode,
                    format!("attempt to execute reserved opcode {}", opcode_to_string(op)),
                ));
            }
            _ => {
                return Err(InterpreterError::new(
                    InterpreterErrorCode::ReservedOpcode,
                    format!("attempt to execute invalid opcode {}", opcode_to_string(op)),
                ));
            }
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn discourage_upgradable_nop(&self, op: u8) -> Result<(), InterpreterError> {
        if self.has_flag(ScriptFlags::DISCOURAGE_UPGRADABLE_NOPS) {
            return Err(InterpreterError::new(
                InterpreterErrorCode::DiscourageUpgradableNOPs,
                format!("{} reserved for soft-fork upgrades", opcode_to_string(op)),
            ));
        }
        Ok(())
    }
}
