//! Script model for the BSV transaction core.
//!
//! Scripts as raw bytes and as parsed chunks, assembly text in both
//! directions, the locking/unlocking role wrappers, P2PKH addresses and the
//! `Spend` interpreter.

pub mod address;
pub mod chunk;
pub mod interpreter;
pub mod opcodes;
pub mod script;

mod error;
pub use address::{Address, Network};
pub use chunk::ScriptChunk;
pub use error::ScriptError;
pub use script::{LockingScript, Script, UnlockingScript};
