//! Script system for output locking conditions
//!
//! - Opcodes and the binary/ASM script format
//! - Script numbers (minimal two's-complement, big-endian)
//! - Signature hashing (BIP-143 style preimage over BLAKE3)
//! - The stack interpreter that gates every spend

pub mod error;
pub mod interpreter;
pub mod opcode;
#[allow(clippy::module_inception)]
pub mod script;
pub mod script_num;
pub mod sighash;

pub use error::ScriptError;
pub use interpreter::{
    eval_tx_input, Interpreter, MAX_ELEMENT_SIZE, MAX_MULTISIG_KEYS, MAX_OPS, MAX_STACK_SIZE,
};
pub use opcode::{is_push_opcode, Opcode};
pub use script::{Script, ScriptChunk};
pub use script_num::{is_truthy, ScriptNum, MAX_SCRIPT_NUM_LEN};
pub use sighash::{
    sighash, sighash_preimage, sign_tx_input, HashCache, SigHashType, TxSignature,
    TX_SIGNATURE_SIZE,
};
