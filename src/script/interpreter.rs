//! Script interpreter
//!
//! A stack machine that checks whether an input may spend an output.
//! The unlock script's pushes form the initial stack, then the output's lock
//! script runs against it. Safety limits:
//! - Stack plus alt stack depth (1000 items)
//! - Element size (520 bytes)
//! - Counted operations (500)
//!
//! Any failure (underflow, disabled or unknown opcode, bad signature
//! encoding, arithmetic overflow) ends evaluation with `false`.

use super::error::ScriptError;
use super::opcode::{is_unknown_opcode, Opcode};
use super::script::{Script, ScriptChunk};
use super::script_num::{is_truthy, minimize, ScriptNum, MAX_SCRIPT_NUM_LEN};
use super::sighash::{sighash, HashCache, TxSignature};
use crate::core::transaction::Tx;
use crate::crypto::{blake3_hash, double_blake3_hash, verify_digest, PUB_KEY_SIZE};

// =============================================================================
// Interpreter Limits
// =============================================================================

/// Maximum combined size of the main and alt stacks
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum size of one stack element in bytes
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Maximum number of non-push operations per script
pub const MAX_OPS: usize = 500;

/// Maximum keys in one CHECKMULTISIG
pub const MAX_MULTISIG_KEYS: usize = 20;

/// Evaluates one input's unlock script against the output it spends
pub struct Interpreter<'a> {
    tx: &'a Tx,
    n_in: usize,
    value: u64,
    hash_cache: &'a mut HashCache,
    stack: Vec<Vec<u8>>,
    alt_stack: Vec<Vec<u8>>,
    /// Execution state of each open IF
    if_stack: Vec<bool>,
    op_count: usize,
    /// Lock script bytes after the last executed CODESEPARATOR
    script_code: Vec<u8>,
    /// Reason for the last failure, empty on success
    pub err_str: String,
}

impl<'a> Interpreter<'a> {
    /// `value` is the amount of the output being spent
    pub fn new(tx: &'a Tx, n_in: usize, value: u64, hash_cache: &'a mut HashCache) -> Self {
        Self {
            tx,
            n_in,
            value,
            hash_cache,
            stack: Vec::new(),
            alt_stack: Vec::new(),
            if_stack: Vec::new(),
            op_count: 0,
            script_code: Vec::new(),
            err_str: String::new(),
        }
    }

    /// Run `unlock` then `lock`; true iff exactly one truthy item remains
    pub fn eval_tx_in(&mut self, unlock: &Script, lock: &Script) -> bool {
        match self.run(unlock, lock) {
            Ok(()) => {
                self.err_str.clear();
                true
            }
            Err(e) => {
                self.err_str = e.to_string();
                false
            }
        }
    }

    /// Final stack after a successful evaluation
    pub fn stack(&self) -> &[Vec<u8>] {
        &self.stack
    }

    fn run(&mut self, unlock: &Script, lock: &Script) -> Result<(), ScriptError> {
        let initial = unlock.push_values().ok_or(ScriptError::UnlockNotPushOnly)?;
        for item in initial {
            self.push(item)?;
        }

        self.script_code = lock.to_buf();
        for (index, chunk) in lock.chunks.iter().enumerate() {
            self.step(lock, index, chunk)?;
        }
        if !self.if_stack.is_empty() {
            return Err(ScriptError::UnbalancedConditional);
        }

        match self.stack.as_slice() {
            [top] if is_truthy(top) => Ok(()),
            [_] => Err(ScriptError::FalseResult),
            other => Err(ScriptError::DirtyStack(other.len())),
        }
    }

    fn executing(&self) -> bool {
        self.if_stack.iter().all(|b| *b)
    }

    /// Execute a single chunk
    fn step(&mut self, lock: &Script, index: usize, chunk: &ScriptChunk) -> Result<(), ScriptError> {
        if is_unknown_opcode(chunk.opcode) {
            return Err(ScriptError::UnknownOpcode(chunk.opcode));
        }
        if let Some(data) = &chunk.data {
            if data.len() > MAX_ELEMENT_SIZE {
                return Err(ScriptError::ElementTooLarge(data.len()));
            }
            if self.executing() {
                self.push(data.clone())?;
            }
            return Ok(());
        }

        let opcode = Opcode::from_byte(chunk.opcode).ok_or(ScriptError::UnknownOpcode(chunk.opcode))?;
        if opcode.is_disabled() {
            return Err(ScriptError::DisabledOpcode(chunk.opcode));
        }
        if chunk.opcode > Opcode::Op16 as u8 {
            self.op_count += 1;
            if self.op_count > MAX_OPS {
                return Err(ScriptError::TooManyOps);
            }
        }

        let is_conditional = matches!(
            opcode,
            Opcode::If | Opcode::NotIf | Opcode::Else | Opcode::EndIf
        );
        if !self.executing() && !is_conditional {
            return Ok(());
        }

        match opcode {
            // Constants
            Opcode::Op0 => self.push(Vec::new())?,
            Opcode::Op1Negate => self.push_num(ScriptNum(-1))?,
            Opcode::Op1
            | Opcode::Op2
            | Opcode::Op3
            | Opcode::Op4
            | Opcode::Op5
            | Opcode::Op6
            | Opcode::Op7
            | Opcode::Op8
            | Opcode::Op9
            | Opcode::Op10
            | Opcode::Op11
            | Opcode::Op12
            | Opcode::Op13
            | Opcode::Op14
            | Opcode::Op15
            | Opcode::Op16 => {
                let n = opcode.small_int_value().unwrap_or_default();
                self.push(vec![n])?;
            }

            // Flow control
            Opcode::Nop
            | Opcode::Nop1
            | Opcode::Nop4
            | Opcode::Nop5
            | Opcode::Nop6
            | Opcode::Nop7
            | Opcode::Nop8
            | Opcode::Nop9
            | Opcode::Nop10 => {}
            Opcode::If | Opcode::NotIf => {
                let mut branch = false;
                if self.executing() {
                    let cond = is_truthy(&self.pop()?);
                    branch = if opcode == Opcode::If { cond } else { !cond };
                }
                self.if_stack.push(branch);
            }
            Opcode::Else => {
                let outer_executing = self.if_stack.len() < 2
                    || self.if_stack[..self.if_stack.len() - 1].iter().all(|b| *b);
                let top = self
                    .if_stack
                    .last_mut()
                    .ok_or(ScriptError::UnbalancedConditional)?;
                *top = outer_executing && !*top;
            }
            Opcode::EndIf => {
                self.if_stack
                    .pop()
                    .ok_or(ScriptError::UnbalancedConditional)?;
            }
            Opcode::Verify => {
                if !is_truthy(&self.pop()?) {
                    return Err(ScriptError::VerifyFailed("OP_VERIFY"));
                }
            }
            Opcode::Return => return Err(ScriptError::OpReturn),

            // Stack
            Opcode::ToAltStack => {
                let v = self.pop()?;
                self.alt_stack.push(v);
            }
            Opcode::FromAltStack => {
                let v = self.alt_stack.pop().ok_or(ScriptError::StackUnderflow)?;
                self.push(v)?;
            }
            Opcode::TwoDrop => {
                self.pop()?;
                self.pop()?;
            }
            Opcode::TwoDup => {
                let a = self.peek(1)?.clone();
                let b = self.peek(0)?.clone();
                self.push(a)?;
                self.push(b)?;
            }
            Opcode::ThreeDup => {
                let a = self.peek(2)?.clone();
                let b = self.peek(1)?.clone();
                let c = self.peek(0)?.clone();
                self.push(a)?;
                self.push(b)?;
                self.push(c)?;
            }
            Opcode::TwoOver => {
                let a = self.peek(3)?.clone();
                let b = self.peek(2)?.clone();
                self.push(a)?;
                self.push(b)?;
            }
            Opcode::TwoRot => {
                self.require(6)?;
                let len = self.stack.len();
                let moved: Vec<_> = self.stack.drain(len - 6..len - 4).collect();
                self.stack.extend(moved);
            }
            Opcode::TwoSwap => {
                self.require(4)?;
                let len = self.stack.len();
                self.stack.swap(len - 4, len - 2);
                self.stack.swap(len - 3, len - 1);
            }
            Opcode::IfDup => {
                let top = self.peek(0)?.clone();
                if is_truthy(&top) {
                    self.push(top)?;
                }
            }
            Opcode::Depth => self.push_num(ScriptNum::from(self.stack.len() as u64))?,
            Opcode::Drop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.peek(0)?.clone();
                self.push(top)?;
            }
            Opcode::Nip => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.remove(len - 2);
            }
            Opcode::Over => {
                let v = self.peek(1)?.clone();
                self.push(v)?;
            }
            Opcode::Pick | Opcode::Roll => {
                let n = self.pop_num()?.value();
                let n = usize::try_from(n).map_err(|_| ScriptError::InvalidRange("PICK/ROLL"))?;
                if n >= self.stack.len() {
                    return Err(ScriptError::StackUnderflow);
                }
                let idx = self.stack.len() - 1 - n;
                let v = if opcode == Opcode::Roll {
                    self.stack.remove(idx)
                } else {
                    self.stack[idx].clone()
                };
                self.push(v)?;
            }
            Opcode::Rot => {
                self.require(3)?;
                let len = self.stack.len();
                let v = self.stack.remove(len - 3);
                self.stack.push(v);
            }
            Opcode::Swap => {
                self.require(2)?;
                let len = self.stack.len();
                self.stack.swap(len - 2, len - 1);
            }
            Opcode::Tuck => {
                self.require(2)?;
                let top = self.peek(0)?.clone();
                let len = self.stack.len();
                self.stack.insert(len - 2, top);
                self.check_depth()?;
            }

            // Splice
            Opcode::Cat => {
                let b = self.pop()?;
                let mut a = self.pop()?;
                a.extend_from_slice(&b);
                self.push(a)?;
            }
            Opcode::Split => {
                let n = self.pop_num()?.value();
                let data = self.pop()?;
                let n = usize::try_from(n)
                    .ok()
                    .filter(|n| *n <= data.len())
                    .ok_or(ScriptError::InvalidRange("OP_SPLIT"))?;
                let (left, right) = data.split_at(n);
                self.push(left.to_vec())?;
                self.push(right.to_vec())?;
            }
            Opcode::Num2Bin => {
                let size = self.pop_num()?.value();
                let size = usize::try_from(size)
                    .ok()
                    .filter(|s| *s <= MAX_ELEMENT_SIZE)
                    .ok_or(ScriptError::InvalidRange("NUM2BIN"))?;
                let raw = minimize(&self.pop()?);
                let n = ScriptNum::from_buf(&raw)?;
                self.push(n.to_buf_padded(size)?)?;
            }
            Opcode::Bin2Num => {
                let raw = minimize(&self.pop()?);
                if raw.len() > MAX_SCRIPT_NUM_LEN {
                    return Err(ScriptError::NumberTooLong(raw.len()));
                }
                self.push_num(ScriptNum::from_buf(&raw)?)?;
            }
            Opcode::Size => {
                let len = self.peek(0)?.len();
                self.push_num(ScriptNum::from(len as u64))?;
            }

            // Bitwise logic
            Opcode::Invert => {
                let v = self.pop()?.iter().map(|b| !b).collect();
                self.push(v)?;
            }
            Opcode::And | Opcode::Or | Opcode::Xor => {
                let b = self.pop()?;
                let a = self.pop()?;
                if a.len() != b.len() {
                    return Err(ScriptError::OperandSizeMismatch);
                }
                let v = a
                    .iter()
                    .zip(&b)
                    .map(|(x, y)| match opcode {
                        Opcode::And => x & y,
                        Opcode::Or => x | y,
                        _ => x ^ y,
                    })
                    .collect();
                self.push(v)?;
            }
            Opcode::Equal | Opcode::EqualVerify => {
                let b = self.pop()?;
                let a = self.pop()?;
                let equal = a == b;
                if opcode == Opcode::EqualVerify {
                    if !equal {
                        return Err(ScriptError::VerifyFailed("OP_EQUALVERIFY"));
                    }
                } else {
                    self.push_bool(equal)?;
                }
            }

            // Arithmetic
            Opcode::Add1
            | Opcode::Sub1
            | Opcode::Negate
            | Opcode::Abs
            | Opcode::Not
            | Opcode::NotEqual0 => {
                let a = self.pop_num()?;
                let r = match opcode {
                    Opcode::Add1 => a.checked_add(ScriptNum(1))?,
                    Opcode::Sub1 => a.checked_sub(ScriptNum(1))?,
                    Opcode::Negate => a.checked_neg()?,
                    Opcode::Abs => a.checked_abs()?,
                    Opcode::Not => ScriptNum::from(a.value() == 0),
                    _ => ScriptNum::from(a.value() != 0),
                };
                self.push_num(r)?;
            }
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::BoolAnd
            | Opcode::BoolOr
            | Opcode::NumEqual
            | Opcode::NumEqualVerify
            | Opcode::NumNotEqual
            | Opcode::LessThan
            | Opcode::GreaterThan
            | Opcode::LessThanOrEqual
            | Opcode::GreaterThanOrEqual
            | Opcode::Min
            | Opcode::Max => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                let r = match opcode {
                    Opcode::Add => a.checked_add(b)?,
                    Opcode::Sub => a.checked_sub(b)?,
                    Opcode::Mul => a.checked_mul(b)?,
                    Opcode::Div => a.checked_div(b)?,
                    Opcode::Mod => a.checked_rem(b)?,
                    Opcode::BoolAnd => ScriptNum::from(a.value() != 0 && b.value() != 0),
                    Opcode::BoolOr => ScriptNum::from(a.value() != 0 || b.value() != 0),
                    Opcode::NumEqual | Opcode::NumEqualVerify => ScriptNum::from(a == b),
                    Opcode::NumNotEqual => ScriptNum::from(a != b),
                    Opcode::LessThan => ScriptNum::from(a < b),
                    Opcode::GreaterThan => ScriptNum::from(a > b),
                    Opcode::LessThanOrEqual => ScriptNum::from(a <= b),
                    Opcode::GreaterThanOrEqual => ScriptNum::from(a >= b),
                    Opcode::Min => a.min(b),
                    _ => a.max(b),
                };
                if opcode == Opcode::NumEqualVerify {
                    if r.value() == 0 {
                        return Err(ScriptError::VerifyFailed("OP_NUMEQUALVERIFY"));
                    }
                } else {
                    self.push_num(r)?;
                }
            }
            Opcode::Within => {
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let x = self.pop_num()?;
                self.push_bool(min <= x && x < max)?;
            }

            // Crypto
            Opcode::Blake3 => {
                let v = self.pop()?;
                self.push(blake3_hash(&v).to_vec())?;
            }
            Opcode::DoubleBlake3 => {
                let v = self.pop()?;
                self.push(double_blake3_hash(&v).to_vec())?;
            }
            Opcode::CodeSeparator => {
                self.script_code = Script::new(lock.chunks[index + 1..].to_vec()).to_buf();
            }
            Opcode::CheckSig | Opcode::CheckSigVerify => {
                let pub_key = self.pop()?;
                let sig = self.pop()?;
                let ok = self.check_sig(&sig, &pub_key)?;
                if opcode == Opcode::CheckSigVerify {
                    if !ok {
                        return Err(ScriptError::VerifyFailed("OP_CHECKSIGVERIFY"));
                    }
                } else {
                    self.push_bool(ok)?;
                }
            }
            Opcode::CheckMultiSig | Opcode::CheckMultiSigVerify => {
                let ok = self.check_multi_sig()?;
                if opcode == Opcode::CheckMultiSigVerify {
                    if !ok {
                        return Err(ScriptError::VerifyFailed("OP_CHECKMULTISIGVERIFY"));
                    }
                } else {
                    self.push_bool(ok)?;
                }
            }

            // Locks
            Opcode::CheckLockAbsVerify => {
                let lock = self.peek_lock()?;
                if lock > self.tx.lock_abs {
                    return Err(ScriptError::LockAbsNotReached);
                }
            }
            Opcode::CheckLockRelVerify => {
                let lock = self.peek_lock()?;
                let input = self
                    .tx
                    .inputs
                    .get(self.n_in)
                    .ok_or(ScriptError::InputIndexOutOfRange(self.n_in))?;
                if lock > u64::from(input.lock_rel) {
                    return Err(ScriptError::LockRelNotReached);
                }
            }

            Opcode::PushData1 | Opcode::PushData2 | Opcode::PushData4 => {
                // Parsed chunks always carry data for these
                return Err(ScriptError::TruncatedPushData(chunk.opcode));
            }

            Opcode::Reserved
            | Opcode::Ver
            | Opcode::VerIf
            | Opcode::VerNotIf
            | Opcode::Reserved1
            | Opcode::Reserved2
            | Opcode::Mul2
            | Opcode::Div2
            | Opcode::LShift
            | Opcode::RShift => return Err(ScriptError::DisabledOpcode(chunk.opcode)),
        }

        Ok(())
    }

    fn check_sig(&mut self, sig_buf: &[u8], pub_key: &[u8]) -> Result<bool, ScriptError> {
        if pub_key.len() != PUB_KEY_SIZE {
            return Err(ScriptError::InvalidPubKeyEncoding);
        }
        let sig = TxSignature::from_buf(sig_buf)?;
        let digest = sighash(
            self.tx,
            self.n_in,
            &self.script_code,
            self.value,
            sig.hash_type,
            self.hash_cache,
        )?;
        Ok(verify_digest(pub_key, &digest, sig.sig.as_slice()))
    }

    /// Stack: `<sig 1> .. <sig m> <m> <key 1> .. <key n> <n>`
    ///
    /// Signatures must appear in the same order as their keys.
    fn check_multi_sig(&mut self) -> Result<bool, ScriptError> {
        let n_keys = self.pop_count()?;
        if n_keys > MAX_MULTISIG_KEYS {
            return Err(ScriptError::InvalidMultisigCount);
        }
        self.op_count += n_keys;
        if self.op_count > MAX_OPS {
            return Err(ScriptError::TooManyOps);
        }
        let mut keys = Vec::with_capacity(n_keys);
        for _ in 0..n_keys {
            keys.push(self.pop()?);
        }
        keys.reverse();

        let n_sigs = self.pop_count()?;
        if n_sigs > n_keys {
            return Err(ScriptError::InvalidMultisigCount);
        }
        let mut sigs = Vec::with_capacity(n_sigs);
        for _ in 0..n_sigs {
            sigs.push(self.pop()?);
        }
        sigs.reverse();

        let mut key_iter = keys.iter();
        for sig in &sigs {
            let mut matched = false;
            for key in key_iter.by_ref() {
                if self.check_sig(sig, key)? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn push(&mut self, item: Vec<u8>) -> Result<(), ScriptError> {
        if item.len() > MAX_ELEMENT_SIZE {
            return Err(ScriptError::ElementTooLarge(item.len()));
        }
        self.stack.push(item);
        self.check_depth()
    }

    fn check_depth(&self) -> Result<(), ScriptError> {
        let depth = self.stack.len() + self.alt_stack.len();
        if depth > MAX_STACK_SIZE {
            return Err(ScriptError::StackOverflow(depth));
        }
        Ok(())
    }

    fn push_num(&mut self, n: ScriptNum) -> Result<(), ScriptError> {
        self.push(n.to_buf())
    }

    fn push_bool(&mut self, b: bool) -> Result<(), ScriptError> {
        self.push_num(ScriptNum::from(b))
    }

    fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.stack.pop().ok_or(ScriptError::StackUnderflow)
    }

    fn pop_num(&mut self) -> Result<ScriptNum, ScriptError> {
        let v = self.pop()?;
        ScriptNum::from_buf(&v)
    }

    fn pop_count(&mut self) -> Result<usize, ScriptError> {
        let n = self.pop_num()?.value();
        usize::try_from(n).map_err(|_| ScriptError::InvalidMultisigCount)
    }

    /// Item `depth` positions below the top
    fn peek(&self, depth: usize) -> Result<&Vec<u8>, ScriptError> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(ScriptError::StackUnderflow)
    }

    fn peek_lock(&self) -> Result<u64, ScriptError> {
        let n = ScriptNum::from_buf(self.peek(0)?)?;
        n.to_u64().ok_or(ScriptError::NegativeLock)
    }

    fn require(&self, n: usize) -> Result<(), ScriptError> {
        if self.stack.len() < n {
            return Err(ScriptError::StackUnderflow);
        }
        Ok(())
    }
}

/// Evaluate input `n_in` of `tx`, which spends an output of `value` locked by `lock`
pub fn eval_tx_input(
    tx: &Tx,
    n_in: usize,
    lock: &Script,
    value: u64,
    hash_cache: &mut HashCache,
) -> bool {
    let Some(input) = tx.inputs.get(n_in) else {
        return false;
    };
    Interpreter::new(tx, n_in, value, hash_cache).eval_tx_in(&input.script, lock)
}
