//! Script opcodes
//!
//! Defines the instruction set for the script interpreter. Direct data
//! pushes of 1..=75 bytes use the length itself as the opcode byte and have
//! no named variant.

use serde::{Deserialize, Serialize};

/// Largest opcode byte that is a direct push of that many bytes
pub const MAX_DIRECT_PUSH: u8 = 0x4b;

macro_rules! define_opcodes {
    ($( $(#[$meta:meta])* $variant:ident = $byte:literal => $name:literal, )*) => {
        /// Opcodes for the script interpreter
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$meta])* $variant = $byte, )*
        }

        impl Opcode {
            /// Convert byte to opcode
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $byte => Some(Opcode::$variant), )*
                    _ => None,
                }
            }

            /// Get opcode name for disassembly
            pub fn name(&self) -> &'static str {
                match self {
                    $( Opcode::$variant => concat!("OP_", $name), )*
                }
            }

            /// Parse an opcode name, with or without the `OP_` prefix
            pub fn from_name(name: &str) -> Option<Self> {
                let bare = name.strip_prefix("OP_").unwrap_or(name);
                match bare {
                    $( $name => Some(Opcode::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_opcodes! {
    // Constants
    /// Push an empty buffer
    Op0 = 0x00 => "0",
    PushData1 = 0x4c => "PUSHDATA1",
    PushData2 = 0x4d => "PUSHDATA2",
    PushData4 = 0x4e => "PUSHDATA4",
    /// Push -1
    Op1Negate = 0x4f => "1NEGATE",
    Reserved = 0x50 => "RESERVED",
    Op1 = 0x51 => "1",
    Op2 = 0x52 => "2",
    Op3 = 0x53 => "3",
    Op4 = 0x54 => "4",
    Op5 = 0x55 => "5",
    Op6 = 0x56 => "6",
    Op7 = 0x57 => "7",
    Op8 = 0x58 => "8",
    Op9 = 0x59 => "9",
    Op10 = 0x5a => "10",
    Op11 = 0x5b => "11",
    Op12 = 0x5c => "12",
    Op13 = 0x5d => "13",
    Op14 = 0x5e => "14",
    Op15 = 0x5f => "15",
    Op16 = 0x60 => "16",

    // Flow control
    Nop = 0x61 => "NOP",
    Ver = 0x62 => "VER",
    If = 0x63 => "IF",
    NotIf = 0x64 => "NOTIF",
    VerIf = 0x65 => "VERIF",
    VerNotIf = 0x66 => "VERNOTIF",
    Else = 0x67 => "ELSE",
    EndIf = 0x68 => "ENDIF",
    Verify = 0x69 => "VERIFY",
    Return = 0x6a => "RETURN",

    // Stack
    ToAltStack = 0x6b => "TOALTSTACK",
    FromAltStack = 0x6c => "FROMALTSTACK",
    TwoDrop = 0x6d => "2DROP",
    TwoDup = 0x6e => "2DUP",
    ThreeDup = 0x6f => "3DUP",
    TwoOver = 0x70 => "2OVER",
    TwoRot = 0x71 => "2ROT",
    TwoSwap = 0x72 => "2SWAP",
    IfDup = 0x73 => "IFDUP",
    Depth = 0x74 => "DEPTH",
    Drop = 0x75 => "DROP",
    Dup = 0x76 => "DUP",
    Nip = 0x77 => "NIP",
    Over = 0x78 => "OVER",
    Pick = 0x79 => "PICK",
    Roll = 0x7a => "ROLL",
    Rot = 0x7b => "ROT",
    Swap = 0x7c => "SWAP",
    Tuck = 0x7d => "TUCK",

    // Splice
    Cat = 0x7e => "CAT",
    Split = 0x7f => "SPLIT",
    Num2Bin = 0x80 => "NUM2BIN",
    Bin2Num = 0x81 => "BIN2NUM",
    Size = 0x82 => "SIZE",

    // Bitwise logic
    Invert = 0x83 => "INVERT",
    And = 0x84 => "AND",
    Or = 0x85 => "OR",
    Xor = 0x86 => "XOR",
    Equal = 0x87 => "EQUAL",
    EqualVerify = 0x88 => "EQUALVERIFY",
    Reserved1 = 0x89 => "RESERVED1",
    Reserved2 = 0x8a => "RESERVED2",

    // Arithmetic
    Add1 = 0x8b => "1ADD",
    Sub1 = 0x8c => "1SUB",
    Mul2 = 0x8d => "2MUL",
    Div2 = 0x8e => "2DIV",
    Negate = 0x8f => "NEGATE",
    Abs = 0x90 => "ABS",
    Not = 0x91 => "NOT",
    NotEqual0 = 0x92 => "0NOTEQUAL",
    Add = 0x93 => "ADD",
    Sub = 0x94 => "SUB",
    Mul = 0x95 => "MUL",
    Div = 0x96 => "DIV",
    Mod = 0x97 => "MOD",
    LShift = 0x98 => "LSHIFT",
    RShift = 0x99 => "RSHIFT",
    BoolAnd = 0x9a => "BOOLAND",
    BoolOr = 0x9b => "BOOLOR",
    NumEqual = 0x9c => "NUMEQUAL",
    NumEqualVerify = 0x9d => "NUMEQUALVERIFY",
    NumNotEqual = 0x9e => "NUMNOTEQUAL",
    LessThan = 0x9f => "LESSTHAN",
    GreaterThan = 0xa0 => "GREATERTHAN",
    LessThanOrEqual = 0xa1 => "LESSTHANOREQUAL",
    GreaterThanOrEqual = 0xa2 => "GREATERTHANOREQUAL",
    Min = 0xa3 => "MIN",
    Max = 0xa4 => "MAX",
    Within = 0xa5 => "WITHIN",

    // Crypto
    Blake3 = 0xa6 => "BLAKE3",
    DoubleBlake3 = 0xa7 => "DOUBLEBLAKE3",
    CodeSeparator = 0xab => "CODESEPARATOR",
    CheckSig = 0xac => "CHECKSIG",
    CheckSigVerify = 0xad => "CHECKSIGVERIFY",
    CheckMultiSig = 0xae => "CHECKMULTISIG",
    CheckMultiSigVerify = 0xaf => "CHECKMULTISIGVERIFY",

    // Locks and expansion
    Nop1 = 0xb0 => "NOP1",
    /// Fail unless the top item is at most the tx's absolute lock
    CheckLockAbsVerify = 0xb1 => "CHECKLOCKABSVERIFY",
    /// Fail unless the top item is at most the input's relative lock
    CheckLockRelVerify = 0xb2 => "CHECKLOCKRELVERIFY",
    Nop4 = 0xb3 => "NOP4",
    Nop5 = 0xb4 => "NOP5",
    Nop6 = 0xb5 => "NOP6",
    Nop7 = 0xb6 => "NOP7",
    Nop8 = 0xb7 => "NOP8",
    Nop9 = 0xb8 => "NOP9",
    Nop10 = 0xb9 => "NOP10",
}

impl Opcode {
    /// Opcodes that fail the script wherever they appear
    pub fn is_disabled(&self) -> bool {
        matches!(
            self,
            Opcode::Reserved
                | Opcode::Ver
                | Opcode::VerIf
                | Opcode::VerNotIf
                | Opcode::Reserved1
                | Opcode::Reserved2
                | Opcode::Mul2
                | Opcode::Div2
                | Opcode::LShift
                | Opcode::RShift
        )
    }

    /// Small-integer opcode for 0..=16
    pub fn small_int(n: u8) -> Option<Self> {
        match n {
            0 => Some(Opcode::Op0),
            1..=16 => Opcode::from_byte(Opcode::Op1 as u8 + n - 1),
            _ => None,
        }
    }

    /// Value pushed by OP_1..OP_16
    pub fn small_int_value(&self) -> Option<u8> {
        let b = *self as u8;
        (Opcode::Op1 as u8..=Opcode::Op16 as u8)
            .contains(&b)
            .then(|| b - Opcode::Op1 as u8 + 1)
    }
}

/// True for opcode bytes that only push data onto the stack
pub fn is_push_opcode(byte: u8) -> bool {
    byte <= Opcode::Op16 as u8 && byte != Opcode::Reserved as u8
}

/// True for bytes that are neither a known opcode nor a direct push
pub fn is_unknown_opcode(byte: u8) -> bool {
    !(1..=MAX_DIRECT_PUSH).contains(&byte) && Opcode::from_byte(byte).is_none()
}
