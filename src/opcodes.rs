//! # Opcode Table
//!
//! The byte-to-mnemonic mapping the decompiler dispatches on, plus the
//! object-specifier sub-operation table consulted for the `MakeObjectAlias`
//! family (`comments[byte - 23] -> sub_operation_name`).
//!
//! Real AppleScript bytecode assigns these mnemonics to specific byte
//! values inside Apple's Object Model container; this repository isn't
//! parsing that container (see [`crate::loader`]), so the byte assignments
//! below are this crate's own fixture numbering, stable enough for the
//! bundled encoder (used by tests and the fixture loader) and the
//! [`OpcodeTable`] trait to agree on. A real-bytecode opcode table is a
//! drop-in replacement behind the same trait.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::ast::{BinaryOpKind, UnaryOpKind};

/// Byte below which no object-specifier sub-operation exists. Bytes `>=`
/// this value belong to the `MakeObjectAlias` family; `byte - OBJECT_SPECIFIER_BASE`
/// indexes the sub-operation table.
pub const OBJECT_SPECIFIER_BASE: u8 = 23;

/// `opcodes[byte] -> mnemonic`, consumed by the decompiler's dispatch loop.
pub trait OpcodeTable {
    fn mnemonic(&self, byte: u8) -> Option<&str>;
    /// `comments[byte - 23] -> sub_operation_name`, only meaningful for
    /// bytes in the `MakeObjectAlias` family.
    fn sub_operation(&self, byte: u8) -> Option<&str>;
}

macro_rules! mnemonic_table {
    ($($byte:expr => $name:expr),+ $(,)?) => {
        &[$(($byte as u8, $name)),+]
    };
}

/// The fixture byte assignment. Ordering has no significance beyond giving
/// every mnemonic named in the instruction-category rules a stable byte.
static MNEMONIC_TABLE: &[(u8, &str)] = mnemonic_table! {
    0  => "Push0",
    1  => "Push1",
    2  => "Push2",
    3  => "Push3",
    4  => "PushMinus1",
    5  => "PushTrue",
    6  => "PushFalse",
    7  => "PushIt",
    8  => "PushMe",
    9  => "PushLiteral",
    10 => "PushLiteralExtended",
    11 => "PushVariable",
    12 => "PushVariableExtended",
    13 => "PushGlobal",
    14 => "PushGlobalExtended",
    15 => "PushParentVariable",

    16 => "PopVariable",
    17 => "PopVariableExtended",
    18 => "PopGlobal",
    19 => "PopGlobalExtended",
    20 => "PopParentVariable",
    21 => "SetData",

    22 => "Dup",

    23 => "MakeObjectAlias",
    24 => "MakeObjectAlias",
    25 => "MakeObjectAlias",
    26 => "MakeObjectAlias",
    27 => "MakeObjectAlias",
    28 => "MakeObjectAlias",
    29 => "MakeObjectAlias",

    30 => "Subtract",
    31 => "Add",
    32 => "Equal",
    33 => "NotEqual",
    34 => "Concatenate",
    35 => "Remainder",
    36 => "Divide",
    37 => "Multiply",
    38 => "Power",
    39 => "LessThanOrEqual",
    40 => "LessThan",
    41 => "GreaterThan",
    42 => "GreaterThanOrEqual",
    43 => "Coerce",
    44 => "Contains",
    45 => "Negate",
    46 => "Not",

    47 => "TestIf",
    48 => "Jump",
    49 => "LinkRepeat",
    50 => "RepeatNTimes",
    51 => "RepeatWhile",
    52 => "RepeatUntil",
    53 => "RepeatInCollection",
    54 => "RepeatInRange",
    55 => "Exit",
    56 => "ErrorHandler",
    57 => "EndErrorHandler",
    58 => "HandleError",
    59 => "Tell",
    60 => "EndTell",
    61 => "And",
    62 => "Or",

    63 => "MessageSend",
    64 => "PositionalMessageSend",
    65 => "StoreResult",
    66 => "Error",

    67 => "MakeVector",
    68 => "MakeRecord",

    69 => "Return",
};

/// `comments[byte - OBJECT_SPECIFIER_BASE] -> sub_operation_name`.
static SUB_OPERATION_TABLE: &[(u8, &str)] = &[
    (0, "GetPositionEnd"),
    (1, "GetProperty"),
    (2, "GetEvery"),
    (3, "GetIndexed"),
    (4, "GetKeyFrom"),
    (5, "GetRange"),
];

static MNEMONIC_BY_BYTE: Lazy<HashMap<u8, &'static str>> =
    Lazy::new(|| MNEMONIC_TABLE.iter().copied().collect());

static BYTE_BY_MNEMONIC: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (byte, name) in MNEMONIC_TABLE {
        map.entry(*name).or_insert(*byte);
    }
    map
});

static SUB_OPERATION_BY_OFFSET: Lazy<HashMap<u8, &'static str>> =
    Lazy::new(|| SUB_OPERATION_TABLE.iter().copied().collect());

/// The built-in, fixture-scale realization of [`OpcodeTable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinOpcodeTable;

impl OpcodeTable for BuiltinOpcodeTable {
    fn mnemonic(&self, byte: u8) -> Option<&str> {
        MNEMONIC_BY_BYTE.get(&byte).copied()
    }

    fn sub_operation(&self, byte: u8) -> Option<&str> {
        let offset = byte.checked_sub(OBJECT_SPECIFIER_BASE)?;
        SUB_OPERATION_BY_OFFSET.get(&offset).copied()
    }
}

/// Reverse lookup used by the fixture encoder (tests, and anything
/// constructing bytecode by hand) to find the byte for a mnemonic.
pub fn byte_for_mnemonic(mnemonic: &str) -> Option<u8> {
    BYTE_BY_MNEMONIC.get(mnemonic).copied()
}

/// Maps a binary-operator mnemonic (e.g. `"Add"`, `"Equal"`) to its
/// [`BinaryOpKind`]. `And`/`Or` are deliberately excluded: they are
/// constructed through the short-circuit block accumulators in
/// [`crate::decompiler::ops_control`], never by a direct pop-both-push-one
/// binary opcode.
pub fn binary_op_for_mnemonic(mnemonic: &str) -> Option<BinaryOpKind> {
    Some(match mnemonic {
        "Add" => BinaryOpKind::Add,
        "Subtract" => BinaryOpKind::Sub,
        "Multiply" => BinaryOpKind::Mul,
        "Divide" => BinaryOpKind::Div,
        "Remainder" => BinaryOpKind::Mod,
        "Power" => BinaryOpKind::Pow,
        "Concatenate" => BinaryOpKind::Concat,
        "Equal" => BinaryOpKind::Eq,
        "NotEqual" => BinaryOpKind::Ne,
        "LessThan" => BinaryOpKind::Lt,
        "LessThanOrEqual" => BinaryOpKind::Le,
        "GreaterThan" => BinaryOpKind::Gt,
        "GreaterThanOrEqual" => BinaryOpKind::Ge,
        "Coerce" => BinaryOpKind::Coerce,
        "Contains" => BinaryOpKind::Contains,
        _ => return None,
    })
}

/// Maps a unary-operator mnemonic to its [`UnaryOpKind`].
pub fn unary_op_for_mnemonic(mnemonic: &str) -> Option<UnaryOpKind> {
    Some(match mnemonic {
        "Negate" => UnaryOpKind::Neg,
        "Not" => UnaryOpKind::Not,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mnemonic_to_byte_and_back() {
        let table = BuiltinOpcodeTable;
        let byte = byte_for_mnemonic("Add").unwrap();
        assert_eq!(table.mnemonic(byte), Some("Add"));
    }

    #[test]
    fn object_specifier_sub_operations_resolve_from_base_offset() {
        let table = BuiltinOpcodeTable;
        let byte = OBJECT_SPECIFIER_BASE + 1;
        assert_eq!(table.mnemonic(byte), Some("MakeObjectAlias"));
        assert_eq!(table.sub_operation(byte), Some("GetProperty"));
    }

    #[test]
    fn unknown_byte_has_no_mnemonic() {
        let table = BuiltinOpcodeTable;
        assert_eq!(table.mnemonic(250), None);
    }

    #[test]
    fn and_or_are_not_binary_op_mnemonics() {
        assert_eq!(binary_op_for_mnemonic("And"), None);
        assert_eq!(binary_op_for_mnemonic("Or"), None);
    }
}
