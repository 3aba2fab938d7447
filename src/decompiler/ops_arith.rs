//! Stack pushes/pops and arithmetic/comparison/logical operators.
//!
//! Every push leaves `|stack| -> |stack| + 1`; every pop-and-queue opcode
//! (`PopVariable`, `PopGlobal`, `PopParentVariable`, `SetData`) queues
//! `pending_assignment` without touching the value stack itself — the value
//! is consumed later, when the queued target is paired with a value at a
//! flush point (`Jump`, `EndTell`, `StoreResult`, `EndErrorHandler`; see
//! [`super::ops_control`]). Binary opcodes leave `|stack| -> |stack| - 1`;
//! unary opcodes preserve stack size.

use crate::ast::{BinaryOpKind, Expression, Statement};
use crate::error::DecompileError;
use crate::literal::PoolValue;
use crate::opcodes::{binary_op_for_mnemonic, unary_op_for_mnemonic};

use super::{variable_name, BlockAccumulator, Reader, RepeatInProgress};

/// Dispatches a single mnemonic to its stack-push/pop/operator handler.
/// Returns `Ok(None)` when the mnemonic belongs to another category.
#[allow(clippy::too_many_arguments)]
pub(super) fn dispatch(
    mnemonic: &str,
    byte: u8,
    _curr_pos: usize,
    reader: &mut Reader,
    stack: &mut Vec<Expression>,
    block_stack: &mut [BlockAccumulator],
    pending_assignment: &mut Option<Expression>,
    literals: &[PoolValue],
    params: &[String],
) -> Result<Option<Vec<Statement>>, DecompileError> {
    match mnemonic {
        "Push0" | "Push1" | "Push2" | "Push3" => {
            let n = mnemonic.as_bytes()[4] - b'0';
            stack.push(Expression::NumberLiteral(n as i64));
        }
        "PushMinus1" => stack.push(Expression::NumberLiteral(-1)),
        "PushTrue" => stack.push(Expression::BooleanLiteral(true)),
        "PushFalse" => stack.push(Expression::BooleanLiteral(false)),
        "PushIt" => stack.push(Expression::VarRef("__it__".to_string())),
        "PushMe" => stack.push(Expression::VarRef("my".to_string())),
        "PushLiteral" | "PushLiteralExtended" => {
            let index = reader.read_index(byte, mnemonic.ends_with("Extended"))?;
            stack.push(super::literal_expr(literals, index)?);
        }
        "PushVariable" | "PushVariableExtended" => {
            let slot = reader.read_index(byte, mnemonic.ends_with("Extended"))?;
            stack.push(Expression::VarRef(variable_name(params, slot)));
        }
        "PushGlobal" | "PushGlobalExtended" => {
            let index = reader.read_index(byte, mnemonic.ends_with("Extended"))?;
            stack.push(super::literal_expr(literals, index)?);
        }
        "PushParentVariable" => {
            let slot = reader.read_index_extended()?;
            stack.push(Expression::VarRef(format!("[parent]{}", variable_name(params, slot))));
        }
        "PopVariable" | "PopVariableExtended" => {
            let slot = reader.read_index(byte, mnemonic.ends_with("Extended"))?;
            *pending_assignment = Some(Expression::VarRef(variable_name(params, slot)));
        }
        "PopGlobal" | "PopGlobalExtended" => {
            let index = reader.read_index(byte, mnemonic.ends_with("Extended"))?;
            let name = match literals.get(index) {
                Some(PoolValue::ByteString(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                Some(PoolValue::Utf16String(bytes)) => {
                    let units: Vec<u16> = bytes
                        .chunks_exact(2)
                        .map(|p| u16::from_be_bytes([p[0], p[1]]))
                        .collect();
                    String::from_utf16_lossy(&units)
                }
                _ => format!("[L{index}]"),
            };
            *pending_assignment = Some(Expression::VarRef(name));
        }
        "PopParentVariable" => {
            let slot = reader.read_index_extended()?;
            *pending_assignment = Some(Expression::VarRef(format!(
                "[parent]{}",
                variable_name(params, slot)
            )));
        }
        "SetData" => {
            let target = stack
                .pop()
                .ok_or_else(|| DecompileError::decode_failure("SetData: stack underflow"))?;
            *pending_assignment = Some(target);
        }
        "Dup" => {
            if let Some(top) = stack.last().cloned() {
                if should_duplicate(block_stack) {
                    stack.push(top);
                }
            }
        }
        _ => {
            if let Some(op) = binary_op_for_mnemonic(mnemonic) {
                let right = pop_operand(stack, mnemonic)?;
                let left = pop_operand(stack, mnemonic)?;
                stack.push(Expression::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            } else if let Some(op) = unary_op_for_mnemonic(mnemonic) {
                let operand = pop_operand(stack, mnemonic)?;
                stack.push(Expression::UnaryOp {
                    op,
                    operand: Box::new(operand),
                });
            } else {
                return Ok(None);
            }
        }
    }
    Ok(Some(Vec::new()))
}

fn pop_operand(stack: &mut Vec<Expression>, mnemonic: &str) -> Result<Expression, DecompileError> {
    stack
        .pop()
        .ok_or_else(|| DecompileError::decode_failure(format!("{mnemonic}: stack underflow")))
}

/// `Dup` is a stack-balancing artifact the compiler emits inside
/// non-`Forever` repeat bodies; everywhere else (including a bare handler
/// body, or a `Forever` repeat) it genuinely duplicates the top of stack.
/// Walks from the innermost block outward looking for the nearest
/// `RepeatInProgress`.
fn should_duplicate(block_stack: &[BlockAccumulator]) -> bool {
    for block in block_stack.iter().rev() {
        if let BlockAccumulator::Repeat(RepeatInProgress { kind, .. }) = block {
            return *kind == crate::ast::RepeatKind::Forever;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOpKind;
    use crate::opcodes::BuiltinOpcodeTable;

    #[test]
    fn push_constants() {
        let mut stack = Vec::new();
        let mut block_stack = vec![BlockAccumulator::Handler(Vec::new())];
        let mut pending = None;
        let mut reader = Reader::new(&[]);
        dispatch(
            "Push2",
            0,
            0,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(stack, vec![Expression::NumberLiteral(2)]);
    }

    #[test]
    fn add_pops_two_pushes_one() {
        let mut stack = vec![Expression::NumberLiteral(2), Expression::NumberLiteral(3)];
        let mut block_stack = vec![BlockAccumulator::Handler(Vec::new())];
        let mut pending = None;
        let mut reader = Reader::new(&[]);
        dispatch(
            "Add",
            0,
            0,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::Add,
                left: Box::new(Expression::NumberLiteral(2)),
                right: Box::new(Expression::NumberLiteral(3)),
            }]
        );
    }

    #[test]
    fn dup_skipped_inside_non_forever_repeat() {
        let mut stack = vec![Expression::NumberLiteral(1)];
        let mut block_stack = vec![
            BlockAccumulator::Handler(Vec::new()),
            BlockAccumulator::Repeat(RepeatInProgress {
                kind: crate::ast::RepeatKind::While,
                end_repeat_pos: 10,
                condition: None,
                times: None,
                counter_var: None,
                from_expr: None,
                to_expr: None,
                by_expr: None,
                in_expr: None,
                body: Vec::new(),
            }),
        ];
        let mut pending = None;
        let mut reader = Reader::new(&[]);
        dispatch(
            "Dup",
            0,
            0,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn unrecognized_mnemonic_returns_none() {
        let mut stack = Vec::new();
        let mut block_stack = vec![BlockAccumulator::Handler(Vec::new())];
        let mut pending = None;
        let mut reader = Reader::new(&[]);
        let _ = BuiltinOpcodeTable;
        let result = dispatch(
            "TestIf",
            0,
            0,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending,
            &[],
            &[],
        )
        .unwrap();
        assert!(result.is_none());
    }
}
