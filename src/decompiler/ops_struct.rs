//! Object specifiers (the `MakeObjectAlias` sub-operation family) and the
//! aggregate-literal opcodes `MakeVector`/`MakeRecord`.

use crate::ast::{BinaryOpKind, Expression, RecordField, Statement};
use crate::error::DecompileError;
use crate::opcodes::OpcodeTable;

/// The AppleEvent code for the special `kfrmID  ` key form: a literal
/// 8-character code (trailing spaces included) rather than a human label,
/// distinguishing "get item id X" from an ordinary named-key lookup.
const KEY_FORM_ID: &str = "kfrmID  ";

/// Dispatches a single mnemonic to the object-specifier or aggregate-literal
/// handler. Returns `Ok(None)` when the mnemonic belongs to another
/// category.
pub(super) fn dispatch(
    mnemonic: &str,
    byte: u8,
    opcodes: &dyn OpcodeTable,
    stack: &mut Vec<Expression>,
) -> Result<Option<Vec<Statement>>, DecompileError> {
    if mnemonic == "MakeObjectAlias" {
        return dispatch_object_alias(byte, opcodes, stack).map(Some);
    }

    let statements = match mnemonic {
        "MakeVector" => {
            let count = pop_count(stack, "MakeVector")?;
            let items = pop_n(stack, count, "MakeVector")?;
            stack.push(Expression::List(items));
            Vec::new()
        }
        "MakeRecord" => {
            // The popped count is the total item count (2n): n labels
            // interleaved with n values, in stack order.
            let count = pop_count(stack, "MakeRecord")?;
            let items = pop_n(stack, count, "MakeRecord")?;
            let mut fields = Vec::with_capacity(count / 2);
            let mut items = items.into_iter();
            while let (Some(label), Some(value)) = (items.next(), items.next()) {
                fields.push(RecordField { label, value });
            }
            stack.push(Expression::Record(fields));
            Vec::new()
        }
        _ => return Ok(None),
    };
    Ok(Some(statements))
}

fn dispatch_object_alias(
    byte: u8,
    opcodes: &dyn OpcodeTable,
    stack: &mut Vec<Expression>,
) -> Result<Vec<Statement>, DecompileError> {
    match opcodes.sub_operation(byte) {
        Some("GetPositionEnd") => {
            let container = pop(stack, "MakeObjectAlias")?;
            stack.push(Expression::UnaryOp {
                op: crate::ast::UnaryOpKind::EndOf,
                operand: Box::new(container),
            });
        }
        Some("GetProperty") => {
            let l = pop(stack, "MakeObjectAlias")?;
            let r = pop(stack, "MakeObjectAlias")?;
            stack.push(Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(l),
                right: Box::new(r),
            });
        }
        Some("GetEvery") => {
            let r = pop(stack, "MakeObjectAlias")?;
            let l = pop(stack, "MakeObjectAlias")?;
            stack.push(Expression::BinaryOp {
                op: BinaryOpKind::Every,
                left: Box::new(l),
                right: Box::new(r),
            });
        }
        Some("GetIndexed") => {
            // pop l, pop r, pop target -> push GetProperty(r, GetProperty(l, target))
            let l = pop(stack, "MakeObjectAlias")?;
            let r = pop(stack, "MakeObjectAlias")?;
            let target = pop(stack, "MakeObjectAlias")?;
            let inner = Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(l),
                right: Box::new(target),
            };
            stack.push(Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(r),
                right: Box::new(inner),
            });
        }
        Some("GetKeyFrom") => {
            // pop l, pop r; if l is the kfrmID keyword, pop a type, pop one
            // more value, and concatenate the type's code onto l.
            let l = pop(stack, "MakeObjectAlias")?;
            let r = pop(stack, "MakeObjectAlias")?;
            let l = if matches!(&l, Expression::Keyword(k) if k == KEY_FORM_ID) {
                let type_code = pop(stack, "MakeObjectAlias")?;
                stack.pop();
                concat_keyword(l, type_code)
            } else {
                l
            };
            stack.push(Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(l),
                right: Box::new(r),
            });
        }
        Some("GetRange") => {
            // pop to, pop from, pop prop, pop (discard), pop var, pop (discard)
            // -> push GetProperty(prop, GetProperty(Thru(from,to), var))
            let to = pop(stack, "MakeObjectAlias")?;
            let from = pop(stack, "MakeObjectAlias")?;
            let prop = pop(stack, "MakeObjectAlias")?;
            stack.pop();
            let var = pop(stack, "MakeObjectAlias")?;
            stack.pop();
            let range = Expression::BinaryOp {
                op: BinaryOpKind::Thru,
                left: Box::new(from),
                right: Box::new(to),
            };
            let range_of = Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(range),
                right: Box::new(var),
            };
            stack.push(Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(prop),
                right: Box::new(range_of),
            });
        }
        _ => {
            stack.pop();
            return Ok(vec![Statement::Comment(
                DecompileError::unknown_opcode(format!("MakeObjectAlias {byte:#04x}")).to_string(),
            )]);
        }
    }
    Ok(Vec::new())
}

/// `GetKeyFrom`'s `kfrmID` special case: appends the popped type code's text
/// onto the key-form label when both are keywords; otherwise leaves the
/// label unchanged (best-effort, per the spec's open question on this rule).
fn concat_keyword(label: Expression, type_code: Expression) -> Expression {
    match (label, type_code) {
        (Expression::Keyword(mut s), Expression::Keyword(t)) => {
            s.push_str(&t);
            Expression::Keyword(s)
        }
        (label, _) => label,
    }
}

fn pop(stack: &mut Vec<Expression>, mnemonic: &str) -> Result<Expression, DecompileError> {
    stack
        .pop()
        .ok_or_else(|| DecompileError::decode_failure(format!("{mnemonic}: stack underflow")))
}

/// Pops a non-negative element count off the value stack, for opcodes whose
/// aggregate size is pushed by a preceding `Push*` rather than carried in
/// the bytecode operand.
fn pop_count(stack: &mut Vec<Expression>, mnemonic: &str) -> Result<usize, DecompileError> {
    match pop(stack, mnemonic)? {
        Expression::NumberLiteral(n) if n >= 0 => Ok(n as usize),
        other => Err(DecompileError::decode_failure(format!(
            "{mnemonic}: expected a non-negative count, found {other:?}"
        ))),
    }
}

fn pop_n(
    stack: &mut Vec<Expression>,
    n: usize,
    mnemonic: &str,
) -> Result<Vec<Expression>, DecompileError> {
    if stack.len() < n {
        return Err(DecompileError::decode_failure(format!(
            "{mnemonic}: stack underflow popping {n} items"
        )));
    }
    let at = stack.len() - n;
    Ok(stack.split_off(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{BuiltinOpcodeTable, OBJECT_SPECIFIER_BASE};

    #[test]
    fn get_property_builds_binary_op_from_top_then_next() {
        let table = BuiltinOpcodeTable;
        // Stack, bottom to top: container ("doc"), key ("pnam"). The key is
        // popped first (l), the container second (r).
        let mut stack = vec![
            Expression::VarRef("doc".to_string()),
            Expression::Keyword("pnam".to_string()),
        ];
        let byte = OBJECT_SPECIFIER_BASE + 1;
        dispatch("MakeObjectAlias", byte, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(Expression::Keyword("pnam".to_string())),
                right: Box::new(Expression::VarRef("doc".to_string())),
            }]
        );
    }

    #[test]
    fn get_indexed_nests_get_property_around_target() {
        let table = BuiltinOpcodeTable;
        // Stack, bottom to top: target, r, l.
        let mut stack = vec![
            Expression::VarRef("target".to_string()),
            Expression::VarRef("r".to_string()),
            Expression::VarRef("l".to_string()),
        ];
        let byte = OBJECT_SPECIFIER_BASE + 3;
        dispatch("MakeObjectAlias", byte, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(Expression::VarRef("r".to_string())),
                right: Box::new(Expression::BinaryOp {
                    op: BinaryOpKind::GetProperty,
                    left: Box::new(Expression::VarRef("l".to_string())),
                    right: Box::new(Expression::VarRef("target".to_string())),
                }),
            }]
        );
    }

    #[test]
    fn get_key_from_id_form_concatenates_type_code_onto_label() {
        let table = BuiltinOpcodeTable;
        // Stack, bottom to top: discard, type, r, l=kfrmID.
        let mut stack = vec![
            Expression::VarRef("discard".to_string()),
            Expression::Keyword("docu".to_string()),
            Expression::NumberLiteral(3),
            Expression::Keyword(KEY_FORM_ID.to_string()),
        ];
        let byte = OBJECT_SPECIFIER_BASE + 4;
        dispatch("MakeObjectAlias", byte, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(Expression::Keyword(format!("{KEY_FORM_ID}docu"))),
                right: Box::new(Expression::NumberLiteral(3)),
            }]
        );
    }

    #[test]
    fn get_key_from_non_id_form_leaves_label_unchanged() {
        let table = BuiltinOpcodeTable;
        let mut stack = vec![
            Expression::NumberLiteral(3),
            Expression::Keyword("kfrmName".to_string()),
        ];
        let byte = OBJECT_SPECIFIER_BASE + 4;
        dispatch("MakeObjectAlias", byte, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(Expression::Keyword("kfrmName".to_string())),
                right: Box::new(Expression::NumberLiteral(3)),
            }]
        );
    }

    #[test]
    fn get_range_nests_thru_inside_get_property() {
        let table = BuiltinOpcodeTable;
        // Stack, bottom to top: discard, var, discard, prop, from, to.
        let mut stack = vec![
            Expression::VarRef("discard1".to_string()),
            Expression::VarRef("var".to_string()),
            Expression::VarRef("discard2".to_string()),
            Expression::VarRef("prop".to_string()),
            Expression::NumberLiteral(1),
            Expression::NumberLiteral(10),
        ];
        let byte = OBJECT_SPECIFIER_BASE + 5;
        dispatch("MakeObjectAlias", byte, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::BinaryOp {
                op: BinaryOpKind::GetProperty,
                left: Box::new(Expression::VarRef("prop".to_string())),
                right: Box::new(Expression::BinaryOp {
                    op: BinaryOpKind::GetProperty,
                    left: Box::new(Expression::BinaryOp {
                        op: BinaryOpKind::Thru,
                        left: Box::new(Expression::NumberLiteral(1)),
                        right: Box::new(Expression::NumberLiteral(10)),
                    }),
                    right: Box::new(Expression::VarRef("var".to_string())),
                }),
            }]
        );
    }

    #[test]
    fn make_vector_collects_items_in_order() {
        let mut stack = vec![
            Expression::NumberLiteral(1),
            Expression::NumberLiteral(2),
            Expression::NumberLiteral(3),
            Expression::NumberLiteral(3),
        ];
        let table = BuiltinOpcodeTable;
        dispatch("MakeVector", 0, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::List(vec![
                Expression::NumberLiteral(1),
                Expression::NumberLiteral(2),
                Expression::NumberLiteral(3),
            ])]
        );
    }

    #[test]
    fn make_record_pairs_adjacent_items_preserving_order() {
        let mut stack = vec![
            Expression::Keyword("name".to_string()),
            Expression::VarRef("a".to_string()),
            Expression::Keyword("age".to_string()),
            Expression::NumberLiteral(30),
            Expression::NumberLiteral(4),
        ];
        let table = BuiltinOpcodeTable;
        dispatch("MakeRecord", 0, &table, &mut stack)
            .unwrap()
            .unwrap();
        assert_eq!(
            stack,
            vec![Expression::Record(vec![
                RecordField {
                    label: Expression::Keyword("name".to_string()),
                    value: Expression::VarRef("a".to_string()),
                },
                RecordField {
                    label: Expression::Keyword("age".to_string()),
                    value: Expression::NumberLiteral(30),
                },
            ])]
        );
    }
}
