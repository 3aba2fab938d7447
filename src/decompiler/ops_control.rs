//! Control flow (`if`/`repeat`/`try`/`tell`/`and`/`or`), message sends,
//! handler calls and `return`, plus the block-stack reduction loop that
//! routes completed statements into whichever construct is currently open
//! and closes constructs once their end position is reached.

use crate::ast::*;
use crate::error::DecompileError;
use crate::literal::PoolValue;

use super::{
    flush_pending, variable_name, BlockAccumulator, IfInProgress, Reader, RepeatInProgress,
    ShortCircuitInProgress, TellInProgress, TryInProgress,
};

#[allow(clippy::too_many_arguments)]
pub(super) fn dispatch(
    mnemonic: &str,
    curr_pos: usize,
    reader: &mut Reader,
    stack: &mut Vec<Expression>,
    block_stack: &mut Vec<BlockAccumulator>,
    pending_assignment: &mut Option<Expression>,
    literals: &[PoolValue],
    params: &[String],
    prev_mnemonic: Option<&str>,
) -> Result<Option<Vec<Statement>>, DecompileError> {
    let statements = match mnemonic {
        "TestIf" => {
            let word = reader.read_signed_word()?;
            let else_pos = Reader::branch_target(curr_pos, word)?;
            let condition = pop(stack, "TestIf")?;
            block_stack.push(BlockAccumulator::If(IfInProgress {
                condition,
                else_pos,
                end_if_pos: None,
                then_block: Vec::new(),
                else_block: Vec::new(),
            }));
            Vec::new()
        }
        "Jump" => {
            let word = reader.read_signed_word()?;
            let address = Reader::branch_target(curr_pos, word)?;
            let mut statements = Vec::new();
            let mut idx = block_stack.len() - 1;
            while idx > 0 {
                if let BlockAccumulator::If(ifp) = &block_stack[idx] {
                    if ifp.end_if_pos.is_none() {
                        break;
                    }
                }
                idx -= 1;
            }
            if let BlockAccumulator::If(ifp) = &mut block_stack[idx] {
                if ifp.end_if_pos.is_none() {
                    ifp.end_if_pos = Some(address);
                    if let Some(stmt) = flush_pending(stack, pending_assignment) {
                        statements.push(stmt);
                    }
                }
            }
            statements
        }
        "LinkRepeat" => {
            let word = reader.read_signed_word()?;
            let end_repeat_pos = Reader::branch_target(curr_pos, word)?;
            block_stack.push(BlockAccumulator::Repeat(RepeatInProgress {
                kind: RepeatKind::Forever,
                end_repeat_pos,
                condition: None,
                times: None,
                counter_var: None,
                from_expr: None,
                to_expr: None,
                by_expr: None,
                in_expr: None,
                body: Vec::new(),
            }));
            Vec::new()
        }
        "RepeatNTimes" => {
            stack.pop();
            let n = pop(stack, "RepeatNTimes")?;
            with_open_repeat(block_stack, |r| {
                r.kind = RepeatKind::Times;
                r.times = Some(n.clone());
            })?;
            Vec::new()
        }
        "RepeatWhile" => {
            let cond = pop(stack, "RepeatWhile")?;
            with_open_repeat(block_stack, |r| {
                r.kind = RepeatKind::While;
                r.condition = Some(cond.clone());
            })?;
            Vec::new()
        }
        "RepeatUntil" => {
            let cond = pop(stack, "RepeatUntil")?;
            with_open_repeat(block_stack, |r| {
                r.kind = RepeatKind::Until;
                r.condition = Some(cond.clone());
            })?;
            Vec::new()
        }
        "RepeatInCollection" => {
            let slot = reader.read_index_extended()?;
            stack.pop();
            stack.pop();
            let collection = pop(stack, "RepeatInCollection")?;
            let name = variable_name(params, slot);
            with_open_repeat(block_stack, |r| {
                r.kind = RepeatKind::WithIn;
                r.counter_var = Some(name.clone());
                r.in_expr = Some(collection.clone());
            })?;
            Vec::new()
        }
        "RepeatInRange" => {
            let slot = reader.read_index_extended()?;
            let by = pop(stack, "RepeatInRange")?;
            let to = pop(stack, "RepeatInRange")?;
            let from = pop(stack, "RepeatInRange")?;
            let name = variable_name(params, slot);
            with_open_repeat(block_stack, |r| {
                r.kind = RepeatKind::WithCounter;
                r.from_expr = Some(from.clone());
                r.to_expr = Some(to.clone());
                r.by_expr = Some(by.clone());
                r.counter_var = Some(name.clone());
            })?;
            Vec::new()
        }
        "Exit" => vec![Statement::ExitRepeat],
        "ErrorHandler" => {
            let _ = reader.read_signed_word()?;
            block_stack.push(BlockAccumulator::Try(TryInProgress {
                try_block: Vec::new(),
                on_error_var: None,
                on_error_block: Vec::new(),
                end_try_pos: None,
            }));
            Vec::new()
        }
        "EndErrorHandler" => {
            let word = reader.read_signed_word()?;
            let address = Reader::branch_target(curr_pos, word)?;
            let mut idx = block_stack.len() - 1;
            while idx > 0 && !matches!(block_stack[idx], BlockAccumulator::Try(_)) {
                idx -= 1;
            }
            let flushed = flush_if_call_or_pending(stack, pending_assignment);
            if let BlockAccumulator::Try(try_p) = &mut block_stack[idx] {
                if let Some(stmt) = flushed {
                    try_p.try_block.push(stmt);
                }
                try_p.end_try_pos = Some(address);
            }
            Vec::new()
        }
        "HandleError" => {
            // Two slot reads with no semantic effect on the AST: the
            // original decompiler only ever uses these for its debug
            // comment.
            let _ = reader.read_index_extended()?;
            let _ = reader.read_index_extended()?;
            Vec::new()
        }
        "Tell" => {
            let _ = reader.read_signed_word()?;
            let target = pop(stack, "Tell")?;
            block_stack.push(BlockAccumulator::Tell(TellInProgress {
                target,
                body: Vec::new(),
                is_done: false,
            }));
            Vec::new()
        }
        "EndTell" => {
            let mut idx = block_stack.len() - 1;
            while idx > 0 && !matches!(block_stack[idx], BlockAccumulator::Tell(_)) {
                idx -= 1;
            }
            let mut statements = Vec::new();
            let is_misccura = match &block_stack[idx] {
                BlockAccumulator::Tell(tell) => {
                    matches!(&tell.target, Expression::Keyword(k) if k == "misccura")
                }
                _ => false,
            };
            if !stack.is_empty() && !is_misccura {
                if let Some(stmt) = flush_pending(stack, pending_assignment) {
                    statements.push(stmt);
                }
            }
            if let BlockAccumulator::Tell(tell) = &mut block_stack[idx] {
                tell.is_done = true;
            }
            statements
        }
        "And" | "Or" => {
            let word = reader.read_signed_word()?;
            let end_pos = Reader::branch_target(curr_pos, word)?;
            let left = pop(stack, mnemonic)?;
            let op = if mnemonic == "And" {
                BinaryOpKind::And
            } else {
                BinaryOpKind::Or
            };
            block_stack.push(BlockAccumulator::ShortCircuit(ShortCircuitInProgress {
                op,
                left,
                end_pos,
            }));
            Vec::new()
        }
        "MessageSend" => {
            let index = reader.read_signed_word()? as usize;
            let command_name = match literals.get(index) {
                Some(PoolValue::EventCode(class, id)) => {
                    format!(
                        "{}{}",
                        crate::literal::code_to_ascii(*class),
                        crate::literal::code_to_ascii(*id)
                    )
                }
                _ => format!("[L{index}]"),
            };
            let args_count = as_count(pop(stack, "MessageSend")?)?;
            let args = pop_n(stack, args_count, "MessageSend")?;
            let direct_object = pop(stack, "MessageSend")?;
            let mut arguments = vec![direct_object];
            arguments.extend(args);
            stack.push(Expression::CommandCall {
                command_name,
                target: None,
                arguments,
            });
            Vec::new()
        }
        "PositionalMessageSend" => {
            let index = reader.read_signed_word()? as usize;
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
            let args_count = as_count(pop(stack, "PositionalMessageSend")?)?;
            let arguments = pop_n(stack, args_count, "PositionalMessageSend")?;
            let target = match stack.pop() {
                Some(Expression::VarRef(ref name)) if name == "__it__" => None,
                other => other,
            };
            stack.push(Expression::HandlerCall {
                name,
                arguments,
                target: target.map(Box::new),
            });
            Vec::new()
        }
        "StoreResult" => {
            if stack.is_empty() {
                vec![Statement::Comment(
                    DecompileError::unknown_opcode("StoreResult").to_string(),
                )]
            } else {
                flush_pending(stack, pending_assignment)
                    .into_iter()
                    .collect()
            }
        }
        "Error" => {
            let first = pop(stack, "Error")?;
            let (count, sentinel) = match first {
                Expression::NumberLiteral(n) => (n as usize, None),
                other => {
                    let count_expr = pop(stack, "Error")?;
                    (as_count(count_expr)?, Some(other))
                }
            };
            let mut arguments = pop_n(stack, count, "Error")?;
            if let Some(sentinel) = sentinel {
                arguments.insert(0, sentinel);
            }
            stack.pop();
            vec![Statement::ExprStmt(Expression::CommandCall {
                command_name: "error".to_string(),
                target: None,
                arguments,
            })]
        }
        "Return" => match stack.last() {
            Some(Expression::CommandCall { .. }) | Some(Expression::HandlerCall { .. }) => {
                vec![Statement::ExprStmt(stack.pop().unwrap())]
            }
            Some(_) => vec![Statement::Return(stack.pop())],
            None if prev_mnemonic != Some("Return") => vec![Statement::Return(None)],
            None => Vec::new(),
        },
        _ => return Ok(None),
    };
    Ok(Some(statements))
}

fn pop(stack: &mut Vec<Expression>, mnemonic: &str) -> Result<Expression, DecompileError> {
    stack
        .pop()
        .ok_or_else(|| DecompileError::decode_failure(format!("{mnemonic}: stack underflow")))
}

fn pop_n(
    stack: &mut Vec<Expression>,
    n: usize,
    mnemonic: &str,
) -> Result<Vec<Expression>, DecompileError> {
    if stack.len() < n {
        return Err(DecompileError::decode_failure(format!(
            "{mnemonic}: stack underflow popping {n} arguments"
        )));
    }
    let at = stack.len() - n;
    Ok(stack.split_off(at))
}

fn as_count(expr: Expression) -> Result<usize, DecompileError> {
    match expr {
        Expression::NumberLiteral(n) if n >= 0 => Ok(n as usize),
        _ => Err(DecompileError::decode_failure(
            "expected a non-negative argument count",
        )),
    }
}

fn with_open_repeat(
    block_stack: &mut [BlockAccumulator],
    f: impl FnOnce(&mut RepeatInProgress),
) -> Result<(), DecompileError> {
    match block_stack.last_mut() {
        Some(BlockAccumulator::Repeat(r)) => {
            f(r);
            Ok(())
        }
        _ => Err(DecompileError::decode_failure(
            "repeat-refinement opcode outside an open repeat block",
        )),
    }
}

/// `EndErrorHandler`'s flush rule: a queued assignment always flushes, but a
/// bare expression only flushes when it is itself a call (so the error
/// variable capture doesn't accidentally swallow an unrelated leftover
/// value).
fn flush_if_call_or_pending(
    stack: &mut Vec<Expression>,
    pending_assignment: &mut Option<Expression>,
) -> Option<Statement> {
    if pending_assignment.is_some() {
        return flush_pending(stack, pending_assignment);
    }
    match stack.last() {
        Some(Expression::CommandCall { .. }) | Some(Expression::HandlerCall { .. }) => {
            stack.pop().map(Statement::ExprStmt)
        }
        _ => None,
    }
}

/// One reduction pass: routes `statements` into the innermost open block
/// (skipping short-circuit accumulators, which are resolved separately at
/// the top of the main loop) and, if that block's closing condition is now
/// met, closes it and cascades the result into its parent.
pub(super) fn reduce_block_stack(
    block_stack: &mut Vec<BlockAccumulator>,
    stack: &mut Vec<Expression>,
    curr_pos: usize,
    mut statements: Vec<Statement>,
) {
    loop {
        let mut idx = block_stack.len() - 1;
        while matches!(block_stack[idx], BlockAccumulator::ShortCircuit(_)) {
            idx -= 1;
        }

        let mut closed = false;
        match &mut block_stack[idx] {
            BlockAccumulator::Tell(tell) => {
                if !statements.is_empty() {
                    tell.body.append(&mut statements);
                }
                if tell.is_done {
                    closed = true;
                }
            }
            BlockAccumulator::Try(try_p) => {
                if !statements.is_empty() {
                    if try_p.end_try_pos.is_some() {
                        try_p.on_error_block.append(&mut statements);
                    } else {
                        try_p.try_block.append(&mut statements);
                    }
                }
                if matches!(try_p.end_try_pos, Some(end) if curr_pos >= end) {
                    closed = true;
                }
            }
            BlockAccumulator::Repeat(repeat) => {
                if !statements.is_empty() && curr_pos <= repeat.end_repeat_pos {
                    repeat.body.append(&mut statements);
                }
                if curr_pos >= repeat.end_repeat_pos {
                    closed = true;
                }
            }
            BlockAccumulator::If(ifp) => {
                if !statements.is_empty() && curr_pos < ifp.else_pos {
                    ifp.then_block.append(&mut statements);
                } else if let Some(end_if) = ifp.end_if_pos {
                    if !statements.is_empty() && curr_pos <= end_if {
                        ifp.else_block.append(&mut statements);
                    }
                    if curr_pos == end_if {
                        if let Some(top) = stack.pop() {
                            ifp.else_block.push(Statement::ExprStmt(top));
                        }
                        closed = true;
                    }
                }
            }
            BlockAccumulator::Handler(body) => {
                if !statements.is_empty() {
                    body.append(&mut statements);
                }
            }
            BlockAccumulator::ShortCircuit(_) => unreachable!("skipped above"),
        }

        if !closed {
            break;
        }
        let finished = block_stack.remove(idx);
        statements = close_block(finished).into_iter().collect();
    }
}

/// Converts a closed block accumulator into its finalised [`Statement`].
/// Returns `None` for a `tell` whose target is the compiler-synthesised
/// `misccura` marker, whose body is dropped entirely (its contents remain
/// as ordinary expressions for the surrounding context to consume).
pub(super) fn close_block(acc: BlockAccumulator) -> Option<Statement> {
    match acc {
        BlockAccumulator::Tell(tell) => {
            if matches!(&tell.target, Expression::Keyword(k) if k == "misccura") {
                None
            } else {
                Some(Statement::Tell(TellBlock {
                    target: tell.target,
                    body: tell.body,
                }))
            }
        }
        BlockAccumulator::Try(try_p) => Some(Statement::Try(TryStatement {
            try_block: try_p.try_block,
            on_error_var: try_p.on_error_var,
            on_error_block: try_p.on_error_block,
            end_try_pos: try_p.end_try_pos.unwrap_or(0),
        })),
        BlockAccumulator::Repeat(repeat) => Some(Statement::Repeat(RepeatStatement {
            kind: repeat.kind,
            end_repeat_pos: repeat.end_repeat_pos,
            condition: repeat.condition,
            times: repeat.times,
            counter_var: repeat.counter_var,
            from_expr: repeat.from_expr,
            to_expr: repeat.to_expr,
            by_expr: repeat.by_expr,
            in_expr: repeat.in_expr,
            body: repeat.body,
        })),
        BlockAccumulator::If(ifp) => Some(Statement::If(IfStatement {
            condition: ifp.condition,
            then_block: ifp.then_block,
            else_block: ifp.else_block,
            end_if_pos: ifp.end_if_pos.unwrap_or(ifp.else_pos),
        })),
        BlockAccumulator::Handler(_) | BlockAccumulator::ShortCircuit(_) => None,
    }
}
