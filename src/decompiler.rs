//! # Stack-Machine Decompiler
//!
//! This module implements the core fetch-decode-reduce loop that turns one
//! function record's byte-relative bytecode stream into a [`Handler`].
//!
//! ## High-level model
//! - **Value stack (`stack`)**: holds [`Expression`]s produced/consumed by
//!   push/pop/operator opcodes — the stack-machine operand stack.
//! - **Block stack (`block_stack`)**: a stack of [`BlockAccumulator`]s; the
//!   bottom entry is always the handler body itself, and each nested
//!   `if`/`repeat`/`try`/`tell`/`and`/`or` construct pushes one on entry and
//!   pops it on completion.
//! - **Pending assignment (`pending_assignment`)**: the target of a queued
//!   `set` that hasn't yet been paired with a value (see
//!   [`ops_arith::handle_pop_variable`] and friends).
//! - **Reader (`reader`)**: tracks the byte position and knows how to read
//!   the format's 16-bit byte-relative operands (see
//!   [`Reader::read_signed_word`]).
//!
//! Delegated by effect, matching the opcode categories in the component
//! design:
//! - Stack pushes/pops and arithmetic/logical operators: [`ops_arith`]
//! - Control flow (`if`/`repeat`/`try`/`tell`/`and`/`or`), calls and
//!   returns: [`ops_control`]
//! - Object specifiers and aggregate literals: [`ops_struct`]

use crate::ast::*;
use crate::error::DecompileError;
use crate::literal::PoolValue;
use crate::loader::FunctionRecord;
use crate::opcodes::OpcodeTable;

mod ops_arith;
mod ops_control;
mod ops_struct;

#[cfg(test)]
mod tests;

/// `if`/`then`/`else` in progress: mirrors [`IfStatement`] but with
/// `end_if_pos` still unknown until a `Jump` discovers it.
#[derive(Debug)]
pub(crate) struct IfInProgress {
    pub condition: Expression,
    pub else_pos: usize,
    pub end_if_pos: Option<usize>,
    pub then_block: Vec<Statement>,
    pub else_block: Vec<Statement>,
}

/// `repeat` in progress: starts as a bare `Forever` accumulator and is
/// narrowed in place by `RepeatWhile`/`RepeatNTimes`/etc.
#[derive(Debug)]
pub(crate) struct RepeatInProgress {
    pub kind: RepeatKind,
    pub end_repeat_pos: usize,
    pub condition: Option<Expression>,
    pub times: Option<Expression>,
    pub counter_var: Option<String>,
    pub from_expr: Option<Expression>,
    pub to_expr: Option<Expression>,
    pub by_expr: Option<Expression>,
    pub in_expr: Option<Expression>,
    pub body: Vec<Statement>,
}

/// `try`/`on error` in progress.
#[derive(Debug)]
pub(crate) struct TryInProgress {
    pub try_block: Vec<Statement>,
    pub on_error_var: Option<String>,
    pub on_error_block: Vec<Statement>,
    pub end_try_pos: Option<usize>,
}

/// `tell` in progress.
#[derive(Debug)]
pub(crate) struct TellInProgress {
    pub target: Expression,
    pub body: Vec<Statement>,
    pub is_done: bool,
}

/// `and`/`or` in progress: the short-circuit accumulator entered on `And`
/// or `Or` and resolved when the instruction pointer reaches `end_pos`.
#[derive(Debug)]
pub(crate) struct ShortCircuitInProgress {
    pub op: BinaryOpKind,
    pub left: Expression,
    pub end_pos: usize,
}

/// Transient block-stack entries. Distinct from the finalised [`Statement`]
/// variants so `end_if_pos`/`end_repeat_pos`/`end_try_pos` can stay
/// non-optional once a block is closed and emitted.
pub(crate) enum BlockAccumulator {
    Handler(Vec<Statement>),
    If(IfInProgress),
    Repeat(RepeatInProgress),
    Try(TryInProgress),
    Tell(TellInProgress),
    ShortCircuit(ShortCircuitInProgress),
}

/// Reads the byte-relative, signed-16-bit-operand instruction stream.
pub(crate) struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(code: &'a [u8]) -> Self {
        Self { code, pos: 0 }
    }

    fn has_next(&self) -> bool {
        self.pos < self.code.len()
    }

    fn curr_pos(&self) -> usize {
        self.pos
    }

    fn read_byte(&mut self) -> Result<u8, DecompileError> {
        let b = *self
            .code
            .get(self.pos)
            .ok_or_else(|| DecompileError::decode_failure("truncated instruction stream"))?;
        self.pos += 1;
        Ok(b)
    }

    /// Reads a big-endian 16-bit word, sign-extending via two's complement
    /// when the high bit is set. Used uniformly for branch deltas and pool
    //// variable indices in the `Extended` opcode forms.
    fn read_signed_word(&mut self) -> Result<i32, DecompileError> {
        let hi = self.read_byte()? as u16;
        let lo = self.read_byte()? as u16;
        let raw = (hi << 8) | lo;
        Ok(if raw & 0x8000 != 0 {
            raw as i32 - 0x1_0000
        } else {
            raw as i32
        })
    }

    /// Reads an operand index for an opcode with both a short and an
    /// `Extended` form: the low four bits of the already-read opcode `byte`
    /// for the short form (no further byte consumed), a signed word for the
    /// `Extended` form.
    fn read_index(&mut self, byte: u8, extended: bool) -> Result<usize, DecompileError> {
        if extended {
            self.read_index_extended()
        } else {
            Ok((byte & 0x0F) as usize)
        }
    }

    /// Reads a 16-bit operand index, for opcodes that only ever carry the
    /// `Extended` form (no short immediate exists to fall back to).
    fn read_index_extended(&mut self) -> Result<usize, DecompileError> {
        let word = self.read_signed_word()?;
        usize::try_from(word)
            .map_err(|_| DecompileError::decode_failure("negative operand index"))
    }

    /// Computes a branch target from a word just read at `operand_pos`:
    /// `operand_pos + 1 + offset` (relative to the byte before the operand).
    fn branch_target(operand_pos: usize, offset: i32) -> Result<usize, DecompileError> {
        let target = operand_pos as i64 + 1 + offset as i64;
        usize::try_from(target)
            .map_err(|_| DecompileError::decode_failure("branch target underflowed"))
    }
}

/// Resolves a pool index to the literal it names, converting it to an
/// [`Expression`] leaf. Out-of-range indices decode to a placeholder
/// `VarRef` rather than failing the whole handler, matching the source's
/// `"[L%d]"` fallback for indices beyond the pool.
pub(crate) fn literal_expr(literals: &[PoolValue], index: usize) -> Result<Expression, DecompileError> {
    match literals.get(index) {
        Some(value) => crate::literal::convert_literal(value),
        None => Ok(Expression::VarRef(format!("[L{index}]"))),
    }
}

/// Names a local variable slot, enriching it with the parameter name when
/// the slot indexes one of the handler's declared parameters.
pub(crate) fn variable_name(params: &[String], slot: usize) -> String {
    match params.get(slot) {
        Some(name) => format!("[var_{slot} ({name})]"),
        None => format!("[var_{slot}]"),
    }
}

/// Flushes whatever is on top of the value stack as either a
/// [`Statement::Set`] (when a pop opcode queued a target) or a bare
/// [`Statement::ExprStmt`], clearing `pending_assignment`.
pub(crate) fn flush_pending(
    stack: &mut Vec<Expression>,
    pending_assignment: &mut Option<Expression>,
) -> Option<Statement> {
    let value = stack.pop()?;
    if let Some(target) = pending_assignment.take() {
        Some(Statement::Set(SetStatement {
            target: LValue::new(target),
            value,
        }))
    } else {
        Some(Statement::ExprStmt(value))
    }
}

/// Decompiles one function record to a [`Handler`].
///
/// `emit_comments` mirrors `--comments`: a leading [`Statement::Comment`]
/// carrying the byte offset and mnemonic is attached to every instruction's
/// emitted statements. `debug` mirrors `--debug`: the value stack and
/// mnemonic are traced to standard error before each instruction runs.
pub fn decompile_handler(
    record: &FunctionRecord,
    opcodes: &dyn OpcodeTable,
    emit_comments: bool,
    debug: bool,
) -> Result<Handler, DecompileError> {
    let mut reader = Reader::new(&record.code);
    let mut stack: Vec<Expression> = Vec::new();
    let mut block_stack: Vec<BlockAccumulator> = vec![BlockAccumulator::Handler(Vec::new())];
    let mut pending_assignment: Option<Expression> = None;
    let mut prev_mnemonic: Option<String> = None;

    while reader.has_next() {
        let curr_pos = reader.curr_pos();

        if debug {
            eprintln!("{curr_pos:05x} {stack:?}");
        }

        // And/Or resolution: only when the immediate top of the block
        // stack is itself a short-circuit accumulator whose right operand
        // starts exactly here.
        if let Some(BlockAccumulator::ShortCircuit(sc)) = block_stack.last() {
            if curr_pos == sc.end_pos && !stack.is_empty() {
                let right = stack.pop().unwrap();
                if let Some(BlockAccumulator::ShortCircuit(sc)) = block_stack.pop() {
                    stack.push(Expression::BinaryOp {
                        op: sc.op,
                        left: Box::new(sc.left),
                        right: Box::new(right),
                    });
                }
            }
        }

        let byte = reader.read_byte()?;
        let mnemonic = opcodes
            .mnemonic(byte)
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown".to_string());

        let mut statements: Vec<Statement> = ops_arith::dispatch(
            &mnemonic,
            byte,
            curr_pos,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending_assignment,
            &record.literals,
            &record.params,
        )?
        .or(ops_control::dispatch(
            &mnemonic,
            curr_pos,
            &mut reader,
            &mut stack,
            &mut block_stack,
            &mut pending_assignment,
            &record.literals,
            &record.params,
            prev_mnemonic.as_deref(),
        )?)
        .or(ops_struct::dispatch(&mnemonic, byte, opcodes, &mut stack)?)
        .unwrap_or_else(|| match opcodes.mnemonic(byte) {
            Some(_) => Vec::new(),
            None => vec![Statement::Comment(
                DecompileError::unknown_opcode(format!("{byte:#04x}")).to_string(),
            )],
        });

        if emit_comments {
            let hex_pos = format!("{curr_pos:05x}");
            statements.insert(0, Statement::Comment(format!("{hex_pos} {mnemonic}")));
        }

        ops_control::reduce_block_stack(&mut block_stack, &mut stack, curr_pos, statements);

        prev_mnemonic = Some(mnemonic);
    }

    // Unwind anything still open at end-of-code: repeatedly pop the
    // innermost block, close it, and let the ordinary reduction loop
    // cascade the result through any remaining ancestors. A single pass
    // isn't enough: a `Tell`/`If` accumulator never satisfies its own
    // closing condition at a synthetic `curr_pos` of `usize::MAX`, so the
    // loop keeps forcing pops until only the root `Handler` is left.
    while block_stack.len() > 1 {
        let finished = block_stack.pop().unwrap();
        let statements: Vec<Statement> = ops_control::close_block(finished).into_iter().collect();
        ops_control::reduce_block_stack(&mut block_stack, &mut stack, usize::MAX, statements);
    }

    let body = match block_stack.pop() {
        Some(BlockAccumulator::Handler(body)) => body,
        _ => unreachable!("handler accumulator is always the root of the block stack"),
    };

    Ok(Handler {
        name: record.name.clone(),
        parameters: record.params.clone(),
        body,
    })
}
