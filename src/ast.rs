//! # Abstract Syntax Tree for Decompiled AppleScript
//!
//! This module defines the **target representation** the decompiler builds
//! and the printer walks: a closed, tagged-variant tree of handlers, blocks,
//! statements and expressions that mirrors AppleScript's concrete syntax
//! closely enough to be printed back out, without attempting to model
//! execution semantics.
//!
//! ## Design
//! - The tree is printing-oriented, not execution-oriented: it keeps
//!   syntactic distinctions (`of` vs juxtaposition, `every X of Y` vs `X's Y`)
//!   that have no semantic difference but must round-trip in output.
//! - Nodes carry no source locations; a handler's decompilation pass is
//!   thrown away once the tree is built (see [`crate::decompiler`]).
//! - The transient block accumulators the decompiler mutates while a handler
//!   is still open (`IfInProgress`, `RepeatInProgress`, ...) are a *separate*
//!   sum type, `crate::decompiler::BlockAccumulator` — this module
//!   only contains the finalised shapes that reach a completed [`Script`].
//!   Because of that split, `end_if_pos`/`end_repeat_pos`/`end_try_pos` are
//!   plain (non-optional) fields here rather than nullable ones.

/// Top-level container produced by the driver: every property declaration,
/// every handler, and any top-level ("run") statements, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Script {
    pub properties: Vec<PropertyDecl>,
    pub handlers: Vec<Handler>,
    pub body: Vec<Statement>,
}

/// `property foo : 42`
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub initial_value: Expression,
}

/// A named subroutine: `on sayHello(name, greeting) ... end sayHello`.
#[derive(Clone, Debug, PartialEq)]
pub struct Handler {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Vec<Statement>,
}

/// Statements that make up a handler body, a `tell`/`repeat`/`if`/`try`
/// block, or the top-level run section.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Comment(String),
    PropertyDecl(PropertyDecl),
    Set(SetStatement),
    VarDecl(VarDecl),
    If(IfStatement),
    Repeat(RepeatStatement),
    Try(TryStatement),
    Tell(TellBlock),
    /// `return` or `return expr`.
    Return(Option<Expression>),
    ExitRepeat,
    ExprStmt(Expression),
}

/// `set x to expr`.
#[derive(Clone, Debug, PartialEq)]
pub struct SetStatement {
    pub target: LValue,
    pub value: Expression,
}

/// The assignable left-hand side of a [`SetStatement`]. A thin wrapper
/// around the referenced expression (almost always a [`Expression::VarRef`])
/// kept distinct so a future assignable-property form doesn't have to
/// reshape `SetStatement`.
#[derive(Clone, Debug, PartialEq)]
pub struct LValue {
    pub obj: Box<Expression>,
}

impl LValue {
    pub fn new(obj: Expression) -> Self {
        Self { obj: Box::new(obj) }
    }
}

/// `local x, y` or `global myVar`.
#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub names: Vec<String>,
    pub is_global: bool,
}

/// `if cond then ... [else ...] end if`.
///
/// `end_if_pos` is always populated in a finalised node: the compiler always
/// emits the trailing `Jump` that lets the decompiler discover it, even when
/// the source had no `else` clause (in that case `else_block` is simply
/// empty).
#[derive(Clone, Debug, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Vec<Statement>,
    pub else_block: Vec<Statement>,
    pub end_if_pos: usize,
}

/// Which form of `repeat` a [`RepeatStatement`] represents, and therefore
/// which of its optional fields are populated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatKind {
    /// `repeat` ... `end repeat`
    Forever,
    /// `repeat while cond`
    While,
    /// `repeat until cond`
    Until,
    /// `repeat N times`
    Times,
    /// `repeat with i from X to Y [by Z]`
    WithCounter,
    /// `repeat with i in X`
    WithIn,
}

/// `repeat ... end repeat`, in any of the forms in [`RepeatKind`].
///
/// Only the fields relevant to `kind` are populated; which ones those are is
/// dictated by `kind` itself (see [`RepeatKind`] and the class invariant in
/// the spec: "`RepeatStatement.kind` always matches which optional fields
/// are populated").
#[derive(Clone, Debug, PartialEq)]
pub struct RepeatStatement {
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

impl RepeatStatement {
    /// A bare `repeat ... end repeat` accumulator, as pushed by `LinkRepeat`
    /// before any of the `RepeatWhile`/`RepeatNTimes`/... refinement
    /// opcodes narrow it to its final [`RepeatKind`].
    pub fn forever(end_repeat_pos: usize) -> Self {
        Self {
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
        }
    }
}

/// `try ... on error [errVar] ... end try`.
///
/// The decompiler always constructs a `try_block`/`on_error_block` pair (see
/// §4.3.3's `ErrorHandler` rule), so both are plain `Vec`s here rather than
/// `Option`s; an empty `on_error_block` still prints an `on error` clause,
/// matching what the bytecode actually emits for every `try`.
#[derive(Clone, Debug, PartialEq)]
pub struct TryStatement {
    pub try_block: Vec<Statement>,
    pub on_error_var: Option<String>,
    pub on_error_block: Vec<Statement>,
    pub end_try_pos: usize,
}

/// `tell target ... end tell`.
#[derive(Clone, Debug, PartialEq)]
pub struct TellBlock {
    pub target: Expression,
    pub body: Vec<Statement>,
}

/// Binary operator kinds. `Coerce`, `GetProperty`, `GetIndexed`, `Every` and
/// `Thru` print using special-cased syntax rather than plain infix notation
/// (see [`crate::printer`]); `And`/`Or` are produced by the decompiler's
/// short-circuit block accumulators rather than directly by a binary-op
/// opcode, but land here once resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Coerce,
    Contains,
    GetIndexed,
    GetProperty,
    Every,
    Thru,
    And,
    Or,
}

/// Unary operator kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOpKind {
    Neg,
    Not,
    EndOf,
}

/// A single `label: value` pair inside a [`Expression::Record`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordField {
    pub label: Expression,
    pub value: Expression,
}

/// AppleScript's compound reference form, e.g.
/// `every paragraph of text of document 1`. No opcode rule in this
/// decompiler constructs one directly (composite references surface as
/// chains of `BinaryOp(GetProperty, ...)`/`BinaryOp(Every, ...)` instead),
/// but the printer still gives it a total mapping so the node stays
/// available to a reader of the tree (e.g. an analyzer) that wants to
/// synthesize one.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementSpecifier {
    pub container: Box<Expression>,
    pub element_class: Option<String>,
    pub key: Option<Box<Expression>>,
    pub key_kind: Option<String>,
}

/// Every expression form the decompiler can produce, plus a small number
/// (`ElementSpecifier`) that exist only for printer totality.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    StringLiteral(String),
    NumberLiteral(i64),
    BooleanLiteral(bool),
    /// `date "..."`; the original text is kept verbatim rather than parsed.
    DateLiteral(String),
    MissingValue,
    /// A four- or eight-byte AppleEvent code, carried as text and resolved
    /// to a human name by the printer via the dictionary (see
    /// [`crate::dictionary`]).
    Keyword(String),
    VarRef(String),
    List(Vec<Expression>),
    Record(Vec<RecordField>),
    ElementSpecifier(ElementSpecifier),
    BinaryOp {
        op: BinaryOpKind,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expression>,
    },
    /// `(target's command arg1 arg2)` or a bare StandardAdditions-style
    /// command. `arguments` always carries the direct object first (see the
    /// `MessageSend` rule in the spec).
    CommandCall {
        command_name: String,
        target: Option<Box<Expression>>,
        arguments: Vec<Expression>,
    },
    /// A user-defined handler invocation, `target's name(args)` or bare
    /// `name(args)` when there is no explicit target.
    HandlerCall {
        name: String,
        arguments: Vec<Expression>,
        target: Option<Box<Expression>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_statement_else_block_defaults_empty_but_end_if_pos_is_required() {
        let stmt = IfStatement {
            condition: Expression::BooleanLiteral(true),
            then_block: vec![Statement::ExitRepeat],
            else_block: Vec::new(),
            end_if_pos: 42,
        };
        assert!(stmt.else_block.is_empty());
        assert_eq!(stmt.end_if_pos, 42);
    }

    #[test]
    fn repeat_forever_has_no_optional_fields_populated() {
        let r = RepeatStatement::forever(10);
        assert_eq!(r.kind, RepeatKind::Forever);
        assert!(r.condition.is_none());
        assert!(r.counter_var.is_none());
    }
}
