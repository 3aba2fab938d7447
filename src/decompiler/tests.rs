//! End-to-end scenarios: raw bytecode in, printed AppleScript source out,
//! exercising the decompiler and printer together rather than either in
//! isolation.

use crate::analyzer::{BaseAnalyzer, NaiveStringAnalyzer};
use crate::ast::{BinaryOpKind, Expression, Handler, RepeatKind, RepeatStatement, Statement, TellBlock};
use crate::decompiler::decompile_handler;
use crate::dictionary::BuiltinDictionary;
use crate::literal::PoolValue;
use crate::loader::FunctionRecord;
use crate::opcodes::{byte_for_mnemonic, BuiltinOpcodeTable};
use crate::printer::Printer;

fn record(name: &str, literals: Vec<PoolValue>, code: Vec<u8>) -> FunctionRecord {
    FunctionRecord {
        name: name.to_string(),
        params: Vec::new(),
        literals,
        code,
    }
}

fn op(name: &str) -> u8 {
    byte_for_mnemonic(name).unwrap_or_else(|| panic!("no byte assigned for {name}"))
}

#[test]
fn push_true_return_prints_bare_return() {
    let rec = record("H", Vec::new(), vec![op("PushTrue"), op("Return")]);
    let handler = decompile_handler(&rec, &BuiltinOpcodeTable, false, false).unwrap();
    let printer = Printer::new(&BuiltinDictionary, &BaseAnalyzer);
    assert_eq!(printer.print_handler(&handler, 0), "on H\n    return true\nend H");
}

#[test]
fn add_of_two_literals_returns_binary_op() {
    let rec = record(
        "H",
        Vec::new(),
        vec![op("Push2"), op("Push3"), op("Add"), op("Return")],
    );
    let handler = decompile_handler(&rec, &BuiltinOpcodeTable, false, false).unwrap();
    assert_eq!(
        handler.body,
        vec![Statement::Return(Some(Expression::BinaryOp {
            op: BinaryOpKind::Add,
            left: Box::new(Expression::NumberLiteral(2)),
            right: Box::new(Expression::NumberLiteral(3)),
        }))]
    );
    let printer = Printer::new(&BuiltinDictionary, &BaseAnalyzer);
    assert_eq!(printer.print_handler(&handler, 0), "on H\n    return 2 + 3\nend H");
}

/// `{65, 66, 67}` collapses to a single string literal under the naive
/// string analyzer (see §4.5's printable-ASCII-number handling).
#[test]
fn ascii_char_list_collapses_under_naive_analyzer() {
    let literals = vec![PoolValue::Fixnum(65), PoolValue::Fixnum(66), PoolValue::Fixnum(67)];
    let code = vec![
        op("PushLiteralExtended"),
        0x00,
        0x00,
        op("PushLiteralExtended"),
        0x00,
        0x01,
        op("PushLiteralExtended"),
        0x00,
        0x02,
        op("Push3"),
        op("MakeVector"),
        op("Return"),
    ];
    let rec = record("H", literals, code);
    let handler = decompile_handler(&rec, &BuiltinOpcodeTable, false, false).unwrap();

    let analyzer = NaiveStringAnalyzer;
    let printer = Printer::new(&BuiltinDictionary, &analyzer);
    let out = printer.print_handler(&handler, 0);
    assert_eq!(out, "on H\n    return { \"ABC\" }\nend H");
}

/// A `tell` targeting an application, wrapping a bare `activate` call,
/// round-trips through the printer without losing the `tell` header or
/// collapsing the command's dropped `__it__` direct object.
#[test]
fn tell_application_activate_round_trips() {
    let handler = Handler {
        name: "H".to_string(),
        parameters: Vec::new(),
        body: vec![Statement::Tell(TellBlock {
            target: Expression::VarRef("application \"Finder\"".to_string()),
            body: vec![Statement::ExprStmt(Expression::CommandCall {
                command_name: "coreactv".to_string(),
                target: None,
                arguments: vec![Expression::VarRef("__it__".to_string())],
            })],
        })],
    };
    let printer = Printer::new(&BuiltinDictionary, &BaseAnalyzer);
    let out = printer.print_handler(&handler, 0);
    assert_eq!(
        out,
        "on H\n    tell application \"Finder\"\n        (activate)\n    end tell\nend H"
    );
}

/// `repeat with i from 1 to 10 by 2` with no body still prints the header
/// and `end repeat`.
#[test]
fn repeat_with_counter_and_empty_body() {
    let repeat = RepeatStatement {
        kind: RepeatKind::WithCounter,
        end_repeat_pos: 0,
        condition: None,
        times: None,
        counter_var: Some("i".to_string()),
        from_expr: Some(Expression::NumberLiteral(1)),
        to_expr: Some(Expression::NumberLiteral(10)),
        by_expr: Some(Expression::NumberLiteral(2)),
        in_expr: None,
        body: Vec::new(),
    };
    let handler = Handler {
        name: "H".to_string(),
        parameters: Vec::new(),
        body: vec![Statement::Repeat(repeat)],
    };
    let printer = Printer::new(&BuiltinDictionary, &BaseAnalyzer);
    let out = printer.print_handler(&handler, 0);
    assert_eq!(
        out,
        "on H\n    repeat with i from 1 to 10 by 2\n    end repeat\nend H"
    );
}

/// `1 and false`: the right branch is a bare `PushFalse` reached exactly at
/// the `And` accumulator's `end_pos`, collapsing to a single `BinaryOp`.
#[test]
fn and_expression_collapses_to_single_binary_op() {
    let code = vec![
        op("Push1"),
        op("And"),
        0x00,
        0x03,
        op("PushFalse"),
        op("Return"),
    ];
    let rec = record("H", Vec::new(), code);
    let handler = decompile_handler(&rec, &BuiltinOpcodeTable, false, false).unwrap();
    assert_eq!(
        handler.body,
        vec![Statement::Return(Some(Expression::BinaryOp {
            op: BinaryOpKind::And,
            left: Box::new(Expression::NumberLiteral(1)),
            right: Box::new(Expression::BooleanLiteral(false)),
        }))]
    );
    let printer = Printer::new(&BuiltinDictionary, &BaseAnalyzer);
    assert_eq!(printer.print_handler(&handler, 0), "on H\n    return 1 and false\nend H");
}
